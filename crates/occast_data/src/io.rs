//! Reading and writing series files and observation exports.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use occast_core::BucketKind;

use crate::error::{DataError, Result};
use crate::observation::Observation;
use crate::series::{SeriesRow, SeriesTable};

/// Write a table as CSV with header `speciesName,count,bucketIndex,className`.
///
/// One row per non-zero cell, ordered by bucket then species.
pub fn write_series_csv<P: AsRef<Path>>(table: &SeriesTable, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let rows = table.rows();
    for row in &rows {
        writer
            .serialize(row)
            .map_err(|e| DataError::FormatError(format!("Failed to write series row: {e}")))?;
    }
    writer.flush()?;

    tracing::debug!(path = %path.as_ref().display(), rows = rows.len(), "wrote series file");
    Ok(())
}

/// Read a series CSV into a table.
///
/// Missing zero rows are expected. The `className` column is optional and
/// duplicate (species, bucket) rows are summed.
///
/// # Errors
///
/// Returns [`DataError::Parse`] naming the line of the first bad row.
pub fn read_series_csv<P: AsRef<Path>>(path: P, kind: BucketKind) -> Result<SeriesTable> {
    let file = File::open(path.as_ref())?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let mut rows = Vec::new();
    for result in reader.deserialize::<SeriesRow>() {
        let row = result.map_err(|e| {
            let line = e.position().map_or(0, csv::Position::line);
            DataError::Parse(format!("series file line {line}: {e}"))
        })?;
        if row.species.trim().is_empty() {
            return Err(DataError::Parse(format!(
                "series file row for bucket {} has an empty species name",
                row.bucket
            )));
        }
        rows.push(row);
    }

    let table = SeriesTable::from_rows(kind, rows);
    tracing::debug!(
        path = %path.as_ref().display(),
        species = table.n_species(),
        "read series file"
    );
    Ok(table)
}

/// Read a JSON array of occurrence records.
///
/// Records that do not deserialize are skipped and counted. The second
/// value of the returned pair is that count.
///
/// # Errors
///
/// Returns [`DataError::Parse`] if the file is not a JSON array.
pub fn read_observations_json<P: AsRef<Path>>(path: P) -> Result<(Vec<Observation>, usize)> {
    let file = File::open(path.as_ref())?;
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| DataError::Parse(format!("Failed to parse observations: {e}")))?;

    let serde_json::Value::Array(records) = json else {
        return Err(DataError::Parse(
            "observation file must hold a JSON array".to_string(),
        ));
    };

    let mut observations = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for (i, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Observation>(record) {
            Ok(observation) => observations.push(observation),
            Err(e) => {
                tracing::debug!(record = i, error = %e, "skipping unreadable observation");
                skipped += 1;
            }
        }
    }

    Ok((observations, skipped))
}
