//! occast CLI: aggregate occurrence records, train, evaluate and forecast.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use occast::models::{checkpoint::METADATA_FILE, ArtifactMetadata};
use occast::prelude::*;
use occast::stages::aggregate_file;

/// Backend for inference.
type InferBackend = NdArray;
/// Backend for training.
type TrainBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "occast")]
#[command(author, version)]
#[command(about = "Species-occurrence forecasting with negative-binomial LSTM models")]
#[command(long_about = "occast: forecast species-occurrence counts from biodiversity records.

EXAMPLES:
  # Bucket raw occurrence records into a seasonal series file
  occast aggregate --input occurrences.json --output series.csv

  # Train on the series and write an artifact directory
  occast train --series series.csv --output runs/bryozoa --epochs 100

  # Train seasonally on a monthly series file
  occast train --series monthly.csv --series-kind month --output runs/bryozoa

  # Score the test partition
  occast evaluate --artifact runs/bryozoa --series series.csv --partition test

  # Forecast eight seasons ahead
  occast predict --artifact runs/bryozoa --series series.csv --species \"Disporella hispida\" --total 8")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bucket a JSON array of occurrence records into a series CSV
    Aggregate {
        /// Occurrence records (JSON array)
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Series file to write
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Bucket width: month or season
        #[arg(long, value_name = "KIND")]
        kind: Option<BucketKind>,
    },
    /// Train a forecaster on a series file
    Train {
        /// Series file
        #[arg(long, value_name = "FILE")]
        series: PathBuf,

        /// Bucket width of the series file (defaults to the configured kind)
        #[arg(long, value_name = "KIND")]
        series_kind: Option<BucketKind>,

        /// Artifact directory to write
        #[arg(long, default_value = "./runs/occast", value_name = "DIR")]
        output: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Number of training epochs
        #[arg(long, value_name = "N")]
        epochs: Option<usize>,

        /// Learning rate for Adam
        #[arg(long, value_name = "LR")]
        lr: Option<f64>,

        /// Batch size
        #[arg(long, value_name = "SIZE")]
        batch_size: Option<usize>,

        /// Random seed
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,
    },
    /// Evaluate an artifact on one partition
    Evaluate {
        /// Artifact directory
        #[arg(long, value_name = "DIR")]
        artifact: PathBuf,

        /// Series file
        #[arg(long, value_name = "FILE")]
        series: PathBuf,

        /// Bucket width of the series file (defaults to the configured kind)
        #[arg(long, value_name = "KIND")]
        series_kind: Option<BucketKind>,

        /// Partition: train, valid or test
        #[arg(long, default_value = "test", value_name = "PARTITION")]
        partition: Partition,
    },
    /// Forecast a species from the configured start year
    Predict {
        /// Artifact directory
        #[arg(long, value_name = "DIR")]
        artifact: PathBuf,

        /// Series file
        #[arg(long, value_name = "FILE")]
        series: PathBuf,

        /// Bucket width of the series file (defaults to the configured kind)
        #[arg(long, value_name = "KIND")]
        series_kind: Option<BucketKind>,

        /// Species name
        #[arg(long)]
        species: String,

        /// Predicted means fed back per model call
        #[arg(long, default_value = "1", value_name = "K")]
        steps_per_prediction: usize,

        /// Number of buckets to forecast
        #[arg(long, default_value = "8", value_name = "N")]
        total: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Aggregate {
            input,
            output,
            config,
            kind,
        } => handle_aggregate(&input, &output, config.as_deref(), kind),
        Commands::Train {
            series,
            series_kind,
            output,
            config,
            epochs,
            lr,
            batch_size,
            seed,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(epochs) = epochs {
                config.training.n_epochs = epochs;
            }
            if let Some(lr) = lr {
                config.training.lr = lr;
            }
            if let Some(batch_size) = batch_size {
                config.training.batch_size = batch_size;
            }
            if let Some(seed) = seed {
                config.training.seed = Seed::new(seed);
            }
            config.training.verbose = cli.verbose > 0;
            handle_train(&series, series_kind, &output, config)
        }
        Commands::Evaluate {
            artifact,
            series,
            series_kind,
            partition,
        } => handle_evaluate(&artifact, &series, series_kind, partition),
        Commands::Predict {
            artifact,
            series,
            series_kind,
            species,
            steps_per_prediction,
            total,
        } => handle_predict(
            &artifact,
            &series,
            series_kind,
            PredictionRequest::new(species, steps_per_prediction, total),
        ),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Read a series file written with buckets of `series_kind`.
///
/// Without an explicit kind the file is assumed to match the config. A
/// monthly file under a seasonal config is folded when the context is built.
fn load_series(path: &Path, series_kind: Option<BucketKind>, config: &PipelineConfig) -> Result<SeriesTable> {
    let kind = series_kind.unwrap_or(config.bucketing.kind);
    read_series_csv(path, kind).with_context(|| format!("Failed to read {kind} series {}", path.display()))
}

fn handle_aggregate(input: &Path, output: &Path, config: Option<&Path>, kind: Option<BucketKind>) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(kind) = kind {
        config.bucketing.kind = kind;
    }

    let (table, report) = aggregate_file(input, &config.bucketing)
        .with_context(|| format!("Failed to aggregate {}", input.display()))?;
    if table.is_empty() {
        bail!("No usable observations in {}", input.display());
    }
    write_series_csv(&table, output).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("=== occast Aggregation ===\n");
    println!("  Bucket kind:        {}", table.kind());
    println!("  Species:            {}", table.n_species());
    println!("  Accepted:           {}", report.accepted);
    println!("  Year-only (month 1): {}", report.defaulted_to_first_month);
    println!("  Malformed skipped:  {}", report.skipped_malformed);
    println!("  Before epoch:       {}", report.skipped_before_epoch);
    println!("\nSeries written to {}", output.display());
    Ok(())
}

fn handle_train(series: &Path, series_kind: Option<BucketKind>, output: &Path, config: PipelineConfig) -> Result<()> {
    println!("=== occast Training ===\n");
    println!("Configuration:");
    println!("  Buckets: {}", config.bucketing.kind);
    println!("  Window: {} -> {}", config.windowing.seq_len, config.windowing.horizon);
    println!(
        "  Model: {} x {} LSTM",
        config.model.n_layers, config.model.hidden_size
    );
    println!("  Epochs: {}", config.training.n_epochs);
    println!("  Learning rate: {}", config.training.lr);
    println!("  Batch size: {}", config.training.batch_size);
    println!("  Seed: {}\n", config.training.seed.value());

    let table = load_series(series, series_kind, &config)?;
    let mut context =
        ForecastContext::<InferBackend>::prepare(config, table).context("Failed to prepare series")?;

    let device = burn_ndarray::NdArrayDevice::Cpu;
    let summary = context
        .train::<TrainBackend>(&device)
        .context("Training failed")?;

    println!("Epochs run: {}", summary.epochs_run);
    if let (Some(epoch), Some(loss)) = (summary.best_epoch, summary.best_valid_loss) {
        println!("Best validation loss: {loss:.5} (epoch {})", epoch + 1);
    }
    if let Some(loss) = summary.final_train_loss {
        println!("Final training loss: {loss:.5}");
    }

    let dir = context.save(output).context("Failed to save artifact")?;
    println!("\nArtifact written to {}", dir.display());
    Ok(())
}

fn load_context(
    artifact: &Path,
    series: &Path,
    series_kind: Option<BucketKind>,
) -> Result<ForecastContext<InferBackend>> {
    let metadata = ArtifactMetadata::load(artifact.join(METADATA_FILE))
        .with_context(|| format!("Failed to read artifact {}", artifact.display()))?;
    let config: PipelineConfig =
        serde_json::from_value(metadata.pipeline).context("Artifact has no usable pipeline config")?;

    let table = load_series(series, series_kind, &config)?;
    let device = burn_ndarray::NdArrayDevice::Cpu;
    ForecastContext::<InferBackend>::load(artifact, table, &device).context("Failed to load artifact")
}

fn handle_evaluate(
    artifact: &Path,
    series: &Path,
    series_kind: Option<BucketKind>,
    partition: Partition,
) -> Result<()> {
    let context = load_context(artifact, series, series_kind)?;
    let report = context
        .evaluate(partition)
        .with_context(|| format!("Failed to evaluate {partition} partition"))?;

    println!("=== occast Evaluation ({partition}) ===\n");
    println!("  Windows: {}", report.n_windows);
    println!("  MAE:     {:.6}", report.mae);
    println!("  RMSE:    {:.6}", report.rmse);
    println!("  NB NLL:  {:.6}", report.nll);
    Ok(())
}

fn handle_predict(
    artifact: &Path,
    series: &Path,
    series_kind: Option<BucketKind>,
    request: PredictionRequest,
) -> Result<()> {
    let context = load_context(artifact, series, series_kind)?;
    let response = handle_prediction(&context, &request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.success {
        bail!("Prediction failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly_table() -> SeriesTable {
        let mut table = SeriesTable::new(BucketKind::Month);
        for month in 0..12 {
            table.add_count("Disporella hispida", BucketIndex::new(month), u64::from(month) + 1);
        }
        table
    }

    #[test]
    fn test_monthly_file_folds_into_seasons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monthly.csv");
        write_series_csv(&monthly_table(), &path).unwrap();

        let config = PipelineConfig::default();
        assert_eq!(config.bucketing.kind, BucketKind::Season);

        let table = load_series(&path, Some(BucketKind::Month), &config).unwrap();
        assert_eq!(table.kind(), BucketKind::Month);

        let mut config = config;
        config.normalization.share_of_total = false;
        let context = ForecastContext::<InferBackend>::prepare(config, table).unwrap();
        assert_eq!(context.kind(), BucketKind::Season);
        // monthly counts 1..=12 summed in threes
        let seasons = context.normalized("Disporella hispida").unwrap();
        assert_eq!(seasons, &[6.0, 15.0, 24.0, 33.0][..]);
    }

    #[test]
    fn test_series_kind_flag_parses() {
        let cli = Cli::try_parse_from([
            "occast", "predict", "--artifact", "a", "--series", "s.csv", "--series-kind", "month", "--species", "x",
        ])
        .unwrap();
        let Commands::Predict { series_kind, .. } = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(series_kind, Some(BucketKind::Month));
    }
}
