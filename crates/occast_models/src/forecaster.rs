//! Stacked-LSTM forecaster emitting negative-binomial parameters.

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use occast_core::{CoreError, DistributionParams, ForecastingModel, WindowForecaster};

/// Positive activation applied to the dense head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    /// `ln(1 + e^x)`.
    #[default]
    Softplus,
    /// `e^x`, capped at [`EXP_OUTPUT_MAX`].
    Exp,
}

impl core::fmt::Display for OutputActivation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

// Lets the forecaster carry the activation as a non-parameter module field.
use burn::constant;
constant!(OutputActivation);

/// Upper bound applied to exponential outputs.
pub const EXP_OUTPUT_MAX: f32 = 1e6;

/// Smallest value either activation can emit, so μ and α stay strictly positive.
pub const OUTPUT_MIN: f32 = f32::MIN_POSITIVE;

/// Configuration for [`NbForecaster`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NbForecasterConfig {
    /// Features per step.
    pub n_features: usize,
    /// Sequence length.
    pub seq_len: usize,
    /// Forecast horizon.
    pub horizon: usize,
    /// Hidden units per LSTM layer.
    pub hidden_size: usize,
    /// Number of stacked LSTM layers.
    pub n_layers: usize,
    /// Dropout rate.
    pub dropout: f64,
    /// Output activation.
    pub activation: OutputActivation,
}

impl Default for NbForecasterConfig {
    fn default() -> Self {
        Self {
            n_features: 1,
            seq_len: 12,
            horizon: 1,
            hidden_size: 200,
            n_layers: 3,
            dropout: 0.2,
            activation: OutputActivation::Softplus,
        }
    }
}

impl NbForecasterConfig {
    /// Create a new config.
    pub fn new(n_features: usize, seq_len: usize, horizon: usize) -> Self {
        Self {
            n_features,
            seq_len,
            horizon,
            ..Default::default()
        }
    }

    /// Set the hidden size.
    #[must_use]
    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    /// Set the number of LSTM layers.
    #[must_use]
    pub fn with_n_layers(mut self, n_layers: usize) -> Self {
        self.n_layers = n_layers;
        self
    }

    /// Set the dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Set the output activation.
    #[must_use]
    pub fn with_activation(mut self, activation: OutputActivation) -> Self {
        self.activation = activation;
        self
    }

    /// Outputs of the dense head, two per forecast step.
    #[must_use]
    pub fn output_dim(&self) -> usize {
        2 * self.horizon
    }

    /// Check dimensions and dropout rate.
    pub fn validate(&self) -> occast_core::Result<()> {
        let positive = [
            ("n_features", self.n_features),
            ("seq_len", self.seq_len),
            ("horizon", self.horizon),
            ("hidden_size", self.hidden_size),
            ("n_layers", self.n_layers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CoreError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(CoreError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> NbForecaster<B> {
        NbForecaster::new(self.clone(), device)
    }
}

/// Stacked LSTM, dropout, dense `2H` head and a positive activation.
///
/// Input windows are `(batch, seq_len, n_features)`. The output row is
/// interleaved `[μ0, α0, μ1, α1, ...]`, every value strictly positive.
///
/// # Example
///
/// ```rust,ignore
/// use occast_models::NbForecasterConfig;
///
/// let model = NbForecasterConfig::new(1, 12, 1).init::<NdArray>(&device);
/// let params = model.forward(x); // (batch, 2)
/// ```
#[derive(Module, Debug)]
pub struct NbForecaster<B: Backend> {
    /// LSTM layers.
    lstms: Vec<Lstm<B>>,
    /// Dropout between layers and before the head.
    dropout: Dropout,
    /// Dense head.
    head: Linear<B>,
    /// Sequence length.
    #[module(skip)]
    seq_len: usize,
    /// Features per step.
    #[module(skip)]
    n_features: usize,
    /// Forecast horizon.
    #[module(skip)]
    horizon: usize,
    /// Output activation.
    #[module(skip)]
    activation: OutputActivation,
}

impl<B: Backend> NbForecaster<B> {
    /// Create a new model.
    pub fn new(config: NbForecasterConfig, device: &B::Device) -> Self {
        let lstms = (0..config.n_layers.max(1))
            .map(|i| {
                let d_input = if i == 0 { config.n_features } else { config.hidden_size };
                LstmConfig::new(d_input, config.hidden_size, true).init(device)
            })
            .collect();

        Self {
            lstms,
            dropout: DropoutConfig::new(config.dropout).init(),
            head: LinearConfig::new(config.hidden_size, config.output_dim()).init(device),
            seq_len: config.seq_len,
            n_features: config.n_features,
            horizon: config.horizon,
            activation: config.activation,
        }
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, seq_len, n_features)
    ///
    /// # Returns
    ///
    /// Interleaved parameters of shape (batch, 2 * horizon).
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let n_layers = self.lstms.len();
        let mut hidden = x;
        for (i, lstm) in self.lstms.iter().enumerate() {
            let (output, _) = lstm.forward(hidden, None);
            hidden = if i + 1 < n_layers {
                self.dropout.forward(output)
            } else {
                output
            };
        }

        // Last timestep
        let [batch, seq_len, hidden_dim] = hidden.dims();
        let last = hidden
            .slice([0..batch, (seq_len - 1)..seq_len, 0..hidden_dim])
            .reshape([batch, hidden_dim]);

        let out = self.head.forward(self.dropout.forward(last));
        match self.activation {
            OutputActivation::Softplus => softplus(out),
            OutputActivation::Exp => out.exp().clamp(OUTPUT_MIN, EXP_OUTPUT_MAX),
        }
    }

    /// Forward pass split into `(μ, α)`, each of shape (batch, horizon).
    pub fn forward_params(&self, x: Tensor<B, 3>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        split_params(self.forward(x))
    }

    /// Sequence length.
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Features per step.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Forecast horizon.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Device holding the weights.
    #[must_use]
    pub fn device(&self) -> B::Device {
        self.head.weight.val().device()
    }
}

/// Numerically stable softplus, `max(x, 0) + ln(1 + e^-|x|)`, floored at [`OUTPUT_MIN`].
///
/// Below about -104 the log term underflows to zero in f32; the additive
/// floor keeps the result positive without cutting the gradient.
pub fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clone().clamp_min(0.0) + x.abs().neg().exp().log1p() + OUTPUT_MIN
}

/// Split interleaved `(batch, 2H)` parameters into `(μ, α)`.
pub fn split_params<B: Backend>(params: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let [batch, width] = params.dims();
    let horizon = width / 2;
    let pairs = params.reshape([batch, horizon, 2]);
    let mu = pairs
        .clone()
        .slice([0..batch, 0..horizon, 0..1])
        .reshape([batch, horizon]);
    let alpha = pairs.slice([0..batch, 0..horizon, 1..2]).reshape([batch, horizon]);
    (mu, alpha)
}

impl<B: Backend> ForecastingModel<B> for NbForecaster<B> {
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        NbForecaster::forward(self, x)
    }

    fn horizon(&self) -> usize {
        self.horizon
    }
}

impl<B: Backend> WindowForecaster for NbForecaster<B> {
    fn seq_len(&self) -> usize {
        self.seq_len
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn forecast(&self, window: &[f32]) -> occast_core::Result<Vec<DistributionParams>> {
        let expected = self.seq_len * self.n_features;
        if window.len() != expected {
            return Err(CoreError::InvalidShape {
                expected: format!("{} values ({} x {})", expected, self.seq_len, self.n_features),
                got: format!("{} values", window.len()),
            });
        }

        let x = Tensor::<B, 1>::from_floats(window, &self.device()).reshape([1, self.seq_len, self.n_features]);
        let row = NbForecaster::forward(self, x)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| CoreError::Inference(format!("{e:?}")))?;

        Ok(DistributionParams::from_interleaved(&row))
    }
}
