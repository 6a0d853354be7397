// External imports
use anyhow::{anyhow, bail, Result};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use log::{debug, info};
use ndarray::{s, Array2, Array3};
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_1_tensor_preparation::{create_windows, windows_to_tensors, MinMaxScaler};
use super::step_3_lstm_model_arch::WindPowerLstm;
use super::step_5_prediction::predict_scaled;
use crate::config::LstmSearchConfig;
use crate::evaluation::mean_absolute_error;

/// Training backend: ndarray CPU tensors with reverse-mode autodiff
pub type BurnBackend = Autodiff<NdArray<f32>>;
/// Inference backend, produced by `AutodiffModule::valid`
pub type InferenceBackend = NdArray<f32>;

/// One point of the recurrent model's manual grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LstmHyperParams {
    pub units: usize,
    pub dropout: f64,
    pub epochs: usize,
}

/// Optimiser settings shared by every grid point
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub seed: u64,
}

impl From<&LstmSearchConfig> for TrainingConfig {
    fn from(config: &LstmSearchConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            batch_size: config.batch_size,
            seed: config.seed,
        }
    }
}

/// Cartesian product units x dropout x epochs, in declaration order
pub fn lstm_grid(config: &LstmSearchConfig) -> Vec<LstmHyperParams> {
    let mut grid = Vec::new();
    for &units in &config.units {
        for &dropout in &config.dropout {
            for &epochs in &config.epochs {
                grid.push(LstmHyperParams { units, dropout, epochs });
            }
        }
    }
    grid
}

// Helper for batching
fn get_batches<B: Backend, const D: usize>(data: &Tensor<B, D>, batch_size: usize) -> Vec<Tensor<B, D>> {
    let num_samples = data.dims()[0];
    let mut batches = Vec::new();
    let mut start = 0;
    while start < num_samples {
        let end = usize::min(start + batch_size, num_samples);
        batches.push(data.clone().narrow(0, start, end - start));
        start = end;
    }
    batches
}

/// Trains one LSTM with Adam on mean squared error
///
/// # Arguments
///
/// * `windows` - Scaled input windows `[samples, timesteps, features]`
/// * `targets` - Scaled target per window
/// * `params` - Hidden units, dropout and epochs
/// * `config` - Learning rate, batch size and seed
///
/// # Returns
///
/// The trained model and the mean training loss per epoch
pub fn train_lstm(
    windows: &Array3<f64>,
    targets: &[f64],
    params: &LstmHyperParams,
    config: &TrainingConfig,
    device: &<BurnBackend as Backend>::Device,
) -> Result<(WindPowerLstm<BurnBackend>, Vec<f64>)> {
    if windows.dim().0 == 0 {
        bail!("Cannot train an LSTM without windows");
    }
    if config.batch_size == 0 {
        bail!("Batch size must be at least 1");
    }

    BurnBackend::seed(config.seed);
    let (features, target_tensor) = windows_to_tensors::<BurnBackend>(windows, targets, device)?;
    let input_size = features.dims()[2];

    let mut model = WindPowerLstm::<BurnBackend>::new(input_size, params.units, params.dropout, device);
    let mut optimizer = AdamConfig::new().init();

    // Mini-batches stay in chronological order
    let feature_batches = get_batches(&features, config.batch_size);
    let target_batches = get_batches(&target_tensor, config.batch_size);

    let mut loss_history = Vec::with_capacity(params.epochs);
    for epoch in 1..=params.epochs {
        let mut epoch_loss = 0.0;
        for (batch_features, batch_targets) in feature_batches.iter().zip(target_batches.iter()) {
            let predictions = model.forward(batch_features.clone());
            let diff = predictions - batch_targets.clone();
            let loss_tensor = (diff.clone() * diff).mean();
            epoch_loss += loss_tensor.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(loss_tensor.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }
        let avg_loss = epoch_loss / feature_batches.len() as f64;
        debug!("epoch {}/{} loss {:.6}", epoch, params.epochs, avg_loss);
        loss_history.push(avg_loss);
    }

    Ok((model, loss_history))
}

/// Validation outcome of one grid point
#[derive(Debug, Clone, Serialize)]
pub struct LstmTrial {
    pub params: LstmHyperParams,
    pub validation_mae: f64,
    pub final_loss: f64,
}

/// Best recurrent model with the scalers it was trained under
pub struct LstmSearchResult {
    pub best_params: LstmHyperParams,
    pub best_validation_mae: f64,
    pub trials: Vec<LstmTrial>,
    pub model: WindPowerLstm<InferenceBackend>,
    pub feature_scaler: MinMaxScaler,
    pub target_scaler: MinMaxScaler,
    pub timesteps: usize,
}

/// Manual grid search for the LSTM on the training partition
///
/// Scalers are fit on `train_x` / `train_y`. Windows are built over the scaled
/// training rows and the most recent `validation_split` share of them is held out.
/// Each grid point is trained from scratch; validation MAE is computed on
/// inverse-scaled predictions and the lowest wins (first in grid order on ties).
pub fn search_lstm(
    train_x: &Array2<f64>,
    train_y: &[f64],
    config: &LstmSearchConfig,
    device: &<BurnBackend as Backend>::Device,
) -> Result<LstmSearchResult> {
    let grid = lstm_grid(config);
    if grid.is_empty() {
        bail!("Empty LSTM hyperparameter grid");
    }

    let feature_scaler = MinMaxScaler::fit(train_x)?;
    let target_scaler = MinMaxScaler::fit_1d(train_y)?;
    let scaled_x = feature_scaler.transform(train_x)?;
    let scaled_y = target_scaler.transform_1d(train_y)?;

    let (windows, targets) = create_windows(&scaled_x, &scaled_y, config.timesteps)?;
    let n_windows = targets.len();
    let n_validation = (n_windows as f64 * config.validation_split).round() as usize;
    let n_fit = n_windows.saturating_sub(n_validation);
    if n_validation == 0 || n_fit == 0 {
        bail!(
            "{} windows cannot be split into LSTM training and validation sets",
            n_windows
        );
    }

    let fit_windows = windows.slice(s![..n_fit, .., ..]).to_owned();
    let fit_targets = &targets[..n_fit];
    let validation_windows = windows.slice(s![n_fit.., .., ..]).to_owned();
    let validation_truth = target_scaler.inverse_transform_1d(&targets[n_fit..])?;

    info!(
        "LSTM: searching {} configurations ({} fit windows, {} validation windows)",
        grid.len(),
        n_fit,
        n_validation
    );

    let training = TrainingConfig::from(config);
    let mut trials = Vec::with_capacity(grid.len());
    let mut best: Option<(usize, f64, WindPowerLstm<InferenceBackend>)> = None;

    for params in grid {
        let (model, losses) = train_lstm(&fit_windows, fit_targets, &params, &training, device)?;
        let model = model.valid();

        let scaled_predictions = predict_scaled(&model, &validation_windows, device)?;
        let predictions = target_scaler.inverse_transform_1d(&scaled_predictions)?;
        let validation_mae = mean_absolute_error(&validation_truth, &predictions)?;
        info!("LSTM {:?}: validation MAE {:.6}", params, validation_mae);

        let is_best = best.as_ref().map_or(true, |(_, best_mae, _)| validation_mae < *best_mae);
        let final_loss = losses.last().copied().unwrap_or(f64::NAN);
        trials.push(LstmTrial {
            params,
            validation_mae,
            final_loss,
        });
        if is_best {
            best = Some((trials.len() - 1, validation_mae, model));
        }
    }

    let (best_index, best_validation_mae, model) = best.ok_or_else(|| anyhow!("No LSTM configuration was trained"))?;
    let best_params = trials[best_index].params.clone();
    info!("LSTM: best {:?} (validation MAE {:.6})", best_params, best_validation_mae);

    Ok(LstmSearchResult {
        best_params,
        best_validation_mae,
        trials,
        model,
        feature_scaler,
        target_scaler,
        timesteps: config.timesteps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::linear_trend_matrix;
    use burn_ndarray::NdArrayDevice;

    fn tiny_config() -> LstmSearchConfig {
        LstmSearchConfig {
            units: vec![4],
            dropout: vec![0.0],
            epochs: vec![2],
            batch_size: 8,
            ..LstmSearchConfig::default()
        }
    }

    #[test]
    fn test_default_grid_size() {
        let grid = lstm_grid(&LstmSearchConfig::default());
        assert_eq!(grid.len(), 8);
        assert_eq!(
            grid[0],
            LstmHyperParams {
                units: 32,
                dropout: 0.1,
                epochs: 10
            }
        );
    }

    #[test]
    fn test_train_records_loss_per_epoch() {
        let device = NdArrayDevice::default();
        let (x, y) = linear_trend_matrix(20);
        let (windows, targets) = create_windows(&x, &y, 3).unwrap();
        let params = LstmHyperParams {
            units: 4,
            dropout: 0.0,
            epochs: 3,
        };
        let config = TrainingConfig {
            learning_rate: 0.01,
            batch_size: 4,
            seed: 1,
        };

        let (_, losses) = train_lstm(&windows, &targets, &params, &config, &device).unwrap();
        assert_eq!(losses.len(), 3);
        assert!(losses.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_single_configuration_search() {
        let device = NdArrayDevice::default();
        let (x, y) = linear_trend_matrix(40);
        let result = search_lstm(&x, &y, &tiny_config(), &device).unwrap();

        assert_eq!(result.trials.len(), 1);
        assert_eq!(result.best_params.units, 4);
        assert!(result.best_validation_mae.is_finite());
        assert_eq!(result.timesteps, 3);
    }

    #[test]
    fn test_search_needs_validation_windows() {
        let device = NdArrayDevice::default();
        let (x, y) = linear_trend_matrix(3);
        assert!(search_lstm(&x, &y, &tiny_config(), &device).is_err());
    }
}
