// External imports
use anyhow::{bail, Result};
use burn::tensor::backend::Backend;
use ndarray::{s, Array2, Array3};

// Internal imports
use super::step_1_tensor_preparation::{create_windows, windows_to_tensor};
use super::step_3_lstm_model_arch::WindPowerLstm;
use super::step_4_train_model::{InferenceBackend, LstmSearchResult};

const PREDICTION_BATCH: usize = 256;

/// Runs the model over scaled windows, returning scaled predictions in window order
pub fn predict_scaled<B: Backend>(
    model: &WindPowerLstm<B>,
    windows: &Array3<f64>,
    device: &B::Device,
) -> Result<Vec<f64>> {
    let n_windows = windows.dim().0;
    let mut predictions = Vec::with_capacity(n_windows);

    let mut start = 0;
    while start < n_windows {
        let end = usize::min(start + PREDICTION_BATCH, n_windows);
        let batch = windows.slice(s![start..end, .., ..]).to_owned();
        let output = model.forward(windows_to_tensor::<B>(&batch, device));
        let values = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Failed to read predictions: {:?}", e))?;
        predictions.extend(values.into_iter().map(f64::from));
        start = end;
    }

    Ok(predictions)
}

/// Predicts the rows `first_row..` of a time-ordered feature matrix
///
/// # Arguments
///
/// * `search` - Trained model with its scalers
/// * `x` - Unscaled feature rows for the whole dataset
/// * `first_row` - First row to predict (the start of the test partition)
///
/// # Returns
///
/// One inverse-scaled prediction per row from `first_row` on. The window for a
/// row ends at that row, so its earlier timesteps may come from rows before
/// `first_row`.
pub fn predict_from_row(
    search: &LstmSearchResult,
    x: &Array2<f64>,
    first_row: usize,
    device: &<InferenceBackend as Backend>::Device,
) -> Result<Vec<f64>> {
    let timesteps = search.timesteps;
    if first_row + 1 < timesteps {
        bail!(
            "Row {} has fewer than {} rows of history for a full window",
            first_row,
            timesteps
        );
    }
    if first_row >= x.nrows() {
        bail!("No rows to predict from row {} of {}", first_row, x.nrows());
    }

    let scaled = search.feature_scaler.transform(x)?;
    let placeholder = vec![0.0; x.nrows()];
    let (windows, _) = create_windows(&scaled, &placeholder, timesteps)?;

    let first_window = first_row + 1 - timesteps;
    let selected = windows.slice(s![first_window.., .., ..]).to_owned();
    let scaled_predictions = predict_scaled(&search.model, &selected, device)?;
    search.target_scaler.inverse_transform_1d(&scaled_predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LstmSearchConfig;
    use crate::lstm::step_4_train_model::search_lstm;
    use crate::util::test_utils::linear_trend_matrix;
    use burn_ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_predict_scaled_matches_window_count() {
        let device = NdArrayDevice::default();
        let model: WindPowerLstm<NdArray> = WindPowerLstm::new(2, 4, 0.0, &device);
        let windows = Array3::<f64>::zeros((300, 3, 2));

        let predictions = predict_scaled(&model, &windows, &device).unwrap();
        assert_eq!(predictions.len(), 300);
    }

    #[test]
    fn test_predict_from_row_covers_test_rows() {
        let device = NdArrayDevice::default();
        let (x, y) = linear_trend_matrix(50);
        let config = LstmSearchConfig {
            units: vec![4],
            dropout: vec![0.0],
            epochs: vec![1],
            ..LstmSearchConfig::default()
        };
        let search = search_lstm(&x.slice(s![..40, ..]).to_owned(), &y[..40], &config, &device).unwrap();

        let predictions = predict_from_row(&search, &x, 40, &device).unwrap();
        assert_eq!(predictions.len(), 10);
        assert!(predictions.iter().all(|p| p.is_finite()));
        assert!(predict_from_row(&search, &x, 1, &device).is_err());
    }
}
