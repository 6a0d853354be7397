// External crates
use ndarray::Array2;

// Local modules
use super::{check_training_input, Regressor};
use crate::error::{PipelineError, PipelineResult};

/// Predicts the training mean for every row
#[derive(Debug, Clone)]
pub struct MeanBaseline {
    mean: f64,
}

impl MeanBaseline {
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl Regressor for MeanBaseline {
    type Params = ();
    const NAME: &'static str = "Mean baseline";

    fn fit(x: &Array2<f64>, y: &[f64], _params: &()) -> PipelineResult<Self> {
        check_training_input(x, y)?;
        Ok(Self {
            mean: y.iter().sum::<f64>() / y.len() as f64,
        })
    }

    fn predict(&self, x: &Array2<f64>) -> PipelineResult<Vec<f64>> {
        Ok(vec![self.mean; x.nrows()])
    }
}

/// Persistence forecast: the next value equals the current one.
///
/// Reads the current observation from feature column `source_index`.
pub fn persistence_forecast(x: &Array2<f64>, source_index: usize) -> PipelineResult<Vec<f64>> {
    if source_index >= x.ncols() {
        return Err(PipelineError::Model(format!(
            "persistence source column {} out of range ({} features)",
            source_index,
            x.ncols()
        )));
    }
    Ok(x.column(source_index).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::linear_trend_matrix;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mean_baseline_predicts_training_mean() {
        let (x, y) = linear_trend_matrix(100);
        let model = MeanBaseline::fit(&x, &y, &()).unwrap();
        let predictions = model.predict(&x).unwrap();

        let expected = y.iter().sum::<f64>() / 100.0;
        assert_abs_diff_eq!(model.mean(), expected, epsilon = 1e-12);
        assert!(predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_persistence_reads_current_value() {
        let (x, _) = linear_trend_matrix(4);
        assert_eq!(persistence_forecast(&x, 0).unwrap(), vec![0.0, 0.25, 0.5, 0.75]);
        assert!(persistence_forecast(&x, 5).is_err());
    }
}
