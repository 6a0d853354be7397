// External crates
use ndarray::Array2;
use serde::Serialize;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt::Debug;

// Local modules
use crate::error::{PipelineError, PipelineResult};

pub mod baseline;
pub mod gradient_boosting;
pub mod grid_search;
pub mod random_forest;

/// A tabular regressor that can be fit from scratch for one hyperparameter setting
pub trait Regressor: Sized + Send {
    /// One point of the hyperparameter grid
    type Params: Clone + Debug + Serialize + Send + Sync;

    /// Name used in logs and the comparison report
    const NAME: &'static str;

    fn fit(x: &Array2<f64>, y: &[f64], params: &Self::Params) -> PipelineResult<Self>;

    fn predict(&self, x: &Array2<f64>) -> PipelineResult<Vec<f64>>;
}

/// Row-major copy of a feature matrix for smartcore estimators
pub fn to_dense_matrix(x: &Array2<f64>) -> PipelineResult<DenseMatrix<f64>> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(PipelineError::Model(format!(
            "cannot build a {}x{} feature matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    let values: Vec<f64> = x.iter().copied().collect();
    Ok(DenseMatrix::new(x.nrows(), x.ncols(), values, false))
}

/// Rejects empty or mismatched training input before it reaches an estimator
pub fn check_training_input(x: &Array2<f64>, y: &[f64]) -> PipelineResult<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::Model("cannot train on an empty dataset".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::Model(format!(
            "feature and target count mismatch: {} rows, {} targets",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}
