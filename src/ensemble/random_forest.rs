// External crates
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{RandomForestRegressor, RandomForestRegressorParameters};
use smartcore::linalg::basic::matrix::DenseMatrix;

// Local modules
use super::{check_training_input, to_dense_matrix, Regressor};
use crate::config::TreeSearchConfig;
use crate::constants::RANDOM_FOREST_NAME;
use crate::error::{PipelineError, PipelineResult};

/// Random forest hyperparameters searched by the grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub seed: u64,
}

impl ForestParams {
    /// Every split considers all `n_features` columns
    fn to_smartcore(&self, n_features: usize) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: Some(self.max_depth),
            min_samples_leaf: 1,
            min_samples_split: 2,
            n_trees: self.n_trees,
            m: Some(n_features),
            keep_samples: false,
            seed: self.seed,
        }
    }
}

/// Bagged regression trees, fit with a fixed seed
pub struct RandomForestModel {
    model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl Regressor for RandomForestModel {
    type Params = ForestParams;
    const NAME: &'static str = RANDOM_FOREST_NAME;

    fn fit(x: &Array2<f64>, y: &[f64], params: &ForestParams) -> PipelineResult<Self> {
        check_training_input(x, y)?;
        debug!("Fitting random forest {:?} on {} rows", params, x.nrows());

        let x_matrix = to_dense_matrix(x)?;
        let y_vec = y.to_vec();
        let model = RandomForestRegressor::fit(&x_matrix, &y_vec, params.to_smartcore(x.ncols()))
            .map_err(|e| PipelineError::Model(format!("random forest training failed: {:?}", e)))?;

        Ok(Self { model })
    }

    fn predict(&self, x: &Array2<f64>) -> PipelineResult<Vec<f64>> {
        let x_matrix = to_dense_matrix(x)?;
        self.model
            .predict(&x_matrix)
            .map_err(|e| PipelineError::Model(format!("random forest prediction failed: {:?}", e)))
    }
}

/// Cartesian product of tree counts and depths, in declaration order
pub fn forest_grid(config: &TreeSearchConfig) -> Vec<ForestParams> {
    let mut grid = Vec::with_capacity(config.rf_n_trees.len() * config.rf_max_depth.len());
    for &n_trees in &config.rf_n_trees {
        for &max_depth in &config.rf_max_depth {
            grid.push(ForestParams {
                n_trees,
                max_depth,
                seed: config.seed,
            });
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::linear_trend_matrix;

    #[test]
    fn test_forest_grid_is_full_product() {
        let grid = forest_grid(&TreeSearchConfig::default());
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0].n_trees, 50);
        assert_eq!(grid[0].max_depth, 5);
        assert_eq!(grid[0].to_smartcore(7).m, Some(7));
        assert_eq!(grid[3].n_trees, 100);
        assert_eq!(grid[3].max_depth, 10);
    }

    #[test]
    fn test_forest_fits_a_trend() {
        let (x, y) = linear_trend_matrix(60);
        let params = ForestParams {
            n_trees: 10,
            max_depth: 5,
            seed: 42,
        };
        let model = RandomForestModel::fit(&x, &y, &params).unwrap();
        let predictions = model.predict(&x).unwrap();

        assert_eq!(predictions.len(), y.len());
        let mae: f64 = predictions.iter().zip(&y).map(|(p, t)| (p - t).abs()).sum::<f64>() / y.len() as f64;
        assert!(mae < 0.1, "in-sample MAE too high: {}", mae);
    }

    #[test]
    fn test_forest_rejects_mismatched_input() {
        let (x, _) = linear_trend_matrix(10);
        let params = ForestParams {
            n_trees: 5,
            max_depth: 3,
            seed: 1,
        };
        assert!(RandomForestModel::fit(&x, &[0.0; 3], &params).is_err());
    }
}
