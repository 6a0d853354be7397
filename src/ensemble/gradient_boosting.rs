// External crates
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{DecisionTreeRegressor, DecisionTreeRegressorParameters};

// Local modules
use super::{check_training_input, to_dense_matrix, Regressor};
use crate::config::TreeSearchConfig;
use crate::constants::GRADIENT_BOOSTING_NAME;
use crate::error::{PipelineError, PipelineResult};

type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Gradient boosting hyperparameters searched by the grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
}

/// Least-squares gradient boosting over shallow regression trees.
///
/// Starts from the training mean; each stage fits a tree to the current residuals
/// and adds its prediction scaled by the learning rate.
pub struct GradientBoostingModel {
    params: BoostingParams,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingModel {
    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    fn tree_parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.params.max_depth)
            .with_min_samples_leaf(1)
            .with_min_samples_split(2)
    }
}

fn tree_predict(tree: &RegressionTree, x: &DenseMatrix<f64>) -> PipelineResult<Vec<f64>> {
    tree.predict(x)
        .map_err(|e| PipelineError::Model(format!("boosting stage prediction failed: {:?}", e)))
}

impl Regressor for GradientBoostingModel {
    type Params = BoostingParams;
    const NAME: &'static str = GRADIENT_BOOSTING_NAME;

    fn fit(x: &Array2<f64>, y: &[f64], params: &BoostingParams) -> PipelineResult<Self> {
        check_training_input(x, y)?;
        if params.n_estimators == 0 || params.learning_rate <= 0.0 {
            return Err(PipelineError::Model(format!("invalid boosting parameters {:?}", params)));
        }
        debug!("Fitting gradient boosting {:?} on {} rows", params, x.nrows());

        let x_matrix = to_dense_matrix(x)?;
        let init = y.iter().sum::<f64>() / y.len() as f64;
        let mut model = Self {
            params: params.clone(),
            init,
            trees: Vec::with_capacity(params.n_estimators),
        };

        let mut current = vec![init; y.len()];
        for stage in 0..params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, f)| t - f).collect();
            let tree = RegressionTree::fit(&x_matrix, &residuals, model.tree_parameters()).map_err(|e| {
                PipelineError::Model(format!("boosting stage {} training failed: {:?}", stage, e))
            })?;

            let update = tree_predict(&tree, &x_matrix)?;
            for (f, u) in current.iter_mut().zip(update) {
                *f += params.learning_rate * u;
            }
            model.trees.push(tree);
        }

        Ok(model)
    }

    fn predict(&self, x: &Array2<f64>) -> PipelineResult<Vec<f64>> {
        let x_matrix = to_dense_matrix(x)?;
        let mut predictions = vec![self.init; x.nrows()];
        for tree in &self.trees {
            let update = tree_predict(tree, &x_matrix)?;
            for (p, u) in predictions.iter_mut().zip(update) {
                *p += self.params.learning_rate * u;
            }
        }
        Ok(predictions)
    }
}

/// Cartesian product over stage count, learning rate and depth, in declaration order
pub fn boosting_grid(config: &TreeSearchConfig) -> Vec<BoostingParams> {
    let mut grid = Vec::new();
    for &n_estimators in &config.gb_n_estimators {
        for &learning_rate in &config.gb_learning_rate {
            for &max_depth in &config.gb_max_depth {
                grid.push(BoostingParams {
                    n_estimators,
                    learning_rate,
                    max_depth,
                });
            }
        }
    }
    grid
}
