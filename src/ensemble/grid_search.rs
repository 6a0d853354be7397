// External crates
use log::info;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::Serialize;

// Local modules
use super::Regressor;
use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::mean_absolute_error;

/// Train/validation row indices for one fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Splits `0..n_rows` into `k` contiguous validation blocks without shuffling.
///
/// The first `n_rows % k` blocks get one extra row. Each fold trains on every row
/// outside its block.
pub fn kfold_indices(n_rows: usize, k: usize) -> PipelineResult<Vec<Fold>> {
    if k < 2 || n_rows < k {
        return Err(PipelineError::Model(format!(
            "cannot build {} folds from {} rows",
            k, n_rows
        )));
    }

    let base = n_rows / k;
    let extra = n_rows % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        folds.push(Fold {
            train: (0..start).chain(end..n_rows).collect(),
            validation: (start..end).collect(),
        });
        start = end;
    }
    Ok(folds)
}

/// Cross-validated score of one grid point
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore<P> {
    pub params: P,
    /// Negative MAE per fold
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Outcome of a grid search: every candidate plus the best one refit on all rows
pub struct GridSearchResult<R: Regressor> {
    pub best_index: usize,
    pub best_params: R::Params,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore<R::Params>>,
    pub best_model: R,
}

fn score_candidate<R: Regressor>(
    params: &R::Params,
    x: &Array2<f64>,
    y: &[f64],
    folds: &[Fold],
) -> PipelineResult<CandidateScore<R::Params>> {
    let mut fold_scores = Vec::with_capacity(folds.len());
    for fold in folds {
        let x_train = x.select(Axis(0), &fold.train);
        let y_train: Vec<f64> = fold.train.iter().map(|&i| y[i]).collect();
        let x_valid = x.select(Axis(0), &fold.validation);
        let y_valid: Vec<f64> = fold.validation.iter().map(|&i| y[i]).collect();

        let model = R::fit(&x_train, &y_train, params)?;
        let predictions = model.predict(&x_valid)?;
        fold_scores.push(-mean_absolute_error(&y_valid, &predictions)?);
    }

    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
    info!(
        "{} {:?}: fold scores {:?}, mean neg MAE {:.6}",
        R::NAME,
        params,
        fold_scores,
        mean_score
    );
    Ok(CandidateScore {
        params: params.clone(),
        fold_scores,
        mean_score,
    })
}

/// Exhaustive k-fold grid search scored by negative mean absolute error
///
/// # Arguments
///
/// * `grid` - Candidate hyperparameters, searched in this order
/// * `x` - Training features, time ordered
/// * `y` - Training targets
/// * `k` - Number of contiguous folds
///
/// # Returns
///
/// All candidate scores and the best candidate (highest mean score, first in grid
/// order on ties) refit on the full training data
pub fn grid_search<R: Regressor>(
    grid: &[R::Params],
    x: &Array2<f64>,
    y: &[f64],
    k: usize,
) -> PipelineResult<GridSearchResult<R>> {
    if grid.is_empty() {
        return Err(PipelineError::Model(format!("empty hyperparameter grid for {}", R::NAME)));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::Model(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }

    let folds = kfold_indices(y.len(), k)?;
    info!(
        "{}: searching {} candidates with {}-fold CV on {} rows",
        R::NAME,
        grid.len(),
        k,
        y.len()
    );

    let candidates: Vec<CandidateScore<R::Params>> = grid
        .par_iter()
        .map(|params| score_candidate::<R>(params, x, y, &folds))
        .collect::<PipelineResult<_>>()?;

    let mut best_index = 0;
    for (i, candidate) in candidates.iter().enumerate().skip(1) {
        if candidate.mean_score > candidates[best_index].mean_score {
            best_index = i;
        }
    }

    let best_params = candidates[best_index].params.clone();
    let best_score = candidates[best_index].mean_score;
    info!("{}: best {:?} (neg MAE {:.6})", R::NAME, best_params, best_score);

    let best_model = R::fit(x, y, &best_params)?;
    Ok(GridSearchResult {
        best_index,
        best_params,
        best_score,
        candidates,
        best_model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::baseline::MeanBaseline;
    use crate::ensemble::random_forest::{ForestParams, RandomForestModel};
    use crate::util::test_utils::linear_trend_matrix;

    #[test]
    fn test_kfold_contiguous_and_covering() {
        let folds = kfold_indices(10, 3).unwrap();
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].validation, vec![0, 1, 2, 3]);
        assert_eq!(folds[1].validation, vec![4, 5, 6]);
        assert_eq!(folds[2].validation, vec![7, 8, 9]);
        assert_eq!(folds[1].train, vec![0, 1, 2, 3, 7, 8, 9]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.validation.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_kfold_needs_enough_rows() {
        assert!(kfold_indices(2, 3).is_err());
        assert!(kfold_indices(10, 1).is_err());
    }

    #[test]
    fn test_empty_grid_is_error() {
        let (x, y) = linear_trend_matrix(30);
        let result = grid_search::<MeanBaseline>(&[], &x, &y, 3);
        assert!(matches!(result, Err(PipelineError::Model(_))));
    }

    #[test]
    fn test_single_candidate_grid_returns_it() {
        let (x, y) = linear_trend_matrix(60);
        let only = ForestParams {
            n_trees: 5,
            max_depth: 3,
            seed: 42,
        };
        let result = grid_search::<RandomForestModel>(&[only.clone()], &x, &y, 3).unwrap();

        assert_eq!(result.best_index, 0);
        assert_eq!(result.best_params, only);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].fold_scores.len(), 3);
        assert!(result.best_score <= 0.0);
    }

    #[test]
    fn test_ties_resolve_to_first_candidate() {
        let (x, y) = linear_trend_matrix(30);
        let result = grid_search::<MeanBaseline>(&[(), (), ()], &x, &y, 3).unwrap();
        assert_eq!(result.best_index, 0);
        assert!(result.best_score.is_finite());
    }
}
