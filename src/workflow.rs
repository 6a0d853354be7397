// External crates
use anyhow::{Context, Result};
use burn_ndarray::NdArrayDevice;
use log::info;
use std::path::Path;
use std::time::Instant;

// Local modules
use crate::config::PipelineConfig;
use crate::constants::LSTM_NAME;
use crate::ensemble::baseline::{persistence_forecast, MeanBaseline};
use crate::ensemble::gradient_boosting::{boosting_grid, GradientBoostingModel};
use crate::ensemble::grid_search::{grid_search, GridSearchResult};
use crate::ensemble::random_forest::{forest_grid, RandomForestModel};
use crate::ensemble::Regressor;
use crate::error::PipelineResult;
use crate::evaluation::{ComparisonReport, ModelScores};
use crate::lstm::step_4_train_model::search_lstm;
use crate::lstm::step_5_prediction::predict_from_row;
use crate::util::alignment::{align_next_step, chronological_split, AlignedDataset, TrainTestSplit};
use crate::util::feature_engineering::add_wind_features;
use crate::util::model_logger::ExperimentReport;
use crate::util::pre_processor::load_and_merge;

/// Aligned dataset and its chronological partitions
pub struct PreparedData {
    pub dataset: AlignedDataset,
    pub split: TrainTestSplit,
}

/// Ingestion, feature construction, alignment and split
pub fn prepare_data(primary: &Path, forecast_dir: &Path, config: &PipelineConfig) -> PipelineResult<PreparedData> {
    let merged = load_and_merge(primary, forecast_dir, &config.farm_pattern, &config.target)?;
    let featured = add_wind_features(&merged, &config.features)?;
    let dataset = align_next_step(&featured, &config.target, config.mask_policy)?;
    let split = chronological_split(&dataset, config.train_ratio)?;
    Ok(PreparedData { dataset, split })
}

fn search_and_score<R: Regressor>(
    grid: &[R::Params],
    split: &TrainTestSplit,
    folds: usize,
) -> PipelineResult<(GridSearchResult<R>, ModelScores)> {
    let search = grid_search::<R>(grid, &split.train.features, &split.train.target, folds)?;
    let predictions = search.best_model.predict(&split.test.features)?;
    let scores = ModelScores::compute(&split.test.target, &predictions)?;
    info!("{} test MAE {:.4} RMSE {:.4}", R::NAME, scores.mae, scores.rmse);
    Ok((search, scores))
}

fn baseline_scores(split: &TrainTestSplit, target: &str, report: &mut ComparisonReport) -> PipelineResult<()> {
    let mean = MeanBaseline::fit(&split.train.features, &split.train.target, &())?;
    let predictions = mean.predict(&split.test.features)?;
    report.add_baseline(MeanBaseline::NAME, ModelScores::compute(&split.test.target, &predictions)?);

    if let Some(index) = split.test.feature_index(target) {
        let predictions = persistence_forecast(&split.test.features, index)?;
        report.add_baseline("Persistence", ModelScores::compute(&split.test.target, &predictions)?);
    }
    Ok(())
}

/// Runs the full comparison: tree ensembles first, then the LSTM
///
/// # Arguments
///
/// * `primary` - Primary observation CSV
/// * `forecast_dir` - Directory holding the per-farm forecast files
/// * `config` - Pipeline settings
///
/// # Returns
///
/// The experiment report; its `comparison` field holds test MAE/RMSE per model
pub fn run_pipeline(primary: &Path, forecast_dir: &Path, config: &PipelineConfig) -> Result<ExperimentReport> {
    let started = Instant::now();
    let prepared = prepare_data(primary, forecast_dir, config).context("Data preparation failed")?;
    let split = &prepared.split;
    let folds = config.trees.cv_folds;

    let mut comparison = ComparisonReport::new(split.test.len());

    let (forest, forest_scores) =
        search_and_score::<RandomForestModel>(&forest_grid(&config.trees), split, folds)
            .context("Random forest search failed")?;
    comparison.add_model(RandomForestModel::NAME, forest_scores);

    let (boosting, boosting_scores) =
        search_and_score::<GradientBoostingModel>(&boosting_grid(&config.trees), split, folds)
            .context("Gradient boosting search failed")?;
    comparison.add_model(GradientBoostingModel::NAME, boosting_scores);

    let device = NdArrayDevice::default();
    let lstm = search_lstm(&split.train.features, &split.train.target, &config.lstm, &device)
        .context("LSTM search failed")?;
    let lstm_predictions = predict_from_row(&lstm, &prepared.dataset.features, split.train.len(), &device)?;
    let lstm_scores = ModelScores::compute(&split.test.target, &lstm_predictions)?;
    info!("{} test MAE {:.4} RMSE {:.4}", LSTM_NAME, lstm_scores.mae, lstm_scores.rmse);
    comparison.add_model(LSTM_NAME, lstm_scores);

    baseline_scores(split, &config.target, &mut comparison)?;

    let mut report = ExperimentReport::new(config, comparison);
    report.train_rows = split.train.len();
    report.feature_names = prepared.dataset.feature_names.clone();
    report.random_forest = forest.candidates;
    report.gradient_boosting = boosting.candidates;
    report.lstm = lstm.trials;
    report.set_training_time(started.elapsed().as_secs_f64());

    Ok(report)
}
