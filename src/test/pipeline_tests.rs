#[cfg(test)]
mod tests {
    use crate::config::PipelineConfig;
    use crate::util::synthetic::write_demo_dataset;
    use crate::workflow::{prepare_data, run_pipeline};
    use tempfile::tempdir;

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::quick();
        config.trees.rf_n_trees = vec![5];
        config.trees.gb_n_estimators = vec![5];
        config.lstm.units = vec![4];
        config.lstm.epochs = vec![1];
        config
    }

    #[test]
    fn test_prepare_data_from_demo_files() {
        let dir = tempdir().unwrap();
        let paths = write_demo_dataset(dir.path(), 120, 2, 5).unwrap();
        let prepared = prepare_data(&paths.primary, &paths.forecast_dir, &small_config()).unwrap();

        assert!(prepared.dataset.feature_names.iter().any(|f| f == "ws_wf2"));
        assert!(prepared.dataset.feature_names.iter().any(|f| f == "wp1_lag_3"));
        assert_eq!(
            prepared.split.train.len() + prepared.split.test.len(),
            prepared.dataset.len()
        );
    }

    #[test]
    fn test_run_pipeline_reports_models_in_order() {
        let dir = tempdir().unwrap();
        let paths = write_demo_dataset(dir.path(), 160, 2, 9).unwrap();
        let report = run_pipeline(&paths.primary, &paths.forecast_dir, &small_config()).unwrap();

        let names: Vec<&str> = report.comparison.models.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(names, vec!["Random Forest", "Gradient Boosting", "LSTM"]);
        assert_eq!(report.comparison.baselines.len(), 2);
        assert!(report
            .comparison
            .models
            .iter()
            .all(|r| r.mae.is_finite() && r.rmse >= r.mae));
        assert_eq!(report.random_forest.len(), 1);
        assert_eq!(report.lstm.len(), 1);
        assert_eq!(report.train_rows + report.test_rows, 160 - 12);
    }
}
