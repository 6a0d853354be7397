use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::ensemble::gradient_boosting::BoostingParams;
use crate::ensemble::grid_search::CandidateScore;
use crate::ensemble::random_forest::ForestParams;
use crate::evaluation::ComparisonReport;
use crate::lstm::step_4_train_model::LstmTrial;

/// Everything a run searched and scored, written as one JSON document
#[derive(Debug, Serialize)]
pub struct ExperimentReport {
    pub timestamp: String,
    pub version: String,
    pub config: PipelineConfig,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_names: Vec<String>,
    pub random_forest: Vec<CandidateScore<ForestParams>>,
    pub gradient_boosting: Vec<CandidateScore<BoostingParams>>,
    pub lstm: Vec<LstmTrial>,
    pub comparison: ComparisonReport,
    pub training_time_seconds: Option<f64>,
}

impl ExperimentReport {
    pub fn new(config: &PipelineConfig, comparison: ComparisonReport) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            version: crate::build_info::PKG_VERSION.to_string(),
            config: config.clone(),
            train_rows: 0,
            test_rows: comparison.test_rows,
            feature_names: Vec::new(),
            random_forest: Vec::new(),
            gradient_boosting: Vec::new(),
            lstm: Vec::new(),
            comparison,
            training_time_seconds: None,
        }
    }

    pub fn set_training_time(&mut self, seconds: f64) {
        self.training_time_seconds = Some(seconds);
    }

    /// Plain-text listing of every searched candidate, in search order
    pub fn search_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Random Forest (mean neg MAE over folds)");
        for candidate in &self.random_forest {
            let _ = writeln!(out, "  {:?}: {:.6}", candidate.params, candidate.mean_score);
        }
        let _ = writeln!(out, "Gradient Boosting (mean neg MAE over folds)");
        for candidate in &self.gradient_boosting {
            let _ = writeln!(out, "  {:?}: {:.6}", candidate.params, candidate.mean_score);
        }
        let _ = writeln!(out, "LSTM (validation MAE)");
        for trial in &self.lstm {
            let _ = writeln!(out, "  {:?}: {:.6}", trial.params, trial.validation_mae);
        }
        out
    }

    /// Writes `{target}_{timestamp}_report.json` under `report_dir`
    pub fn save(&self, report_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(report_dir)?;

        let filename = format!(
            "{}_{}_report.json",
            self.config.target,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let file_path = report_dir.join(filename);

        let json = serde_json::to_string_pretty(&self)?;
        let mut file = fs::File::create(&file_path)?;
        file.write_all(json.as_bytes())?;

        Ok(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ModelScores;
    use tempfile::tempdir;

    #[test]
    fn test_report_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let mut comparison = ComparisonReport::new(12);
        comparison.add_model("Random Forest", ModelScores { mae: 0.1, rmse: 0.2 });

        let mut report = ExperimentReport::new(&PipelineConfig::default(), comparison);
        report.random_forest.push(CandidateScore {
            params: ForestParams {
                n_trees: 50,
                max_depth: 5,
                seed: 42,
            },
            fold_scores: vec![-0.1, -0.2, -0.15],
            mean_score: -0.15,
        });
        report.set_training_time(1.5);

        let path = report.save(dir.path()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["test_rows"], 12);
        assert_eq!(json["random_forest"][0]["params"]["n_trees"], 50);
        assert_eq!(json["comparison"]["models"][0]["model"], "Random Forest");
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("wp1_"));

        let summary = report.search_summary();
        assert!(summary.contains("n_trees: 50"));
        assert!(summary.contains("-0.150000"));
    }
}
