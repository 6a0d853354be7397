// External crates
use serde::{Deserialize, Serialize};
use std::fmt;

// Local modules
use crate::error::{PipelineError, PipelineResult};

fn check_pairs(y_true: &[f64], y_pred: &[f64]) -> PipelineResult<()> {
    if y_true.is_empty() {
        return Err(PipelineError::DataQuality("cannot score an empty prediction set".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::Alignment(format!(
            "{} observations but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Mean absolute error
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> PipelineResult<f64> {
    check_pairs(y_true, y_pred)?;
    let total: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    Ok(total / y_true.len() as f64)
}

/// Root mean squared error
pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> PipelineResult<f64> {
    check_pairs(y_true, y_pred)?;
    let total: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    Ok((total / y_true.len() as f64).sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScores {
    pub mae: f64,
    pub rmse: f64,
}

impl ModelScores {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> PipelineResult<Self> {
        Ok(Self {
            mae: mean_absolute_error(y_true, y_pred)?,
            rmse: root_mean_squared_error(y_true, y_pred)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub model: String,
    pub mae: f64,
    pub rmse: f64,
}

/// Test-set scores per model, kept in insertion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub test_rows: usize,
    pub models: Vec<ReportRow>,
    pub baselines: Vec<ReportRow>,
}

impl ComparisonReport {
    pub fn new(test_rows: usize) -> Self {
        Self {
            test_rows,
            ..Default::default()
        }
    }

    pub fn add_model(&mut self, name: &str, scores: ModelScores) {
        self.models.push(ReportRow {
            model: name.to_string(),
            mae: scores.mae,
            rmse: scores.rmse,
        });
    }

    pub fn add_baseline(&mut self, name: &str, scores: ModelScores) {
        self.baselines.push(ReportRow {
            model: name.to_string(),
            mae: scores.mae,
            rmse: scores.rmse,
        });
    }

    /// Model with the lowest test MAE (baselines excluded)
    pub fn best_model(&self) -> Option<&ReportRow> {
        self.models
            .iter()
            .min_by(|a, b| a.mae.partial_cmp(&b.mae).unwrap_or(std::cmp::Ordering::Equal))
    }
}

fn write_rows(f: &mut fmt::Formatter<'_>, rows: &[ReportRow]) -> fmt::Result {
    for row in rows {
        writeln!(f, "{:<20} {:>10.4} {:>10.4}", row.model, row.mae, row.rmse)?;
    }
    Ok(())
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test set: {} rows", self.test_rows)?;
        writeln!(f, "{:<20} {:>10} {:>10}", "Model", "MAE", "RMSE")?;
        writeln!(f, "{}", "-".repeat(42))?;
        write_rows(f, &self.models)?;
        if !self.baselines.is_empty() {
            writeln!(f, "{}", "-".repeat(42))?;
            write_rows(f, &self.baselines)?;
        }
        Ok(())
    }
}
