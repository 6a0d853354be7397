// External crates
use chrono::Duration;
use log::{info, warn};
use ndarray::{s, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

// Local modules
use crate::constants::{DATE_COLUMN, HORIZON_COLUMN, ROW_INDEX_COLUMN};
use crate::error::{PipelineError, PipelineResult};
use crate::util::feature_engineering::{date_key, horizon_groups, parse_date_key, per_horizon};
use crate::util::file_utils::{has_column, is_key_column};

const TARGET_VALUE_COLUMN: &str = "__target";
const TARGET_ROW_COLUMN: &str = "__target_row";
const TARGET_DATE_COLUMN: &str = "__target_date";

/// When rows with missing values are removed relative to the one-step target shift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MaskPolicy {
    /// Shift on the full time-ordered frame, then drop incomplete rows.
    /// Every target is the observation exactly one row later.
    #[default]
    ShiftThenDrop,
    /// Drop incomplete feature rows first, then shift. A target may skip over
    /// dropped rows.
    DropThenShift,
}

/// Feature matrix and next-step target with row correspondence checked
#[derive(Debug, Clone)]
pub struct AlignedDataset {
    /// `date` key of each feature row
    pub dates: Vec<i64>,
    pub feature_names: Vec<String>,
    /// Shape `[rows, feature_names.len()]`
    pub features: Array2<f64>,
    pub target: Vec<f64>,
}

impl AlignedDataset {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == name)
    }

    /// Contiguous row range, order preserved
    pub fn slice_rows(&self, rows: Range<usize>) -> AlignedDataset {
        AlignedDataset {
            dates: self.dates[rows.clone()].to_vec(),
            feature_names: self.feature_names.clone(),
            features: self.features.slice(s![rows.clone(), ..]).to_owned(),
            target: self.target[rows].to_vec(),
        }
    }
}

/// Chronological train/test partitions
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: AlignedDataset,
    pub test: AlignedDataset,
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Predictor columns: every numeric column except the keys and helper columns.
///
/// The raw target column stays in: its value at `t` is known when predicting `t + 1`.
pub fn feature_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric(c.dtype()))
        .map(|c| c.name().to_string())
        .filter(|name| !is_key_column(name) && !name.starts_with("__"))
        .collect()
}

fn float_values(df: &DataFrame, column: &str) -> PipelineResult<Vec<f64>> {
    let casted = df.column(column)?.cast(&DataType::Float64)?;
    let values = casted.f64()?;
    if values.null_count() > 0 {
        return Err(PipelineError::DataQuality(format!(
            "column '{}' still has {} missing values after masking",
            column,
            values.null_count()
        )));
    }
    Ok(values.into_no_null_iter().collect())
}

fn int_values(df: &DataFrame, column: &str) -> PipelineResult<Vec<i64>> {
    let casted = df.column(column)?.cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().map(|v| v.unwrap_or(-1)).collect())
}

/// Position of each row inside its horizon series (the whole frame without `hors`)
fn series_positions(df: &DataFrame) -> PipelineResult<Series> {
    let mut positions: Vec<i64> = (0..df.height() as i64).collect();
    if let Some(groups) = horizon_groups(df)? {
        for rows in groups {
            for (position, &row) in rows.iter().enumerate() {
                positions[row] = position as i64;
            }
        }
    }
    Ok(Series::new(ROW_INDEX_COLUMN.into(), positions))
}

fn next_step(df: &DataFrame, column: &str, name: &str) -> PipelineResult<Column> {
    let series = df.column(column)?.as_materialized_series().clone();
    let shifted = per_horizon(df, &series, |s| Ok(s.shift(-1)))?;
    Ok(shifted.with_name(name.into()).into_column())
}

fn with_next_step_target(df: &DataFrame, target: &str) -> PipelineResult<DataFrame> {
    let columns = [
        next_step(df, target, TARGET_VALUE_COLUMN)?,
        next_step(df, ROW_INDEX_COLUMN, TARGET_ROW_COLUMN)?,
        next_step(df, DATE_COLUMN, TARGET_DATE_COLUMN)?,
    ];
    let mut result = df.hstack(&columns)?;
    let value = result.column(TARGET_VALUE_COLUMN)?.cast(&DataType::Float64)?;
    result.with_column(value)?;
    Ok(result)
}

/// Alignment stage: next-step target, missing-value masking and explicit row
/// correspondence check
///
/// # Arguments
///
/// * `df` - Frame with derived features, in time order
/// * `target` - Source column of the target (its value one row later)
/// * `policy` - Where the missing-value drop sits relative to the shift
///
/// # Returns
///
/// The aligned dataset. `Alignment` error when a target does not come from the
/// expected next row; `DataQuality` error when no row survives.
pub fn align_next_step(df: &DataFrame, target: &str, policy: MaskPolicy) -> PipelineResult<AlignedDataset> {
    let feature_names = feature_columns(df);
    if !feature_names.iter().any(|f| f == target) {
        return Err(PipelineError::Alignment(format!(
            "target column '{}' is missing or not numeric",
            target
        )));
    }

    let n_rows = df.height();
    let indexed = df.hstack(&[series_positions(df)?.into_column()])?;

    let mut required: Vec<String> = feature_names.clone();
    required.push(TARGET_VALUE_COLUMN.to_string());
    required.push(TARGET_ROW_COLUMN.to_string());
    required.push(TARGET_DATE_COLUMN.to_string());

    let aligned = match policy {
        MaskPolicy::ShiftThenDrop => {
            with_next_step_target(&indexed, target)?.drop_nulls(Some(required.as_slice()))?
        }
        MaskPolicy::DropThenShift => {
            let complete = indexed.drop_nulls(Some(feature_names.as_slice()))?;
            with_next_step_target(&complete, target)?.drop_nulls(Some(required.as_slice()))?
        }
    };

    let dropped = n_rows - aligned.height();
    if dropped > 0 {
        warn!("Dropped {} of {} rows with missing features or target", dropped, n_rows);
    }
    if aligned.height() == 0 {
        return Err(PipelineError::DataQuality(format!(
            "all {} rows were dropped by the missing-value filter",
            n_rows
        )));
    }

    let rows = int_values(&aligned, ROW_INDEX_COLUMN)?;
    let target_rows = int_values(&aligned, TARGET_ROW_COLUMN)?;
    let series = if has_column(&aligned, HORIZON_COLUMN) {
        int_values(&aligned, HORIZON_COLUMN)?
    } else {
        vec![0; aligned.height()]
    };
    verify_row_correspondence(&rows, &target_rows, &series, policy)?;

    let dates = int_values(&aligned, DATE_COLUMN)?;
    let target_dates = int_values(&aligned, TARGET_DATE_COLUMN)?;
    verify_date_correspondence(&dates, &target_dates)?;

    let columns: Vec<Vec<f64>> = feature_names
        .iter()
        .map(|name| float_values(&aligned, name))
        .collect::<PipelineResult<_>>()?;
    let target_values = float_values(&aligned, TARGET_VALUE_COLUMN)?;

    let features = Array2::from_shape_fn((aligned.height(), feature_names.len()), |(i, j)| columns[j][i]);

    if features.nrows() != target_values.len() || dates.len() != target_values.len() {
        return Err(PipelineError::Alignment(format!(
            "feature rows ({}) and target rows ({}) differ",
            features.nrows(),
            target_values.len()
        )));
    }

    let dataset = AlignedDataset {
        dates,
        feature_names,
        features,
        target: target_values,
    };
    info!(
        "Aligned dataset: {} rows x {} features ({:?})",
        dataset.len(),
        dataset.n_features(),
        policy
    );
    Ok(dataset)
}

/// Rows are positions inside their horizon series; `series` names that series
fn verify_row_correspondence(
    rows: &[i64],
    target_rows: &[i64],
    series: &[i64],
    policy: MaskPolicy,
) -> PipelineResult<()> {
    if rows.len() != target_rows.len() || rows.len() != series.len() {
        return Err(PipelineError::Alignment(format!(
            "{} feature rows but {} target rows",
            rows.len(),
            target_rows.len()
        )));
    }

    // next kept row of the same series, for every kept row
    let mut next_kept: Vec<Option<i64>> = vec![None; rows.len()];
    let mut seen: HashMap<i64, i64> = HashMap::new();
    for i in (0..rows.len()).rev() {
        next_kept[i] = seen.insert(series[i], rows[i]);
    }

    let mut skipped = 0usize;
    for (i, (&row, &target_row)) in rows.iter().zip(target_rows).enumerate() {
        if target_row <= row {
            return Err(PipelineError::Alignment(format!(
                "target for row {} comes from row {} (not in the future)",
                row, target_row
            )));
        }
        match policy {
            MaskPolicy::ShiftThenDrop if target_row != row + 1 => {
                return Err(PipelineError::Alignment(format!(
                    "target for row {} comes from row {} instead of {}",
                    row,
                    target_row,
                    row + 1
                )));
            }
            MaskPolicy::DropThenShift if target_row != row + 1 => {
                if let Some(next_row) = next_kept[i] {
                    if next_row != target_row {
                        return Err(PipelineError::Alignment(format!(
                            "target for row {} comes from row {} but the next kept row is {}",
                            row, target_row, next_row
                        )));
                    }
                }
                skipped += 1;
            }
            _ => {}
        }
    }

    if skipped > 0 {
        warn!("{} targets skip over dropped rows (more than one step ahead)", skipped);
    }
    Ok(())
}

/// Every target must come from a later `date` than its feature row. Targets more
/// than one hour ahead (gaps in the series) are counted and logged.
fn verify_date_correspondence(dates: &[i64], target_dates: &[i64]) -> PipelineResult<()> {
    let mut beyond_next_hour = 0usize;
    for (&date, &target_date) in dates.iter().zip(target_dates) {
        if target_date <= date {
            return Err(PipelineError::Alignment(format!(
                "target for date {} comes from date {} (not a later hour)",
                date, target_date
            )));
        }
        let next_hour = parse_date_key(date).map(|t| date_key(&(t + Duration::hours(1))));
        if next_hour != Some(target_date) {
            beyond_next_hour += 1;
        }
    }

    if beyond_next_hour > 0 {
        warn!("{} targets lie more than one hour after their feature row", beyond_next_hour);
    }
    Ok(())
}

/// Single contiguous cut at `floor(train_ratio * N)`; no shuffling.
///
/// When several rows share a `date` (multiple horizons), the cut moves forward to
/// the next date boundary so every test date is later than every train date.
pub fn chronological_split(dataset: &AlignedDataset, train_ratio: f64) -> PipelineResult<TrainTestSplit> {
    if !(0.0..1.0).contains(&train_ratio) || train_ratio == 0.0 {
        return Err(PipelineError::DataQuality(format!(
            "train ratio must be in (0, 1), got {}",
            train_ratio
        )));
    }

    let n = dataset.len();
    let mut split_idx = (n as f64 * train_ratio).floor() as usize;
    while split_idx > 0 && split_idx < n && dataset.dates[split_idx] == dataset.dates[split_idx - 1] {
        split_idx += 1;
    }

    if split_idx == 0 || split_idx >= n {
        return Err(PipelineError::DataQuality(format!(
            "{} rows cannot be split into non-empty train and test partitions",
            n
        )));
    }

    let split = TrainTestSplit {
        train: dataset.slice_rows(0..split_idx),
        test: dataset.slice_rows(split_idx..n),
    };

    let last_train = split.train.dates.iter().copied().max().unwrap_or(i64::MIN);
    let first_test = split.test.dates.iter().copied().min().unwrap_or(i64::MAX);
    if first_test <= last_train {
        return Err(PipelineError::Alignment(format!(
            "test partition starts at {} but train partition reaches {}",
            first_test, last_train
        )));
    }

    info!(
        "Split: {} train rows (..{}), {} test rows ({}..)",
        split.train.len(),
        last_train,
        split.test.len(),
        first_test
    );
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_gap() -> DataFrame {
        df!(
            "date" => [2009070100i64, 2009070101, 2009070102, 2009070103, 2009070104, 2009070105],
            "wp1" => [0.0f64, 0.1, 0.2, 0.3, 0.4, 0.5],
            "u_wf1" => [Some(1.0f64), Some(1.0), None, Some(1.0), Some(1.0), Some(1.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_feature_columns_exclude_keys() {
        let df = df!("date" => [1i64], "hors" => [1i64], "wp1" => [0.5f64], "u_wf1" => [1.0f64]).unwrap();
        assert_eq!(feature_columns(&df), vec!["wp1", "u_wf1"]);
    }

    #[test]
    fn test_shift_then_drop_targets_next_row() {
        let aligned = align_next_step(&frame_with_gap(), "wp1", MaskPolicy::ShiftThenDrop).unwrap();

        // row 2 has a missing forecast, row 5 has no next observation
        assert_eq!(aligned.dates, vec![2009070100, 2009070101, 2009070103, 2009070104]);
        assert_eq!(aligned.target, vec![0.1, 0.2, 0.4, 0.5]);
        assert_eq!(aligned.features.nrows(), aligned.target.len());
        assert!(!aligned.dates.contains(&2009070105));
    }

    #[test]
    fn test_drop_then_shift_skips_dropped_rows() {
        let aligned = align_next_step(&frame_with_gap(), "wp1", MaskPolicy::DropThenShift).unwrap();

        assert_eq!(aligned.dates, vec![2009070100, 2009070101, 2009070103, 2009070104]);
        // row 1 now predicts row 3
        assert_eq!(aligned.target, vec![0.1, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_all_rows_dropped_is_data_quality_error() {
        let df = df!(
            "date" => [2009070100i64, 2009070101],
            "wp1" => [0.0f64, 0.1],
            "u_wf1" => [None::<f64>, None]
        )
        .unwrap();
        let err = align_next_step(&df, "wp1", MaskPolicy::ShiftThenDrop).unwrap_err();
        assert!(matches!(err, PipelineError::DataQuality(_)));
    }

    #[test]
    fn test_row_correspondence_rejects_misaligned_target() {
        let series = [0, 0, 0];
        let err = verify_row_correspondence(&[0, 1, 2], &[1, 3, 3], &series, MaskPolicy::ShiftThenDrop).unwrap_err();
        assert!(matches!(err, PipelineError::Alignment(_)));
        assert!(verify_row_correspondence(&[0, 1], &[1], &[0, 0], MaskPolicy::ShiftThenDrop).is_err());
    }

    #[test]
    fn test_date_correspondence_rejects_same_hour_target() {
        let err = verify_date_correspondence(&[2009070100, 2009070100], &[2009070101, 2009070100]).unwrap_err();
        assert!(matches!(err, PipelineError::Alignment(_)));
        assert!(verify_date_correspondence(&[2009070123], &[2009070200]).is_ok());
    }

    fn horizon_frame(hours: usize) -> DataFrame {
        let mut dates = Vec::new();
        let mut hors = Vec::new();
        let mut power = Vec::new();
        for h in 0..hours as i64 {
            for horizon in [1i64, 2] {
                dates.push(2009070100 + h);
                hors.push(horizon);
                power.push(h as f64);
            }
        }
        df!("date" => dates, "hors" => hors, "wp1" => power).unwrap()
    }

    #[test]
    fn test_target_is_next_hour_of_same_horizon() {
        let aligned = align_next_step(&horizon_frame(20), "wp1", MaskPolicy::ShiftThenDrop).unwrap();

        // the last hour of each horizon has no next observation
        assert_eq!(aligned.len(), 38);
        let wp1 = aligned.feature_index("wp1").unwrap();
        for (i, &target) in aligned.target.iter().enumerate() {
            assert_eq!(target, aligned.features[[i, wp1]] + 1.0);
        }
    }

    #[test]
    fn test_drop_then_shift_stays_inside_horizon() {
        let mut df = horizon_frame(6);
        let gap: Vec<Option<f64>> = (0..12).map(|i| if i == 4 { None } else { Some(1.0) }).collect();
        df.with_column(Series::new("u_wf1".into(), gap)).unwrap();

        let aligned = align_next_step(&df, "wp1", MaskPolicy::DropThenShift).unwrap();
        // (hour 1, hors 1) now predicts hour 3 of the same horizon
        let row = aligned.dates.iter().position(|&d| d == 2009070101).unwrap();
        assert_eq!(aligned.target[row], 3.0);
        assert_eq!(aligned.target[row + 1], 2.0);
    }

    #[test]
    fn test_split_is_contiguous_and_ordered() {
        let dates: Vec<i64> = (0..10).map(|h| 2009070100 + h).collect();
        let df = df!("date" => dates, "wp1" => (0..10).map(|v| v as f64).collect::<Vec<f64>>()).unwrap();
        let aligned = align_next_step(&df, "wp1", MaskPolicy::ShiftThenDrop).unwrap();
        let split = chronological_split(&aligned, 0.8).unwrap();

        // 9 aligned rows -> floor(7.2) = 7
        assert_eq!(split.train.len(), 7);
        assert_eq!(split.test.len(), 2);
        let max_train = *split.train.dates.iter().max().unwrap();
        assert!(split.test.dates.iter().all(|&d| d > max_train));
    }

    #[test]
    fn test_split_moves_past_shared_dates() {
        let dataset = AlignedDataset {
            dates: vec![1, 1, 2, 2, 3, 3],
            feature_names: vec!["x".to_string()],
            features: Array2::zeros((6, 1)),
            target: vec![0.0; 6],
        };
        let split = chronological_split(&dataset, 0.5).unwrap();
        assert_eq!(split.train.dates, vec![1, 1, 2, 2]);
        assert_eq!(split.test.dates, vec![3, 3]);
    }

    #[test]
    fn test_split_needs_two_partitions() {
        let dataset = AlignedDataset {
            dates: vec![1],
            feature_names: vec!["x".to_string()],
            features: Array2::zeros((1, 1)),
            target: vec![0.0],
        };
        assert!(chronological_split(&dataset, 0.8).is_err());
    }
}
