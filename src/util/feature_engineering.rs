// External crates
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::info;
use polars::prelude::*;
use std::collections::BTreeMap;

// Local modules
use crate::config::FeatureConfig;
use crate::constants::{CALENDAR_FEATURES, DATE_COLUMN, HORIZON_COLUMN};
use crate::error::{PipelineError, PipelineResult};
use crate::util::file_utils::has_column;

fn trailing_window(window: usize) -> RollingOptionsFixedWindow {
    // min_periods == window: undefined until the window is full
    RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        center: false,
        ..Default::default()
    }
}

fn float_series(df: &DataFrame, column: &str) -> PolarsResult<Series> {
    let series = df.column(column)?.cast(&DataType::Float64)?;
    Ok(series.as_materialized_series().clone())
}

/// Row positions of each horizon series, in frame order.
///
/// `None` when the frame has no `hors` column and is a single series.
pub fn horizon_groups(df: &DataFrame) -> PolarsResult<Option<Vec<Vec<usize>>>> {
    if !has_column(df, HORIZON_COLUMN) {
        return Ok(None);
    }
    let horizons = df.column(HORIZON_COLUMN)?.cast(&DataType::Int64)?;
    let mut groups: BTreeMap<Option<i64>, Vec<usize>> = BTreeMap::new();
    for (row, hors) in horizons.i64()?.into_iter().enumerate() {
        groups.entry(hors).or_default().push(row);
    }
    Ok(Some(groups.into_values().collect()))
}

/// Applies a row-sequential operation to each horizon series on its own and
/// scatters the results back to frame order.
///
/// A frame with one row per (`date`, `hors`) holds one hourly series per horizon;
/// the previous or next step of a row is the neighbouring row of the same horizon.
pub fn per_horizon<F>(df: &DataFrame, series: &Series, op: F) -> PolarsResult<Series>
where
    F: Fn(&Series) -> PolarsResult<Series>,
{
    let Some(groups) = horizon_groups(df)? else {
        return op(series);
    };

    let values = series.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let mut scattered: Vec<Option<f64>> = vec![None; series.len()];

    for rows in groups {
        let part: Vec<Option<f64>> = rows.iter().map(|&row| values.get(row)).collect();
        let result = op(&Series::new(series.name().clone(), part))?;
        let result = result.cast(&DataType::Float64)?;
        for (&row, value) in rows.iter().zip(result.f64()?.into_iter()) {
            scattered[row] = value;
        }
    }

    Ok(Series::new(series.name().clone(), scattered))
}

/// Calculates lagged features for a given column
///
/// `{column}_lag_{k}` at row `t` holds the value at row `t - k` of the same
/// horizon series; the first `k` rows of each series are null.
pub fn calculate_lagged_features(df: &DataFrame, column: &str, lags: &[usize]) -> PolarsResult<Vec<Series>> {
    let series = float_series(df, column)?;
    let mut result = Vec::with_capacity(lags.len());

    for &lag in lags {
        let lagged = per_horizon(df, &series, |s| Ok(s.shift(lag as i64)))?;
        let name = format!("{}_lag_{}", column, lag);
        result.push(lagged.with_name(name.into()));
    }

    Ok(result)
}

/// Calculates trailing rolling mean and standard deviation for each window
///
/// Both statistics at row `t` cover rows `[t - w + 1, t]` of the same horizon
/// series only, so no future value ever enters a row. Standard deviation is the
/// sample estimate (ddof = 1).
pub fn calculate_rolling_features(df: &DataFrame, column: &str, windows: &[usize]) -> PolarsResult<Vec<Series>> {
    let series = float_series(df, column)?;
    let mut result = Vec::with_capacity(windows.len() * 2);

    for &window in windows {
        if window == 0 {
            return Err(PolarsError::ComputeError("Rolling window must be at least 1".into()));
        }
        let mean = per_horizon(df, &series, |s| s.rolling_mean(trailing_window(window)))?;
        let std = per_horizon(df, &series, |s| s.rolling_std(trailing_window(window)))?;
        result.push(mean.with_name(format!("{}_roll_mean_{}", column, window).into()));
        result.push(std.with_name(format!("{}_roll_std_{}", column, window).into()));
    }

    Ok(result)
}

/// Encodes a timestamp as a `YYYYMMDDHH` key
pub fn date_key(t: &NaiveDateTime) -> i64 {
    t.year() as i64 * 1_000_000 + t.month() as i64 * 10_000 + t.day() as i64 * 100 + t.hour() as i64
}

/// Parses a `YYYYMMDDHH` key into a timestamp
pub fn parse_date_key(value: i64) -> Option<NaiveDateTime> {
    if !(1_000_000_000..=9_999_999_999).contains(&value) {
        return None;
    }
    let hour = (value % 100) as u32;
    let day = ((value / 100) % 100) as u32;
    let month = ((value / 10_000) % 100) as u32;
    let year = (value / 1_000_000) as i32;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)
}

/// Create calendar features (`hour`, `dayofweek`, `month`) from the date key
///
/// Day of week counts from Monday = 0. A null or malformed key rejects the whole
/// frame with `MalformedKey`; nothing is defaulted.
pub fn calculate_calendar_features(df: &DataFrame, key: &str) -> PipelineResult<Vec<Series>> {
    let keys = df.column(key)?.cast(&DataType::Int64)?;
    let keys = keys.i64()?;
    let n_rows = df.height();

    let mut hour = Vec::with_capacity(n_rows);
    let mut dayofweek = Vec::with_capacity(n_rows);
    let mut month = Vec::with_capacity(n_rows);

    for (row, value) in keys.into_iter().enumerate() {
        let datetime = value
            .and_then(parse_date_key)
            .ok_or_else(|| PipelineError::MalformedKey {
                row,
                value: value.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string()),
            })?;

        hour.push(datetime.hour() as i32);
        dayofweek.push(datetime.weekday().num_days_from_monday() as i32);
        month.push(datetime.month() as i32);
    }

    let [hour_name, dayofweek_name, month_name] = CALENDAR_FEATURES;
    Ok(vec![
        Series::new(hour_name.into(), hour),
        Series::new(dayofweek_name.into(), dayofweek),
        Series::new(month_name.into(), month),
    ])
}

/// Feature construction stage: appends lag, rolling and calendar columns
///
/// # Arguments
///
/// * `df` - Time-ordered merged frame
/// * `config` - Source column, lags and rolling windows
///
/// # Returns
///
/// The input frame with the derived columns appended. Existing columns and row
/// order are untouched.
pub fn add_wind_features(df: &DataFrame, config: &FeatureConfig) -> PipelineResult<DataFrame> {
    let mut derived: Vec<Series> = Vec::new();
    derived.extend(calculate_lagged_features(df, &config.source_column, &config.lags)?);
    derived.extend(calculate_rolling_features(df, &config.source_column, &config.rolling_windows)?);
    derived.extend(calculate_calendar_features(df, DATE_COLUMN)?);

    let columns: Vec<Column> = derived.into_iter().map(|s| s.into_column()).collect();
    let result = df.hstack(&columns)?;

    info!("Added {} derived feature columns", columns.len());
    Ok(result)
}
