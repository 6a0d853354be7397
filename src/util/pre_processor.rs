// External crates
use log::{info, warn};
use polars::prelude::*;
use std::path::Path;

// Local modules
use crate::constants::{DATE_COLUMN, FARM_SUFFIX_PREFIX, HORIZON_COLUMN, ROW_INDEX_COLUMN};
use crate::error::{PipelineError, PipelineResult};
use crate::util::file_utils::{
    discover_farm_files, ensure_key_columns, has_column, is_key_column, key_columns, read_csv_file,
};

/// Loads the primary observation table and sorts it by its key
///
/// # Arguments
///
/// * `full_path` - Path to the primary CSV
/// * `target` - Name of the power column that must be present (usually `wp1`)
///
/// # Returns
///
/// Returns the time-ordered DataFrame or an `Ingestion` error
pub fn load_primary(full_path: &Path, target: &str) -> PipelineResult<DataFrame> {
    info!("Loading primary table from: {}", full_path.display());

    let mut df = read_csv_file(full_path)?;
    ensure_key_columns(&mut df, full_path)?;

    if !has_column(&df, target) {
        return Err(PipelineError::ingestion(
            full_path,
            format!("required target column '{}' not found", target),
        ));
    }

    let df = df.sort(key_columns(&df), SortMultipleOptions::default())?;
    info!("Primary table: {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

/// Renames every non-key column to `{name}_wf{farm_index}`
pub fn suffix_farm_columns(df: &mut DataFrame, farm_index: usize) -> PolarsResult<()> {
    let renames: Vec<(String, String)> = df
        .get_column_names()
        .iter()
        .filter(|name| !is_key_column(name.as_str()))
        .map(|name| {
            (
                name.to_string(),
                format!("{}{}{}", name, FARM_SUFFIX_PREFIX, farm_index),
            )
        })
        .collect();

    for (old_name, new_name) in renames {
        df.rename(&old_name, new_name.into())?;
    }
    Ok(())
}

/// Loads each farm file and suffixes its columns with the 1-based farm index
pub fn load_farm_forecasts(forecast_dir: &Path, pattern: &str) -> PipelineResult<Vec<DataFrame>> {
    let files = discover_farm_files(forecast_dir, pattern)?;
    let mut frames = Vec::with_capacity(files.len());

    for (i, path) in files.iter().enumerate() {
        let mut df = read_csv_file(path)?;
        ensure_key_columns(&mut df, path)?;
        suffix_farm_columns(&mut df, i + 1)?;
        info!(
            "Farm {} <- {} ({} rows)",
            i + 1,
            path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            df.height()
        );
        frames.push(df);
    }

    Ok(frames)
}

fn shared_keys(left: &DataFrame, right: &DataFrame) -> Vec<&'static str> {
    let mut keys = vec![DATE_COLUMN];
    if has_column(left, HORIZON_COLUMN) && has_column(right, HORIZON_COLUMN) {
        keys.push(HORIZON_COLUMN);
    }
    keys
}

fn key_exprs(keys: &[&str]) -> Vec<Expr> {
    keys.iter().map(|k| col(*k)).collect()
}

/// Full outer join of all farm frames on their shared keys.
///
/// Returns `None` when there is nothing to merge.
pub fn merge_farm_forecasts(frames: Vec<DataFrame>) -> PipelineResult<Option<DataFrame>> {
    let mut frames = frames.into_iter();
    let Some(mut merged) = frames.next() else {
        return Ok(None);
    };

    for next in frames {
        let keys = shared_keys(&merged, &next);
        merged = merged
            .lazy()
            .join(
                next.lazy(),
                key_exprs(&keys),
                key_exprs(&keys),
                JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
            )
            .collect()?;
    }

    let merged = merged.sort(key_columns(&merged), SortMultipleOptions::default())?;
    Ok(Some(merged))
}

/// Keeps one forecast row per `date`: the one with the smallest horizon.
///
/// Used when the observation table has no `hors` column, so that a join on
/// `date` alone cannot duplicate observation rows.
pub fn collapse_to_freshest_horizon(df: DataFrame) -> PolarsResult<DataFrame> {
    let sorted = df.sort(vec![DATE_COLUMN, HORIZON_COLUMN], SortMultipleOptions::default())?;
    let dates = sorted.column(DATE_COLUMN)?.i64()?;
    let previous = dates.shift(1);
    let first_of_date = dates.not_equal_missing(&previous);

    let collapsed = sorted.filter(&first_of_date)?;
    collapsed.drop(HORIZON_COLUMN)
}

/// Left joins merged forecasts onto the primary table. Every primary row is kept,
/// in its original order; unmatched forecast cells are null.
pub fn join_onto_primary(primary: &DataFrame, forecasts: DataFrame) -> PipelineResult<DataFrame> {
    let forecasts = if !has_column(primary, HORIZON_COLUMN) && has_column(&forecasts, HORIZON_COLUMN) {
        collapse_to_freshest_horizon(forecasts)?
    } else {
        forecasts
    };

    let keys = shared_keys(primary, &forecasts);
    let joined = primary
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX_COLUMN, None)
        .join(
            forecasts.lazy(),
            key_exprs(&keys),
            key_exprs(&keys),
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    if joined.height() != primary.height() {
        return Err(PipelineError::DataQuality(format!(
            "forecast join changed the primary row count from {} to {} (duplicate forecast keys?)",
            primary.height(),
            joined.height()
        )));
    }

    let joined = joined
        .sort(vec![ROW_INDEX_COLUMN], SortMultipleOptions::default())?
        .drop(ROW_INDEX_COLUMN)?;
    Ok(joined)
}

/// Ingestion & merge stage: primary table plus every farm forecast file
///
/// # Arguments
///
/// * `primary_path` - Path to the primary observation CSV
/// * `forecast_dir` - Directory containing the per-farm forecast CSVs
/// * `pattern` - Glob pattern on file name selecting the farm files
/// * `target` - Power column required in the primary table
///
/// # Returns
///
/// One frame keyed by `date`[,`hors`]. With no farm files the primary table passes
/// through unchanged.
pub fn load_and_merge(
    primary_path: &Path,
    forecast_dir: &Path,
    pattern: &str,
    target: &str,
) -> PipelineResult<DataFrame> {
    let primary = load_primary(primary_path, target)?;
    let farms = load_farm_forecasts(forecast_dir, pattern)?;

    let Some(forecasts) = merge_farm_forecasts(farms)? else {
        warn!("No farm forecast files merged; using the primary table alone");
        return Ok(primary);
    };

    let merged = join_onto_primary(&primary, forecasts)?;
    info!(
        "Merged frame: {} rows x {} columns",
        merged.height(),
        merged.width()
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn farm(values: &[f64]) -> DataFrame {
        df!(
            "date" => [2009070100i64, 2009070100, 2009070101],
            "hors" => [1i64, 2, 1],
            "u" => values,
            "ws" => values
        )
        .unwrap()
    }

    #[test]
    fn test_suffix_leaves_keys_untouched() {
        let mut df = farm(&[1.0, 2.0, 3.0]);
        suffix_farm_columns(&mut df, 4).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["date", "hors", "u_wf4", "ws_wf4"]);
    }

    #[test]
    fn test_merge_is_outer_across_farms() {
        let mut a = farm(&[1.0, 2.0, 3.0]);
        suffix_farm_columns(&mut a, 1).unwrap();
        let mut b = df!(
            "date" => [2009070101i64, 2009070102],
            "hors" => [1i64, 1],
            "u" => [9.0f64, 8.0]
        )
        .unwrap();
        suffix_farm_columns(&mut b, 2).unwrap();

        let merged = merge_farm_forecasts(vec![a, b]).unwrap().unwrap();
        // (00,1) (00,2) (01,1) (02,1): farm-specific keys survive
        assert_eq!(merged.height(), 4);
        assert!(has_column(&merged, "u_wf1"));
        assert!(has_column(&merged, "u_wf2"));
        assert!(!has_column(&merged, "date_right"));
        let u2 = merged.column("u_wf2").unwrap();
        assert_eq!(u2.null_count(), 2);
    }

    #[test]
    fn test_merge_without_frames_is_none() {
        assert!(merge_farm_forecasts(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn test_collapse_keeps_smallest_horizon() {
        let df = farm(&[1.0, 2.0, 3.0]);
        let collapsed = collapse_to_freshest_horizon(df).unwrap();
        assert_eq!(collapsed.height(), 2);
        assert!(!has_column(&collapsed, "hors"));
        let u: Vec<Option<f64>> = collapsed.column("u").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(u, vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_left_join_keeps_primary_rows_in_order() {
        let primary = df!(
            "date" => [2009070100i64, 2009070101, 2009070102],
            "wp1" => [0.1f64, 0.2, 0.3]
        )
        .unwrap();
        let mut forecasts = farm(&[1.0, 2.0, 3.0]);
        suffix_farm_columns(&mut forecasts, 1).unwrap();

        let joined = join_onto_primary(&primary, forecasts).unwrap();
        assert_eq!(joined.height(), 3);
        let dates: Vec<Option<i64>> = joined.column("date").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(dates, vec![Some(2009070100), Some(2009070101), Some(2009070102)]);
        let u: Vec<Option<f64>> = joined.column("u_wf1").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(u, vec![Some(1.0), Some(3.0), None]);
    }
}
