// External crates
use glob::glob;
use log::{debug, info};
use polars::prelude::*;
use std::path::{Path, PathBuf};

// Internal modules
use crate::constants::{DATE_COLUMN, HORIZON_COLUMN};
use crate::error::{PipelineError, PipelineResult};

/// Read a CSV file with a header row into a DataFrame
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
///
/// # Returns
///
/// Returns the DataFrame, or an `Ingestion` error when the file is missing or unreadable
pub fn read_csv_file<P: AsRef<Path>>(file_path: P) -> PipelineResult<DataFrame> {
    let path = file_path.as_ref();
    debug!("Reading CSV: {}", path.display());

    if !path.is_file() {
        return Err(PipelineError::ingestion(path, "file not found"));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| PipelineError::ingestion(path, e.to_string()))
}

/// Returns true when the frame carries a column with this exact name
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Key columns of a frame: `date` always, `hors` when present
pub fn key_columns(df: &DataFrame) -> Vec<&'static str> {
    let mut keys = vec![DATE_COLUMN];
    if has_column(df, HORIZON_COLUMN) {
        keys.push(HORIZON_COLUMN);
    }
    keys
}

pub fn is_key_column(name: &str) -> bool {
    name == DATE_COLUMN || name == HORIZON_COLUMN
}

/// Require the `date` key and normalise key dtypes to Int64 so frames from
/// different files join on identical types.
pub fn ensure_key_columns(df: &mut DataFrame, source: &Path) -> PipelineResult<()> {
    if !has_column(df, DATE_COLUMN) {
        return Err(PipelineError::ingestion(
            source,
            format!("required key column '{}' not found", DATE_COLUMN),
        ));
    }

    for key in key_columns(df) {
        let casted = df.column(key)?.cast(&DataType::Int64)?;
        df.with_column(casted)?;
    }
    Ok(())
}

/// Find per-farm forecast files in `dir` whose file name matches `pattern`.
///
/// Files come back in sorted order; the position in this list is the farm index
/// used for column suffixes. A missing directory or no match gives an empty list.
pub fn discover_farm_files(dir: &Path, pattern: &str) -> PipelineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        info!("Forecast directory {} not found, no farm forecasts merged", dir.display());
        return Ok(Vec::new());
    }

    let full_pattern = dir.join(pattern);
    let pattern_str = full_pattern.to_string_lossy().to_string();
    let entries = glob(&pattern_str)
        .map_err(|e| PipelineError::ingestion(dir, format!("invalid glob pattern '{}': {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    info!("Found {} farm forecast file(s) matching '{}'", files.len(), pattern);
    Ok(files)
}
