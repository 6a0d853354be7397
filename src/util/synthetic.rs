// External crates
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::info;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

// Local modules
use crate::error::{PipelineError, PipelineResult};
use crate::util::feature_engineering::date_key;

const FORECAST_HORIZONS: [i64; 3] = [1, 2, 3];
const RATED_WIND_SPEED: f64 = 12.0;

/// Hourly `YYYYMMDDHH` keys starting at `start`
pub fn hourly_date_keys(start: NaiveDateTime, n_hours: usize) -> Vec<i64> {
    (0..n_hours)
        .map(|h| {
            let t = start + Duration::hours(h as i64);
            date_key(&t)
        })
        .collect()
}

pub fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2009, 7, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Normalised power curve: cubic up to rated speed, flat after
fn power_curve(wind_speed: f64) -> f64 {
    let ratio = (wind_speed / RATED_WIND_SPEED).clamp(0.0, 1.0);
    ratio.powi(3)
}

/// Synthetic observation table and per-farm forecast tables
#[derive(Debug, Clone)]
pub struct SyntheticWindData {
    /// `date`, `wp1`..`wp{n}`
    pub primary: DataFrame,
    /// One frame per farm: `date`, `hors`, `u`, `v`, `ws`, `wd`
    pub farms: Vec<DataFrame>,
}

/// Generates a seeded wind/power dataset with hourly keys
///
/// Wind speed per farm follows a mean-reverting random walk; power is the
/// normalised power curve of that speed plus noise. Forecast rows exist for every
/// date and horizon, with error growing with the horizon.
pub fn generate_wind_data(n_hours: usize, n_farms: usize, seed: u64) -> PipelineResult<SyntheticWindData> {
    if n_hours == 0 || n_farms == 0 {
        return Err(PipelineError::DataQuality(
            "synthetic data needs at least one hour and one farm".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let dates = hourly_date_keys(default_start(), n_hours);
    let mut primary_columns = vec![Column::new("date".into(), dates.clone())];
    let mut farms = Vec::with_capacity(n_farms);

    for farm in 1..=n_farms {
        let mut speed: f64 = rng.random_range(4.0..8.0);
        let mut speeds = Vec::with_capacity(n_hours);
        let mut power = Vec::with_capacity(n_hours);
        for _ in 0..n_hours {
            speed += 0.1 * (7.0 - speed) + rng.random_range(-1.0..1.0);
            speed = speed.max(0.0);
            speeds.push(speed);
            let noisy = power_curve(speed) + rng.random_range(-0.02..0.02);
            power.push(noisy.clamp(0.0, 1.0));
        }
        primary_columns.push(Column::new(format!("wp{}", farm).into(), power));

        let rows = n_hours * FORECAST_HORIZONS.len();
        let mut f_dates = Vec::with_capacity(rows);
        let mut f_hors = Vec::with_capacity(rows);
        let mut f_u = Vec::with_capacity(rows);
        let mut f_v = Vec::with_capacity(rows);
        let mut f_ws = Vec::with_capacity(rows);
        let mut f_wd = Vec::with_capacity(rows);

        for (i, &date) in dates.iter().enumerate() {
            for &hors in &FORECAST_HORIZONS {
                let error = 0.3 * hors as f64 * (rng.random::<f64>() - 0.5);
                let ws = (speeds[i] + error).max(0.0);
                let wd: f64 = rng.random_range(0.0..360.0);
                f_dates.push(date);
                f_hors.push(hors);
                f_u.push(ws * wd.to_radians().sin());
                f_v.push(ws * wd.to_radians().cos());
                f_ws.push(ws);
                f_wd.push(wd);
            }
        }

        farms.push(DataFrame::new(vec![
            Column::new("date".into(), f_dates),
            Column::new("hors".into(), f_hors),
            Column::new("u".into(), f_u),
            Column::new("v".into(), f_v),
            Column::new("ws".into(), f_ws),
            Column::new("wd".into(), f_wd),
        ])?);
    }

    Ok(SyntheticWindData {
        primary: DataFrame::new(primary_columns)?,
        farms,
    })
}

fn write_csv(df: &mut DataFrame, path: &Path) -> PipelineResult<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Locations of a dataset written by [`write_demo_dataset`]
#[derive(Debug, Clone)]
pub struct DemoPaths {
    pub primary: PathBuf,
    pub forecast_dir: PathBuf,
}

/// Writes `train.csv` and `windforecasts_wf{i}.csv` files under `dir`
pub fn write_demo_dataset(dir: &Path, n_hours: usize, n_farms: usize, seed: u64) -> PipelineResult<DemoPaths> {
    let data = generate_wind_data(n_hours, n_farms, seed)?;
    fs::create_dir_all(dir)?;

    let primary = dir.join("train.csv");
    let mut primary_df = data.primary;
    write_csv(&mut primary_df, &primary)?;

    for (i, mut farm) in data.farms.into_iter().enumerate() {
        write_csv(&mut farm, &dir.join(format!("windforecasts_wf{}.csv", i + 1)))?;
    }

    info!(
        "Wrote synthetic dataset to {} ({} hours, {} farms)",
        dir.display(),
        n_hours,
        n_farms
    );
    Ok(DemoPaths {
        primary,
        forecast_dir: dir.to_path_buf(),
    })
}
