// External crates
use ndarray::Array2;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Local modules
use crate::util::synthetic::{default_start, hourly_date_keys};

/// Hourly frame with `date`, a linearly rising `wp1` and one farm forecast column
pub fn linear_trend_frame(num_rows: usize) -> DataFrame {
    let dates = hourly_date_keys(default_start(), num_rows);
    let power: Vec<f64> = (0..num_rows).map(|i| i as f64 / num_rows as f64).collect();
    let speed: Vec<f64> = power.iter().map(|p| 3.0 + 10.0 * p).collect();
    df!("date" => dates, "wp1" => power, "ws_wf1" => speed).unwrap()
}

/// Same layout as [`linear_trend_frame`] with seeded noise on power and speed
pub fn noisy_wind_frame(num_rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let dates = hourly_date_keys(default_start(), num_rows);
    let mut power = Vec::with_capacity(num_rows);
    let mut speed = Vec::with_capacity(num_rows);
    for i in 0..num_rows {
        let base = 0.5 + 0.4 * (i as f64 / 12.0).sin();
        power.push((base + rng.random_range(-0.05..0.05)).clamp(0.0, 1.0));
        speed.push(8.0 * base + rng.random_range(-0.5..0.5));
    }
    df!("date" => dates, "wp1" => power, "ws_wf1" => speed).unwrap()
}

/// Two-feature matrix whose target is an exact linear function of the first column
pub fn linear_trend_matrix(num_rows: usize) -> (Array2<f64>, Vec<f64>) {
    let x = Array2::from_shape_fn((num_rows, 2), |(i, j)| {
        let t = i as f64 / num_rows as f64;
        if j == 0 {
            t
        } else {
            1.0 - t
        }
    });
    let y = (0..num_rows).map(|i| 0.1 + 0.8 * i as f64 / num_rows as f64).collect();
    (x, y)
}
