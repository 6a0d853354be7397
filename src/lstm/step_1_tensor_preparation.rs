// External crates
use anyhow::{bail, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor};
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

/// Per-column min-max scaler mapping the fitted range onto [0, 1]
///
/// Columns with zero range keep a scale of 1, so they map to 0 instead of NaN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinMaxScaler {
    pub min: Vec<f64>,
    pub scale: Vec<f64>,
}

impl MinMaxScaler {
    /// Fits one range per column of `x`
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            bail!("Cannot fit a scaler on an empty matrix");
        }
        let mut min = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for column in x.axis_iter(Axis(1)) {
            let lo = column.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if !lo.is_finite() || !hi.is_finite() {
                bail!("Cannot fit a scaler on non-finite values");
            }
            let range = hi - lo;
            min.push(lo);
            scale.push(if range.abs() < f64::EPSILON { 1.0 } else { range });
        }
        Ok(Self { min, scale })
    }

    /// Single-column scaler, used for the target
    pub fn fit_1d(values: &[f64]) -> Result<Self> {
        let column = Array2::from_shape_vec((values.len(), 1), values.to_vec())?;
        Self::fit(&column)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.min.len() {
            bail!("Scaler fitted on {} columns, got {}", self.min.len(), width);
        }
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok(Array2::from_shape_fn(x.dim(), |(i, j)| (x[[i, j]] - self.min[j]) / self.scale[j]))
    }

    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        Ok(Array2::from_shape_fn(x.dim(), |(i, j)| x[[i, j]] * self.scale[j] + self.min[j]))
    }

    pub fn transform_1d(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.check_width(1)?;
        Ok(values.iter().map(|v| (v - self.min[0]) / self.scale[0]).collect())
    }

    pub fn inverse_transform_1d(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.check_width(1)?;
        Ok(values.iter().map(|v| v * self.scale[0] + self.min[0]).collect())
    }
}

/// Builds overlapping sliding windows with stride 1
///
/// # Arguments
///
/// * `x` - Feature rows in time order, shape `[rows, features]`
/// * `y` - Target per row (already the next-step value)
/// * `timesteps` - Rows per window
///
/// # Returns
///
/// Windows of shape `[rows - timesteps + 1, timesteps, features]`. Window `i`
/// covers rows `i..i + timesteps` and takes the target of its last row.
pub fn create_windows(x: &Array2<f64>, y: &[f64], timesteps: usize) -> Result<(Array3<f64>, Vec<f64>)> {
    if timesteps == 0 {
        bail!("Window length must be at least 1");
    }
    if x.nrows() != y.len() {
        bail!("{} feature rows but {} targets", x.nrows(), y.len());
    }
    if x.nrows() < timesteps {
        bail!(
            "Not enough rows ({}) for a window of {} timesteps",
            x.nrows(),
            timesteps
        );
    }

    let n_windows = x.nrows() - timesteps + 1;
    let n_features = x.ncols();
    let windows = Array3::from_shape_fn((n_windows, timesteps, n_features), |(w, t, f)| x[[w + t, f]]);
    let targets = (0..n_windows).map(|w| y[w + timesteps - 1]).collect();
    Ok((windows, targets))
}

/// Converts windows and targets to burn tensors `[samples, timesteps, features]`
/// and `[samples, 1]`
pub fn windows_to_tensors<B: Backend>(
    windows: &Array3<f64>,
    targets: &[f64],
    device: &B::Device,
) -> Result<(Tensor<B, 3>, Tensor<B, 2>)> {
    let (n_samples, timesteps, n_features) = windows.dim();
    if n_samples != targets.len() {
        bail!("{} windows but {} targets", n_samples, targets.len());
    }

    let features_data: Vec<f32> = windows.iter().map(|&v| v as f32).collect();
    let target_data: Vec<f32> = targets.iter().map(|&v| v as f32).collect();

    let features_shape = Shape::new([n_samples, timesteps, n_features]);
    let target_shape = Shape::new([n_samples, 1]);

    let features_tensor: Tensor<B, 3> =
        Tensor::<B, 1>::from_floats(features_data.as_slice(), device).reshape(features_shape);
    let target_tensor: Tensor<B, 2> =
        Tensor::<B, 1>::from_floats(target_data.as_slice(), device).reshape(target_shape);

    Ok((features_tensor, target_tensor))
}

/// Feature-only tensor for inference
pub fn windows_to_tensor<B: Backend>(windows: &Array3<f64>, device: &B::Device) -> Tensor<B, 3> {
    let (n_samples, timesteps, n_features) = windows.dim();
    let data: Vec<f32> = windows.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([n_samples, timesteps, n_features])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use ndarray::array;

    #[test]
    fn test_scaler_maps_to_unit_range() {
        let x = array![[1.0, 5.0], [3.0, 5.0], [2.0, 5.0]];
        let scaler = MinMaxScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();

        assert_abs_diff_eq!(scaled[[0, 0]], 0.0);
        assert_abs_diff_eq!(scaled[[1, 0]], 1.0);
        assert_abs_diff_eq!(scaled[[2, 0]], 0.5);
        // constant column
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_scaler_round_trip() {
        let x = array![[0.12, -3.0], [0.87, 4.5], [0.33, 1.25], [0.5, 0.0]];
        let scaler = MinMaxScaler::fit(&x).unwrap();
        let restored = scaler.inverse_transform(&scaler.transform(&x).unwrap()).unwrap();
        for (a, b) in x.iter().zip(restored.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }

        let y = [0.1, 0.4, 0.9];
        let target_scaler = MinMaxScaler::fit_1d(&y).unwrap();
        let back = target_scaler
            .inverse_transform_1d(&target_scaler.transform_1d(&y).unwrap())
            .unwrap();
        for (a, b) in y.iter().zip(&back) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_scaler_rejects_wrong_width() {
        let scaler = MinMaxScaler::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_windows_take_last_row_target() {
        let x = Array2::from_shape_fn((5, 2), |(i, j)| (i * 10 + j) as f64);
        let y = [0.0, 1.0, 2.0, 3.0, 4.0];
        let (windows, targets) = create_windows(&x, &y, 3).unwrap();

        assert_eq!(windows.dim(), (3, 3, 2));
        assert_eq!(targets, vec![2.0, 3.0, 4.0]);
        assert_eq!(windows[[1, 0, 0]], 10.0);
        assert_eq!(windows[[1, 2, 1]], 31.0);
    }

    #[test]
    fn test_windows_need_enough_rows() {
        let x = Array2::<f64>::zeros((2, 1));
        assert!(create_windows(&x, &[0.0, 0.0], 3).is_err());
    }

    #[test]
    fn test_tensor_shapes() {
        let device = NdArrayDevice::default();
        let x = Array2::from_shape_fn((6, 4), |(i, j)| (i + j) as f64);
        let y = vec![0.5; 6];
        let (windows, targets) = create_windows(&x, &y, 3).unwrap();
        let (features, target) = windows_to_tensors::<NdArray>(&windows, &targets, &device).unwrap();

        assert_eq!(features.dims(), [4, 3, 4]);
        assert_eq!(target.dims(), [4, 1]);
    }
}
