// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Heatmap decoding.
//!
//! The pose model emits one confidence surface per joint. [`HeatmapDecoder`]
//! picks the peak of every surface and rescales it from heatmap cells to image
//! pixels.

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{InferenceError, Result};
use crate::keypoint::Keypoint;

/// Default heatmap height produced by HRNet-style pose models.
pub const HEATMAP_HEIGHT: usize = 64;

/// Default heatmap width produced by HRNet-style pose models.
pub const HEATMAP_WIDTH: usize = 48;

/// Per-joint confidence surfaces with shape (K, H, W).
#[derive(Debug, Clone)]
pub struct Heatmap {
    data: Array3<f32>,
}

impl Heatmap {
    /// Wrap a (K, H, W) array.
    #[must_use]
    pub const fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// Build a heatmap from a raw model output buffer.
    ///
    /// Leading singleton dimensions are squeezed, so (1, 1, K, H, W),
    /// (1, K, H, W) and (K, H, W) are all accepted.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InferenceError`] if the shape has fewer than
    /// three dimensions, a leading dimension other than 1, or does not match the
    /// buffer length.
    pub fn from_raw(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        if shape.len() < 3 {
            return Err(InferenceError::InferenceError(format!(
                "Unexpected heatmap shape {shape:?}, expected (K, H, W)"
            )));
        }
        let (lead, khw) = shape.split_at(shape.len() - 3);
        if lead.iter().any(|&d| d != 1) {
            return Err(InferenceError::InferenceError(format!(
                "Unexpected heatmap shape {shape:?}, only a single frame is supported"
            )));
        }
        let array = Array3::from_shape_vec((khw[0], khw[1], khw[2]), data).map_err(|e| {
            InferenceError::InferenceError(format!("Heatmap shape {shape:?} does not match data: {e}"))
        })?;
        Ok(Self::new(array))
    }

    /// Number of joint channels (K).
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.data.shape()[0]
    }

    /// Spatial size of each channel as (height, width).
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[1], shape[2])
    }

    /// Borrow the underlying array.
    #[must_use]
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }
}

impl From<Array3<f32>> for Heatmap {
    fn from(data: Array3<f32>) -> Self {
        Self::new(data)
    }
}

/// Position of the first maximum of a 2-D surface, scanning rows top to bottom
/// and columns left to right.
///
/// A flat surface yields `(0, 0)`. NaN handling is unspecified: NaN never
/// compares greater, so it is effectively skipped unless it sits at the origin.
#[must_use]
pub fn argmax_2d(surface: &ArrayView2<'_, f32>) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_value = f32::NEG_INFINITY;
    let mut first = true;
    for ((row, col), &value) in surface.indexed_iter() {
        if first || value > best_value {
            best = (row, col);
            best_value = value;
            first = false;
        }
    }
    best
}

/// Converts heatmaps to integer keypoints in a target image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapDecoder {
    /// Scale factors (`scale_y`, `scale_x`) from heatmap cells to target pixels.
    scale: (f64, f64),
}

impl HeatmapDecoder {
    /// Create a decoder from explicit scale factors (`scale_y`, `scale_x`).
    #[must_use]
    pub const fn with_scale(scale_y: f64, scale_x: f64) -> Self {
        Self {
            scale: (scale_y, scale_x),
        }
    }

    /// Create a decoder mapping a heatmap of `heatmap_size` onto `target_size`,
    /// both given as (height, width).
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ConfigError`] if the heatmap size has a zero dimension.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(heatmap_size: (usize, usize), target_size: (usize, usize)) -> Result<Self> {
        let (hh, hw) = heatmap_size;
        if hh == 0 || hw == 0 {
            return Err(InferenceError::ConfigError(format!(
                "Heatmap size must be non-zero, got {hh}x{hw}"
            )));
        }
        Ok(Self::with_scale(
            target_size.0 as f64 / hh as f64,
            target_size.1 as f64 / hw as f64,
        ))
    }

    /// Scale factors (`scale_y`, `scale_x`).
    #[must_use]
    pub const fn scale(&self) -> (f64, f64) {
        self.scale
    }

    /// Map a heatmap cell to a target pixel, truncating towards zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn scale_cell(&self, row: usize, col: usize) -> Keypoint {
        let (scale_y, scale_x) = self.scale;
        Keypoint::new(
            (row as f64 * scale_y).floor() as i32,
            (col as f64 * scale_x).floor() as i32,
        )
    }

    /// Decode one keypoint per channel, in channel order.
    ///
    /// No confidence threshold is applied: every channel yields a keypoint.
    #[must_use]
    pub fn decode(&self, heatmap: &Heatmap) -> Vec<Keypoint> {
        self.decode_view(&heatmap.view())
    }

    /// Decode a borrowed (K, H, W) array.
    #[must_use]
    pub fn decode_view(&self, heatmap: &ArrayView3<'_, f32>) -> Vec<Keypoint> {
        heatmap
            .axis_iter(Axis(0))
            .map(|channel| {
                let (row, col) = argmax_2d(&channel);
                self.scale_cell(row, col)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_argmax_unique_peak() {
        let mut surface = Array2::<f32>::zeros((64, 48));
        surface[[10, 20]] = 0.9;
        surface[[30, 5]] = 0.5;
        assert_eq!(argmax_2d(&surface.view()), (10, 20));
    }

    #[test]
    fn test_argmax_flat_is_origin() {
        let surface = Array2::<f32>::from_elem((64, 48), 0.3);
        assert_eq!(argmax_2d(&surface.view()), (0, 0));
    }

    #[test]
    fn test_argmax_tie_breaks_row_major() {
        let mut surface = Array2::<f32>::zeros((4, 4));
        surface[[2, 0]] = 1.0;
        surface[[1, 3]] = 1.0;
        surface[[3, 3]] = 1.0;
        assert_eq!(argmax_2d(&surface.view()), (1, 3));
    }

    #[test]
    fn test_decode_scales_and_truncates() {
        let mut data = Array3::<f32>::zeros((2, 64, 48));
        data[[0, 7, 4]] = 1.0;
        data[[1, 63, 47]] = 1.0;
        // 480 / 64 = 7.5, 640 / 48 = 13.333...
        let decoder = HeatmapDecoder::new((64, 48), (480, 640)).unwrap();
        let kps = decoder.decode(&Heatmap::new(data));

        assert_eq!(kps.len(), 2);
        // floor(7 * 7.5) = 52, floor(4 * 13.333) = 53
        assert_eq!(kps[0], Keypoint::new(52, 53));
        // floor(63 * 7.5) = 472, floor(47 * 13.333) = 626
        assert_eq!(kps[1], Keypoint::new(472, 626));
    }

    #[test]
    fn test_decode_flat_channels_yield_origin() {
        let data = Array3::<f32>::zeros((17, 64, 48));
        let decoder = HeatmapDecoder::new((64, 48), (256, 192)).unwrap();
        let kps = decoder.decode(&Heatmap::new(data));
        assert_eq!(kps.len(), 17);
        assert!(kps.iter().all(|kp| *kp == Keypoint::new(0, 0)));
    }

    #[test]
    fn test_decoder_rejects_zero_heatmap() {
        assert!(matches!(
            HeatmapDecoder::new((0, 48), (256, 192)),
            Err(InferenceError::ConfigError(_))
        ));
    }

    #[test]
    fn test_from_raw_squeezes_leading_dims() {
        let data = vec![0.0; 17 * 64 * 48];
        let heatmap = Heatmap::from_raw(data.clone(), &[1, 1, 17, 64, 48]).unwrap();
        assert_eq!(heatmap.num_joints(), 17);
        assert_eq!(heatmap.size(), (64, 48));

        assert!(Heatmap::from_raw(data.clone(), &[2, 17, 32, 48]).is_err());
        assert!(Heatmap::from_raw(data.clone(), &[17, 64]).is_err());
        assert!(Heatmap::from_raw(data, &[1, 17, 64, 47]).is_err());
    }
}
