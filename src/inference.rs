// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration.
//!
//! This module defines the [`InferenceConfig`] struct, which controls the model
//! input size, how decoded keypoints are scaled, what a report exposes and the
//! posture rule thresholds.

use std::fmt;
use std::str::FromStr;

use crate::error::{InferenceError, Result};
use crate::heatmap::{HEATMAP_HEIGHT, HEATMAP_WIDTH};
use crate::posture::PostureThresholds;

/// Pixel space that reported keypoints are scaled into.
///
/// Posture rules are always evaluated on source-pixel keypoints, so the
/// verdict does not depend on this choice even when the frame and the model
/// input have different aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeypointSpace {
    /// Pixels of the original, unresized frame.
    #[default]
    Source,
    /// Pixels of the resized model input.
    ModelInput,
}

impl KeypointSpace {
    /// Returns the CLI name of the space.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::ModelInput => "model-input",
        }
    }
}

impl fmt::Display for KeypointSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KeypointSpace {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "source" | "original" => Ok(Self::Source),
            "model-input" | "model_input" | "model" | "input" => Ok(Self::ModelInput),
            _ => Err(InferenceError::ConfigError(format!(
                "invalid keypoint space '{s}', expected one of: source, model-input"
            ))),
        }
    }
}

/// Configuration for posture inference.
///
/// # Example
///
/// ```rust
/// use posture_inference::{InferenceConfig, KeypointSpace};
///
/// let config = InferenceConfig::new()
///     .with_imgsz(256, 192)
///     .with_keypoint_space(KeypointSpace::ModelInput)
///     .with_flags(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Explicit model input size (height, width).
    /// If `None`, the size reported by the model is used.
    pub imgsz: Option<(usize, usize)>,
    /// Heatmap size (height, width) emitted by the model.
    pub heatmap_size: (usize, usize),
    /// Pixel space of reported keypoints.
    pub keypoint_space: KeypointSpace,
    /// Whether reports include the keypoint list.
    pub include_keypoints: bool,
    /// Whether reports include the triggered posture flags.
    pub include_flags: bool,
    /// Posture rule thresholds.
    pub thresholds: PostureThresholds,
    /// Number of intra-op threads for ONNX Runtime.
    /// Setting this to `0` allows ONNX Runtime to choose the optimal number.
    pub num_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            imgsz: None,
            heatmap_size: (HEATMAP_HEIGHT, HEATMAP_WIDTH),
            keypoint_space: KeypointSpace::Source,
            include_keypoints: true,
            include_flags: false,
            thresholds: PostureThresholds::default(),
            num_threads: 0,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model input size.
    ///
    /// # Arguments
    ///
    /// * `height` - The target image height.
    /// * `width` - The target image width.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the heatmap size emitted by the model.
    #[must_use]
    pub const fn with_heatmap_size(mut self, height: usize, width: usize) -> Self {
        self.heatmap_size = (height, width);
        self
    }

    /// Set the pixel space of reported keypoints. Classification is unaffected.
    #[must_use]
    pub const fn with_keypoint_space(mut self, space: KeypointSpace) -> Self {
        self.keypoint_space = space;
        self
    }

    /// Include or omit keypoints in reports.
    #[must_use]
    pub const fn with_keypoints(mut self, include: bool) -> Self {
        self.include_keypoints = include;
        self
    }

    /// Include or omit posture flags in reports.
    #[must_use]
    pub const fn with_flags(mut self, include: bool) -> Self {
        self.include_flags = include;
        self
    }

    /// Set the posture rule thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: PostureThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the number of threads for inference.
    ///
    /// # Arguments
    ///
    /// * `threads` - The number of intra-op threads. Set to `0` for auto-configuration.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Check sizes and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ConfigError`] on a zero-sized input or heatmap,
    /// or an invalid threshold.
    pub fn validate(&self) -> Result<()> {
        if let Some((h, w)) = self.imgsz {
            if h == 0 || w == 0 {
                return Err(InferenceError::ConfigError(format!(
                    "Input size must be non-zero, got {h}x{w}"
                )));
            }
        }
        let (hh, hw) = self.heatmap_size;
        if hh == 0 || hw == 0 {
            return Err(InferenceError::ConfigError(format!(
                "Heatmap size must be non-zero, got {hh}x{hw}"
            )));
        }
        self.thresholds.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = InferenceConfig::default();
        assert_eq!(config.imgsz, None);
        assert_eq!(config.heatmap_size, (64, 48));
        assert_eq!(config.keypoint_space, KeypointSpace::Source);
        assert!(config.include_keypoints);
        assert!(!config.include_flags);
        assert_eq!(config.num_threads, 0);
    }

    #[test]
    fn test_config_builder() {
        let config = InferenceConfig::new()
            .with_imgsz(384, 288)
            .with_heatmap_size(96, 72)
            .with_keypoint_space(KeypointSpace::ModelInput)
            .with_keypoints(false)
            .with_flags(true)
            .with_threads(4);

        assert_eq!(config.imgsz, Some((384, 288)));
        assert_eq!(config.heatmap_size, (96, 72));
        assert_eq!(config.keypoint_space, KeypointSpace::ModelInput);
        assert!(!config.include_keypoints);
        assert!(config.include_flags);
        assert_eq!(config.num_threads, 4);
    }

    #[test]
    fn test_config_validate() {
        assert!(InferenceConfig::default().validate().is_ok());
        assert!(InferenceConfig::new().with_imgsz(0, 192).validate().is_err());
        assert!(InferenceConfig::new().with_heatmap_size(64, 0).validate().is_err());
        let bad = PostureThresholds::new().with_forward_head(-1.0);
        assert!(InferenceConfig::new().with_thresholds(bad).validate().is_err());
    }

    #[test]
    fn test_keypoint_space_from_str() {
        assert_eq!("source".parse::<KeypointSpace>().unwrap(), KeypointSpace::Source);
        assert_eq!("model-input".parse::<KeypointSpace>().unwrap(), KeypointSpace::ModelInput);
        assert_eq!("MODEL".parse::<KeypointSpace>().unwrap(), KeypointSpace::ModelInput);
        assert!("screen".parse::<KeypointSpace>().is_err());
        assert_eq!(KeypointSpace::ModelInput.to_string(), "model-input");
    }
}
