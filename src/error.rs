// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the posture inference library.

use std::fmt;

use crate::keypoint::Joint;

/// Result type alias for posture inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Main error type for the posture inference library.
#[derive(Debug)]
pub enum InferenceError {
    /// Error loading the ONNX model.
    ModelLoadError(String),
    /// Input bytes could not be decoded as an image.
    InvalidImageError(String),
    /// The pose model invocation failed or produced an unusable tensor.
    InferenceError(String),
    /// The classifier did not receive a full skeleton: either the keypoint list
    /// length is not the joint count, or a required joint slot is empty.
    MissingKeypointError {
        /// Number of joints the classifier requires.
        expected: usize,
        /// Number of keypoints actually supplied.
        found: usize,
        /// The required joint that is absent, if a single slot is to blame.
        joint: Option<Joint>,
    },
    /// Invalid configuration provided.
    ConfigError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
}

impl InferenceError {
    /// Whether the error was caused by the caller's input rather than the service.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidImageError(_))
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InvalidImageError(msg) => write!(f, "Invalid image: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::MissingKeypointError {
                joint: Some(joint), ..
            } => write!(f, "Missing keypoint: required joint {joint} is absent"),
            Self::MissingKeypointError { expected, found, .. } => {
                write!(f, "Missing keypoints: expected {expected}, found {found}")
            }
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for InferenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for InferenceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for InferenceError {
    fn from(err: image::ImageError) -> Self {
        Self::InvalidImageError(err.to_string())
    }
}
