// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Posture Inference Library
//!
//! Sitting-posture classification from a single camera frame. An HRNet-style
//! pose model (run through ONNX Runtime) produces one heatmap per COCO joint;
//! the peaks are decoded into a 17-joint skeleton and a fixed table of
//! geometric rules decides whether the posture is good.
//!
//! ## Features
//!
//! - **ONNX Runtime** - Any HRNet-style model exported with a (1, 3, H, W) input
//!   and (1, 17, 64, 48) heatmap output
//! - **Scale invariant rules** - Every threshold is a multiple of the shoulder width
//! - **Injectable model** - The pipeline only sees the [`PoseModel`] trait
//! - **Thread safe** - One [`InferencePipeline`] serves concurrent callers
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use posture_inference::{InferenceConfig, InferencePipeline};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InferenceConfig::new().with_flags(true);
//!     let pipeline = InferencePipeline::load("hrnet_pose.onnx", config)?;
//!
//!     let report = pipeline.process(&std::fs::read("person.jpg")?)?;
//!     println!("good posture: {}", report.good);
//!     for flag in report.flag_descriptions() {
//!         println!("  - {flag}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Classifying Keypoints Directly
//!
//! ```rust
//! use posture_inference::{Joint, Keypoint, PostureClassifier, Skeleton};
//!
//! let skeleton = Skeleton::default()
//!     .with_joint(Joint::LeftShoulder, Some(Keypoint::new(64, 120)))
//!     .with_joint(Joint::RightShoulder, Some(Keypoint::new(64, 72)));
//!
//! // Ears, elbows, wrists and hips are required as well.
//! assert!(PostureClassifier::default().classify(&skeleton).is_err());
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Classify one image
//! posture-inference predict --model hrnet_pose.onnx --source person.jpg
//!
//! # Classify a directory, list flags and save annotated copies
//! posture-inference predict -m hrnet_pose.onnx -s frames/ --flags --save
//!
//! # JSON lines with keypoints in model-input pixels
//! posture-inference predict -m hrnet_pose.onnx -s frames/ --json --keypoint-space model-input
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust
//! use posture_inference::{InferenceConfig, KeypointSpace, PostureThresholds};
//!
//! let config = InferenceConfig::new()
//!     .with_imgsz(256, 192)                           // Model input size
//!     .with_keypoint_space(KeypointSpace::Source)     // Report source pixels
//!     .with_flags(true)                               // Include triggered flags
//!     .with_thresholds(PostureThresholds::new().with_slouch(0.3));
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | [`InferencePipeline`]: decode, resize, infer, decode heatmaps, classify |
//! | [`model`] | [`PoseModel`] trait and the ONNX Runtime [`OnnxPoseModel`] |
//! | [`heatmap`] | [`Heatmap`] and the argmax [`HeatmapDecoder`] |
//! | [`keypoint`] | [`Joint`], [`Keypoint`] and [`Skeleton`] |
//! | [`posture`] | [`PostureClassifier`] rule table and [`PostureVerdict`] |
//! | [`results`] | [`PoseAnalysis`] and the serializable [`PostureReport`] |
//! | [`inference`] | [`InferenceConfig`] for customizing inference settings |
//! | [`preprocessing`] | Image decoding, resizing and normalization |
//! | [`source`] | Image file, directory and glob sources for the CLI |
//! | [`error`] | Error types ([`InferenceError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Skeleton overlays for `--save` (default) |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod error;
pub mod heatmap;
pub mod inference;
pub mod keypoint;
pub mod model;
pub mod pipeline;
pub mod posture;
pub mod preprocessing;
pub mod results;
pub mod source;

pub mod cli;

// Re-export main types for convenience
pub use error::{InferenceError, Result};
pub use heatmap::{Heatmap, HeatmapDecoder};
pub use inference::{InferenceConfig, KeypointSpace};
pub use keypoint::{Joint, Keypoint, Skeleton};
pub use model::{OnnxPoseModel, PoseModel, StaticPoseModel};
pub use pipeline::InferencePipeline;
pub use posture::{Flag, PostureClassifier, PostureThresholds, PostureVerdict};
pub use results::{PoseAnalysis, PostureReport, Speed};
pub use source::Source;

// Re-export preprocessing utilities
pub use preprocessing::{array_to_image, decode_image, preprocess_image};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
