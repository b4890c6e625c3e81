// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Results of a posture inference run.
//!
//! [`PoseAnalysis`] keeps everything the pipeline produced for one frame;
//! [`PostureReport`] is the trimmed, serializable view handed to callers.

use serde::Serialize;

use crate::inference::KeypointSpace;
use crate::keypoint::{Keypoint, Skeleton};
use crate::posture::{Flag, PostureVerdict};

/// Timing information for one inference run, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Speed {
    /// Time spent decoding and resizing the frame.
    pub preprocess: Option<f64>,
    /// Time spent in the pose model.
    pub inference: Option<f64>,
    /// Time spent decoding heatmaps and classifying.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of all recorded stages.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// Full outcome of analysing one frame.
#[derive(Debug, Clone)]
pub struct PoseAnalysis {
    /// Decoded skeleton, in `keypoint_space` pixels.
    pub skeleton: Skeleton,
    /// Posture verdict for the skeleton.
    pub verdict: PostureVerdict,
    /// Pixel space of `skeleton`.
    pub keypoint_space: KeypointSpace,
    /// Original frame size (height, width).
    pub orig_shape: (usize, usize),
    /// Model input size (height, width).
    pub input_shape: (usize, usize),
    /// Stage timings.
    pub speed: Speed,
}

impl PoseAnalysis {
    /// Whether the posture was judged good.
    #[must_use]
    pub const fn is_good(&self) -> bool {
        self.verdict.is_good()
    }

    /// Skeleton rescaled into original frame pixels.
    ///
    /// Identity when keypoints were already decoded in source space.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn source_skeleton(&self) -> Skeleton {
        match self.keypoint_space {
            KeypointSpace::Source => self.skeleton,
            KeypointSpace::ModelInput => {
                let gain_y = self.orig_shape.0 as f64 / self.input_shape.0.max(1) as f64;
                let gain_x = self.orig_shape.1 as f64 / self.input_shape.1.max(1) as f64;
                self.skeleton.map(|kp| {
                    Keypoint::new(
                        (f64::from(kp.row) * gain_y).floor() as i32,
                        (f64::from(kp.col) * gain_x).floor() as i32,
                    )
                })
            }
        }
    }

    /// Build the serializable report.
    #[must_use]
    pub fn report(&self, include_keypoints: bool, include_flags: bool) -> PostureReport {
        PostureReport {
            good: self.verdict.is_good(),
            flags: include_flags.then(|| self.verdict.flags().to_vec()),
            keypoints: include_keypoints.then(|| self.skeleton.slots().to_vec()),
        }
    }
}

/// Serializable posture result.
///
/// Serializes as `{"good": bool, "flags": [...], "keypoints": [[row, col], ...]}`
/// with `flags` and `keypoints` omitted when not requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostureReport {
    /// True when no posture rule fired.
    pub good: bool,
    /// Triggered flags, in rule order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<Flag>>,
    /// One (row, col) pair per joint in canonical order; `null` for absent joints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<Option<Keypoint>>>,
}

impl PostureReport {
    /// Flag descriptions, empty when flags were not requested or none fired.
    #[must_use]
    pub fn flag_descriptions(&self) -> Vec<&'static str> {
        self.flags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|flag| flag.description())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::Joint;

    fn analysis(space: KeypointSpace, flags: Vec<Flag>) -> PoseAnalysis {
        let skeleton = Skeleton::default()
            .with_joint(Joint::Nose, Some(Keypoint::new(64, 48)))
            .with_joint(Joint::LeftAnkle, Some(Keypoint::new(255, 191)));
        PoseAnalysis {
            skeleton,
            verdict: PostureVerdict::from_flags(flags),
            keypoint_space: space,
            orig_shape: (512, 384),
            input_shape: (256, 192),
            speed: Speed::new(1.0, 2.0, 0.5),
        }
    }

    #[test]
    fn test_speed_total() {
        assert!((Speed::new(1.0, 2.0, 0.5).total() - 3.5).abs() < 1e-9);
        assert!(Speed::default().total().abs() < 1e-9);
    }

    #[test]
    fn test_source_skeleton_rescales_model_input() {
        let a = analysis(KeypointSpace::ModelInput, Vec::new());
        let source = a.source_skeleton();
        assert_eq!(source.get(Joint::Nose), Some(Keypoint::new(128, 96)));
        assert_eq!(source.get(Joint::LeftAnkle), Some(Keypoint::new(510, 382)));
        assert_eq!(source.get(Joint::LeftEye), None);

        let b = analysis(KeypointSpace::Source, Vec::new());
        assert_eq!(b.source_skeleton(), b.skeleton);
    }

    #[test]
    fn test_report_serialization() {
        let a = analysis(KeypointSpace::Source, vec![Flag::UnevenShoulders]);

        let bare = serde_json::to_value(a.report(false, false)).unwrap();
        assert_eq!(bare, serde_json::json!({ "good": false }));

        let full = serde_json::to_value(a.report(true, true)).unwrap();
        assert_eq!(full["flags"], serde_json::json!(["uneven shoulders"]));
        let keypoints = full["keypoints"].as_array().unwrap();
        assert_eq!(keypoints.len(), 17);
        assert_eq!(keypoints[0], serde_json::json!([64, 48]));
        assert!(keypoints[1].is_null());
    }

    #[test]
    fn test_flag_descriptions() {
        let a = analysis(KeypointSpace::Source, vec![Flag::Slouching, Flag::HeadTilt]);
        assert!(a.report(true, false).flag_descriptions().is_empty());
        assert_eq!(
            a.report(false, true).flag_descriptions(),
            vec!["slouching", "head tilted to one side"]
        );
    }
}
