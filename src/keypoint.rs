// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton data model.
//!
//! A [`Skeleton`] holds one slot per COCO body joint. Each slot is either a
//! decoded [`Keypoint`] in image pixel space or empty, so an unresolved joint can
//! never be mistaken for a point at the origin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

/// The 17 COCO body joints, in model channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    /// Nose.
    Nose,
    /// Left eye.
    LeftEye,
    /// Right eye.
    RightEye,
    /// Left ear.
    LeftEar,
    /// Right ear.
    RightEar,
    /// Left shoulder.
    LeftShoulder,
    /// Right shoulder.
    RightShoulder,
    /// Left elbow.
    LeftElbow,
    /// Right elbow.
    RightElbow,
    /// Left wrist.
    LeftWrist,
    /// Right wrist.
    RightWrist,
    /// Left hip.
    LeftHip,
    /// Right hip.
    RightHip,
    /// Left knee.
    LeftKnee,
    /// Right knee.
    RightKnee,
    /// Left ankle.
    LeftAnkle,
    /// Right ankle.
    RightAnkle,
}

impl Joint {
    /// Number of joints emitted by the pose model.
    pub const COUNT: usize = 17;

    /// All joints in channel order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    /// Heatmap channel index of this joint.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Joint for a heatmap channel index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Returns the snake-case name of the joint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }

    /// Returns whether the posture classifier reads this joint unconditionally.
    ///
    /// Shoulders, hips, ears, elbows and wrists are required. Every other joint
    /// is looked up optionally and the rules depending on it degrade or skip.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(
            self,
            Self::LeftEar
                | Self::RightEar
                | Self::LeftShoulder
                | Self::RightShoulder
                | Self::LeftElbow
                | Self::RightElbow
                | Self::LeftWrist
                | Self::RightWrist
                | Self::LeftHip
                | Self::RightHip
        )
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Joint {
    type Err = JointParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|joint| joint.as_str() == normalized)
            .ok_or_else(|| JointParseError(s.to_string()))
    }
}

/// Error returned when parsing an unknown joint name.
#[derive(Debug, Clone)]
pub struct JointParseError(String);

impl fmt::Display for JointParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown joint '{}'", self.0)
    }
}

impl std::error::Error for JointParseError {}

/// COCO skeleton limbs as pairs of joints, used when drawing a pose.
pub const LIMBS: [(Joint, Joint); 19] = [
    (Joint::LeftAnkle, Joint::LeftKnee),
    (Joint::LeftKnee, Joint::LeftHip),
    (Joint::RightAnkle, Joint::RightKnee),
    (Joint::RightKnee, Joint::RightHip),
    (Joint::LeftHip, Joint::RightHip),
    (Joint::LeftShoulder, Joint::LeftHip),
    (Joint::RightShoulder, Joint::RightHip),
    (Joint::LeftShoulder, Joint::RightShoulder),
    (Joint::LeftShoulder, Joint::LeftElbow),
    (Joint::RightShoulder, Joint::RightElbow),
    (Joint::LeftElbow, Joint::LeftWrist),
    (Joint::RightElbow, Joint::RightWrist),
    (Joint::LeftEye, Joint::RightEye),
    (Joint::Nose, Joint::LeftEye),
    (Joint::Nose, Joint::RightEye),
    (Joint::LeftEye, Joint::LeftEar),
    (Joint::RightEye, Joint::RightEar),
    (Joint::LeftEar, Joint::LeftShoulder),
    (Joint::RightEar, Joint::RightShoulder),
];

/// Integer pixel coordinate of a joint.
///
/// `row` is the vertical axis (grows downwards), `col` the horizontal axis.
/// Serialized as a `[row, col]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Keypoint {
    /// Vertical pixel coordinate.
    pub row: i32,
    /// Horizontal pixel coordinate.
    pub col: i32,
}

impl Keypoint {
    /// Create a keypoint from a (row, col) pair.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Row as a float, for geometry.
    #[must_use]
    pub fn y(self) -> f32 {
        self.row as f32
    }

    /// Column as a float, for geometry.
    #[must_use]
    pub fn x(self) -> f32 {
        self.col as f32
    }

    /// Euclidean distance to another keypoint.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self.y() - other.y()).hypot(self.x() - other.x())
    }
}

impl From<[i32; 2]> for Keypoint {
    fn from([row, col]: [i32; 2]) -> Self {
        Self { row, col }
    }
}

impl From<Keypoint> for [i32; 2] {
    fn from(kp: Keypoint) -> Self {
        [kp.row, kp.col]
    }
}

impl From<(i32, i32)> for Keypoint {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

/// Decoded joints of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Skeleton {
    joints: [Option<Keypoint>; Joint::COUNT],
}

impl Skeleton {
    /// Build a skeleton from a fully populated decoder output.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingKeypointError`] if `keypoints` does not
    /// contain exactly [`Joint::COUNT`] entries.
    pub fn from_keypoints(keypoints: &[Keypoint]) -> Result<Self> {
        if keypoints.len() != Joint::COUNT {
            return Err(InferenceError::MissingKeypointError {
                expected: Joint::COUNT,
                found: keypoints.len(),
                joint: None,
            });
        }
        let mut joints = [None; Joint::COUNT];
        for (slot, kp) in joints.iter_mut().zip(keypoints) {
            *slot = Some(*kp);
        }
        Ok(Self { joints })
    }

    /// Build a skeleton from per-joint slots, some of which may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingKeypointError`] if `slots` does not
    /// contain exactly [`Joint::COUNT`] entries.
    pub fn from_slots(slots: &[Option<Keypoint>]) -> Result<Self> {
        let joints = slots.try_into().map_err(|_| InferenceError::MissingKeypointError {
            expected: Joint::COUNT,
            found: slots.len(),
            joint: None,
        })?;
        Ok(Self { joints })
    }

    /// Return a copy with one joint slot replaced.
    #[must_use]
    pub const fn with_joint(mut self, joint: Joint, keypoint: Option<Keypoint>) -> Self {
        self.joints[joint.index()] = keypoint;
        self
    }

    /// Look up a joint, yielding `None` when the slot is empty.
    #[must_use]
    pub const fn get(&self, joint: Joint) -> Option<Keypoint> {
        self.joints[joint.index()]
    }

    /// Look up a joint that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingKeypointError`] naming `joint` if the
    /// slot is empty.
    pub fn require(&self, joint: Joint) -> Result<Keypoint> {
        self.get(joint).ok_or_else(|| InferenceError::MissingKeypointError {
            expected: Joint::COUNT,
            found: self.visible(),
            joint: Some(joint),
        })
    }

    /// Number of populated joint slots.
    #[must_use]
    pub fn visible(&self) -> usize {
        self.joints.iter().flatten().count()
    }

    /// Iterate over all joints in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (Joint, Option<Keypoint>)> + '_ {
        Joint::ALL.iter().copied().zip(self.joints.iter().copied())
    }

    /// Joint slots in channel order.
    #[must_use]
    pub const fn slots(&self) -> &[Option<Keypoint>; Joint::COUNT] {
        &self.joints
    }

    /// Apply a coordinate transform to every populated slot.
    #[must_use]
    pub fn map<F>(&self, mut f: F) -> Self
    where
        F: FnMut(Keypoint) -> Keypoint,
    {
        let mut joints = self.joints;
        for kp in joints.iter_mut().flatten() {
            *kp = f(*kp);
        }
        Self { joints }
    }
}
