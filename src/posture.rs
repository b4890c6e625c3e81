// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Sitting-posture classification.
//!
//! The classifier measures a [`Skeleton`] once ([`BodyGeometry`]) and then runs
//! an ordered table of independent [`PostureRule`]s over the measurement. Each
//! rule may raise one [`Flag`]; the pose is good when no rule fires.
//!
//! All thresholds are multiples of the shoulder width, which makes every rule
//! invariant to how far the subject sits from the camera.
//!
//! Coordinates follow the (row, col) convention of [`Keypoint`]: `row` is the
//! vertical axis and `col` the horizontal axis, for every rule.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{InferenceError, Result};
use crate::keypoint::{Joint, Keypoint, Skeleton};

/// Rule thresholds, each expressed as a fraction of the shoulder width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureThresholds {
    /// Maximum forward offset of the head (nose or ears) from the shoulders.
    pub forward_head: f32,
    /// Maximum vertical difference between the shoulders.
    pub uneven_shoulders: f32,
    /// Maximum amount the shoulder line may sit below the hip line.
    pub slouch: f32,
    /// Maximum horizontal shift between shoulder and hip midpoints.
    pub lateral_lean: f32,
    /// Maximum outward elbow offset beyond the shoulders.
    pub rolled_shoulders: f32,
    /// Minimum vertical gap between each shoulder and its ear.
    pub elevated_shoulders: f32,
    /// Maximum vertical difference between the wrists.
    pub arm_asymmetry: f32,
    /// Maximum elbow span.
    pub winged_elbows: f32,
    /// Minimum vertical torso length.
    pub collapsed_torso: f32,
    /// Maximum vertical difference between the eyes.
    pub head_tilt: f32,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            forward_head: 0.20,
            uneven_shoulders: 0.10,
            slouch: 0.25,
            lateral_lean: 0.15,
            rolled_shoulders: 0.20,
            elevated_shoulders: 0.10,
            arm_asymmetry: 0.15,
            winged_elbows: 1.5,
            collapsed_torso: 0.4,
            head_tilt: 0.05,
        }
    }
}

impl PostureThresholds {
    /// Create thresholds with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the forward head threshold.
    #[must_use]
    pub const fn with_forward_head(mut self, ratio: f32) -> Self {
        self.forward_head = ratio;
        self
    }

    /// Set the uneven shoulders threshold.
    #[must_use]
    pub const fn with_uneven_shoulders(mut self, ratio: f32) -> Self {
        self.uneven_shoulders = ratio;
        self
    }

    /// Set the slouching threshold.
    #[must_use]
    pub const fn with_slouch(mut self, ratio: f32) -> Self {
        self.slouch = ratio;
        self
    }

    /// Set the lateral lean threshold.
    #[must_use]
    pub const fn with_lateral_lean(mut self, ratio: f32) -> Self {
        self.lateral_lean = ratio;
        self
    }

    /// Set the head tilt threshold.
    #[must_use]
    pub const fn with_head_tilt(mut self, ratio: f32) -> Self {
        self.head_tilt = ratio;
        self
    }

    fn values(&self) -> [(&'static str, f32); 10] {
        [
            ("forward_head", self.forward_head),
            ("uneven_shoulders", self.uneven_shoulders),
            ("slouch", self.slouch),
            ("lateral_lean", self.lateral_lean),
            ("rolled_shoulders", self.rolled_shoulders),
            ("elevated_shoulders", self.elevated_shoulders),
            ("arm_asymmetry", self.arm_asymmetry),
            ("winged_elbows", self.winged_elbows),
            ("collapsed_torso", self.collapsed_torso),
            ("head_tilt", self.head_tilt),
        ]
    }

    /// Check that every threshold is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ConfigError`] naming the first invalid threshold.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.values() {
            if !value.is_finite() || value < 0.0 {
                return Err(InferenceError::ConfigError(format!(
                    "Posture threshold '{name}' must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A posture deviation raised by one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Nose sits ahead of the shoulder midpoint.
    ForwardHeadNose,
    /// Nose unavailable; an ear sits ahead of its shoulder.
    ForwardHeadEars,
    /// One shoulder is higher than the other.
    UnevenShoulders,
    /// Shoulders have dropped below the hips.
    Slouching,
    /// Upper body shifted sideways over the hips.
    LateralLean,
    /// Elbows pushed outward past the shoulders.
    RolledShoulders,
    /// Shoulders raised towards the ears.
    ElevatedShoulders,
    /// Wrists at different heights.
    AsymmetricArms,
    /// Elbows spread far apart.
    WingedElbows,
    /// Torso appears too short.
    CollapsedTorso,
    /// Eyes at different heights.
    HeadTilt,
    /// Hips below the knees.
    Reclined,
}

impl Flag {
    /// Human-readable description of the deviation.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ForwardHeadNose => "forward head posture (nose)",
            Self::ForwardHeadEars => "forward head posture (ears)",
            Self::UnevenShoulders => "uneven shoulders",
            Self::Slouching => "slouching",
            Self::LateralLean => "leaning to one side",
            Self::RolledShoulders => "hunched back or rolled shoulders",
            Self::ElevatedShoulders => "elevated shoulders",
            Self::AsymmetricArms => "asymmetrical arm positioning",
            Self::WingedElbows => "elbows flared out (winged)",
            Self::CollapsedTorso => "collapsed upper body",
            Self::HeadTilt => "head tilted to one side",
            Self::Reclined => "reclined or slumped sitting position",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.description())
    }
}

/// Outcome of classifying one skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostureVerdict {
    good: bool,
    flags: Vec<Flag>,
}

impl PostureVerdict {
    /// Build a verdict from the flags raised, in rule order.
    #[must_use]
    pub fn from_flags(flags: Vec<Flag>) -> Self {
        Self {
            good: flags.is_empty(),
            flags,
        }
    }

    /// `true` when no rule fired.
    #[must_use]
    pub const fn is_good(&self) -> bool {
        self.good
    }

    /// Flags in rule evaluation order.
    #[must_use]
    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    /// Flag descriptions in rule evaluation order.
    #[must_use]
    pub fn descriptions(&self) -> Vec<&'static str> {
        self.flags.iter().map(|flag| flag.description()).collect()
    }

    /// Whether a given flag was raised.
    #[must_use]
    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Float point as (y, x).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Vertical component.
    pub y: f32,
    /// Horizontal component.
    pub x: f32,
}

impl Point {
    fn midpoint(a: Keypoint, b: Keypoint) -> Self {
        Self {
            y: (a.y() + b.y()) / 2.0,
            x: (a.x() + b.x()) / 2.0,
        }
    }
}

/// Measurements shared by all rules, computed once per skeleton.
#[derive(Debug, Clone, Copy)]
pub struct BodyGeometry {
    /// Left shoulder.
    pub left_shoulder: Keypoint,
    /// Right shoulder.
    pub right_shoulder: Keypoint,
    /// Left hip.
    pub left_hip: Keypoint,
    /// Right hip.
    pub right_hip: Keypoint,
    /// Left ear.
    pub left_ear: Keypoint,
    /// Right ear.
    pub right_ear: Keypoint,
    /// Left elbow.
    pub left_elbow: Keypoint,
    /// Right elbow.
    pub right_elbow: Keypoint,
    /// Left wrist.
    pub left_wrist: Keypoint,
    /// Right wrist.
    pub right_wrist: Keypoint,
    /// Nose, if resolved.
    pub nose: Option<Keypoint>,
    /// Left eye, if resolved.
    pub left_eye: Option<Keypoint>,
    /// Right eye, if resolved.
    pub right_eye: Option<Keypoint>,
    /// Left knee, if resolved.
    pub left_knee: Option<Keypoint>,
    /// Right knee, if resolved.
    pub right_knee: Option<Keypoint>,
    /// Distance between the shoulders; the unit of every threshold.
    pub shoulder_width: f32,
    /// Midpoint of the shoulders.
    pub mid_shoulder: Point,
    /// Midpoint of the hips.
    pub mid_hip: Point,
}

impl BodyGeometry {
    /// Measure a skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingKeypointError`] naming the first
    /// required joint that is absent.
    pub fn measure(skeleton: &Skeleton) -> Result<Self> {
        let left_shoulder = skeleton.require(Joint::LeftShoulder)?;
        let right_shoulder = skeleton.require(Joint::RightShoulder)?;
        let left_hip = skeleton.require(Joint::LeftHip)?;
        let right_hip = skeleton.require(Joint::RightHip)?;

        Ok(Self {
            left_shoulder,
            right_shoulder,
            left_hip,
            right_hip,
            left_ear: skeleton.require(Joint::LeftEar)?,
            right_ear: skeleton.require(Joint::RightEar)?,
            left_elbow: skeleton.require(Joint::LeftElbow)?,
            right_elbow: skeleton.require(Joint::RightElbow)?,
            left_wrist: skeleton.require(Joint::LeftWrist)?,
            right_wrist: skeleton.require(Joint::RightWrist)?,
            nose: skeleton.get(Joint::Nose),
            left_eye: skeleton.get(Joint::LeftEye),
            right_eye: skeleton.get(Joint::RightEye),
            left_knee: skeleton.get(Joint::LeftKnee),
            right_knee: skeleton.get(Joint::RightKnee),
            shoulder_width: left_shoulder.distance(right_shoulder),
            mid_shoulder: Point::midpoint(left_shoulder, right_shoulder),
            mid_hip: Point::midpoint(left_hip, right_hip),
        })
    }

    /// Threshold in pixels for a shoulder-width ratio.
    #[must_use]
    pub fn scaled(&self, ratio: f32) -> f32 {
        ratio * self.shoulder_width
    }

    /// Signed vertical distance from the hip line to the shoulder line.
    #[must_use]
    pub fn torso_drop(&self) -> f32 {
        self.mid_shoulder.y - self.mid_hip.y
    }
}

/// Signature of a posture rule.
pub type RuleFn = fn(&BodyGeometry, &PostureThresholds) -> Option<Flag>;

/// A named entry of the rule table.
#[derive(Clone, Copy)]
pub struct PostureRule {
    /// Short identifier of the rule.
    pub name: &'static str,
    /// Rule body.
    pub check: RuleFn,
}

impl fmt::Debug for PostureRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostureRule").field("name", &self.name).finish()
    }
}

/// The standard rule table, in evaluation order.
pub const DEFAULT_RULES: [PostureRule; 11] = [
    PostureRule { name: "forward_head", check: forward_head },
    PostureRule { name: "uneven_shoulders", check: uneven_shoulders },
    PostureRule { name: "slouching", check: slouching },
    PostureRule { name: "lateral_lean", check: lateral_lean },
    PostureRule { name: "rolled_shoulders", check: rolled_shoulders },
    PostureRule { name: "elevated_shoulders", check: elevated_shoulders },
    PostureRule { name: "asymmetric_arms", check: asymmetric_arms },
    PostureRule { name: "winged_elbows", check: winged_elbows },
    PostureRule { name: "collapsed_torso", check: collapsed_torso },
    PostureRule { name: "head_tilt", check: head_tilt },
    PostureRule { name: "reclined", check: reclined },
];

fn forward_head(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let limit = g.scaled(t.forward_head);
    match g.nose {
        Some(nose) => (nose.x() - g.mid_shoulder.x > limit).then_some(Flag::ForwardHeadNose),
        None => {
            let left = g.left_ear.x() - g.left_shoulder.x();
            let right = g.right_ear.x() - g.right_shoulder.x();
            (left > limit || right > limit).then_some(Flag::ForwardHeadEars)
        }
    }
}

fn uneven_shoulders(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let diff = (g.left_shoulder.y() - g.right_shoulder.y()).abs();
    (diff > g.scaled(t.uneven_shoulders)).then_some(Flag::UnevenShoulders)
}

fn slouching(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    (g.torso_drop() > g.scaled(t.slouch)).then_some(Flag::Slouching)
}

fn lateral_lean(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let shift = (g.mid_shoulder.x - g.mid_hip.x).abs();
    (shift > g.scaled(t.lateral_lean)).then_some(Flag::LateralLean)
}

fn rolled_shoulders(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let limit = g.scaled(t.rolled_shoulders);
    let left_out = g.left_elbow.x() < g.left_shoulder.x() - limit;
    let right_out = g.right_elbow.x() > g.right_shoulder.x() + limit;
    (left_out || right_out).then_some(Flag::RolledShoulders)
}

fn elevated_shoulders(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let limit = g.scaled(t.elevated_shoulders);
    let left = (g.left_shoulder.y() - g.left_ear.y()).abs();
    let right = (g.right_shoulder.y() - g.right_ear.y()).abs();
    (left < limit || right < limit).then_some(Flag::ElevatedShoulders)
}

fn asymmetric_arms(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let diff = (g.left_wrist.y() - g.right_wrist.y()).abs();
    (diff > g.scaled(t.arm_asymmetry)).then_some(Flag::AsymmetricArms)
}

fn winged_elbows(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let span = g.left_elbow.distance(g.right_elbow);
    (span > g.scaled(t.winged_elbows)).then_some(Flag::WingedElbows)
}

// Evaluated independently of `slouching`; both read the same torso drop.
fn collapsed_torso(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    (g.torso_drop().abs() < g.scaled(t.collapsed_torso)).then_some(Flag::CollapsedTorso)
}

fn head_tilt(g: &BodyGeometry, t: &PostureThresholds) -> Option<Flag> {
    let (left, right) = (g.left_eye?, g.right_eye?);
    ((left.y() - right.y()).abs() > g.scaled(t.head_tilt)).then_some(Flag::HeadTilt)
}

fn reclined(g: &BodyGeometry, _t: &PostureThresholds) -> Option<Flag> {
    let (left, right) = (g.left_knee?, g.right_knee?);
    let knee_y = (left.y() + right.y()) / 2.0;
    (g.mid_hip.y > knee_y).then_some(Flag::Reclined)
}

/// Evaluates the rule table over skeletons.
///
/// The classifier holds no per-call state: classifying the same skeleton
/// twice yields the same verdict.
///
/// # Example
///
/// ```
/// use posture_inference::{Joint, Keypoint, PostureClassifier, Skeleton};
///
/// let keypoints: Vec<Keypoint> = vec![Keypoint::new(0, 0); Joint::COUNT];
/// let skeleton = Skeleton::from_keypoints(&keypoints)?;
/// let verdict = PostureClassifier::default().classify(&skeleton)?;
/// assert!(verdict.is_good());
/// # Ok::<(), posture_inference::InferenceError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PostureClassifier {
    thresholds: PostureThresholds,
    rules: Vec<PostureRule>,
}

impl Default for PostureClassifier {
    fn default() -> Self {
        Self::new(PostureThresholds::default())
    }
}

impl PostureClassifier {
    /// Create a classifier with the standard rule table.
    #[must_use]
    pub fn new(thresholds: PostureThresholds) -> Self {
        Self::with_rules(thresholds, DEFAULT_RULES.to_vec())
    }

    /// Create a classifier with a custom rule table.
    #[must_use]
    pub const fn with_rules(thresholds: PostureThresholds, rules: Vec<PostureRule>) -> Self {
        Self { thresholds, rules }
    }

    /// Active thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> &PostureThresholds {
        &self.thresholds
    }

    /// Active rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[PostureRule] {
        &self.rules
    }

    /// Classify a skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingKeypointError`] if a required joint is absent.
    pub fn classify(&self, skeleton: &Skeleton) -> Result<PostureVerdict> {
        let geometry = BodyGeometry::measure(skeleton).inspect_err(|e| {
            tracing::warn!("Cannot classify skeleton: {e}");
        })?;
        Ok(self.evaluate(&geometry))
    }

    /// Classify a positional keypoint list in channel order.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingKeypointError`] unless exactly
    /// [`Joint::COUNT`] keypoints are supplied.
    pub fn classify_keypoints(&self, keypoints: &[Keypoint]) -> Result<PostureVerdict> {
        let skeleton = Skeleton::from_keypoints(keypoints).inspect_err(|e| {
            tracing::warn!("Decoder contract violated: {e}");
        })?;
        self.classify(&skeleton)
    }

    /// Run every rule over a prepared measurement.
    #[must_use]
    pub fn evaluate(&self, geometry: &BodyGeometry) -> PostureVerdict {
        let flags: Vec<Flag> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let flag = (rule.check)(geometry, &self.thresholds);
                if let Some(flag) = flag {
                    tracing::trace!(rule = rule.name, %flag, "posture rule fired");
                }
                flag
            })
            .collect();
        tracing::debug!(
            flags = flags.len(),
            shoulder_width = geometry.shoulder_width,
            "posture classified"
        );
        PostureVerdict::from_flags(flags)
    }
}
