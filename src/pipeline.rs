// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end posture inference.
//!
//! [`InferencePipeline`] chains image decoding, resizing, the pose model,
//! heatmap decoding and posture classification. It holds no per-request state,
//! so one pipeline can serve concurrent callers.

use std::path::Path;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, GenericImageView};

use crate::error::{InferenceError, Result};
use crate::heatmap::{Heatmap, HeatmapDecoder};
use crate::inference::{InferenceConfig, KeypointSpace};
use crate::keypoint::Skeleton;
use crate::model::{OnnxPoseModel, PoseModel};
use crate::posture::PostureClassifier;
use crate::preprocessing::{decode_image, preprocess_image};
use crate::results::{PoseAnalysis, PostureReport, Speed};

/// Posture inference pipeline around an injected pose model.
///
/// # Example
///
/// ```no_run
/// use posture_inference::{InferenceConfig, InferencePipeline};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = InferencePipeline::load("hrnet_pose.onnx", InferenceConfig::default())?;
/// let report = pipeline.process(&std::fs::read("person.jpg")?)?;
/// println!("good posture: {}", report.good);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InferencePipeline<M: PoseModel> {
    model: M,
    config: InferenceConfig,
    classifier: PostureClassifier,
}

impl InferencePipeline<OnnxPoseModel> {
    /// Load an ONNX pose model and wrap it in a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ModelLoadError`] if the model cannot be loaded,
    /// or [`InferenceError::ConfigError`] if the configuration is invalid.
    pub fn load<P: AsRef<Path>>(path: P, config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let model = OnnxPoseModel::load(path, config.num_threads)?;
        Self::new(model, config)
    }
}

impl<M: PoseModel> InferencePipeline<M> {
    /// Create a pipeline from a model and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ConfigError`] if the configuration is invalid.
    pub fn new(model: M, config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let classifier = PostureClassifier::new(config.thresholds);
        Ok(Self {
            model,
            config,
            classifier,
        })
    }

    /// Replace the posture classifier, e.g. with a custom rule table.
    #[must_use]
    pub fn with_classifier(mut self, classifier: PostureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// The wrapped pose model.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// The active configuration.
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// The posture classifier.
    pub const fn classifier(&self) -> &PostureClassifier {
        &self.classifier
    }

    /// Model input size (height, width): the configured override, else the model's own.
    pub fn input_size(&self) -> (usize, usize) {
        self.config.imgsz.unwrap_or_else(|| self.model.input_size())
    }

    /// Analyse an encoded image (PNG, JPEG, BMP, `WebP`).
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidImageError`] if the bytes cannot be
    /// decoded, or any error raised by [`Self::analyze`].
    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<PoseAnalysis> {
        let image = decode_image(bytes)?;
        self.analyze(&image)
    }

    /// Analyse a decoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidImageError`] if the frame cannot be
    /// resized, [`InferenceError::InferenceError`] if the model fails and
    /// [`InferenceError::MissingKeypointError`] if the model emits a heatmap
    /// stack with the wrong number of joints.
    pub fn analyze(&self, image: &DynamicImage) -> Result<PoseAnalysis> {
        let (width, height) = image.dimensions();
        let orig_shape = (height as usize, width as usize);
        let input_size = self.input_size();

        let t0 = Instant::now();
        let tensor = preprocess_image(image, input_size)?;
        let preprocess = t0.elapsed().as_secs_f64() * 1000.0;

        let t1 = Instant::now();
        let heatmap = self.model.infer(&tensor)?;
        let inference = t1.elapsed().as_secs_f64() * 1000.0;

        let t2 = Instant::now();
        let mut analysis = self.analyze_heatmap(&heatmap, orig_shape)?;
        let postprocess = t2.elapsed().as_secs_f64() * 1000.0;

        analysis.speed = Speed::new(preprocess, inference, postprocess);
        tracing::debug!(
            height = orig_shape.0,
            width = orig_shape.1,
            good = analysis.verdict.is_good(),
            flags = analysis.verdict.flags().len(),
            preprocess_ms = preprocess,
            inference_ms = inference,
            postprocess_ms = postprocess,
            "frame analysed"
        );
        Ok(analysis)
    }

    /// Decode and classify a heatmap stack produced for a frame of
    /// `orig_shape` (height, width).
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingKeypointError`] if the stack does not
    /// hold one channel per joint, or [`InferenceError::InferenceError`] if its
    /// spatial size differs from the configured heatmap size.
    pub fn analyze_heatmap(&self, heatmap: &Heatmap, orig_shape: (usize, usize)) -> Result<PoseAnalysis> {
        if heatmap.size() != self.config.heatmap_size {
            return Err(InferenceError::InferenceError(format!(
                "Expected heatmaps of {:?}, got {:?}",
                self.config.heatmap_size,
                heatmap.size()
            )));
        }

        // Rules always see source pixels; the keypoint space only affects what is reported.
        let source = decode_skeleton(heatmap, self.config.heatmap_size, orig_shape)?;
        let verdict = self.classifier.classify(&source)?;

        let input_shape = self.input_size();
        let skeleton = match self.config.keypoint_space {
            KeypointSpace::Source => source,
            KeypointSpace::ModelInput => decode_skeleton(heatmap, self.config.heatmap_size, input_shape)?,
        };

        Ok(PoseAnalysis {
            skeleton,
            verdict,
            keypoint_space: self.config.keypoint_space,
            orig_shape,
            input_shape,
            speed: Speed::default(),
        })
    }

    /// Produce a report for a decoded frame.
    ///
    /// # Errors
    ///
    /// See [`Self::analyze`].
    pub fn process_image(&self, image: &DynamicImage) -> Result<PostureReport> {
        let analysis = self.analyze(image)?;
        Ok(self.report(&analysis))
    }

    /// Produce a report for an encoded image.
    ///
    /// # Errors
    ///
    /// See [`Self::analyze_bytes`].
    pub fn process(&self, bytes: &[u8]) -> Result<PostureReport> {
        let analysis = self.analyze_bytes(bytes)?;
        Ok(self.report(&analysis))
    }

    /// Produce a report for a base64-encoded image.
    ///
    /// A data-URL prefix such as `data:image/png;base64,` is stripped first.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidImageError`] if the payload is not valid
    /// base64 or not a decodable image.
    pub fn process_base64(&self, encoded: &str) -> Result<PostureReport> {
        let bytes = decode_base64(encoded)?;
        self.process(&bytes)
    }

    /// Build a report honouring the configured include switches.
    pub fn report(&self, analysis: &PoseAnalysis) -> PostureReport {
        analysis.report(self.config.include_keypoints, self.config.include_flags)
    }
}

/// Decode a heatmap stack into a skeleton scaled onto `target` (height, width).
fn decode_skeleton(heatmap: &Heatmap, heatmap_size: (usize, usize), target: (usize, usize)) -> Result<Skeleton> {
    let decoder = HeatmapDecoder::new(heatmap_size, target)?;
    Skeleton::from_keypoints(&decoder.decode(heatmap))
}

/// Decode a base64 image payload, dropping anything up to the first comma.
///
/// # Errors
///
/// Returns [`InferenceError::InvalidImageError`] on invalid base64.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    let payload = encoded.split_once(',').map_or(encoded, |(_, data)| data).trim();
    STANDARD
        .decode(payload)
        .map_err(|e| InferenceError::InvalidImageError(format!("Invalid base64 payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::Keypoint;
    use crate::model::StaticPoseModel;
    use crate::posture::Flag;
    use image::{ImageFormat, RgbImage};
    use ndarray::{Array3, s};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    /// Heatmap whose every channel peaks at the same cell.
    fn peak_heatmap(row: usize, col: usize) -> Array3<f32> {
        let mut data = Array3::<f32>::zeros((17, 64, 48));
        data.slice_mut(s![.., row, col]).fill(1.0);
        data
    }

    fn pipeline(config: InferenceConfig) -> InferencePipeline<StaticPoseModel> {
        let model = StaticPoseModel::new(peak_heatmap(10, 24), (256, 192));
        InferencePipeline::new(model, config).unwrap()
    }

    #[test]
    fn test_model_input_space_coordinates() {
        let p = pipeline(InferenceConfig::new().with_keypoint_space(KeypointSpace::ModelInput));
        let analysis = p.analyze_bytes(&png_bytes(640, 480)).unwrap();
        // Scale 4 on both axes.
        assert!(analysis.skeleton.iter().all(|(_, kp)| kp == Some(Keypoint::new(40, 96))));
        assert_eq!(analysis.orig_shape, (480, 640));
        assert_eq!(analysis.input_shape, (256, 192));
    }

    #[test]
    fn test_source_space_coordinates() {
        let p = pipeline(InferenceConfig::default());
        let analysis = p.analyze_bytes(&png_bytes(640, 480)).unwrap();
        // 480 / 64 = 7.5, 640 / 48 = 13.333...
        assert!(analysis.skeleton.iter().all(|(_, kp)| kp == Some(Keypoint::new(75, 320))));
    }

    #[test]
    fn test_report_includes_flags_on_request() {
        // A single-point skeleton has zero shoulder width and fires no rule.
        let p = pipeline(InferenceConfig::default().with_flags(true));
        let report = p.process(&png_bytes(192, 256)).unwrap();
        assert!(report.good, "unexpected flags: {:?}", report.flags);
        assert_eq!(report.flags, Some(Vec::new()));
        assert_eq!(report.keypoints.as_ref().map(Vec::len), Some(17));
    }

    #[test]
    fn test_flat_heatmap_collapses_to_origin() {
        // Every joint decodes to (0, 0): zero shoulder width, and no strict comparison fires.
        let model = StaticPoseModel::new(Array3::zeros((17, 64, 48)), (256, 192));
        let p = InferencePipeline::new(model, InferenceConfig::new().with_flags(true)).unwrap();
        let analysis = p.analyze_bytes(&png_bytes(64, 64)).unwrap();
        assert!(analysis.skeleton.iter().all(|(_, kp)| kp == Some(Keypoint::new(0, 0))));
        assert!(analysis.verdict.is_good());
        assert!(!analysis.verdict.has(Flag::CollapsedTorso));
    }

    #[test]
    fn test_wrong_joint_count() {
        let model = StaticPoseModel::new(Array3::zeros((16, 64, 48)), (256, 192));
        let p = InferencePipeline::new(model, InferenceConfig::default()).unwrap();
        assert!(matches!(
            p.process(&png_bytes(64, 64)),
            Err(InferenceError::MissingKeypointError {
                expected: 17,
                found: 16,
                joint: None
            })
        ));
    }

    #[test]
    fn test_wrong_heatmap_size() {
        let model = StaticPoseModel::new(Array3::zeros((17, 32, 24)), (256, 192));
        let p = InferencePipeline::new(model, InferenceConfig::default()).unwrap();
        assert!(matches!(p.process(&png_bytes(64, 64)), Err(InferenceError::InferenceError(_))));
    }

    #[test]
    fn test_invalid_image() {
        let p = pipeline(InferenceConfig::default());
        let err = p.process(b"not an image").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_imgsz_override() {
        let model = StaticPoseModel::new(peak_heatmap(10, 24), (384, 288));
        let p = InferencePipeline::new(model, InferenceConfig::new().with_imgsz(384, 288)).unwrap();
        assert_eq!(p.input_size(), (384, 288));
        assert!(p.process(&png_bytes(100, 100)).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let model = StaticPoseModel::new(peak_heatmap(10, 24), (256, 192));
        assert!(matches!(
            InferencePipeline::new(model, InferenceConfig::new().with_heatmap_size(0, 48)),
            Err(InferenceError::ConfigError(_))
        ));
    }

    #[test]
    fn test_decode_base64_strips_prefix() {
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64("data:image/png;base64,aGVsbG8=").unwrap(), b"hello");
        assert!(matches!(decode_base64("@@@"), Err(InferenceError::InvalidImageError(_))));
    }

    #[test]
    fn test_process_base64() {
        let p = pipeline(InferenceConfig::default());
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(192, 256)));
        assert!(p.process_base64(&encoded).unwrap().good);
    }
}
