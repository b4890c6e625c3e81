// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Integration tests for the posture inference library.
//!
//! The pose model is replaced by stubs returning constructed heatmaps, so no
//! model file is needed.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::{Array3, Array4};
use posture_inference::{
    Flag, Heatmap, HeatmapDecoder, InferenceConfig, InferenceError, InferencePipeline, Joint,
    Keypoint, KeypointSpace, PoseModel, PostureClassifier, Result, Skeleton, StaticPoseModel,
};

/// Upright seated pose as heatmap cells (row, col), in joint order.
const UPRIGHT: [(usize, usize); 17] = [
    (10, 24), // nose
    (9, 25),  // left eye
    (9, 23),  // right eye
    (10, 27), // left ear
    (10, 21), // right ear
    (16, 30), // left shoulder
    (16, 18), // right shoulder
    (24, 32), // left elbow
    (24, 16), // right elbow
    (31, 31), // left wrist
    (31, 17), // right wrist
    (32, 28), // left hip
    (32, 20), // right hip
    (40, 28), // left knee
    (40, 20), // right knee
    (50, 28), // left ankle
    (50, 20), // right ankle
];

fn heatmap_from_cells(cells: &[(usize, usize); 17]) -> Array3<f32> {
    let mut data = Array3::<f32>::zeros((17, 64, 48));
    for (k, &(row, col)) in cells.iter().enumerate() {
        data[[k, row, col]] = 1.0;
    }
    data
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Stub model that counts invocations and checks the tensor it receives.
struct CountingModel {
    heatmap: Array3<f32>,
    calls: AtomicUsize,
}

impl PoseModel for CountingModel {
    fn input_size(&self) -> (usize, usize) {
        (256, 192)
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Heatmap> {
        assert_eq!(input.shape(), &[1, 3, 256, 192]);
        assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Heatmap::new(self.heatmap.clone()))
    }
}

/// Stub model whose invocation always fails.
struct FailingModel;

impl PoseModel for FailingModel {
    fn input_size(&self) -> (usize, usize) {
        (256, 192)
    }

    fn infer(&self, _input: &Array4<f32>) -> Result<Heatmap> {
        Err(InferenceError::InferenceError("accelerator unavailable".to_string()))
    }
}

#[test]
fn test_heatmap_round_trip_good_posture() {
    let heatmap = Heatmap::new(heatmap_from_cells(&UPRIGHT));
    let decoder = HeatmapDecoder::new((64, 48), (256, 192)).unwrap();

    let keypoints = decoder.decode(&heatmap);
    assert_eq!(keypoints.len(), 17);
    for (kp, &(row, col)) in keypoints.iter().zip(UPRIGHT.iter()) {
        assert_eq!(*kp, Keypoint::new(row as i32 * 4, col as i32 * 4));
    }

    let skeleton = Skeleton::from_keypoints(&keypoints).unwrap();
    assert_eq!(skeleton.get(Joint::LeftShoulder), Some(Keypoint::new(64, 120)));
    assert_eq!(skeleton.get(Joint::RightShoulder), Some(Keypoint::new(64, 72)));

    let verdict = PostureClassifier::default().classify(&skeleton).unwrap();
    assert!(verdict.is_good());
    assert!(verdict.flags().is_empty());
}

#[test]
fn test_pipeline_end_to_end_source_space() {
    let model = CountingModel {
        heatmap: heatmap_from_cells(&UPRIGHT),
        calls: AtomicUsize::new(0),
    };
    let pipeline = InferencePipeline::new(model, InferenceConfig::default()).unwrap();

    let analysis = pipeline.analyze_bytes(&png_bytes(640, 480)).unwrap();
    assert_eq!(pipeline.model().calls.load(Ordering::SeqCst), 1);
    assert!(analysis.verdict.is_good());
    assert_eq!(analysis.orig_shape, (480, 640));

    // 480 / 64 = 7.5 rows per cell, 640 / 48 = 13.33 columns per cell.
    assert_eq!(analysis.skeleton.get(Joint::Nose), Some(Keypoint::new(75, 320)));
    assert_eq!(analysis.skeleton.get(Joint::LeftShoulder), Some(Keypoint::new(120, 400)));
    assert_eq!(analysis.skeleton.get(Joint::RightElbow), Some(Keypoint::new(180, 213)));
}

#[test]
fn test_pipeline_model_input_space() {
    let model = StaticPoseModel::new(heatmap_from_cells(&UPRIGHT), (256, 192));
    let config = InferenceConfig::new().with_keypoint_space(KeypointSpace::ModelInput);
    let pipeline = InferencePipeline::new(model, config).unwrap();

    let analysis = pipeline.analyze_bytes(&png_bytes(640, 480)).unwrap();
    assert_eq!(analysis.skeleton.get(Joint::Nose), Some(Keypoint::new(40, 96)));
    // Mapping back to the source frame scales by 480/256 and 640/192.
    assert_eq!(analysis.source_skeleton().get(Joint::Nose), Some(Keypoint::new(75, 320)));
}

#[test]
fn test_verdict_independent_of_keypoint_space() {
    // A 640x64 strip squashes the torso in source pixels but not at the 256x192 model input.
    let bytes = png_bytes(640, 64);
    let analyze = |space| {
        let model = StaticPoseModel::new(heatmap_from_cells(&UPRIGHT), (256, 192));
        let config = InferenceConfig::new().with_keypoint_space(space);
        InferencePipeline::new(model, config).unwrap().analyze_bytes(&bytes).unwrap()
    };

    let source = analyze(KeypointSpace::Source);
    let input = analyze(KeypointSpace::ModelInput);
    assert_eq!(source.verdict.flags(), &[Flag::ElevatedShoulders, Flag::CollapsedTorso]);
    assert_eq!(input.verdict, source.verdict);

    assert_eq!(source.skeleton.get(Joint::Nose), Some(Keypoint::new(10, 320)));
    assert_eq!(input.skeleton.get(Joint::Nose), Some(Keypoint::new(40, 96)));
    assert_eq!(input.source_skeleton().get(Joint::Nose), Some(Keypoint::new(10, 320)));
}

#[test]
fn test_forward_head_detected_from_heatmaps() {
    let mut cells = UPRIGHT;
    cells[Joint::Nose.index()] = (10, 30);
    let model = StaticPoseModel::new(heatmap_from_cells(&cells), (256, 192));
    let pipeline = InferencePipeline::new(model, InferenceConfig::new().with_flags(true)).unwrap();

    let report = pipeline.process(&png_bytes(192, 256)).unwrap();
    assert!(!report.good);
    assert_eq!(report.flags, Some(vec![Flag::ForwardHeadNose]));
}

#[test]
fn test_report_json_shape() {
    let model = StaticPoseModel::new(heatmap_from_cells(&UPRIGHT), (256, 192));
    let pipeline = InferencePipeline::new(model, InferenceConfig::default()).unwrap();

    let report = pipeline.process(&png_bytes(192, 256)).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(object["good"], serde_json::json!(true));

    let keypoints = object["keypoints"].as_array().unwrap();
    assert_eq!(keypoints.len(), 17);
    assert_eq!(keypoints[Joint::LeftHip.index()], serde_json::json!([128, 112]));
}

#[test]
fn test_report_with_flags_only() {
    let model = StaticPoseModel::new(heatmap_from_cells(&UPRIGHT), (256, 192));
    let config = InferenceConfig::new().with_keypoints(false).with_flags(true);
    let pipeline = InferencePipeline::new(model, config).unwrap();

    let json = serde_json::to_string(&pipeline.process(&png_bytes(192, 256)).unwrap()).unwrap();
    assert_eq!(json, r#"{"good":true,"flags":[]}"#);
}

#[test]
fn test_base64_with_data_url_prefix() {
    let model = StaticPoseModel::new(heatmap_from_cells(&UPRIGHT), (256, 192));
    let pipeline = InferencePipeline::new(model, InferenceConfig::default()).unwrap();

    let plain = STANDARD.encode(png_bytes(192, 256));
    let prefixed = format!("data:image/png;base64,{plain}");
    assert_eq!(
        pipeline.process_base64(&plain).unwrap(),
        pipeline.process_base64(&prefixed).unwrap()
    );
}

#[test]
fn test_invalid_inputs_are_client_errors() {
    let model = StaticPoseModel::new(heatmap_from_cells(&UPRIGHT), (256, 192));
    let pipeline = InferencePipeline::new(model, InferenceConfig::default()).unwrap();

    for err in [
        pipeline.process(b"").unwrap_err(),
        pipeline.process(b"GIF89a-but-not-really").unwrap_err(),
        pipeline.process_base64("!!not base64!!").unwrap_err(),
    ] {
        assert!(matches!(err, InferenceError::InvalidImageError(_)), "{err}");
        assert!(err.is_client_error());
    }
}

#[test]
fn test_model_failure_is_server_error() {
    let pipeline = InferencePipeline::new(FailingModel, InferenceConfig::default()).unwrap();
    let err = pipeline.process(&png_bytes(64, 64)).unwrap_err();
    assert!(matches!(err, InferenceError::InferenceError(_)));
    assert!(!err.is_client_error());
}

#[test]
fn test_pipeline_shared_across_threads() {
    let model = CountingModel {
        heatmap: heatmap_from_cells(&UPRIGHT),
        calls: AtomicUsize::new(0),
    };
    let pipeline = InferencePipeline::new(model, InferenceConfig::default()).unwrap();
    let bytes = png_bytes(192, 256);
    let expected = pipeline.process(&bytes).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| pipeline.process(&bytes).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
    assert_eq!(pipeline.model().calls.load(Ordering::SeqCst), 5);
}

#[test]
fn test_boxed_model() {
    let model: Box<dyn PoseModel> =
        Box::new(StaticPoseModel::new(heatmap_from_cells(&UPRIGHT), (256, 192)));
    let pipeline = InferencePipeline::new(model, InferenceConfig::default()).unwrap();
    assert_eq!(pipeline.input_size(), (256, 192));
    assert!(pipeline.process(&png_bytes(192, 256)).unwrap().good);
}
