// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose model loading and invocation.
//!
//! The pipeline only sees the [`PoseModel`] trait, so tests can substitute a
//! stub that returns constructed heatmaps. [`OnnxPoseModel`] is the production
//! implementation backed by ONNX Runtime.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array3, Array4};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use crate::error::{InferenceError, Result};
use crate::heatmap::Heatmap;

/// Default model input size (height, width) for HRNet pose models.
pub const DEFAULT_INPUT_SIZE: (usize, usize) = (256, 192);

/// A pose model that turns an image tensor into per-joint heatmaps.
///
/// Implementations must be safe to call from several threads at once.
pub trait PoseModel: Send + Sync {
    /// Expected input size as (height, width).
    fn input_size(&self) -> (usize, usize);

    /// Run the model on a (1, 3, H, W) tensor normalized to [0, 1].
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InferenceError`] if the invocation fails or the
    /// output is not a single-frame heatmap stack.
    fn infer(&self, input: &Array4<f32>) -> Result<Heatmap>;
}

impl<M: PoseModel + ?Sized> PoseModel for Box<M> {
    fn input_size(&self) -> (usize, usize) {
        (**self).input_size()
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Heatmap> {
        (**self).infer(input)
    }
}

/// HRNet-style pose model running on ONNX Runtime.
///
/// `Session::run` needs exclusive access, so invocations are serialized
/// behind a mutex; everything else is read-only after loading.
pub struct OnnxPoseModel {
    /// ONNX Runtime session.
    session: Mutex<Session>,
    /// Input tensor name.
    input_name: String,
    /// Output tensor name.
    output_name: String,
    /// Input size (height, width).
    input_size: (usize, usize),
}

impl OnnxPoseModel {
    /// Load a pose model from an ONNX file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ONNX model file.
    /// * `num_threads` - Intra-op threads; `0` lets ONNX Runtime decide.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ModelLoadError`] if the file doesn't exist or
    /// the session can't be created.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(InferenceError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(num_threads)
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to set intra-thread count: {e}")))?
            .commit_from_file(path)
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to load model: {e}")))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| InferenceError::ModelLoadError("Model has no inputs".to_string()))?;
        let input_name = input.name.clone();
        let input_size = input
            .input_type
            .tensor_shape()
            .and_then(|shape| static_hw(shape))
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::ModelLoadError("Model has no outputs".to_string()))?;

        tracing::info!(
            model = %path.display(),
            input = %input_name,
            height = input_size.0,
            width = input_size.1,
            "pose model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_size,
        })
    }
}

/// Read a static (H, W) from an NCHW shape; dynamic dimensions are negative.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn static_hw(shape: &[i64]) -> Option<(usize, usize)> {
    match shape {
        [_, _, h, w] if *h > 0 && *w > 0 => Some((*h as usize, *w as usize)),
        _ => None,
    }
}

impl PoseModel for OnnxPoseModel {
    fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Heatmap> {
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous)
            .map_err(|e| InferenceError::InferenceError(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::InferenceError("Model session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| InferenceError::InferenceError(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::InferenceError(format!("Output '{}' not found", self.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::InferenceError(format!("Failed to extract output: {e}")))?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Heatmap::from_raw(data.to_vec(), &shape)
    }
}

impl std::fmt::Debug for OnnxPoseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPoseModel")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_size", &self.input_size)
            .finish()
    }
}

/// Model returning a fixed heatmap, for tests and dry runs.
#[derive(Debug, Clone)]
pub struct StaticPoseModel {
    heatmap: Array3<f32>,
    input_size: (usize, usize),
}

impl StaticPoseModel {
    /// Create a model that always returns `heatmap` and reports `input_size`.
    #[must_use]
    pub const fn new(heatmap: Array3<f32>, input_size: (usize, usize)) -> Self {
        Self { heatmap, input_size }
    }
}

impl PoseModel for StaticPoseModel {
    fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Heatmap> {
        let expected = [1, 3, self.input_size.0, self.input_size.1];
        if input.shape() != expected {
            return Err(InferenceError::InferenceError(format!(
                "Expected input shape {expected:?}, got {:?}",
                input.shape()
            )));
        }
        Ok(Heatmap::new(self.heatmap.clone()))
    }
}
