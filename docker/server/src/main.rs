// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use posture_inference::pipeline::decode_base64;
use posture_inference::{InferenceConfig, InferenceError, InferencePipeline, OnnxPoseModel, PoseModel, PostureReport};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

const DEFAULT_MODEL_PATH: &str = "hrnet_pose.onnx";
const DEFAULT_PORT: &str = "8000";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// Shared application state
struct AppState {
    pipeline: InferencePipeline<Box<dyn PoseModel>>,
    model_path: String,
}

// Query parameters for the report shape
#[derive(Debug, Default, Deserialize, IntoParams)]
struct PredictParams {
    /// Include the triggered posture flags. Default: false
    #[param(example = true)]
    flags: Option<bool>,
    /// Include the 17 decoded keypoints. Default: true
    #[param(example = true)]
    keypoints: Option<bool>,
}

// JSON request body
#[derive(Debug, Deserialize, ToSchema)]
struct ImageData {
    /// Base64 image, optionally prefixed with `data:image/...;base64,`
    image_base64: String,
}

// Posture result
#[derive(Debug, Serialize, Deserialize, ToSchema)]
struct PredictResponse {
    /// True when no posture rule fired
    good: bool,
    /// Triggered posture flags, in rule order
    #[serde(skip_serializing_if = "Option::is_none")]
    flags: Option<Vec<String>>,
    /// 17 COCO keypoints as [row, col] in source image pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    keypoints: Option<Vec<Option<Vec<i32>>>>,
}

impl From<PostureReport> for PredictResponse {
    fn from(report: PostureReport) -> Self {
        Self {
            good: report.good,
            flags: report
                .flags
                .map(|flags| flags.iter().map(ToString::to_string).collect()),
            keypoints: report.keypoints.map(|kps| {
                kps.into_iter()
                    .map(|kp| kp.map(|kp| vec![kp.row, kp.col]))
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
struct ErrorResponse {
    /// Error message
    error: String,
}

#[derive(Serialize, ToSchema)]
struct InfoResponse {
    /// Path to the loaded model
    model_path: String,
    /// Model input size [height, width]
    imgsz: Vec<usize>,
    /// Heatmap size [height, width]
    heatmap_size: Vec<usize>,
    /// Number of keypoints per skeleton
    num_keypoints: usize,
    /// Pixel space of reported keypoints
    keypoint_space: String,
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// Server status
    status: String,
    /// API version
    version: String,
}

/// Error returned by a handler, rendered as `{"error": ...}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(e: InferenceError) -> Self {
        if e.is_client_error() {
            Self::bad_request(e.to_string())
        } else {
            Self::internal(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", self.message);
        } else {
            tracing::warn!(status = %self.status, "{}", self.message);
        }
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

// OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Posture Inference Server",
        description = "Sitting-posture classification from a single image.\n\n## Query Parameters\n- `flags`: include triggered posture flags (default: false)\n- `keypoints`: include the 17 decoded keypoints (default: true)",
        version = "0.1.0",
        license(name = "AGPL-3.0", url = "https://ultralytics.com/license")
    ),
    paths(root, health, info, predict),
    components(schemas(ImageData, PredictResponse, ErrorResponse, InfoResponse, HealthResponse)),
    tags(
        (name = "inference", description = "Posture inference endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
struct ApiDoc;

fn cors_layer(origin: &str) -> CorsLayer {
    let origin = origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::warn!("Invalid ALLOWED_ORIGIN '{origin}', using {DEFAULT_ALLOWED_ORIGIN}");
        HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN)
    });
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}

fn app(state: Arc<AppState>, allowed_origin: &str) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/predict", post(predict))
        .route("/predict/", post(predict))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(allowed_origin))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let model_path = env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string());
    let port = env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let allowed_origin =
        env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGIN.to_string());

    tracing::info!("Loading model: {model_path}");
    let config = InferenceConfig::default();
    let model = match OnnxPoseModel::load(&model_path, config.num_threads) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!("Failed to load model {model_path}: {e}");
            std::process::exit(1);
        }
    };
    let pipeline = match InferencePipeline::new(Box::new(model) as Box<dyn PoseModel>, config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        pipeline,
        model_path,
    });
    let app = app(state, &allowed_origin);

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Server listening on {addr}, CORS origin {allowed_origin}");
    tracing::info!("Swagger UI available at http://localhost:{port}/swagger-ui/");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
    }
}

/// Root endpoint
///
/// Returns a welcome message and API information.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Welcome message", body = String)
    )
)]
async fn root() -> &'static str {
    "Posture Inference Server - POST /predict with {\"image_base64\": ...} or a multipart 'image' field. Swagger UI at /swagger-ui/"
}

/// Health check endpoint
///
/// Returns server health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: posture_inference::VERSION.to_string(),
    })
}

/// Model information endpoint
///
/// Returns the loaded model path, input size and heatmap size.
#[utoipa::path(
    get,
    path = "/info",
    tag = "inference",
    responses(
        (status = 200, description = "Model information", body = InfoResponse)
    )
)]
async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let config = state.pipeline.config();
    let (in_h, in_w) = state.pipeline.input_size();
    let (hm_h, hm_w) = config.heatmap_size;
    Json(InfoResponse {
        model_path: state.model_path.clone(),
        imgsz: vec![in_h, in_w],
        heatmap_size: vec![hm_h, hm_w],
        num_keypoints: posture_inference::Joint::COUNT,
        keypoint_space: config.keypoint_space.to_string(),
    })
}

/// Image payload extracted from a request.
enum Payload {
    Bytes(Vec<u8>),
    Base64(String),
}

/// Read the `image` (file) or `image_base64` (text) field of a multipart form.
async fn read_multipart(mut multipart: Multipart) -> Result<Payload, ApiError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?;
        let Some(field) = field else {
            return Err(ApiError::bad_request("Missing 'image' field"));
        };
        match field.name() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read field: {e}")))?;
                return Ok(Payload::Bytes(bytes.to_vec()));
            }
            Some("image_base64") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read field: {e}")))?;
                return Ok(Payload::Base64(text));
            }
            _ => {}
        }
    }
}

/// Classify posture in an image
///
/// Send `{"image_base64": "..."}` as JSON (a `data:` URL prefix is accepted) or a
/// multipart form with an `image` file field.
///
/// ## Query Parameters
/// - `flags`: include the triggered posture flags (default: false)
/// - `keypoints`: include the decoded keypoints (default: true)
#[utoipa::path(
    post,
    path = "/predict",
    tag = "inference",
    params(PredictParams),
    request_body(content = ImageData, content_type = "application/json", description = "Base64 image; multipart/form-data with an 'image' field is also accepted"),
    responses(
        (status = 200, description = "Posture classified", body = PredictResponse),
        (status = 400, description = "Bad request - invalid image or missing field", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictParams>,
    request: Request,
) -> Result<Json<PredictResponse>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let payload = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(multipart).await?
    } else {
        let Json(body) = Json::<ImageData>::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Payload::Base64(body.image_base64)
    };

    let include_flags = params.flags.unwrap_or(state.pipeline.config().include_flags);
    let include_keypoints = params
        .keypoints
        .unwrap_or(state.pipeline.config().include_keypoints);

    let report = tokio::task::spawn_blocking(move || {
        let bytes = match payload {
            Payload::Bytes(bytes) => bytes,
            Payload::Base64(encoded) => decode_base64(&encoded)?,
        };
        let analysis = state.pipeline.analyze_bytes(&bytes)?;
        tracing::info!(
            good = analysis.verdict.is_good(),
            flags = analysis.verdict.flags().len(),
            inference_ms = analysis.speed.inference.unwrap_or(0.0),
            "posture classified"
        );
        Ok::<_, InferenceError>(analysis.report(include_keypoints, include_flags))
    })
    .await
    .map_err(|e| ApiError::internal(format!("Inference task failed: {e}")))??;

    Ok(Json(report.into()))
}
