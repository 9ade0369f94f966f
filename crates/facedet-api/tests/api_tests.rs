//! API integration tests.

use std::io::Cursor;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{ImageFormat, Rgb, RgbImage};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use tower::ServiceExt;

use facedet_api::{build_pipeline, create_router, ApiConfig, AppState, PipelineSettings, TelemetryConfig};
use facedet_media::{
    DetectionEngine, EngineConfig, FaceModel, MediaError, MediaResult, ModelHandle, RawDetection,
    Raster,
};
use facedet_models::BoundingBox;

const BOUNDARY: &str = "facedet-test-boundary";

#[derive(Clone)]
struct StubModel {
    detections: Vec<RawDetection>,
}

impl FaceModel for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    fn load(&self) -> MediaResult<Box<dyn ModelHandle>> {
        Ok(Box::new(self.clone()))
    }
}

impl ModelHandle for StubModel {
    fn infer(&mut self, _raster: &Raster) -> MediaResult<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }
}

struct BrokenModel;

impl FaceModel for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    fn load(&self) -> MediaResult<Box<dyn ModelHandle>> {
        Ok(Box::new(BrokenModel))
    }
}

impl ModelHandle for BrokenModel {
    fn infer(&mut self, _raster: &Raster) -> MediaResult<Vec<RawDetection>> {
        Err(MediaError::inference("cuda context lost"))
    }
}

fn test_router_with(config: ApiConfig, detections: Vec<RawDetection>) -> Router {
    router_for(config, &StubModel { detections })
}

fn router_for(config: ApiConfig, model: &dyn FaceModel) -> Router {
    let engine = DetectionEngine::new(model, EngineConfig::default()).unwrap();
    let pipeline = build_pipeline(&config, &PipelineSettings::default(), engine).unwrap();
    let state = AppState::with_pipeline(config, TelemetryConfig::default(), pipeline);
    let handle = PrometheusBuilder::new().build_recorder().handle();
    create_router(state, Some(handle))
}

fn test_router(detections: Vec<RawDetection>) -> Router {
    test_router_with(ApiConfig::default(), detections)
}

fn one_face() -> Vec<RawDetection> {
    vec![RawDetection::new(BoundingBox::new(8.0, 8.0, 40.0, 40.0), 0.93)]
}

fn png_image(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn multipart_body(field: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"face.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn detect_request(content_type: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/detect/faces/image")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_router(vec![]).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["message"], "Face Detection API is operational");
}

#[tokio::test]
async fn test_root_redirects_to_health() {
    let response = test_router(vec![]).oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/health");
}

#[tokio::test]
async fn test_detect_raw_body() {
    let response = test_router(one_face())
        .oneshot(detect_request("image/png", png_image(64, 64)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(headers.get("x-total-faces").unwrap(), "1");
    let seconds: f64 = headers
        .get("x-processing-time")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(seconds >= 0.0);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 64));
}

#[tokio::test]
async fn test_detect_multipart_upload() {
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    let body = multipart_body("file", &png_image(48, 32));

    let response = test_router(one_face())
        .oneshot(detect_request(&content_type, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-total-faces").unwrap(), "1");
}

#[tokio::test]
async fn test_detect_no_faces() {
    let response = test_router(vec![])
        .oneshot(detect_request("image/png", png_image(32, 32)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-total-faces").unwrap(), "0");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let mut request = detect_request("image/png", png_image(16, 16));
    request
        .headers_mut()
        .insert("x-request-id", "req-1234".parse().unwrap());

    let response = test_router(vec![]).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-1234");
}

#[tokio::test]
async fn test_empty_body_is_decode_error() {
    let response = test_router(vec![])
        .oneshot(detect_request("application/octet-stream", Vec::new()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "decode_error");
}

#[tokio::test]
async fn test_garbage_body_is_rejected() {
    let response = test_router(vec![])
        .oneshot(detect_request("image/jpeg", b"definitely not an image".to_vec()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_multipart_missing_file_field() {
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    let body = multipart_body("image", &png_image(16, 16));

    let response = test_router(vec![])
        .oneshot(detect_request(&content_type, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_body_limit() {
    let config = ApiConfig {
        max_body_size: 1024,
        ..ApiConfig::default()
    };

    let response = test_router_with(config, vec![])
        .oneshot(detect_request("application/octet-stream", vec![0u8; 4096]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_ready_reports_pool() {
    let response = test_router(vec![]).oneshot(get("/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["model"]["name"], "stub");
    assert_eq!(body["checks"]["model"]["pool_size"], 1);
}

#[tokio::test]
async fn test_tracing_status_without_exporter() {
    let response = test_router(vec![])
        .oneshot(get("/tracing/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["enabled"], false);
    assert_eq!(body["connection_status"], "disabled");
    assert_eq!(body["service_name"], "face-detection");
    assert_eq!(body["details"]["can_connect"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let response = test_router(vec![]).oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_detect_rejects_get() {
    let response = test_router(vec![])
        .oneshot(get("/detect/faces/image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_inference_failure_detail_depends_on_environment() {
    let production = ApiConfig {
        environment: "production".to_string(),
        ..ApiConfig::default()
    };
    let response = router_for(production, &BrokenModel)
        .oneshot(detect_request("image/png", png_image(16, 16)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "inference_error");
    assert_eq!(body["detail"], "An internal error occurred");

    let response = router_for(ApiConfig::default(), &BrokenModel)
        .oneshot(detect_request("image/png", png_image(16, 16)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("cuda context lost"));
}
