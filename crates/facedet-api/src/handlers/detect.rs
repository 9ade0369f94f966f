//! Face detection endpoint.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::middleware::{RequestId, PROCESSING_TIME_HEADER, TOTAL_FACES_HEADER};
use crate::state::AppState;

/// Multipart field holding the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Detect faces in an uploaded image and return it annotated.
///
/// Accepts either the raw encoded image as the request body or a
/// `multipart/form-data` upload with the image in the `file` field.
pub async fn detect_faces(State(state): State<AppState>, request: Request) -> Response {
    let hide_internal = state.config.is_production();
    match annotate_upload(state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response_with(hide_internal),
    }
}

async fn annotate_upload(state: AppState, request: Request) -> ApiResult<Response> {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let payload = if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        let payload = read_upload(multipart).await?;
        metrics::record_image_received(payload.len(), "multipart");
        payload
    } else {
        let payload = Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        metrics::record_image_received(payload.len(), "raw");
        payload
    };

    let result = state.pipeline.run_with_id(request_id, payload).await?;

    let faces = HeaderValue::from(result.detection_count());
    let processing_time = HeaderValue::from_str(&result.processing_time_header())
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let content_type = HeaderValue::from_static(result.format().mime_type());

    let mut response = (StatusCode::OK, result.into_bytes()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(TOTAL_FACES_HEADER, faces);
    headers.insert(PROCESSING_TIME_HEADER, processing_time);

    Ok(response)
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Bytes> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::rejected(e.status(), e.body_text()));
        }
    }

    Err(ApiError::bad_request(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}
