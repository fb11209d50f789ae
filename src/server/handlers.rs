use super::AppState;
use crate::error::{PhotoInspectError, RequestError};
use crate::inference::Inspector;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use photo_inspect_common::DEFAULT_SERVICE_PROMPT;
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_MIME: &str = "image/png";

#[derive(Debug, Serialize)]
pub struct InferResponse {
    pub label: String,
    pub confidence: f64,
    pub reason: String,
    pub note: String,
    pub raw: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub ok: bool,
    pub model: String,
    pub has_api_key: bool,
}

/// `{"error": ...}` とステータスで返すエラー
#[derive(Debug)]
pub struct ApiError {
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
}

impl From<PhotoInspectError> for ApiError {
    fn from(err: PhotoInspectError) -> Self {
        match err {
            PhotoInspectError::Request(RequestError::Status { body, .. }) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: format!("gemini_api:{}", body),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: other.to_string(),
            },
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::bad_request(format!("multipart: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} {}", self.status, self.message);
        }
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

pub(super) async fn ping<I>(State(state): State<Arc<AppState<I>>>) -> Json<PingResponse>
where
    I: Inspector + Send + Sync + 'static,
{
    Json(PingResponse {
        ok: true,
        model: state.model.clone(),
        has_api_key: state.has_api_key,
    })
}

pub(super) async fn infer<I>(
    State(state): State<Arc<AppState<I>>>,
    mut multipart: Multipart,
) -> Result<Json<InferResponse>, ApiError>
where
    I: Inspector + Send + Sync + 'static,
{
    let mut file = None;
    let mut mime = None;
    let mut prompt = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => file = Some(field.bytes().await?),
            "mime" => mime = Some(field.text().await?),
            "prompt" => prompt = Some(field.text().await?),
            _ => {}
        }
    }

    let image = file
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::bad_request("empty file"))?;
    let mime = mime
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MIME.to_string());
    let prompt = prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SERVICE_PROMPT.to_string());

    tracing::debug!("/infer: {} bytes, {}", image.len(), mime);

    let inspection = state.inspector.inspect(&image, &mime, &prompt).await?;

    let raw = if state.echo_raw {
        inspection.raw.map(|r| r.0)
    } else {
        None
    };

    Ok(Json(InferResponse {
        label: inspection.verdict.label,
        confidence: inspection.verdict.confidence,
        reason: inspection.verdict.reason,
        note: inspection.note,
        raw,
    }))
}
