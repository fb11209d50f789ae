//! 推論サービス（`POST /infer`）のクライアント

use super::{Inspection, Inspector};
use crate::error::{RequestError, Result};
use photo_inspect_common::note::PHRASE_FAILED;
use photo_inspect_common::{InferenceVerdict, RawPayload};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct InferResponse {
    #[serde(default)]
    label: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reason: String,
    note: Option<String>,
    raw: Option<serde_json::Value>,
}

pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(RequestError::from)?;
        Ok(Self {
            http,
            endpoint: infer_endpoint(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Inspector for ServiceClient {
    async fn inspect(&self, image: &[u8], mime: &str, prompt: &str) -> Result<Inspection> {
        let file = Part::bytes(image.to_vec())
            .file_name(upload_file_name(mime))
            .mime_str(mime)
            .map_err(RequestError::from)?;
        let form = Form::new()
            .part("file", file)
            .text("mime", mime.to_string())
            .text("prompt", prompt.to_string());

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(RequestError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(RequestError::from)?;

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: InferResponse = serde_json::from_str(&body)
            .map_err(|e| RequestError::InvalidBody(e.to_string()))?;
        Ok(inspection_from_response(parsed))
    }
}

fn inspection_from_response(response: InferResponse) -> Inspection {
    let note = response
        .note
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| PHRASE_FAILED.to_string());

    Inspection {
        verdict: InferenceVerdict::new(response.label, response.confidence, response.reason),
        tier: None,
        note,
        raw: response.raw.filter(|v| !v.is_null()).map(RawPayload::new),
    }
}

/// 送信ファイル名の拡張子はMIMEに合わせる
fn upload_file_name(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/png" => "image.png",
        "image/jpeg" | "image/jpg" => "image.jpg",
        "image/gif" => "image.gif",
        "image/webp" => "image.webp",
        "image/bmp" => "image.bmp",
        _ => "image",
    }
}

/// ベースURLでも `/infer` 付きでも受け付ける
fn infer_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/infer") {
        trimmed.to_string()
    } else {
        format!("{}/infer", trimmed)
    }
}
