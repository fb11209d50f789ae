//! Gemini generateContent 呼び出し

use crate::config::Config;
use crate::error::{RequestError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use photo_inspect_common::RawPayload;
use serde::Serialize;
use std::time::Duration;

const TEMPERATURE: f32 = 0.2;
const TOP_P: f32 = 0.8;
const RESPONSE_MIME_TYPE: &str = "application/json";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini APIリクエスト
#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    response_mime_type: &'static str,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// APIキー・モデルは設定から受け取る（環境変数は見ない）
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(RequestError::from)?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// キーはURLに載せずヘッダで送る
    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /// 画像と指示を1回送り、生レスポンスを返す（リトライなし）
    pub async fn infer(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> std::result::Result<RawPayload, RequestError> {
        let request = build_request(image, mime, prompt);

        tracing::debug!("Gemini {} へ送信 ({} bytes, {})", self.model, image.len(), mime);

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<serde_json::Value>(&body)
            .map(RawPayload::new)
            .map_err(|e| RequestError::InvalidBody(e.to_string()))
    }
}

fn build_request<'a>(image: &[u8], mime: &'a str, prompt: &'a str) -> GeminiRequest<'a> {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime,
                        data: STANDARD.encode(image),
                    },
                },
                Part::Text { text: prompt },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            response_mime_type: RESPONSE_MIME_TYPE,
        },
    }
}
