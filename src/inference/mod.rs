//! 画像1枚の判定
//!
//! - `DirectInspector`: Gemini を直接呼び、レスポンス復元と所見生成を手元で行う
//! - `ServiceClient`: デプロイ済みの推論サービス（`/infer`）に任せる

pub mod gemini;
pub mod service;

pub use gemini::GeminiClient;
pub use service::ServiceClient;

use crate::error::Result;
use photo_inspect_common::{compose, interpret_with_tier, InferenceVerdict, RawPayload, RecoveryTier};
use std::future::Future;

/// 判定結果と所見文
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub verdict: InferenceVerdict,
    /// 手元で復元したときの段階（サービス経由では None）
    pub tier: Option<RecoveryTier>,
    pub note: String,
    pub raw: Option<RawPayload>,
}

/// 画像を判定して所見文を返すもの
pub trait Inspector {
    fn inspect(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<Inspection>> + Send;
}

/// Gemini 直結
pub struct DirectInspector {
    client: GeminiClient,
}

impl DirectInspector {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }
}

impl Inspector for DirectInspector {
    async fn inspect(&self, image: &[u8], mime: &str, prompt: &str) -> Result<Inspection> {
        let raw = self.client.infer(image, mime, prompt).await?;
        Ok(inspection_from_payload(raw))
    }
}

/// 生レスポンス → 判定 → 所見文
pub fn inspection_from_payload(raw: RawPayload) -> Inspection {
    let (verdict, tier) = interpret_with_tier(&raw);
    let note = compose(&verdict);
    Inspection {
        verdict,
        tier: Some(tier),
        note,
        raw: Some(raw),
    }
}
