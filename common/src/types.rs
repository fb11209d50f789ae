//! 判定結果の型定義
//!
//! - RawPayload: 推論エンドポイントの生レスポンス
//! - InferenceVerdict: 生レスポンスから復元した (label, confidence, reason)
//! - RecoveryTier: どの段階のパースで復元できたか

use serde::{Deserialize, Serialize};

/// 正常ラベル
pub const LABEL_NORMAL: &str = "normal";
/// 異常ラベル
pub const LABEL_ABNORMAL: &str = "abnormal";

/// 推論エンドポイントの生レスポンス（generateContent のJSONそのもの）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(pub serde_json::Value);

impl RawPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for RawPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// AI判定結果
///
/// confidence は 0.0〜1.0 を想定するが、この層では検証もクランプもしない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceVerdict {
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub reason: String,
}

impl InferenceVerdict {
    pub fn new(label: impl Into<String>, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            confidence,
            reason: reason.into(),
        }
    }

    /// ラベル不明・信頼度0の判定
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new("", 0.0, reason)
    }

    pub fn is_abnormal(&self) -> bool {
        self.label == LABEL_ABNORMAL
    }

    pub fn is_normal(&self) -> bool {
        self.label == LABEL_NORMAL
    }
}

/// 判定を復元できたパース段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTier {
    /// テキスト全体がJSONとして読めた
    Strict,
    /// `{ ... }` 部分を抽出して読めた
    Embedded,
    /// 構造化できず、テキスト先頭を理由欄に残した
    Fallback,
    /// レスポンス構造そのものが壊れていた
    Malformed,
}

impl RecoveryTier {
    /// 厳密パース以外は劣化扱い
    pub fn is_degraded(&self) -> bool {
        !matches!(self, RecoveryTier::Strict)
    }
}

impl std::fmt::Display for RecoveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryTier::Strict => write!(f, "strict"),
            RecoveryTier::Embedded => write!(f, "embedded"),
            RecoveryTier::Fallback => write!(f, "fallback"),
            RecoveryTier::Malformed => write!(f, "malformed"),
        }
    }
}
