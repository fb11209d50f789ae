//! 推論レスポンスパーサー
//!
//! generateContent のレスポンスから (label, confidence, reason) を復元する。
//! モデルには厳格なJSONを指示しているが、前後の説明文やコードブロックが
//! 混じることがあるため、段階的に条件を緩めて読む。
//!
//! 1. テキスト全体をJSONとして読む
//! 2. テキスト中の最初の `{` から最後の `}` までを読む
//! 3. 読めなければテキスト先頭を理由欄に残す
//!
//! どの経路でも必ず判定を返し、エラーにはしない。

use crate::error::{Error, Result};
use crate::types::{InferenceVerdict, RawPayload, RecoveryTier};
use serde_json::{Map, Value};

/// 構造化できなかったときに理由欄へ残す文字数
pub const FALLBACK_REASON_CHARS: usize = 100;

type TierParser = fn(&str) -> Option<InferenceVerdict>;

/// 試す順に並べたパーサー。最初に成功したものを採用する
const RECOVERY_TIERS: &[(RecoveryTier, TierParser)] = &[
    (RecoveryTier::Strict, parse_strict),
    (RecoveryTier::Embedded, parse_embedded),
];

/// 生レスポンスから判定を復元（失敗しない）
pub fn interpret(payload: &RawPayload) -> InferenceVerdict {
    interpret_with_tier(payload).0
}

/// 生レスポンスから判定を復元し、採用した段階も返す
pub fn interpret_with_tier(payload: &RawPayload) -> (InferenceVerdict, RecoveryTier) {
    match extract_text(payload) {
        Ok(text) => interpret_text(&text),
        Err(e) => {
            tracing::warn!("推論レスポンスの構造が不正: {}", e);
            (
                InferenceVerdict::unknown(format!("parse_error:{}", e)),
                RecoveryTier::Malformed,
            )
        }
    }
}

/// 抽出済みテキストから判定を復元
pub fn interpret_text(text: &str) -> (InferenceVerdict, RecoveryTier) {
    for (tier, parse) in RECOVERY_TIERS {
        if let Some(verdict) = parse(text) {
            if tier.is_degraded() {
                tracing::debug!("判定を {} 段階で復元", tier);
            }
            return (verdict, *tier);
        }
    }

    tracing::warn!(
        "判定JSONを復元できませんでした（{} chars）",
        text.chars().count()
    );
    let reason: String = text.chars().take(FALLBACK_REASON_CHARS).collect();
    (InferenceVerdict::unknown(reason), RecoveryTier::Fallback)
}

/// candidates[0].content.parts[*].text を順に連結する
///
/// candidates や parts が無い場合は空文字列。
/// 型が想定と異なる場合だけエラーになる。
pub fn extract_text(payload: &RawPayload) -> Result<String> {
    let root = match payload.as_value() {
        Value::Null => return Ok(String::new()),
        Value::Object(map) => map,
        other => {
            return Err(Error::Parse(format!(
                "レスポンスがオブジェクトではありません: {}",
                type_name(other)
            )))
        }
    };

    let candidates = match root.get("candidates") {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::Parse(format!(
                "candidates が配列ではありません: {}",
                type_name(other)
            )))
        }
    };

    let Some(first) = candidates.first() else {
        return Ok(String::new());
    };
    let candidate = expect_object(first, "candidates[0]")?;

    let content = match candidate.get("content") {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(value) => expect_object(value, "content")?,
    };

    let parts = match content.get("parts") {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::Parse(format!(
                "parts が配列ではありません: {}",
                type_name(other)
            )))
        }
    };

    let mut text = String::new();
    for (index, part) in parts.iter().enumerate() {
        let part = expect_object(part, "parts[]")?;
        match part.get("text") {
            None | Some(Value::Null) => {}
            Some(Value::String(fragment)) => text.push_str(fragment),
            Some(other) => {
                return Err(Error::Parse(format!(
                    "parts[{}].text が文字列ではありません: {}",
                    index,
                    type_name(other)
                )))
            }
        }
    }

    Ok(text)
}

// =============================================
// 各段階のパーサー
// =============================================

/// テキスト全体をJSONオブジェクトとして読む
fn parse_strict(text: &str) -> Option<InferenceVerdict> {
    parse_verdict_object(text)
}

/// 最初の `{` から最後の `}` までを読む（複数行にまたがってよい）
fn parse_embedded(text: &str) -> Option<InferenceVerdict> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_verdict_object(&text[start..=end])
}

fn parse_verdict_object(json: &str) -> Option<InferenceVerdict> {
    let value: Value = serde_json::from_str(json).ok()?;
    let object = value.as_object()?;

    Some(InferenceVerdict {
        label: stringify(object.get("label")),
        confidence: to_confidence(object.get("confidence"))?,
        reason: stringify(object.get("reason")),
    })
}

/// 文字列以外の値もJSON表記で文字列化する（null と欠落は空）
fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// 数値か数値文字列を受け付ける。欠落は0.0、解釈できない値は None
fn to_confidence(value: Option<&Value>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(_) => None,
    }
}

fn expect_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        Error::Parse(format!(
            "{} がオブジェクトではありません: {}",
            what,
            type_name(value)
        ))
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_with_text(text: &str) -> RawPayload {
        RawPayload::new(json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ] } }
            ]
        }))
    }

    // =============================================
    // extract_text テスト
    // =============================================

    #[test]
    fn test_extract_text_concatenates_parts_in_order() {
        let payload = RawPayload::new(json!({
            "candidates": [
                { "content": { "parts": [
                    { "text": "{\"label\":" },
                    { "inline_data": { "mime_type": "image/png", "data": "" } },
                    { "text": "\"normal\"}" }
                ] } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        }));
        assert_eq!(extract_text(&payload).unwrap(), "{\"label\":\"normal\"}");
    }

    #[test]
    fn test_extract_text_missing_structure_is_empty() {
        assert_eq!(extract_text(&RawPayload::default()).unwrap(), "");
        assert_eq!(extract_text(&RawPayload::new(json!({}))).unwrap(), "");
        assert_eq!(
            extract_text(&RawPayload::new(json!({"candidates": []}))).unwrap(),
            ""
        );
        assert_eq!(
            extract_text(&RawPayload::new(json!({"candidates": [{}]}))).unwrap(),
            ""
        );
        assert_eq!(
            extract_text(&RawPayload::new(json!({"candidates": [{"content": {}}]}))).unwrap(),
            ""
        );
    }

    #[test]
    fn test_extract_text_malformed_structure() {
        let cases = vec![
            json!({"candidates": "oops"}),
            json!({"candidates": [42]}),
            json!({"candidates": [{"content": []}]}),
            json!({"candidates": [{"content": {"parts": {}}}]}),
            json!({"candidates": [{"content": {"parts": [{"text": 1}]}}]}),
            json!([1, 2, 3]),
        ];
        for case in cases {
            let result = extract_text(&RawPayload::new(case.clone()));
            assert!(result.is_err(), "エラーになるべき: {}", case);
        }
    }

    // =============================================
    // interpret テスト
    // =============================================

    #[test]
    fn test_interpret_strict_json() {
        let payload =
            payload_with_text(r#"{"label":"normal","confidence":0.9,"reason":"x"}"#);
        let (verdict, tier) = interpret_with_tier(&payload);
        assert_eq!(tier, RecoveryTier::Strict);
        assert_eq!(verdict, InferenceVerdict::new("normal", 0.9, "x"));
    }

    #[test]
    fn test_interpret_embedded_json_matches_strict() {
        let strict = interpret(&payload_with_text(
            r#"{"label":"normal","confidence":0.9,"reason":"x"}"#,
        ));
        let (embedded, tier) = interpret_with_tier(&payload_with_text(
            "判定結果です。\n{\"label\":\"normal\",\"confidence\":0.9,\"reason\":\"x\"}\n以上です。",
        ));
        assert_eq!(tier, RecoveryTier::Embedded);
        assert_eq!(embedded, strict);
    }

    #[test]
    fn test_interpret_code_fence() {
        let text = "```json\n{\n  \"label\": \"abnormal\",\n  \"confidence\": 0.81,\n  \"reason\": \"外壁にひび割れ\"\n}\n```";
        let (verdict, tier) = interpret_with_tier(&payload_with_text(text));
        assert_eq!(tier, RecoveryTier::Embedded);
        assert_eq!(verdict.label, "abnormal");
        assert_eq!(verdict.confidence, 0.81);
        assert_eq!(verdict.reason, "外壁にひび割れ");
    }

    #[test]
    fn test_interpret_defaults_for_missing_fields() {
        let verdict = interpret(&payload_with_text(r#"{"label":"abnormal"}"#));
        assert_eq!(verdict, InferenceVerdict::new("abnormal", 0.0, ""));
    }

    #[test]
    fn test_interpret_stringifies_and_accepts_numeric_strings() {
        let verdict = interpret(&payload_with_text(
            r#"{"label":1,"confidence":"0.65","reason":["a"]}"#,
        ));
        assert_eq!(verdict.label, "1");
        assert_eq!(verdict.confidence, 0.65);
        assert_eq!(verdict.reason, r#"["a"]"#);
    }

    #[test]
    fn test_interpret_confidence_is_not_clamped() {
        let verdict = interpret(&payload_with_text(
            r#"{"label":"abnormal","confidence":1.7,"reason":""}"#,
        ));
        assert_eq!(verdict.confidence, 1.7);
    }

    #[test]
    fn test_interpret_plain_text_falls_back_to_truncated_reason() {
        let text = "あ".repeat(150);
        let (verdict, tier) = interpret_with_tier(&payload_with_text(&text));
        assert_eq!(tier, RecoveryTier::Fallback);
        assert_eq!(verdict.label, "");
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.reason.chars().count(), FALLBACK_REASON_CHARS);
    }

    #[test]
    fn test_interpret_broken_braces_fall_back() {
        let (verdict, tier) =
            interpret_with_tier(&payload_with_text("label: normal } and { oops"));
        assert_eq!(tier, RecoveryTier::Fallback);
        assert_eq!(verdict.reason, "label: normal } and { oops");
    }

    #[test]
    fn test_interpret_unparseable_confidence_falls_back() {
        let text = r#"{"label":"normal","confidence":"high","reason":"x"}"#;
        let (verdict, tier) = interpret_with_tier(&payload_with_text(text));
        assert_eq!(tier, RecoveryTier::Fallback);
        assert_eq!(verdict.label, "");
        assert_eq!(verdict.reason, text);
    }

    #[test]
    fn test_interpret_empty_payload() {
        let (verdict, tier) = interpret_with_tier(&RawPayload::new(json!({})));
        assert_eq!(tier, RecoveryTier::Fallback);
        assert_eq!(verdict, InferenceVerdict::default());
    }

    #[test]
    fn test_interpret_malformed_payload_names_failure() {
        let payload = RawPayload::new(json!({"candidates": [{"content": {"parts": "x"}}]}));
        let (verdict, tier) = interpret_with_tier(&payload);
        assert_eq!(tier, RecoveryTier::Malformed);
        assert_eq!(verdict.label, "");
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.reason.starts_with("parse_error:"));
        assert!(verdict.reason.contains("parts"));
    }

    #[test]
    fn test_interpret_json_array_is_not_a_verdict() {
        let (verdict, tier) = interpret_with_tier(&payload_with_text(r#"[1,2]"#));
        assert_eq!(tier, RecoveryTier::Fallback);
        assert_eq!(verdict.reason, "[1,2]");
    }
}
