//! 所見文の生成
//!
//! 判定 (label, confidence, reason) からコメント欄に書く文を決める。

use crate::types::InferenceVerdict;

/// 「至急対応」とする信頼度の下限
pub const HIGH_THRESHOLD: f64 = 0.75;
/// 「目視確認」とする信頼度の下限
pub const LOW_THRESHOLD: f64 = 0.55;

pub const PHRASE_URGENT: &str = "異常が確認されました。至急対応してください。";
pub const PHRASE_CONFIRM: &str = "異常の可能性があります。目視確認をお願いします。";
pub const PHRASE_POSSIBLE: &str = "異常の可能性があります。";
pub const PHRASE_NORMAL: &str = "異常は確認されませんでした。";
pub const PHRASE_FAILED: &str = "判定に失敗しました。";

/// 既定の閾値で所見文を生成
pub fn compose(verdict: &InferenceVerdict) -> String {
    compose_with_thresholds(verdict, HIGH_THRESHOLD, LOW_THRESHOLD)
}

/// 閾値を指定して所見文を生成
///
/// 閾値は下限を含む（`>=`）。理由が空でなければ括弧書きで付ける。
pub fn compose_with_thresholds(verdict: &InferenceVerdict, high: f64, low: f64) -> String {
    let phrase = if verdict.is_abnormal() {
        if verdict.confidence >= high {
            PHRASE_URGENT
        } else if verdict.confidence >= low {
            PHRASE_CONFIRM
        } else {
            PHRASE_POSSIBLE
        }
    } else if verdict.is_normal() {
        PHRASE_NORMAL
    } else {
        PHRASE_FAILED
    };

    if verdict.reason.is_empty() {
        phrase.to_string()
    } else {
        format!("{}（根拠:{}）", phrase, verdict.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(label: &str, confidence: f64) -> String {
        compose(&InferenceVerdict::new(label, confidence, ""))
    }

    #[test]
    fn test_abnormal_bands() {
        assert_eq!(note("abnormal", 0.8), PHRASE_URGENT);
        assert_eq!(note("abnormal", 0.6), PHRASE_CONFIRM);
        assert_eq!(note("abnormal", 0.3), PHRASE_POSSIBLE);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert_eq!(note("abnormal", HIGH_THRESHOLD), PHRASE_URGENT);
        assert_eq!(note("abnormal", LOW_THRESHOLD), PHRASE_CONFIRM);
        assert_eq!(note("abnormal", 0.5499), PHRASE_POSSIBLE);
    }

    #[test]
    fn test_normal_ignores_confidence() {
        assert_eq!(note("normal", 0.99), PHRASE_NORMAL);
        assert_eq!(note("normal", 0.0), PHRASE_NORMAL);
    }

    #[test]
    fn test_unknown_label_fails() {
        assert_eq!(note("", 0.0), PHRASE_FAILED);
        assert_eq!(note("ABNORMAL", 0.99), PHRASE_FAILED);
        assert_eq!(note("unknown", 1.0), PHRASE_FAILED);
    }

    #[test]
    fn test_out_of_range_confidence_passes_through() {
        assert_eq!(note("abnormal", 3.0), PHRASE_URGENT);
        assert_eq!(note("abnormal", -1.0), PHRASE_POSSIBLE);
        assert_eq!(note("abnormal", f64::NAN), PHRASE_POSSIBLE);
    }

    #[test]
    fn test_reason_appended() {
        let verdict = InferenceVerdict::new("abnormal", 0.9, "外壁のひび割れ");
        assert_eq!(
            compose(&verdict),
            "異常が確認されました。至急対応してください。（根拠:外壁のひび割れ）"
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let verdict = InferenceVerdict::new("abnormal", 0.6, "");
        assert_eq!(compose_with_thresholds(&verdict, 0.5, 0.2), PHRASE_URGENT);
    }
}
