//! プロンプト定義
//!
//! - DEFAULT_SERVICE_PROMPT: 推論サービス側の既定プロンプト（厳格JSON指定）
//! - DEFAULT_SHEET_PROMPT: 写真帳側からサービスへ送るプロンプト

/// 推論サービスの既定プロンプト
pub const DEFAULT_SERVICE_PROMPT: &str = concat!(
    "あなたは建物外観の安全点検AIです。\n",
    "以下のJSON『のみ』を返してください。コードブロックや説明は一切禁止です。\n",
    "{",
    "\"label\":\"normal\" または \"abnormal\",",
    "\"confidence\": 数値(0.0〜1.0),",
    "\"reason\":\"40文字以内の日本語の根拠\"",
    "}"
);

/// 写真帳から送るプロンプト（理由は40文字以内）
pub const DEFAULT_SHEET_PROMPT: &str = concat!(
    "建物外観を判定し、label/confidence/reason の3項目のみを返してください。",
    "説明・コードブロックは禁止。理由は40文字以内の日本語で。"
);
