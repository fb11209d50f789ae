//! Photo Inspect Common Library
//!
//! 写真帳の点検処理のうち、I/Oを持たない部分:
//! レイアウト計算、推論レスポンスの復元、所見文の生成

pub mod types;
pub mod layout;
pub mod error;
pub mod parser;
pub mod note;
pub mod prompts;

pub use types::{InferenceVerdict, RawPayload, RecoveryTier};
pub use layout::{CommentBlock, RowMetrics, SheetLayout, comment_start_row, estimate_row_from_top};
pub use error::{Error, Result};
pub use parser::{extract_text, interpret, interpret_text, interpret_with_tier};
pub use note::{compose, compose_with_thresholds};
pub use prompts::{DEFAULT_SERVICE_PROMPT, DEFAULT_SHEET_PROMPT};
