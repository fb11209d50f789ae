//! 写真帳の外観点検
//!
//! シート上の写真を画像化して Gemini で判定し、所見文をコメント欄へ書き込む。

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod inference;
pub mod inspection;
pub mod scanner;
pub mod server;
pub mod sheet;
