//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use photo_inspect::error::{ExportError, PhotoInspectError, RequestError};
use photo_inspect::scanner;
use photo_inspect::sheet::XlsxSheet;
use std::path::Path;
use tempfile::tempdir;

/// 存在しないパスを指定した場合
#[test]
fn test_find_workbooks_nonexistent_path() {
    let result = scanner::find_workbooks(Path::new("/nonexistent/path/12345"));
    assert!(matches!(result, Err(PhotoInspectError::FileNotFound(_))));
}

/// ブックのないフォルダ
#[test]
fn test_find_workbooks_no_workbooks() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("test.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("data.json"), "{}").unwrap();

    let result = scanner::find_workbooks(dir.path()).unwrap();
    assert!(result.is_empty());
}

/// 存在しないブックを開いた場合
#[test]
fn test_open_missing_workbook() {
    let result = XlsxSheet::open(Path::new("/nonexistent/写真帳.xlsx"), "写真帳");
    assert!(matches!(result, Err(PhotoInspectError::FileNotFound(_))));
}

/// xlsx ではないファイルを開いた場合
#[test]
fn test_open_broken_workbook() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"not a zip").unwrap();

    let result = XlsxSheet::open(&path, "写真帳");
    assert!(matches!(result, Err(PhotoInspectError::XlsxRead(_))));
}

/// PhotoInspectErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        PhotoInspectError::Config("テスト設定エラー".to_string()),
        PhotoInspectError::FileNotFound("写真帳.xlsx".to_string()),
        PhotoInspectError::SheetNotFound("写真帳".to_string()),
        PhotoInspectError::Host("結合できません".to_string()),
        PhotoInspectError::XlsxRead("壊れています".to_string()),
        PhotoInspectError::Export(ExportError::NoStrategy),
        PhotoInspectError::Request(RequestError::InvalidBody("<html>".to_string())),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// MissingApiKeyエラーのメッセージ確認
#[test]
fn test_missing_api_key_message() {
    let display = format!("{}", PhotoInspectError::MissingApiKey);

    assert!(display.contains("APIキー"));
    assert!(display.contains("GOOGLE_API_KEY"));
    assert!(display.contains("photo-inspect config"));
}

/// 書き出し失敗は全ての原因を含む
#[test]
fn test_export_error_lists_causes() {
    let err = ExportError::AllStrategiesFailed {
        causes: vec!["native: PNGではない".to_string(), "chart: 貼り付け失敗".to_string()],
    };
    let display = format!("{}", err);

    assert!(display.contains("native: PNGではない"));
    assert!(display.contains("chart: 貼り付け失敗"));
}

/// HTTPエラーはステータスと本文を含む
#[test]
fn test_request_status_display() {
    let err: PhotoInspectError = RequestError::Status {
        status: 403,
        body: "API key not valid".to_string(),
    }
    .into();
    let display = format!("{}", err);

    assert!(display.contains("403"));
    assert!(display.contains("API key not valid"));
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: PhotoInspectError = io_err.into();

    assert!(matches!(err, PhotoInspectError::Io(_)));
    assert!(format!("{}", err).contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: PhotoInspectError = json_err.into();

    assert!(matches!(err, PhotoInspectError::JsonParse(_)));
}
