use thiserror::Error;

/// 図形の画像化に失敗（ネイティブ・チャート経由の両方）
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("図形の書き出しに失敗: {}", .causes.join(" / "))]
    AllStrategiesFailed { causes: Vec<String> },

    #[error("書き出し方法が登録されていません")]
    NoStrategy,
}

/// 推論エンドポイントへのリクエストに失敗
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("推論APIに接続できません: {0}")]
    Transport(reqwest::Error),

    #[error("推論APIがエラーを返しました (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("推論APIのレスポンスがJSONではありません: {0}")]
    InvalidBody(String),
}

/// URLはエラー文から落とす（所見・ログ・HTTP応答にそのまま出るため）
impl From<reqwest::Error> for RequestError {
    fn from(e: reqwest::Error) -> Self {
        RequestError::Transport(e.without_url())
    }
}

#[derive(Error, Debug)]
pub enum PhotoInspectError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。GOOGLE_API_KEY を設定するか `photo-inspect config --set-api-key YOUR_KEY` を実行してください")]
    MissingApiKey,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("シートが見つかりません: {0}")]
    SheetNotFound(String),

    #[error("画像書き出しエラー: {0}")]
    Export(#[from] ExportError),

    #[error("推論エラー: {0}")]
    Request(#[from] RequestError),

    #[error("シート操作エラー: {0}")]
    Host(String),

    #[error("Excel読み込みエラー: {0}")]
    XlsxRead(String),

    #[error("Excel書き出しエラー: {0}")]
    XlsxWrite(String),

    #[error("画像処理エラー: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PhotoInspectError>;
