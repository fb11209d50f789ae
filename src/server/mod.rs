//! 推論サービス
//!
//! - `POST /infer`: multipart の画像を判定して所見文を返す
//! - `GET /ping`: 稼働確認

mod handlers;

pub use handlers::{ApiError, InferResponse, PingResponse};

use crate::error::Result;
use crate::inference::Inspector;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// アップロード上限（写真1枚）
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState<I> {
    pub inspector: I,
    pub model: String,
    pub has_api_key: bool,
    /// レスポンスに Gemini の生レスポンスを含める
    pub echo_raw: bool,
}

pub fn router<I>(state: AppState<I>) -> Router
where
    I: Inspector + Send + Sync + 'static,
{
    Router::new()
        .route("/infer", post(handlers::infer::<I>))
        .route("/ping", get(handlers::ping::<I>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn serve<I>(addr: SocketAddr, state: AppState<I>) -> Result<()>
where
    I: Inspector + Send + Sync + 'static,
{
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("推論サービスを起動: http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
