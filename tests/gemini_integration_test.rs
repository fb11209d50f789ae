use photo_inspect::config::Config;
use photo_inspect::inference::{DirectInspector, GeminiClient, Inspector};
use photo_inspect_common::{interpret, DEFAULT_SERVICE_PROMPT};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

fn live_config() -> Option<Config> {
    let mut config = Config::default();
    config.apply_env(|key| std::env::var(key).ok());
    if !config.has_api_key() {
        eprintln!("GOOGLE_API_KEY not set; skipping integration test");
        return None;
    }
    Some(config)
}

fn gray_png() -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255])));
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).expect("encode png");
    buf
}

#[tokio::test]
async fn gemini_infer_integration() {
    let Some(config) = live_config() else {
        return;
    };

    let client = GeminiClient::new(&config).expect("client");
    let raw = client
        .infer(&gray_png(), "image/png", DEFAULT_SERVICE_PROMPT)
        .await
        .expect("request failed");

    assert!(raw.as_value()["candidates"].is_array(), "unexpected payload: {}", raw.as_value());

    let verdict = interpret(&raw);
    println!("label={} confidence={} reason={}", verdict.label, verdict.confidence, verdict.reason);
}

#[tokio::test]
async fn gemini_direct_inspector_integration() {
    let Some(config) = live_config() else {
        return;
    };

    let inspector = DirectInspector::new(GeminiClient::new(&config).expect("client"));
    let inspection = inspector
        .inspect(&gray_png(), "image/png", DEFAULT_SERVICE_PROMPT)
        .await
        .expect("inspection failed");

    assert!(!inspection.note.is_empty());
    println!("{}", inspection.note);
}
