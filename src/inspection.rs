//! 写真帳1シート分の点検
//!
//! 写真ごとに 画像化 → 判定 → 所見文 → コメント欄書き込み を順に行う。
//! 画像化・判定の失敗はその写真の所見（`判定エラー: ...`）になり、処理は続行する。

use crate::error::{PhotoInspectError, Result};
use crate::export::ShapeExporter;
use crate::inference::{Inspection, Inspector};
use crate::scanner::{self, PhotoBlock};
use crate::sheet::{self, SheetHost};
use photo_inspect_common::{CommentBlock, SheetLayout};

/// 書き出し画像の形式
pub const EXPORT_MIME: &str = "image/png";

/// 写真1枚の結果
#[derive(Debug, Clone)]
pub struct PhotoResult {
    pub shape_name: String,
    pub anchor_row: u32,
    pub estimated: bool,
    pub comment: CommentBlock,
    pub note: String,
    pub outcome: PhotoOutcome,
    /// コメント欄へ書き込めたか
    pub written: bool,
}

#[derive(Debug, Clone)]
pub enum PhotoOutcome {
    Inspected(Inspection),
    Failed(String),
}

impl PhotoResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, PhotoOutcome::Failed(_))
    }

    pub fn is_abnormal(&self) -> bool {
        matches!(&self.outcome, PhotoOutcome::Inspected(i) if i.verdict.is_abnormal())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InspectionReport {
    pub results: Vec<PhotoResult>,
}

impl InspectionReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn abnormal(&self) -> usize {
        self.results.iter().filter(|r| r.is_abnormal()).count()
    }
}

pub struct InspectionOrchestrator<'a, I: Inspector> {
    inspector: &'a I,
    exporter: ShapeExporter,
    layout: SheetLayout,
    prompt: String,
}

impl<'a, I: Inspector> InspectionOrchestrator<'a, I> {
    pub fn new(inspector: &'a I, prompt: impl Into<String>) -> Self {
        Self {
            inspector,
            exporter: ShapeExporter::default(),
            layout: SheetLayout::default(),
            prompt: prompt.into(),
        }
    }

    pub fn with_exporter(mut self, exporter: ShapeExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn with_layout(mut self, layout: SheetLayout) -> Self {
        self.layout = layout;
        self
    }

    /// シート上の写真を処理する数（事前表示用）
    pub fn count_photos<H: SheetHost>(&self, host: &H) -> usize {
        scanner::scan_photos(host, &self.layout).len()
    }

    pub async fn run<H: SheetHost>(&self, host: &mut H) -> Result<InspectionReport> {
        self.run_with(host, |_| {}).await
    }

    /// 1枚終わるごとに `on_photo` を呼ぶ
    pub async fn run_with<H, F>(&self, host: &mut H, mut on_photo: F) -> Result<InspectionReport>
    where
        H: SheetHost,
        F: FnMut(&PhotoResult),
    {
        let photos = scanner::scan_photos(&*host, &self.layout);
        let mut report = InspectionReport::default();

        if photos.is_empty() {
            tracing::info!("写真が見つかりません");
            return Ok(report);
        }

        for photo in photos {
            let outcome = match self.inspect_photo(&mut *host, &photo).await {
                Ok(inspection) => PhotoOutcome::Inspected(inspection),
                Err(e) => {
                    tracing::warn!("{} (行 {}): {}", photo.shape.name, photo.anchor_row, e);
                    PhotoOutcome::Failed(e.to_string())
                }
            };

            let note = match &outcome {
                PhotoOutcome::Inspected(inspection) => inspection.note.clone(),
                PhotoOutcome::Failed(e) => format!("判定エラー: {}", e),
            };

            let written = match sheet::write_comment_block(&mut *host, &photo.comment, &note) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("{} に書き込めません: {}", photo.comment, e);
                    false
                }
            };

            let result = PhotoResult {
                shape_name: photo.shape.name,
                anchor_row: photo.anchor_row,
                estimated: photo.estimated,
                comment: photo.comment,
                note,
                outcome,
                written,
            };
            on_photo(&result);
            report.results.push(result);
        }

        Ok(report)
    }

    /// 一時ファイルはこの関数を抜けると削除される
    async fn inspect_photo<H: SheetHost>(&self, host: &mut H, photo: &PhotoBlock) -> Result<Inspection> {
        let temp = tempfile::Builder::new()
            .prefix("photo-inspect-")
            .suffix(".png")
            .tempfile()?;

        self.exporter
            .export(&mut *host, &photo.shape, temp.path())
            .map_err(PhotoInspectError::from)?;

        let image = std::fs::read(temp.path())?;
        tracing::debug!(
            "{} → {} ({} bytes)",
            photo.shape.name,
            photo.comment,
            image.len()
        );

        self.inspector.inspect(&image, EXPORT_MIME, &self.prompt).await
    }
}
