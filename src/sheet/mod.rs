//! 写真帳シートの操作
//!
//! 点検処理はシートを `SheetHost` 越しにしか触らない。
//! 図形の列挙、行高さ、セルの結合・書き込み、図形の画像化を提供する。

mod ooxml;
mod patch;
pub mod xlsx;

pub use xlsx::XlsxSheet;

use crate::error::Result;
use photo_inspect_common::{CommentBlock, RowMetrics};
use std::path::Path;

pub type ShapeId = usize;
pub type ContainerId = usize;

/// 図形の種類（取得できないホストでは Unknown）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Picture,
    Other,
    Unknown,
}

/// 図形の外接矩形（pt）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeInfo {
    pub id: ShapeId,
    pub name: String,
    pub kind: ShapeKind,
    /// 左上セルの行（1始まり）。取れない図形は None
    pub anchor_row: Option<u32>,
    pub bounds: Bounds,
}

/// セル範囲（1始まり、両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl CellRange {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn intersects(&self, other: &CellRange) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }
}

impl From<&CommentBlock> for CellRange {
    fn from(block: &CommentBlock) -> Self {
        Self {
            first_row: block.start_row,
            first_col: block.first_col,
            last_row: block.last_row(),
            last_col: block.last_col(),
        }
    }
}

/// シート側の協調者
///
/// 描画系メソッドは図形の画像化に使う。チャート経由の書き出しでは
/// 一時コンテナを作って図形を貼り付け、書き出した後に削除する。
pub trait SheetHost: RowMetrics {
    fn shapes(&self) -> Vec<ShapeInfo>;

    fn unmerge(&mut self, range: &CellRange) -> Result<()>;
    fn merge(&mut self, range: &CellRange) -> Result<()>;
    fn write_text(&mut self, row: u32, col: u32, text: &str) -> Result<()>;
    /// 折り返し＆上詰め
    fn set_wrap_top(&mut self, range: &CellRange) -> Result<()>;

    fn export_native(&mut self, shape: &ShapeInfo, dest: &Path) -> Result<()>;
    fn add_container(&mut self, bounds: Bounds) -> Result<ContainerId>;
    fn paste_shape(&mut self, container: ContainerId, shape: &ShapeInfo) -> Result<()>;
    fn export_container(&mut self, container: ContainerId, dest: &Path) -> Result<()>;
    fn delete_container(&mut self, container: ContainerId) -> Result<()>;
}

/// コメント欄へ書き込む
///
/// 既存の結合を解除 → 結合 → 値設定 → 折り返し＆上詰め。
/// 結合解除と書式は失敗しても続行する。
pub fn write_comment_block<H: SheetHost + ?Sized>(
    host: &mut H,
    block: &CommentBlock,
    text: &str,
) -> Result<()> {
    let range = CellRange::from(block);

    if let Err(e) = host.unmerge(&range) {
        tracing::debug!("{} の結合解除をスキップ: {}", block, e);
    }
    host.merge(&range)?;
    host.write_text(range.first_row, range.first_col, text)?;
    if let Err(e) = host.set_wrap_top(&range) {
        tracing::debug!("{} の書式設定をスキップ: {}", block, e);
    }

    Ok(())
}
