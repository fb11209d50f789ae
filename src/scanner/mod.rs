//! 写真の検出
//!
//! - シート上の図形から写真を選び、アンカー行とコメント欄を決める
//! - フォルダ指定時は対象ブックを列挙する

use crate::error::{PhotoInspectError, Result};
use crate::sheet::{SheetHost, ShapeInfo, ShapeKind};
use photo_inspect_common::{estimate_row_from_top, CommentBlock, SheetLayout};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 処理済みブックの接尾辞
pub const OUTPUT_SUFFIX: &str = "_点検済";

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];

/// 写真1枚分の処理単位
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoBlock {
    pub shape: ShapeInfo,
    pub anchor_row: u32,
    /// アンカー行を上端位置から推定した
    pub estimated: bool,
    pub comment: CommentBlock,
}

/// 写真かどうか
///
/// 種類が取れない図形は名前で判断する（"picture" 大小無視、または「画像」）
pub fn is_photograph(shape: &ShapeInfo) -> bool {
    match shape.kind {
        ShapeKind::Picture => true,
        ShapeKind::Other => false,
        ShapeKind::Unknown => {
            shape.name.to_lowercase().contains("picture") || shape.name.contains("画像")
        }
    }
}

/// シート上の写真をアンカー行付きで列挙する（図形の並び順のまま）
pub fn scan_photos<H: SheetHost + ?Sized>(host: &H, layout: &SheetLayout) -> Vec<PhotoBlock> {
    host.shapes()
        .into_iter()
        .filter(|shape| {
            let keep = is_photograph(shape);
            if !keep {
                tracing::debug!("写真以外の図形をスキップ: {}", shape.name);
            }
            keep
        })
        .map(|shape| {
            let (anchor_row, estimated) = match shape.anchor_row {
                Some(row) => (row, false),
                None => (estimate_row_from_top(host, shape.bounds.top), true),
            };
            let comment = layout.comment_block(anchor_row);
            PhotoBlock {
                shape,
                anchor_row,
                estimated,
                comment,
            }
        })
        .collect()
}

/// 入力パスから対象ブックを列挙する
///
/// ファイルならそのまま、フォルダなら直下の .xlsx/.xlsm（ロックファイルと出力済みは除く）
pub fn find_workbooks(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(PhotoInspectError::FileNotFound(path.display().to_string()));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut workbooks: Vec<PathBuf> = WalkDir::new(path)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_target_workbook(p))
        .collect();

    workbooks.sort();
    Ok(workbooks)
}

fn is_target_workbook(path: &Path) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let ext = ext.to_string_lossy().to_lowercase();
    if !WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    !stem.starts_with("~$") && !stem.ends_with(OUTPUT_SUFFIX)
}

/// 出力先: 指定がなければ入力と同じ場所に `<stem>_点検済.<元の拡張子>`
///
/// .xlsm はマクロを含んだまま複製するので拡張子も引き継ぐ。
pub fn output_path_for(input: &Path, output: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook".to_string());
    let extension = match input.extension().map(|e| e.to_string_lossy().to_lowercase()) {
        Some(ext) if ext == "xlsm" => "xlsm",
        _ => "xlsx",
    };
    let file_name = format!("{}{}.{}", stem, OUTPUT_SUFFIX, extension);

    match output {
        Some(out) if out.is_dir() || out.extension().is_none() => out.join(file_name),
        Some(out) => out.to_path_buf(),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(file_name),
    }
}
