//! xlsx ファイルを開いて写真帳シートとして扱う
//!
//! - シートの有無・最終行: calamine
//! - 図形・行高さ・結合セル: パッケージ内XMLを直接読む
//! - 保存: 元のパッケージを丸ごと複製し、写真帳シートとスタイルのパーツだけ書き換える
//!   （他のシート・列幅・書式・図形・VBAプロジェクトはそのまま残る）

use super::ooxml::{self, DrawingAnchor, Relationship, EMU_PER_POINT};
use super::patch::{self, CellEdit, CellEdits};
use super::{Bounds, CellRange, ContainerId, ShapeId, ShapeInfo, ShapeKind, SheetHost};
use crate::error::{PhotoInspectError, Result};
use calamine::{open_workbook_auto, Reader};
use image::{imageops, ImageFormat, Rgba, RgbaImage};
use photo_inspect_common::layout::DEFAULT_ROW_HEIGHT_PT;
use photo_inspect_common::RowMetrics;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const REL_STYLES: &str = "/styles";

/// 列幅が取れないときの既定値（pt, 8.43文字 ≒ 64px）
const DEFAULT_COL_WIDTH_PT: f64 = 48.0;

/// pt → px (96dpi)
const PT_TO_PX: f64 = 96.0 / 72.0;

#[derive(Debug, Clone)]
struct Media {
    bytes: Vec<u8>,
    extension: String,
}

#[derive(Debug, Clone)]
struct SheetPicture {
    info: ShapeInfo,
    media: Option<Media>,
}

#[derive(Debug)]
struct Container {
    bounds: Bounds,
    canvas: Option<RgbaImage>,
}

/// xlsx ファイル上の写真帳シート
#[derive(Debug)]
pub struct XlsxSheet {
    source: PathBuf,
    sheet_name: String,
    /// パッケージ内のシートパーツ（"xl/worksheets/sheet2.xml" など）
    sheet_part: String,
    row_heights: HashMap<u32, f64>,
    default_row_height: Option<f64>,
    last_row: u32,
    merges: Vec<CellRange>,
    wrap_top: HashSet<CellRange>,
    texts: HashMap<(u32, u32), String>,
    pictures: Vec<SheetPicture>,
    containers: HashMap<ContainerId, Container>,
    next_container: ContainerId,
}

impl XlsxSheet {
    /// ブックを開いてシートを読み込む
    pub fn open(path: &Path, sheet_name: &str) -> Result<Self> {
        if !path.exists() {
            return Err(PhotoInspectError::FileNotFound(path.display().to_string()));
        }

        let cell_last_row = read_last_row(path, sheet_name)?;
        let mut archive = open_archive(path)?;

        let sheet_part_path = find_sheet_part(&mut archive, sheet_name)?;
        let sheet_xml = read_part(&mut archive, &sheet_part_path)?
            .ok_or_else(|| PhotoInspectError::XlsxRead(format!("{} がありません", sheet_part_path)))?;
        let sheet_part = ooxml::parse_sheet_part(&sheet_xml)?;

        let mut sheet = Self {
            source: path.to_path_buf(),
            sheet_name: sheet_name.to_string(),
            sheet_part: sheet_part_path.clone(),
            row_heights: sheet_part.row_heights,
            default_row_height: sheet_part.default_row_height,
            last_row: sheet_part.max_row.max(cell_last_row),
            merges: sheet_part.merges,
            wrap_top: HashSet::new(),
            texts: HashMap::new(),
            pictures: Vec::new(),
            containers: HashMap::new(),
            next_container: 0,
        };

        if let Some(rid) = sheet_part.drawing_rid {
            sheet.load_drawing(&mut archive, &sheet_part_path, &rid)?;
        }

        tracing::debug!(
            "{} / {}: 図形 {} 件, 最終行 {}",
            path.display(),
            sheet_name,
            sheet.pictures.len(),
            sheet.last_row
        );

        Ok(sheet)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// 書き込んだ値（テスト・確認用）
    pub fn text_at(&self, row: u32, col: u32) -> Option<&str> {
        self.texts.get(&(row, col)).map(String::as_str)
    }

    /// 現在の結合セル一覧
    pub fn merged_ranges(&self) -> &[CellRange] {
        &self.merges
    }

    /// 残っている一時コンテナの数
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    fn load_drawing<R: Read + Seek>(
        &mut self,
        archive: &mut ZipArchive<R>,
        sheet_part_path: &str,
        drawing_rid: &str,
    ) -> Result<()> {
        let sheet_rels = read_rels(archive, sheet_part_path)?;
        let Some(drawing_rel) = sheet_rels
            .iter()
            .find(|r| r.id == drawing_rid && r.rel_type.ends_with(ooxml::REL_DRAWING))
        else {
            tracing::warn!("描画リレーション {} が見つかりません", drawing_rid);
            return Ok(());
        };
        let drawing_path = ooxml::resolve_target(sheet_part_path, &drawing_rel.target);
        let Some(drawing_xml) = read_part(archive, &drawing_path)? else {
            tracing::warn!("{} がありません", drawing_path);
            return Ok(());
        };

        let drawing_rels = read_rels(archive, &drawing_path)?;
        let anchors = ooxml::parse_drawing(&drawing_xml)?;

        for (id, anchor) in anchors.into_iter().enumerate() {
            let media = match anchor.embed.as_deref() {
                Some(rid) => self.load_media(archive, &drawing_path, &drawing_rels, rid)?,
                None => None,
            };
            let picture = self.picture_from_anchor(id, anchor, media);
            self.pictures.push(picture);
        }

        Ok(())
    }

    fn load_media<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        drawing_path: &str,
        rels: &[Relationship],
        rid: &str,
    ) -> Result<Option<Media>> {
        let Some(rel) = rels
            .iter()
            .find(|r| r.id == rid && r.rel_type.ends_with(ooxml::REL_IMAGE))
        else {
            return Ok(None);
        };
        let media_path = ooxml::resolve_target(drawing_path, &rel.target);
        let Some(bytes) = read_part_bytes(archive, &media_path)? else {
            tracing::warn!("画像 {} がありません", media_path);
            return Ok(None);
        };
        let extension = Path::new(&media_path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Ok(Some(Media { bytes, extension }))
    }

    fn picture_from_anchor(
        &self,
        id: ShapeId,
        anchor: DrawingAnchor,
        media: Option<Media>,
    ) -> SheetPicture {
        let emu_to_pt = |emu: i64| emu as f64 / EMU_PER_POINT;

        let (anchor_row, top, left) = match (anchor.from, anchor.pos) {
            (Some(from), _) => {
                let row = from.row + 1;
                let top = self.rows_top(row) + emu_to_pt(from.row_off);
                let left = from.col as f64 * DEFAULT_COL_WIDTH_PT + emu_to_pt(from.col_off);
                (Some(row), top, left)
            }
            (None, Some((x, y))) => (None, emu_to_pt(y), emu_to_pt(x)),
            (None, None) => (None, 0.0, 0.0),
        };

        let (width, height) = match (anchor.ext, anchor.from, anchor.to) {
            (Some((cx, cy)), _, _) => (emu_to_pt(cx), emu_to_pt(cy)),
            (None, Some(from), Some(to)) => {
                let bottom = self.rows_top(to.row + 1) + emu_to_pt(to.row_off);
                let right = to.col as f64 * DEFAULT_COL_WIDTH_PT + emu_to_pt(to.col_off);
                (right - left, bottom - self.rows_top(from.row + 1) - emu_to_pt(from.row_off))
            }
            _ => (0.0, 0.0),
        };

        SheetPicture {
            info: ShapeInfo {
                id,
                name: anchor.name,
                kind: anchor.kind.unwrap_or(ShapeKind::Unknown),
                anchor_row,
                bounds: Bounds {
                    left,
                    top,
                    width: width.max(0.0),
                    height: height.max(0.0),
                },
            },
            media,
        }
    }

    /// 指定行の上端（pt）
    fn rows_top(&self, row: u32) -> f64 {
        (1..row)
            .map(|r| self.row_height(r).unwrap_or(DEFAULT_ROW_HEIGHT_PT))
            .sum()
    }

    fn picture(&self, shape: &ShapeInfo) -> Result<&SheetPicture> {
        self.pictures
            .get(shape.id)
            .ok_or_else(|| PhotoInspectError::Host(format!("図形 {} が見つかりません", shape.name)))
    }

    fn container_mut(&mut self, id: ContainerId) -> Result<&mut Container> {
        self.containers
            .get_mut(&id)
            .ok_or_else(|| PhotoInspectError::Host(format!("コンテナ {} が見つかりません", id)))
    }

    /// 書き込んだ文字列と折り返し書式をセル単位の変更にまとめる
    fn cell_edits(&self, wrap_style: Option<u32>) -> CellEdits {
        let mut edits = CellEdits::new();
        for (&cell, text) in &self.texts {
            edits.entry(cell).or_insert_with(CellEdit::default).text = Some(text.clone());
        }
        if let Some(style) = wrap_style {
            for range in &self.wrap_top {
                edits
                    .entry((range.first_row, range.first_col))
                    .or_insert_with(CellEdit::default)
                    .style = Some(style);
            }
        }
        edits
    }

    /// 点検済みのブックを書き出す
    ///
    /// 元ファイルの各パーツをそのまま複製し、写真帳シートと（必要なら）スタイルだけ差し替える。
    /// `output` が元ファイルと同じでもよい。
    pub fn save(&self, output: &Path) -> Result<()> {
        let mut archive = open_archive(&self.source)?;
        let mut replaced: HashMap<String, Vec<u8>> = HashMap::new();

        let wrap_style = if self.wrap_top.is_empty() {
            None
        } else {
            self.patch_styles(&mut archive, &mut replaced)?
        };

        let sheet_xml = read_part(&mut archive, &self.sheet_part)?
            .ok_or_else(|| PhotoInspectError::XlsxWrite(format!("{} がありません", self.sheet_part)))?;
        let sheet_xml = patch::rewrite_sheet_part(&sheet_xml, &self.cell_edits(wrap_style), &self.merges)?;
        replaced.insert(self.sheet_part.clone(), sheet_xml.into_bytes());

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;

        {
            let mut writer = ZipWriter::new(temp.as_file_mut());
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            for index in 0..archive.len() {
                let entry = archive.by_index_raw(index).map_err(zip_write_error)?;
                match replaced.remove(entry.name()) {
                    Some(bytes) => {
                        writer
                            .start_file(entry.name(), options)
                            .map_err(zip_write_error)?;
                        writer.write_all(&bytes)?;
                    }
                    None => writer.raw_copy_file(entry).map_err(zip_write_error)?,
                }
            }
            writer.finish().map_err(zip_write_error)?;
        }

        drop(archive);
        temp.persist(output).map_err(|e| PhotoInspectError::Io(e.error))?;
        tracing::debug!("{} を書き出しました", output.display());
        Ok(())
    }

    /// 折り返し・上詰めの書式を追加し、その番号を返す（追加できなければ書式なし）
    fn patch_styles<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        replaced: &mut HashMap<String, Vec<u8>>,
    ) -> Result<Option<u32>> {
        let workbook_path = workbook_part(archive)?;
        let Some(styles_path) = read_rels(archive, &workbook_path)?
            .into_iter()
            .find(|r| r.rel_type.ends_with(REL_STYLES))
            .map(|r| ooxml::resolve_target(&workbook_path, &r.target))
        else {
            tracing::warn!("スタイルパーツがないため、コメント欄の書式は設定しません");
            return Ok(None);
        };
        let Some(styles_xml) = read_part(archive, &styles_path)? else {
            tracing::warn!("{} がありません", styles_path);
            return Ok(None);
        };

        match patch::add_wrap_top_style(&styles_xml) {
            Ok((xml, index)) => {
                replaced.insert(styles_path, xml.into_bytes());
                Ok(Some(index))
            }
            Err(e) => {
                tracing::warn!("コメント欄の書式を追加できません: {}", e);
                Ok(None)
            }
        }
    }
}

impl RowMetrics for XlsxSheet {
    fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights
            .get(&row)
            .copied()
            .or(self.default_row_height)
    }

    fn last_used_row(&self) -> u32 {
        self.last_row
    }
}

impl SheetHost for XlsxSheet {
    fn shapes(&self) -> Vec<ShapeInfo> {
        self.pictures.iter().map(|p| p.info.clone()).collect()
    }

    fn unmerge(&mut self, range: &CellRange) -> Result<()> {
        self.merges.retain(|m| !m.intersects(range));
        self.wrap_top.retain(|m| !m.intersects(range));
        Ok(())
    }

    fn merge(&mut self, range: &CellRange) -> Result<()> {
        if let Some(existing) = self.merges.iter().find(|m| m.intersects(range)) {
            return Err(PhotoInspectError::Host(format!(
                "結合範囲が重なっています: {:?}",
                existing
            )));
        }
        self.merges.push(*range);
        Ok(())
    }

    fn write_text(&mut self, row: u32, col: u32, text: &str) -> Result<()> {
        if row == 0 || col == 0 {
            return Err(PhotoInspectError::Host(format!("不正なセル位置: ({}, {})", row, col)));
        }
        self.texts.insert((row, col), text.to_string());
        self.last_row = self.last_row.max(row);
        Ok(())
    }

    fn set_wrap_top(&mut self, range: &CellRange) -> Result<()> {
        self.wrap_top.insert(*range);
        Ok(())
    }

    fn export_native(&mut self, shape: &ShapeInfo, dest: &Path) -> Result<()> {
        let picture = self.picture(shape)?;
        let media = picture
            .media
            .as_ref()
            .ok_or_else(|| PhotoInspectError::Host(format!("{} に画像データがありません", shape.name)))?;

        // 埋め込み画像がそのまま PNG のときだけ直接書き出せる
        if media.extension != "png" {
            return Err(PhotoInspectError::Host(format!(
                "{} は {} 形式のため直接書き出せません",
                shape.name, media.extension
            )));
        }
        std::fs::write(dest, &media.bytes)?;
        Ok(())
    }

    fn add_container(&mut self, bounds: Bounds) -> Result<ContainerId> {
        let id = self.next_container;
        self.next_container += 1;
        self.containers.insert(id, Container { bounds, canvas: None });
        Ok(id)
    }

    fn paste_shape(&mut self, container: ContainerId, shape: &ShapeInfo) -> Result<()> {
        let media = self
            .picture(shape)?
            .media
            .clone()
            .ok_or_else(|| PhotoInspectError::Host(format!("{} に画像データがありません", shape.name)))?;
        let decoded = image::load_from_memory(&media.bytes)?;

        let target = self.container_mut(container)?;
        let width = (target.bounds.width * PT_TO_PX).round().max(1.0) as u32;
        let height = (target.bounds.height * PT_TO_PX).round().max(1.0) as u32;

        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let fitted = decoded.resize(width, height, imageops::FilterType::Triangle).to_rgba8();
        let x = (width - fitted.width()) / 2;
        let y = (height - fitted.height()) / 2;
        imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);

        target.canvas = Some(canvas);
        Ok(())
    }

    fn export_container(&mut self, container: ContainerId, dest: &Path) -> Result<()> {
        let target = self.container_mut(container)?;
        let canvas = target
            .canvas
            .as_ref()
            .ok_or_else(|| PhotoInspectError::Host(format!("コンテナ {} は空です", container)))?;
        canvas.save_with_format(dest, ImageFormat::Png)?;
        Ok(())
    }

    fn delete_container(&mut self, container: ContainerId) -> Result<()> {
        self.containers
            .remove(&container)
            .map(|_| ())
            .ok_or_else(|| PhotoInspectError::Host(format!("コンテナ {} が見つかりません", container)))
    }
}

// =============================================
// 読み込みヘルパー
// =============================================

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|e| PhotoInspectError::XlsxRead(format!("ZIPとして開けません: {}", e)))
}

/// シートの存在確認と、値の入った最終行
fn read_last_row(path: &Path, sheet_name: &str) -> Result<u32> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PhotoInspectError::XlsxRead(format!("{}: {}", path.display(), e)))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet_name) {
        return Err(PhotoInspectError::SheetNotFound(sheet_name.to_string()));
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| PhotoInspectError::XlsxRead(format!("{}: {}", sheet_name, e)))?;

    Ok(range.end().map(|(row, _)| row + 1).unwrap_or(0))
}

fn workbook_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    Ok(read_rels(archive, "")?
        .into_iter()
        .find(|r| r.rel_type.ends_with(ooxml::REL_OFFICE_DOCUMENT))
        .map(|r| ooxml::resolve_target("", &r.target))
        .unwrap_or_else(|| "xl/workbook.xml".to_string()))
}

fn find_sheet_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    sheet_name: &str,
) -> Result<String> {
    let workbook_path = workbook_part(archive)?;

    let workbook_xml = read_part(archive, &workbook_path)?
        .ok_or_else(|| PhotoInspectError::XlsxRead(format!("{} がありません", workbook_path)))?;
    let sheets = ooxml::parse_workbook_sheets(&workbook_xml)?;
    let (_, rid) = sheets
        .into_iter()
        .find(|(name, _)| name == sheet_name)
        .ok_or_else(|| PhotoInspectError::SheetNotFound(sheet_name.to_string()))?;

    read_rels(archive, &workbook_path)?
        .into_iter()
        .find(|r| r.id == rid)
        .map(|r| ooxml::resolve_target(&workbook_path, &r.target))
        .ok_or_else(|| PhotoInspectError::XlsxRead(format!("シート {} のリレーションがありません", sheet_name)))
}

/// パーツの .rels を読む（パーツ名が空ならパッケージの .rels）
fn read_rels<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Vec<Relationship>> {
    let rels_path = if part.is_empty() {
        "_rels/.rels".to_string()
    } else {
        ooxml::rels_path_for(part)
    };
    match read_part(archive, &rels_path)? {
        Some(xml) => ooxml::parse_relationships(&xml),
        None => Ok(Vec::new()),
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    match read_part_bytes(archive, name)? {
        Some(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| PhotoInspectError::XlsxRead(format!("{} がUTF-8ではありません: {}", name, e))),
        None => Ok(None),
    }
}

fn read_part_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(PhotoInspectError::XlsxRead(format!("{}: {}", name, e))),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn zip_write_error(e: zip::result::ZipError) -> PhotoInspectError {
    PhotoInspectError::XlsxWrite(format!("ZIPの書き出しに失敗: {}", e))
}
