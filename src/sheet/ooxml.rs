//! xlsx パッケージ内のXMLパーツ読み取り
//!
//! calamine が扱わない部分（図形アンカー、行高さ、結合セル、リレーション）を
//! quick-xml で直接読む。

use super::{CellRange, ShapeKind};
use crate::error::{PhotoInspectError, Result};
use lazy_static::lazy_static;
use photo_inspect_common::layout::column_index;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;

/// 1pt = 12700 EMU
pub(crate) const EMU_PER_POINT: f64 = 12700.0;

pub(crate) const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
pub(crate) const REL_DRAWING: &str = "/drawing";
pub(crate) const REL_IMAGE: &str = "/image";

lazy_static! {
    static ref CELL_REF: Regex = Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").unwrap();
}

// =============================================
// セル参照
// =============================================

/// "H19" → (19, 8)
pub(crate) fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let caps = CELL_REF.captures(reference.trim())?;
    let col = column_index(caps.get(1)?.as_str())?;
    let row: u32 = caps.get(2)?.as_str().parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, col))
}

/// "H19:K22" または "A1"
pub(crate) fn parse_range_ref(reference: &str) -> Option<CellRange> {
    let (first, last) = match reference.split_once(':') {
        Some((a, b)) => (parse_cell_ref(a)?, parse_cell_ref(b)?),
        None => {
            let cell = parse_cell_ref(reference)?;
            (cell, cell)
        }
    };
    Some(CellRange {
        first_row: first.0.min(last.0),
        first_col: first.1.min(last.1),
        last_row: first.0.max(last.0),
        last_col: first.1.max(last.1),
    })
}

// =============================================
// パス解決
// =============================================

/// パーツに対応する .rels のパス
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// リレーションの Target をパッケージ内の絶対パスへ
pub(crate) fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match base_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// =============================================
// リレーション・ブック
// =============================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

pub(crate) fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut rels = Vec::new();
    for_each_element(xml, |e| {
        if e.local_name().as_ref() == b"Relationship" {
            rels.push(Relationship {
                id: attr(e, b"Id").unwrap_or_default(),
                rel_type: attr(e, b"Type").unwrap_or_default(),
                target: attr(e, b"Target").unwrap_or_default(),
            });
        }
    })?;
    Ok(rels)
}

/// ブック内のシート (名前, r:id)
pub(crate) fn parse_workbook_sheets(xml: &str) -> Result<Vec<(String, String)>> {
    let mut sheets = Vec::new();
    for_each_element(xml, |e| {
        if e.local_name().as_ref() == b"sheet" {
            if let (Some(name), Some(id)) = (attr(e, b"name"), attr(e, b"id")) {
                sheets.push((name, id));
            }
        }
    })?;
    Ok(sheets)
}

// =============================================
// シート
// =============================================

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct SheetPart {
    pub default_row_height: Option<f64>,
    pub row_heights: HashMap<u32, f64>,
    pub max_row: u32,
    pub merges: Vec<CellRange>,
    pub drawing_rid: Option<String>,
}

pub(crate) fn parse_sheet_part(xml: &str) -> Result<SheetPart> {
    let mut part = SheetPart::default();
    for_each_element(xml, |e| match e.local_name().as_ref() {
        b"sheetFormatPr" => {
            part.default_row_height = attr(e, b"defaultRowHeight").and_then(|v| v.parse().ok());
        }
        b"dimension" => {
            if let Some(range) = attr(e, b"ref").as_deref().and_then(parse_range_ref) {
                part.max_row = part.max_row.max(range.last_row);
            }
        }
        b"row" => {
            if let Some(row) = attr(e, b"r").and_then(|v| v.parse::<u32>().ok()) {
                part.max_row = part.max_row.max(row);
                if let Some(height) = attr(e, b"ht").and_then(|v| v.parse::<f64>().ok()) {
                    part.row_heights.insert(row, height);
                }
            }
        }
        b"mergeCell" => {
            if let Some(range) = attr(e, b"ref").as_deref().and_then(parse_range_ref) {
                part.merges.push(range);
            }
        }
        b"drawing" => {
            part.drawing_rid = attr(e, b"id");
        }
        _ => {}
    })?;
    Ok(part)
}

// =============================================
// 描画（図形アンカー）
// =============================================

/// xdr:from / xdr:to（0始まり、オフセットはEMU）
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct AnchorMarker {
    pub col: u32,
    pub col_off: i64,
    pub row: u32,
    pub row_off: i64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct DrawingAnchor {
    pub name: String,
    pub kind: Option<ShapeKind>,
    pub from: Option<AnchorMarker>,
    pub to: Option<AnchorMarker>,
    /// absoluteAnchor の位置（EMU）
    pub pos: Option<(i64, i64)>,
    /// 大きさ（EMU）
    pub ext: Option<(i64, i64)>,
    /// 画像リレーションID
    pub embed: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum MarkerField {
    Col,
    ColOff,
    Row,
    RowOff,
}

pub(crate) fn parse_drawing(xml: &str) -> Result<Vec<DrawingAnchor>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut anchors = Vec::new();
    let mut current: Option<DrawingAnchor> = None;
    let mut marker: Option<(bool, AnchorMarker)> = None;
    let mut field: Option<MarkerField> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                    current = Some(DrawingAnchor::default());
                }
                b"from" => marker = Some((true, AnchorMarker::default())),
                b"to" => marker = Some((false, AnchorMarker::default())),
                b"col" => field = Some(MarkerField::Col),
                b"colOff" => field = Some(MarkerField::ColOff),
                b"row" => field = Some(MarkerField::Row),
                b"rowOff" => field = Some(MarkerField::RowOff),
                _ => {
                    if let Some(anchor) = current.as_mut() {
                        apply_drawing_element(anchor, e);
                    }
                }
            },
            Ok(Event::Empty(ref e)) => {
                if let Some(anchor) = current.as_mut() {
                    apply_drawing_element(anchor, e);
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(field), Some((_, m))) = (field, marker.as_mut()) {
                    let text = e
                        .unescape()
                        .map_err(|e| PhotoInspectError::XlsxRead(format!("描画XML: {}", e)))?;
                    let value: i64 = text.trim().parse().unwrap_or(0);
                    match field {
                        MarkerField::Col => m.col = value.max(0) as u32,
                        MarkerField::ColOff => m.col_off = value,
                        MarkerField::Row => m.row = value.max(0) as u32,
                        MarkerField::RowOff => m.row_off = value,
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"from" | b"to" => {
                    if let (Some((is_from, m)), Some(anchor)) = (marker.take(), current.as_mut()) {
                        if is_from {
                            anchor.from = Some(m);
                        } else {
                            anchor.to = Some(m);
                        }
                    }
                }
                b"col" | b"colOff" | b"row" | b"rowOff" => field = None,
                b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                    if let Some(anchor) = current.take() {
                        anchors.push(anchor);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PhotoInspectError::XlsxRead(format!(
                    "描画XMLの解析に失敗 (位置 {}): {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(anchors)
}

fn apply_drawing_element(anchor: &mut DrawingAnchor, e: &BytesStart<'_>) {
    match e.local_name().as_ref() {
        b"pic" => set_kind(anchor, ShapeKind::Picture),
        b"sp" | b"cxnSp" | b"graphicFrame" => set_kind(anchor, ShapeKind::Other),
        b"grpSp" | b"contentPart" => set_kind(anchor, ShapeKind::Unknown),
        b"cNvPr" => {
            if anchor.name.is_empty() {
                anchor.name = attr(e, b"name").unwrap_or_default();
            }
        }
        b"blip" => {
            if anchor.embed.is_none() {
                anchor.embed = attr(e, b"embed");
            }
        }
        b"pos" => {
            let x = attr(e, b"x").and_then(|v| v.parse().ok());
            let y = attr(e, b"y").and_then(|v| v.parse().ok());
            if let (Some(x), Some(y)) = (x, y) {
                anchor.pos = Some((x, y));
            }
        }
        b"ext" => {
            // a:extLst 内の <a:ext uri="..."> は cx/cy を持たない
            let cx = attr(e, b"cx").and_then(|v| v.parse().ok());
            let cy = attr(e, b"cy").and_then(|v| v.parse().ok());
            if let (None, Some(cx), Some(cy)) = (anchor.ext, cx, cy) {
                anchor.ext = Some((cx, cy));
            }
        }
        _ => {}
    }
}

/// 最初に出てきた図形要素で種類を決める（グループ内の子は見ない）
fn set_kind(anchor: &mut DrawingAnchor, kind: ShapeKind) {
    if anchor.kind.is_none() {
        anchor.kind = Some(kind);
    }
}

// =============================================
// 共通
// =============================================

/// 開始タグ・空タグを順に渡す
fn for_each_element<F>(xml: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&BytesStart<'_>),
{
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => visit(e),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PhotoInspectError::XlsxRead(format!(
                    "XMLの解析に失敗 (位置 {}): {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

/// 名前空間接頭辞を無視して属性値を取る
pub(crate) fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            quick_xml::escape::unescape(&raw).ok().map(|v| v.into_owned())
        })
}
