//! 点検済みコピー用のパーツ書き換え
//!
//! 元のXMLをイベント単位で流し、コメント欄のセル・`<mergeCells>`・
//! 折り返し書式だけを差し替える。その他の要素と属性は元のまま書き戻す。

use super::ooxml::{attr, parse_cell_ref};
use super::CellRange;
use crate::error::{PhotoInspectError, Result};
use photo_inspect_common::layout::column_letters;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fmt::Display;

/// worksheet の子要素で mergeCells より後ろに並ぶもの
const AFTER_MERGE_CELLS: &[&[u8]] = &[
    b"phoneticPr",
    b"conditionalFormatting",
    b"dataValidations",
    b"hyperlinks",
    b"printOptions",
    b"pageMargins",
    b"pageSetup",
    b"headerFooter",
    b"rowBreaks",
    b"colBreaks",
    b"customProperties",
    b"cellWatches",
    b"ignoredErrors",
    b"smartTags",
    b"drawing",
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// セル1つへの変更
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CellEdit {
    /// 書き込む文字列（インライン文字列として保存）
    pub text: Option<String>,
    /// cellXfs の番号
    pub style: Option<u32>,
}

/// (行, 列) → 変更。どちらも1始まり
pub(crate) type CellEdits = BTreeMap<(u32, u32), CellEdit>;

/// "H19"
pub(crate) fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

fn range_ref(range: &CellRange) -> String {
    format!(
        "{}:{}",
        cell_ref(range.first_row, range.first_col),
        cell_ref(range.last_row, range.last_col)
    )
}

// =============================================
// シートパーツ
// =============================================

/// 開いている `<row>`
struct OpenRow<'e> {
    number: u32,
    last_col: u32,
    cells: BTreeMap<u32, &'e CellEdit>,
}

/// セル値と結合範囲を差し替えたシートXMLを返す
///
/// `merges` はシートの結合範囲の全体で、元の `<mergeCells>` は捨てる。
pub(crate) fn rewrite_sheet_part(xml: &str, edits: &CellEdits, merges: &[CellRange]) -> Result<String> {
    let mut pending: BTreeMap<u32, BTreeMap<u32, &CellEdit>> = BTreeMap::new();
    for (&(row, col), edit) in edits {
        pending.entry(row).or_default().insert(col, edit);
    }

    let mut reader = Reader::from_str(xml);
    let mut out = PartWriter::default();
    let mut prefix = String::new();
    let mut depth = 0usize;
    let mut skip = 0usize;
    let mut in_sheet_data = false;
    let mut open_row: Option<OpenRow<'_>> = None;
    let mut last_row = 0u32;
    let mut merges_written = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| read_error(reader.buffer_position(), e))?;

        // 差し替えたセル・元の mergeCells の中身は読み飛ばす
        if skip > 0 {
            match &event {
                Event::Start(_) => skip += 1,
                Event::End(_) => skip -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match &event {
            Event::Start(e) => {
                let name = e.local_name();
                let local = name.as_ref();

                if depth == 0 && local == b"worksheet" {
                    prefix = element_prefix(e);
                }

                if depth == 1 {
                    if local == b"mergeCells" {
                        if !merges_written {
                            out.merges(&prefix, merges)?;
                            merges_written = true;
                        }
                        skip = 1;
                        continue;
                    }
                    if !merges_written && AFTER_MERGE_CELLS.iter().any(|n| *n == local) {
                        out.merges(&prefix, merges)?;
                        merges_written = true;
                    }
                    if local == b"sheetData" {
                        in_sheet_data = true;
                    }
                }

                if in_sheet_data && depth == 2 && local == b"row" {
                    let number = row_number(e).unwrap_or(last_row + 1);
                    last_row = number;
                    out.rows_before(&prefix, &mut pending, number)?;

                    let cells = pending.remove(&number).unwrap_or_default();
                    if cells.is_empty() {
                        out.event(&event)?;
                    } else {
                        out.event(&Event::Start(replace_attr(e, b"spans", None)))?;
                    }
                    open_row = Some(OpenRow { number, last_col: 0, cells });
                    depth += 1;
                    continue;
                }

                if depth == 3 && local == b"c" {
                    if let Some(row) = open_row.as_mut() {
                        let col = cell_column(e).unwrap_or(row.last_col + 1);
                        row.last_col = col;
                        out.cells_before(&prefix, row, col)?;

                        if let Some(edit) = row.cells.remove(&col) {
                            if edit.text.is_some() {
                                out.cell(&prefix, row.number, col, edit, attr(e, b"s"))?;
                                skip = 1;
                                continue;
                            }
                            out.event(&Event::Start(restyle(e, edit)))?;
                            depth += 1;
                            continue;
                        }
                    }
                }

                out.event(&event)?;
                depth += 1;
            }
            Event::Empty(e) => {
                let name = e.local_name();
                let local = name.as_ref();

                if depth == 1 {
                    if local == b"mergeCells" {
                        if !merges_written {
                            out.merges(&prefix, merges)?;
                            merges_written = true;
                        }
                        continue;
                    }
                    if !merges_written && AFTER_MERGE_CELLS.iter().any(|n| *n == local) {
                        out.merges(&prefix, merges)?;
                        merges_written = true;
                    }
                    if local == b"sheetData" && !pending.is_empty() {
                        out.start(&format!("{}sheetData", prefix))?;
                        out.rows_before(&prefix, &mut pending, u32::MAX)?;
                        out.end(&format!("{}sheetData", prefix))?;
                        continue;
                    }
                }

                if in_sheet_data && depth == 2 && local == b"row" {
                    let number = row_number(e).unwrap_or(last_row + 1);
                    last_row = number;
                    out.rows_before(&prefix, &mut pending, number)?;

                    match pending.remove(&number) {
                        Some(cells) => {
                            out.event(&Event::Start(replace_attr(e, b"spans", None)))?;
                            let mut row = OpenRow { number, last_col: 0, cells };
                            out.cells_before(&prefix, &mut row, u32::MAX)?;
                            out.end(&format!("{}row", prefix))?;
                        }
                        None => out.event(&event)?,
                    }
                    continue;
                }

                if depth == 3 && local == b"c" {
                    if let Some(row) = open_row.as_mut() {
                        let col = cell_column(e).unwrap_or(row.last_col + 1);
                        row.last_col = col;
                        out.cells_before(&prefix, row, col)?;

                        if let Some(edit) = row.cells.remove(&col) {
                            if edit.text.is_some() {
                                out.cell(&prefix, row.number, col, edit, attr(e, b"s"))?;
                            } else {
                                out.event(&Event::Empty(restyle(e, edit)))?;
                            }
                            continue;
                        }
                    }
                }

                out.event(&event)?;
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let name = e.local_name();
                let local = name.as_ref();

                if in_sheet_data && depth == 2 && local == b"row" {
                    if let Some(mut row) = open_row.take() {
                        out.cells_before(&prefix, &mut row, u32::MAX)?;
                    }
                } else if depth == 1 && local == b"sheetData" {
                    out.rows_before(&prefix, &mut pending, u32::MAX)?;
                    in_sheet_data = false;
                } else if depth == 0 && local == b"worksheet" && !merges_written {
                    out.merges(&prefix, merges)?;
                    merges_written = true;
                }

                out.event(&event)?;
            }
            Event::Eof => break,
            _ => out.event(&event)?,
        }
    }

    if !pending.is_empty() {
        return Err(PhotoInspectError::XlsxWrite(
            "シートに sheetData がありません".to_string(),
        ));
    }
    out.finish()
}

// =============================================
// スタイルパーツ
// =============================================

/// 折り返し・上詰めの書式を cellXfs の末尾に足し、その番号を返す
pub(crate) fn add_wrap_top_style(xml: &str) -> Result<(String, u32)> {
    let index = count_cell_xfs(xml)?
        .ok_or_else(|| PhotoInspectError::XlsxWrite("styles に cellXfs がありません".to_string()))?;
    let count = (index + 1).to_string();

    let mut reader = Reader::from_str(xml);
    let mut out = PartWriter::default();
    let mut prefix = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| read_error(reader.buffer_position(), e))?;
        match &event {
            Event::Start(e) if e.local_name().as_ref() == b"styleSheet" => {
                prefix = element_prefix(e);
                out.event(&event)?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                out.event(&Event::Start(replace_attr(e, b"count", Some(&count))))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => {
                out.wrap_top_xf(&prefix)?;
                out.event(&event)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"cellXfs" => {
                out.event(&Event::Start(replace_attr(e, b"count", Some(&count))))?;
                out.wrap_top_xf(&prefix)?;
                out.end(&format!("{}cellXfs", prefix))?;
            }
            Event::Eof => break,
            _ => out.event(&event)?,
        }
    }

    Ok((out.finish()?, index))
}

/// cellXfs 直下の xf の数（cellXfs が無ければ None）
fn count_cell_xfs(xml: &str) -> Result<Option<u32>> {
    let mut reader = Reader::from_str(xml);
    let mut count = None;
    let mut inside = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"cellXfs" => {
                inside = true;
                count = Some(0);
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"cellXfs" => {
                count = Some(0);
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => inside = false,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if inside && e.local_name().as_ref() == b"xf" => {
                count = count.map(|c| c + 1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(read_error(reader.buffer_position(), e)),
            _ => {}
        }
    }
    Ok(count)
}

// =============================================
// 書き出し
// =============================================

struct PartWriter {
    inner: Writer<Vec<u8>>,
}

impl Default for PartWriter {
    fn default() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }
}

impl PartWriter {
    fn event(&mut self, event: &Event<'_>) -> Result<()> {
        self.inner.write_event(event).map_err(write_error)
    }

    fn start(&mut self, name: &str) -> Result<()> {
        self.event(&Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(&Event::End(BytesEnd::new(name)))
    }

    /// `before` より前の未出力行を新しい `<row>` として書く
    fn rows_before<'e>(
        &mut self,
        prefix: &str,
        pending: &mut BTreeMap<u32, BTreeMap<u32, &'e CellEdit>>,
        before: u32,
    ) -> Result<()> {
        let rest = pending.split_off(&before);
        let rows = std::mem::replace(pending, rest);
        let row_name = format!("{}row", prefix);

        for (number, cells) in rows {
            let mut start = BytesStart::new(row_name.as_str());
            start.push_attribute(("r", number.to_string().as_str()));
            self.event(&Event::Start(start))?;
            let mut row = OpenRow { number, last_col: 0, cells };
            self.cells_before(prefix, &mut row, u32::MAX)?;
            self.end(&row_name)?;
        }
        Ok(())
    }

    /// 行内で `before` 列より前の未出力セルを書く
    fn cells_before(&mut self, prefix: &str, row: &mut OpenRow<'_>, before: u32) -> Result<()> {
        let rest = row.cells.split_off(&before);
        let cells = std::mem::replace(&mut row.cells, rest);
        for (col, edit) in cells {
            self.cell(prefix, row.number, col, edit, None)?;
        }
        Ok(())
    }

    fn cell(
        &mut self,
        prefix: &str,
        row: u32,
        col: u32,
        edit: &CellEdit,
        original_style: Option<String>,
    ) -> Result<()> {
        let name = format!("{}c", prefix);
        let mut start = BytesStart::new(name.as_str());
        start.push_attribute(("r", cell_ref(row, col).as_str()));
        if let Some(style) = edit.style.map(|s| s.to_string()).or(original_style) {
            start.push_attribute(("s", style.as_str()));
        }

        let Some(text) = &edit.text else {
            return self.event(&Event::Empty(start));
        };

        start.push_attribute(("t", "inlineStr"));
        self.event(&Event::Start(start))?;
        self.start(&format!("{}is", prefix))?;

        let t_name = format!("{}t", prefix);
        let mut t = BytesStart::new(t_name.as_str());
        t.push_attribute(("xml:space", "preserve"));
        self.event(&Event::Start(t))?;
        self.event(&Event::Text(BytesText::new(text)))?;
        self.end(&t_name)?;

        self.end(&format!("{}is", prefix))?;
        self.end(&name)
    }

    fn merges(&mut self, prefix: &str, merges: &[CellRange]) -> Result<()> {
        if merges.is_empty() {
            return Ok(());
        }
        let name = format!("{}mergeCells", prefix);
        let mut start = BytesStart::new(name.as_str());
        start.push_attribute(("count", merges.len().to_string().as_str()));
        self.event(&Event::Start(start))?;

        let cell_name = format!("{}mergeCell", prefix);
        for range in merges {
            let mut cell = BytesStart::new(cell_name.as_str());
            cell.push_attribute(("ref", range_ref(range).as_str()));
            self.event(&Event::Empty(cell))?;
        }
        self.end(&name)
    }

    fn wrap_top_xf(&mut self, prefix: &str) -> Result<()> {
        let name = format!("{}xf", prefix);
        let mut xf = BytesStart::new(name.as_str());
        xf.extend_attributes([
            ("numFmtId", "0"),
            ("fontId", "0"),
            ("fillId", "0"),
            ("borderId", "0"),
            ("xfId", "0"),
            ("applyAlignment", "1"),
        ]);
        self.event(&Event::Start(xf))?;

        let mut alignment = BytesStart::new(format!("{}alignment", prefix));
        alignment.extend_attributes([("vertical", "top"), ("wrapText", "1")]);
        self.event(&Event::Empty(alignment))?;
        self.end(&name)
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.inner.into_inner())
            .map_err(|e| PhotoInspectError::XlsxWrite(format!("UTF-8ではありません: {}", e)))
    }
}

// =============================================
// 属性
// =============================================

/// "x:worksheet" → "x:"
fn element_prefix(e: &BytesStart<'_>) -> String {
    e.name()
        .prefix()
        .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
        .unwrap_or_default()
}

fn row_number(e: &BytesStart<'_>) -> Option<u32> {
    attr(e, b"r").and_then(|v| v.parse().ok())
}

fn cell_column(e: &BytesStart<'_>) -> Option<u32> {
    attr(e, b"r").as_deref().and_then(parse_cell_ref).map(|(_, col)| col)
}

/// 属性 `key` を外し、`value` があれば付け直した要素
fn replace_attr(e: &BytesStart<'_>, key: &[u8], value: Option<&str>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for a in e.attributes().flatten() {
        if a.key.as_ref() != key {
            out.push_attribute((a.key.as_ref(), a.value.as_ref()));
        }
    }
    if let Some(value) = value {
        out.push_attribute((key, value.as_bytes()));
    }
    out
}

/// 書式だけ変えるセル
fn restyle(e: &BytesStart<'_>, edit: &CellEdit) -> BytesStart<'static> {
    match edit.style {
        Some(style) => replace_attr(e, b"s", Some(&style.to_string())),
        None => replace_attr(e, b"", None),
    }
}

fn read_error(position: usize, e: impl Display) -> PhotoInspectError {
    PhotoInspectError::XlsxWrite(format!("XMLの解析に失敗 (位置 {}): {}", position, e))
}

fn write_error(e: impl Display) -> PhotoInspectError {
    PhotoInspectError::XlsxWrite(format!("XMLの書き出しに失敗: {}", e))
}
