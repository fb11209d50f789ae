//! テスト用のシート・判定器

#![allow(dead_code)]

use photo_inspect::error::{PhotoInspectError, RequestError, Result};
use photo_inspect::inference::{inspection_from_payload, Inspection, Inspector};
use photo_inspect::sheet::{Bounds, CellRange, ContainerId, ShapeId, ShapeInfo, ShapeKind, SheetHost};
use photo_inspect_common::{RawPayload, RowMetrics};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// ネイティブ書き出しの挙動
#[derive(Debug, Clone)]
pub enum Native {
    Bytes(Vec<u8>),
    Empty,
    Fail,
}

/// メモリ上の写真帳シート
#[derive(Debug, Default)]
pub struct FakeSheet {
    pub shapes: Vec<ShapeInfo>,
    pub row_heights: HashMap<u32, f64>,
    pub last_row: u32,
    pub native: HashMap<ShapeId, Native>,
    /// チャート経由で書き出す内容（無ければ失敗）
    pub chart: HashMap<ShapeId, Vec<u8>>,
    pub merges: Vec<CellRange>,
    pub texts: HashMap<(u32, u32), String>,
    pub wrapped: Vec<CellRange>,
    pub containers: HashMap<ContainerId, (Bounds, Option<ShapeId>)>,
    pub containers_created: Vec<Bounds>,
    pub next_container: ContainerId,
    pub dests: Vec<PathBuf>,
}

impl FakeSheet {
    pub fn new(last_row: u32) -> Self {
        Self {
            last_row,
            ..Default::default()
        }
    }

    /// 写真を追加（ネイティブ書き出しは bytes を返す）
    pub fn add_photo(&mut self, name: &str, anchor_row: Option<u32>, bytes: &[u8]) -> ShapeId {
        let id = self.add_shape(name, ShapeKind::Picture, anchor_row);
        self.native.insert(id, Native::Bytes(bytes.to_vec()));
        id
    }

    pub fn add_shape(&mut self, name: &str, kind: ShapeKind, anchor_row: Option<u32>) -> ShapeId {
        let id = self.shapes.len();
        self.shapes.push(ShapeInfo {
            id,
            name: name.to_string(),
            kind,
            anchor_row,
            bounds: Bounds { left: 0.0, top: 0.0, width: 80.0, height: 60.0 },
        });
        id
    }

    pub fn text(&self, row: u32, col: u32) -> Option<&str> {
        self.texts.get(&(row, col)).map(String::as_str)
    }
}

impl RowMetrics for FakeSheet {
    fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    fn last_used_row(&self) -> u32 {
        self.last_row
    }
}

fn host_error(msg: &str) -> PhotoInspectError {
    PhotoInspectError::Host(msg.to_string())
}

impl SheetHost for FakeSheet {
    fn shapes(&self) -> Vec<ShapeInfo> {
        self.shapes.clone()
    }

    fn unmerge(&mut self, range: &CellRange) -> Result<()> {
        self.merges.retain(|m| !m.intersects(range));
        Ok(())
    }

    fn merge(&mut self, range: &CellRange) -> Result<()> {
        if self.merges.iter().any(|m| m.intersects(range)) {
            return Err(host_error("overlapping merge"));
        }
        self.merges.push(*range);
        Ok(())
    }

    fn write_text(&mut self, row: u32, col: u32, text: &str) -> Result<()> {
        self.texts.insert((row, col), text.to_string());
        Ok(())
    }

    fn set_wrap_top(&mut self, range: &CellRange) -> Result<()> {
        self.wrapped.push(*range);
        Ok(())
    }

    fn export_native(&mut self, shape: &ShapeInfo, dest: &Path) -> Result<()> {
        self.dests.push(dest.to_path_buf());
        match self.native.get(&shape.id) {
            Some(Native::Bytes(bytes)) => {
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            Some(Native::Empty) => {
                std::fs::write(dest, b"")?;
                Ok(())
            }
            Some(Native::Fail) | None => Err(host_error("native export unavailable")),
        }
    }

    fn add_container(&mut self, bounds: Bounds) -> Result<ContainerId> {
        let id = self.next_container;
        self.next_container += 1;
        self.containers.insert(id, (bounds, None));
        self.containers_created.push(bounds);
        Ok(id)
    }

    fn paste_shape(&mut self, container: ContainerId, shape: &ShapeInfo) -> Result<()> {
        if !self.chart.contains_key(&shape.id) {
            return Err(host_error("paste failed"));
        }
        let entry = self
            .containers
            .get_mut(&container)
            .ok_or_else(|| host_error("no container"))?;
        entry.1 = Some(shape.id);
        Ok(())
    }

    fn export_container(&mut self, container: ContainerId, dest: &Path) -> Result<()> {
        self.dests.push(dest.to_path_buf());
        let shape_id = self
            .containers
            .get(&container)
            .and_then(|(_, shape)| *shape)
            .ok_or_else(|| host_error("empty container"))?;
        let bytes = self.chart.get(&shape_id).cloned().unwrap_or_default();
        std::fs::write(dest, bytes)?;
        Ok(())
    }

    fn delete_container(&mut self, container: ContainerId) -> Result<()> {
        self.containers
            .remove(&container)
            .map(|_| ())
            .ok_or_else(|| host_error("no container"))
    }
}

/// 画像の中身で応答を決める判定器
///
/// - 中身が `fail:<status>` なら HTTP エラー
/// - それ以外は中身をそのままモデルの出力テキストとして扱う
/// - `fixed` があれば中身に関係なくそれを出力テキストにする
#[derive(Debug, Default)]
pub struct ScriptedInspector {
    pub calls: Mutex<Vec<(usize, String, String)>>,
    pub fixed: Option<String>,
}

impl ScriptedInspector {
    pub fn fixed(text: &str) -> Self {
        Self {
            fixed: Some(text.to_string()),
            ..Default::default()
        }
    }
}

impl Inspector for ScriptedInspector {
    async fn inspect(&self, image: &[u8], mime: &str, prompt: &str) -> Result<Inspection> {
        self.calls
            .lock()
            .unwrap()
            .push((image.len(), mime.to_string(), prompt.to_string()));

        let text = match &self.fixed {
            Some(fixed) => fixed.clone(),
            None => String::from_utf8_lossy(image).to_string(),
        };
        if let Some(status) = text.strip_prefix("fail:") {
            return Err(RequestError::Status {
                status: status.parse().unwrap_or(500),
                body: "upstream error".to_string(),
            }
            .into());
        }

        Ok(inspection_from_payload(gemini_payload(&text)))
    }
}

/// Gemini 形式のレスポンス
pub fn gemini_payload(text: &str) -> RawPayload {
    RawPayload::new(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}
