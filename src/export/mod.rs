//! 図形の画像化
//!
//! 書き出し方法を順番に試し、最初に「空でないファイル」を残したものを採用する。
//! 既定の順序はネイティブ書き出し → チャート経由。

mod chart;
mod native;

pub use chart::{ChartExport, MIN_CONTAINER_PT};
pub use native::NativeExport;

use crate::error::{ExportError, Result};
use crate::sheet::{SheetHost, ShapeInfo};
use std::path::Path;

/// 図形を画像ファイルに書き出す方法の1つ
pub trait ExportStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn export(&self, host: &mut dyn SheetHost, shape: &ShapeInfo, dest: &Path) -> Result<()>;
}

pub struct ShapeExporter {
    strategies: Vec<Box<dyn ExportStrategy>>,
}

impl Default for ShapeExporter {
    fn default() -> Self {
        Self::new(vec![Box::new(NativeExport), Box::new(ChartExport)])
    }
}

impl ShapeExporter {
    pub fn new(strategies: Vec<Box<dyn ExportStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// 図形を dest に書き出す。全方法が失敗したら原因をまとめて返す
    pub fn export(
        &self,
        host: &mut dyn SheetHost,
        shape: &ShapeInfo,
        dest: &Path,
    ) -> std::result::Result<(), ExportError> {
        if self.strategies.is_empty() {
            return Err(ExportError::NoStrategy);
        }

        let mut causes = Vec::new();

        for strategy in &self.strategies {
            let outcome = strategy
                .export(host, shape, dest)
                .and_then(|_| ensure_non_empty(dest));

            match outcome {
                Ok(()) => {
                    tracing::debug!("{}: {} で書き出し成功", shape.name, strategy.name());
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!("{}: {} 失敗: {}", shape.name, strategy.name(), e);
                    causes.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        Err(ExportError::AllStrategiesFailed { causes })
    }
}

/// 0バイトのファイルは失敗扱い
fn ensure_non_empty(dest: &Path) -> Result<()> {
    let len = std::fs::metadata(dest)?.len();
    if len == 0 {
        return Err(crate::error::PhotoInspectError::Host(format!(
            "{} が空です",
            dest.display()
        )));
    }
    Ok(())
}
