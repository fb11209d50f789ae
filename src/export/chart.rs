use super::ExportStrategy;
use crate::error::Result;
use crate::sheet::{Bounds, ContainerId, SheetHost, ShapeInfo};
use std::path::Path;

/// コンテナの最小サイズ（pt）
pub const MIN_CONTAINER_PT: f64 = 100.0;

/// 一時チャートに貼り付けて書き出す
pub struct ChartExport;

/// スコープを抜けると一時コンテナを削除する
struct ContainerGuard<'a> {
    host: &'a mut dyn SheetHost,
    id: ContainerId,
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.host.delete_container(self.id) {
            tracing::warn!("一時コンテナ {} を削除できません: {}", self.id, e);
        }
    }
}

impl ExportStrategy for ChartExport {
    fn name(&self) -> &'static str {
        "chart"
    }

    fn export(&self, host: &mut dyn SheetHost, shape: &ShapeInfo, dest: &Path) -> Result<()> {
        let bounds = container_bounds(&shape.bounds);
        let id = host.add_container(bounds)?;
        let guard = ContainerGuard { host, id };

        guard.host.paste_shape(guard.id, shape)?;
        guard.host.export_container(guard.id, dest)
    }
}

fn container_bounds(shape: &Bounds) -> Bounds {
    Bounds {
        left: shape.left,
        top: shape.top,
        width: shape.width.max(MIN_CONTAINER_PT),
        height: shape.height.max(MIN_CONTAINER_PT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_has_minimum_size() {
        let small = Bounds { left: 10.0, top: 20.0, width: 30.0, height: 250.0 };
        let b = container_bounds(&small);
        assert_eq!(b.width, 100.0);
        assert_eq!(b.height, 250.0);
        assert_eq!((b.left, b.top), (10.0, 20.0));
    }
}
