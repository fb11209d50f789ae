use super::ExportStrategy;
use crate::error::Result;
use crate::sheet::{SheetHost, ShapeInfo};
use std::path::Path;

/// ホストの直接書き出し
pub struct NativeExport;

impl ExportStrategy for NativeExport {
    fn name(&self) -> &'static str {
        "native"
    }

    fn export(&self, host: &mut dyn SheetHost, shape: &ShapeInfo, dest: &Path) -> Result<()> {
        host.export_native(shape, dest)
    }
}
