//! In-process `.pbit` archive strategy.

use super::strategy::{
    verify_package, CompileContext, CompileStrategy, StrategyFailure, StrategyOutcome,
};
use crate::config::StrategyKind;
use crate::generator::{archive_entry_name, content_types_xml, PackageFileSet};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";

/// Zips the project files directly. Needs no external tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveStrategy;

impl CompileStrategy for ArchiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Archive
    }

    fn compile(&self, ctx: &CompileContext<'_>) -> Result<StrategyOutcome, StrategyFailure> {
        write_archive(ctx.files, ctx.output_path).map_err(|source| StrategyFailure::Io {
            path: ctx.output_path.to_path_buf(),
            source,
        })?;

        let package = verify_package(ctx.output_path, self.kind())?;
        Ok(StrategyOutcome::Compiled(package))
    }
}

/// Write the file set as a `.pbit` archive at `output`.
pub fn write_archive(files: &PackageFileSet, output: &Path) -> io::Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = ZipWriter::new(File::create(output)?);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    let entries: Vec<&str> = files.paths().map(archive_entry_name).collect();
    writer.start_file(CONTENT_TYPES_ENTRY, options)?;
    writer.write_all(content_types_xml(entries).as_bytes())?;

    for (path, file) in files.iter() {
        writer.start_file(archive_entry_name(path), options)?;
        writer.write_all(file.as_bytes())?;
    }

    writer.finish()?;
    Ok(())
}
