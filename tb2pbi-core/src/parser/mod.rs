//! Workbook source parsing.

mod names;
mod package;
mod workbook;

pub use names::{sanitize_name, strip_brackets, NameAllocator};
pub use package::{read_workbook_bytes, read_workbook_source, RawWorkbookDocument};
pub use workbook::{extract_from_document, extract_workbook, formula_dependencies};

use crate::error::Result;
use crate::model::Workbook;
use std::path::Path;

/// Read and extract a workbook file.
pub fn parse_workbook_file(path: &Path) -> Result<Workbook> {
    let raw = read_workbook_source(path)?;
    extract_workbook(&raw)
}
