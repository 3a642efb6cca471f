//! Workbook source reader for `.twb` and `.twbx` files.

use crate::error::{ConvertError, Result};
use crate::model::ExtractEntry;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Extensions of embedded data extracts.
const EXTRACT_EXTENSIONS: [&str; 2] = [".hyper", ".tde"];

/// Raw workbook XML plus package metadata.
#[derive(Debug, Clone)]
pub struct RawWorkbookDocument {
    /// Source file path.
    pub path: PathBuf,
    /// Archive entry holding the workbook, for packaged workbooks.
    pub entry_name: Option<String>,
    /// Workbook XML text.
    pub xml: String,
    /// Embedded data extracts (recorded, not decoded).
    pub extracts: Vec<ExtractEntry>,
}

impl RawWorkbookDocument {
    /// Wrap XML text that did not come from a file.
    pub fn from_xml(xml: impl Into<String>) -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            entry_name: None,
            xml: xml.into(),
            extracts: Vec::new(),
        }
    }

    /// Parse the XML text into a tree.
    pub fn document(&self) -> Result<roxmltree::Document<'_>> {
        roxmltree::Document::parse(&self.xml)
            .map_err(|e| ConvertError::source_format(&self.path, format!("invalid XML: {}", e)))
    }
}

/// Read a workbook source file.
///
/// Packaged workbooks (`.twbx`) are opened as zip archives and the top-level
/// `.twb` entry is read; plain workbooks are read directly. Files with other
/// extensions are sniffed by content.
pub fn read_workbook_source(path: &Path) -> Result<RawWorkbookDocument> {
    if !path.exists() {
        return Err(ConvertError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path)
        .map_err(|e| ConvertError::source_format(path, format!("cannot read file: {}", e)))?;

    read_workbook_bytes(path, &bytes)
}

/// Read a workbook source from bytes already in memory.
pub fn read_workbook_bytes(path: &Path, bytes: &[u8]) -> Result<RawWorkbookDocument> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let packaged = match extension.as_str() {
        "twbx" => true,
        "twb" => false,
        _ => bytes.starts_with(&ZIP_MAGIC),
    };

    if packaged {
        read_packaged(path, bytes)
    } else {
        let xml = decode_xml_text(path, bytes.to_vec())?;
        Ok(RawWorkbookDocument {
            path: path.to_path_buf(),
            entry_name: None,
            xml,
            extracts: Vec::new(),
        })
    }
}

fn read_packaged(path: &Path, bytes: &[u8]) -> Result<RawWorkbookDocument> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::source_format(path, format!("not a valid package: {}", e)))?;

    let names: Vec<String> = zip.file_names().map(|s| s.to_string()).collect();

    let entry_name = find_workbook_entry(&names).ok_or_else(|| {
        ConvertError::source_format(path, "package contains no .twb workbook entry")
    })?;

    let extracts = list_extracts(&mut zip, &names);

    let mut buf = Vec::new();
    {
        let mut entry = zip.by_name(&entry_name).map_err(|e| {
            ConvertError::source_format(path, format!("cannot open entry {}: {}", entry_name, e))
        })?;
        entry.read_to_end(&mut buf).map_err(|e| {
            ConvertError::source_format(path, format!("cannot read entry {}: {}", entry_name, e))
        })?;
    }

    let xml = decode_xml_text(path, buf)?;

    tracing::debug!(
        entry = %entry_name,
        extracts = extracts.len(),
        "Read packaged workbook"
    );

    Ok(RawWorkbookDocument {
        path: path.to_path_buf(),
        entry_name: Some(entry_name),
        xml,
        extracts,
    })
}

/// Pick the workbook entry: a top-level `.twb` first, else the shallowest one.
fn find_workbook_entry(names: &[String]) -> Option<String> {
    let mut candidates: Vec<&String> = names
        .iter()
        .filter(|n| !n.ends_with('/') && !n.starts_with("__MACOSX/"))
        .filter(|n| n.to_lowercase().ends_with(".twb"))
        .collect();

    candidates.sort_by_key(|n| n.matches('/').count());
    candidates.first().map(|n| n.to_string())
}

fn list_extracts<R: Read + Seek>(zip: &mut ZipArchive<R>, names: &[String]) -> Vec<ExtractEntry> {
    let mut extracts = Vec::new();
    for name in names {
        let lower = name.to_lowercase();
        if !EXTRACT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            continue;
        }
        // Size comes from the central directory; the entry is never decompressed.
        match zip.by_name(name) {
            Ok(entry) => extracts.push(ExtractEntry {
                name: name.clone(),
                size: entry.size(),
            }),
            Err(e) => {
                tracing::warn!(entry = %name, error = %e, "Skipping unreadable extract entry")
            }
        }
    }
    extracts
}

fn decode_xml_text(path: &Path, bytes: Vec<u8>) -> Result<String> {
    let text = String::from_utf8(bytes)
        .map_err(|e| ConvertError::source_format(path, format!("not UTF-8 text: {}", e)))?;

    let text = match text.strip_prefix('\u{FEFF}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    };

    if text.trim().is_empty() {
        return Err(ConvertError::source_format(path, "workbook XML is empty"));
    }

    Ok(text)
}
