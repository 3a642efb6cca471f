//! Project file set assembly and writing.

use super::documents::{DiagramLayout, Metadata, ReportLayout, SecurityBindings};
use crate::config::{ConvertOptions, FORMAT_VERSION};
use crate::error::{ConvertError, Result};
use crate::model::TabularModel;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MODEL_PATH: &str = "DataModelSchema/Model.bim";
pub const METADATA_PATH: &str = "Metadata";
pub const VERSION_PATH: &str = "Version.txt";
pub const SETTINGS_PATH: &str = "Settings";
pub const SECURITY_BINDINGS_PATH: &str = "SecurityBindings";
pub const LAYOUT_PATH: &str = "Report/Layout";
pub const DIAGRAM_LAYOUT_PATH: &str = "DataModelSchema/DiagramLayout";
pub const STATIC_RESOURCES_PATH: &str = "Report/StaticResources.json";

/// Paths every project must contain.
pub const REQUIRED_PATHS: [&str; 6] = [
    MODEL_PATH,
    METADATA_PATH,
    VERSION_PATH,
    SETTINGS_PATH,
    SECURITY_BINDINGS_PATH,
    LAYOUT_PATH,
];

/// Content of one project file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageFile {
    Text(String),
    Binary(Vec<u8>),
}

impl PackageFile {
    /// Raw bytes of the file.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PackageFile::Text(s) => s.as_bytes(),
            PackageFile::Binary(b) => b,
        }
    }

    /// Text content, if the file is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PackageFile::Text(s) => Some(s),
            PackageFile::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Project files keyed by `/`-separated relative path, in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFileSet {
    files: BTreeMap<String, PackageFile>,
}

impl PackageFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, file: PackageFile) {
        self.files.insert(path.into(), file);
    }

    /// Add or replace a text file.
    pub fn insert_text(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.insert(path, PackageFile::Text(text.into()));
    }

    pub fn get(&self, path: &str) -> Option<&PackageFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Files in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageFile)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Required paths that are absent.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_PATHS
            .iter()
            .copied()
            .filter(|path| !self.contains(path))
            .collect()
    }
}

/// Build the project file set for a translated model.
pub fn assemble_package(model: &TabularModel, options: &ConvertOptions) -> Result<PackageFileSet> {
    let mut files = PackageFileSet::new();

    files.insert_text(MODEL_PATH, model.to_bim_json()?);
    files.insert_text(METADATA_PATH, serde_json::to_string(&Metadata::default())?);
    files.insert_text(VERSION_PATH, FORMAT_VERSION);

    let settings = match &options.settings {
        Some(value) => serde_json::to_string(value)?,
        None => "{}".to_string(),
    };
    files.insert_text(SETTINGS_PATH, settings);

    files.insert_text(
        SECURITY_BINDINGS_PATH,
        serde_json::to_string(&SecurityBindings::default())?,
    );
    files.insert_text(LAYOUT_PATH, serde_json::to_string(&ReportLayout::default())?);
    files.insert_text(
        DIAGRAM_LAYOUT_PATH,
        serde_json::to_string(&DiagramLayout::default())?,
    );
    files.insert_text(STATIC_RESOURCES_PATH, "{}");

    validate_package(&files)?;
    Ok(files)
}

/// Check that every required file is present and well formed.
pub fn validate_package(files: &PackageFileSet) -> Result<()> {
    let missing = files.missing_required();
    if !missing.is_empty() {
        return Err(ConvertError::IncompletePackage {
            message: format!("missing {}", missing.join(", ")),
        });
    }

    for path in REQUIRED_PATHS {
        let file = files.get(path).ok_or_else(|| ConvertError::IncompletePackage {
            message: format!("missing {}", path),
        })?;

        let text = file.as_text().ok_or_else(|| ConvertError::IncompletePackage {
            message: format!("{} is not text", path),
        })?;

        if path == VERSION_PATH {
            if text.trim().is_empty() {
                return Err(ConvertError::IncompletePackage {
                    message: format!("{} is empty", path),
                });
            }
            continue;
        }

        if let Err(e) = serde_json::from_str::<serde_json::Value>(text) {
            return Err(ConvertError::IncompletePackage {
                message: format!("{} is not valid JSON: {}", path, e),
            });
        }
    }

    Ok(())
}

/// Write every file under `dir`, creating parent directories.
///
/// Returns the written paths in file set order.
pub fn write_project(files: &PackageFileSet, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| ConvertError::assembly(dir, e))?;

    let mut written = Vec::with_capacity(files.len());
    for (relative, file) in files.iter() {
        let path = relative
            .split('/')
            .fold(dir.to_path_buf(), |acc, part| acc.join(part));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConvertError::assembly(parent, e))?;
        }
        std::fs::write(&path, file.as_bytes()).map_err(|e| ConvertError::assembly(&path, e))?;
        written.push(path);
    }

    tracing::debug!(dir = %dir.display(), files = written.len(), "Wrote project files");
    Ok(written)
}

/// Name of a project file inside the `.pbit` archive.
pub fn archive_entry_name(path: &str) -> &str {
    match path {
        MODEL_PATH => "DataModel",
        VERSION_PATH => "Version",
        other => other,
    }
}
