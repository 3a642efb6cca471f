//! Error types for Tableau to Power BI conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Error codes for conversion failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Input file not found (-1)
    FileNotFound = -1,
    /// Unreadable or unparseable source document (-2)
    SourceFormat = -2,
    /// No data source in the workbook (-11)
    Extraction = -11,
    /// Project directory could not be written (E300)
    Assembly = 300,
}

/// Fatal conversion error.
///
/// These abort the conversion immediately. Packaging failures are not part of
/// this type; see [`crate::compiler::StrategyFailure`].
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unreadable workbook source {path}: {message}")]
    SourceFormat { path: PathBuf, message: String },

    #[error("No data source found in workbook")]
    NoDataSource,

    #[error("Failed to write project file {path}: {source}")]
    AssemblyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Incomplete package: {message}")]
    IncompletePackage { message: String },

    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    /// Build a source format error for `path`.
    pub fn source_format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ConvertError::SourceFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build an assembly error for a failed write of `path`.
    pub fn assembly(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::AssemblyIo {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConvertError::FileNotFound { .. } => ErrorCode::FileNotFound,
            ConvertError::SourceFormat { .. } => ErrorCode::SourceFormat,
            ConvertError::NoDataSource => ErrorCode::Extraction,
            ConvertError::AssemblyIo { .. } => ErrorCode::Assembly,
            ConvertError::IncompletePackage { .. } => ErrorCode::Assembly,
            ConvertError::InvalidModel { .. } => ErrorCode::Assembly,
            ConvertError::Json(_) => ErrorCode::Assembly,
        }
    }

    /// Get the numeric error code value.
    pub fn code_value(&self) -> i32 {
        self.code() as i32
    }

    /// Whether this error means the input could not be read as a workbook.
    pub fn is_source_format(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::SourceFormat | ErrorCode::FileNotFound
        )
    }
}

/// Result type alias for converter operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
