//! Compilation strategy interface and failure classification.

use crate::config::StrategyKind;
use crate::generator::PackageFileSet;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Output markers of a pbi-tools build that targets a newer Desktop runtime.
const VERSION_MISMATCH_MARKERS: [&str; 2] = ["MissingMethodException", "Method not found"];

/// Why a strategy did not produce a package.
///
/// Never fatal to the conversion; the chain moves on to the next strategy.
#[derive(Debug, Error)]
pub enum StrategyFailure {
    #[error("{tool} is not available")]
    Unavailable { tool: String },

    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not finish within {}s", .timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },

    #[error("{tool} exited with {}: {detail}", exit_label(.code))]
    ProcessFailed {
        tool: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("{tool} reported success but produced no package at {path}")]
    MissingOutput { tool: String, path: PathBuf },

    #[error("{tool} is incompatible with the installed Power BI Desktop: {detail}")]
    VersionIncompatibility { tool: String, detail: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code".to_string(),
    }
}

impl StrategyFailure {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyFailure::Unavailable { .. } => "unavailable",
            StrategyFailure::Spawn { .. } => "spawn",
            StrategyFailure::Timeout { .. } => "timeout",
            StrategyFailure::ProcessFailed { .. } => "process-failed",
            StrategyFailure::MissingOutput { .. } => "missing-output",
            StrategyFailure::VersionIncompatibility { .. } => "version-incompatibility",
            StrategyFailure::Io { .. } => "io",
        }
    }

    /// Operator hints for resolving the failure.
    pub fn remediation(&self) -> Vec<&'static str> {
        match self {
            StrategyFailure::Unavailable { .. } => vec![
                "Install the tool and make it available on PATH, or point the matching TB2PBI_* environment variable at it",
            ],
            StrategyFailure::VersionIncompatibility { .. } => vec![
                "Update pbi-tools: choco upgrade pbi-tools",
                "Use the project files manually with Power BI Desktop",
                "Downgrade Power BI Desktop to a version supported by pbi-tools",
            ],
            StrategyFailure::Timeout { .. } => {
                vec!["Retry with a larger --timeout or compile the project manually"]
            }
            _ => Vec::new(),
        }
    }
}

/// Classify a failed process run from its exit code and captured output.
pub fn classify_process_failure(
    tool: &str,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> StrategyFailure {
    let mismatch = VERSION_MISMATCH_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker) || stdout.contains(marker));

    let detail = last_meaningful_line(stderr)
        .or_else(|| last_meaningful_line(stdout))
        .unwrap_or_default()
        .to_string();

    if mismatch {
        StrategyFailure::VersionIncompatibility {
            tool: tool.to_string(),
            detail,
        }
    } else {
        StrategyFailure::ProcessFailed {
            tool: tool.to_string(),
            code,
            detail,
        }
    }
}

fn last_meaningful_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|l| !l.is_empty())
}

/// A package produced by a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPackage {
    pub path: PathBuf,
    pub size: u64,
    pub strategy: StrategyKind,
}

/// Successful strategy result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// The package file exists.
    Compiled(CompiledPackage),
    /// The project was handed to an interactive tool; the operator finishes it.
    HandedOff { instructions: Vec<String> },
}

/// Inputs shared by all strategies of one conversion.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    /// Directory holding the written project files.
    pub project_dir: &'a Path,
    /// Package to produce.
    pub output_path: &'a Path,
    /// The project files in memory.
    pub files: &'a PackageFileSet,
    /// Timeout for blocking external processes.
    pub timeout: Duration,
}

/// One way of turning the project into a `.pbit` package.
pub trait CompileStrategy: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Try to produce the package.
    fn compile(&self, ctx: &CompileContext<'_>) -> Result<StrategyOutcome, StrategyFailure>;
}

/// Remove a package left at `path` by an earlier run.
///
/// External tools are judged by the file they leave behind, so nothing may
/// exist there before they start.
pub fn clear_stale_output(path: &Path) -> Result<(), StrategyFailure> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed stale package");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StrategyFailure::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Confirm that `path` exists and is non-empty.
pub fn verify_package(
    path: &Path,
    strategy: StrategyKind,
) -> Result<CompiledPackage, StrategyFailure> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(CompiledPackage {
            path: path.to_path_buf(),
            size: meta.len(),
            strategy,
        }),
        _ => Err(StrategyFailure::MissingOutput {
            tool: strategy.to_string(),
            path: path.to_path_buf(),
        }),
    }
}
