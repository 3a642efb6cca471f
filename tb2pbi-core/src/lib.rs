//! tb2pbi-core - Core library for converting Tableau workbooks to Power BI templates.
//!
//! This library reads Tableau workbooks (`.twb` / `.twbx`), translates their data
//! sources into a Power BI tabular model, writes the Power BI project files and
//! packages them into a `.pbit` template through a chain of fallback strategies.
//!
//! # Example
//!
//! ```no_run
//! use tb2pbi_core::{convert_workbook, ConvertOptions, ToolInventory};
//! use std::path::Path;
//!
//! let options = ConvertOptions::new("sales.pbit");
//! let report = convert_workbook(Path::new("sales.twbx"), &options, ToolInventory::system()).unwrap();
//! if report.is_partial() {
//!     for step in report.manual_instructions() {
//!         println!("{}", step);
//!     }
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod parser;
pub mod transform;
pub mod validation;

// Re-exports for convenience
pub use compiler::{
    ChainOutcome, ChainReport, CompiledPackage, StrategyChain, StrategyFailure, ToolInventory,
};
pub use config::{ConvertOptions, StrategyKind};
pub use error::{ConvertError, ErrorCode, Result};
pub use generator::{assemble_package, write_project, PackageFileSet};
pub use model::{TabularModel, Workbook};
pub use parser::{extract_workbook, parse_workbook_file, read_workbook_source};
pub use transform::translate_workbook;
pub use validation::{validate_model, validate_workbook, ValidationResult};

use compiler::{CompileContext, ExternalTool};
use config::REPORT_FILE_NAME;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything a conversion produced.
#[derive(Debug, Serialize)]
pub struct ConversionReport {
    /// Source workbook.
    pub input: PathBuf,
    /// Requested package path.
    pub output_path: PathBuf,
    /// Directory holding the project files.
    pub project_dir: PathBuf,
    /// Extracted workbook inventory.
    pub workbook: Workbook,
    /// Workbook and model validation findings.
    pub validation: ValidationResult,
    /// Packaging attempts and their outcome.
    pub chain: ChainReport,
}

impl ConversionReport {
    /// The project was produced but no package was compiled.
    pub fn is_partial(&self) -> bool {
        !self.chain.is_compiled()
    }

    /// Steps for finishing the conversion by hand.
    pub fn manual_instructions(&self) -> Vec<String> {
        match &self.chain.outcome {
            ChainOutcome::Compiled(_) => Vec::new(),
            ChainOutcome::HandedOff { instructions, .. } => instructions.clone(),
            ChainOutcome::Exhausted => vec![
                format!("Project files are ready in {}", self.project_dir.display()),
                format!(
                    "Compile with: pbi-tools compile \"{}\" \"{}\" PBIT True",
                    self.project_dir.display(),
                    self.output_path.display()
                ),
                "Or open the project in Power BI Desktop and use File > Export > Power BI template"
                    .to_string(),
            ],
        }
    }
}

/// Read and extract a workbook without converting it.
pub fn analyze_workbook(input_path: &Path) -> Result<Workbook> {
    parse_workbook_file(input_path)
}

/// Convert a Tableau workbook to a Power BI template.
///
/// This is the main high-level function that performs the full conversion pipeline:
/// 1. Read and extract the workbook
/// 2. Translate it into a tabular model
/// 3. Validate the model
/// 4. Write the project files
/// 5. Package them through the strategy chain
///
/// Packaging failures do not fail the conversion; check
/// [`ConversionReport::is_partial`].
///
/// # Arguments
///
/// * `input_path` - Path to the input `.twb` or `.twbx` file
/// * `options` - Output locations, strategies and model settings
/// * `tools` - Installed external tools
pub fn convert_workbook(
    input_path: &Path,
    options: &ConvertOptions,
    tools: &ToolInventory,
) -> Result<ConversionReport> {
    let output_path = options.resolve_output_path(input_path);
    let project_dir = options.resolve_project_dir(&output_path);

    // Parse
    let raw = read_workbook_source(input_path)?;
    let workbook = extract_workbook(&raw)?;
    tracing::info!(
        datasources = workbook.datasources.len(),
        fields = workbook.field_count(),
        calculated = workbook.calculated_field_count(),
        worksheets = workbook.worksheets.len(),
        "Extracted workbook"
    );

    // Translate and validate
    let model = translate_workbook(&workbook, options);
    let mut validation = validate_workbook(&workbook);
    validation.merge(validate_model(&model)?);
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }
    if !validation.passed {
        return Err(ConvertError::InvalidModel {
            message: validation.errors.join("; "),
        });
    }

    // Write project
    let files = assemble_package(&model, options)?;
    write_project(&files, &project_dir)?;
    tracing::info!(dir = %project_dir.display(), "Project files written");

    // Package
    if options.strategies.contains(&StrategyKind::PbiTools)
        && tools.get(ExternalTool::PbiTools).is_available()
    {
        if let Some(info) = tools.pbi_tools_info.as_ref().filter(|i| i.has_version_mismatch()) {
            tracing::warn!(
                expected = info.pbi_build_version.as_deref().unwrap_or("unknown"),
                installed = info.desktop_version.as_deref().unwrap_or("unknown"),
                "pbi-tools may be incompatible with the installed Power BI Desktop"
            );
        }
    }

    let chain = StrategyChain::from_kinds(&options.strategies, tools);
    let ctx = CompileContext {
        project_dir: &project_dir,
        output_path: &output_path,
        files: &files,
        timeout: options.process_timeout,
    };
    let chain_report = chain.run(&ctx);

    let report = ConversionReport {
        input: input_path.to_path_buf(),
        output_path,
        project_dir,
        workbook,
        validation,
        chain: chain_report,
    };

    if options.write_report {
        let path = report.project_dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).map_err(|e| ConvertError::assembly(&path, e))?;
    }

    Ok(report)
}
