//! Configuration constants and settings for the converter.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Power BI project format version written to `Version.txt`, `Metadata` and
/// `SecurityBindings`.
pub const FORMAT_VERSION: &str = "3.0";

/// Tabular model compatibility level.
pub const COMPATIBILITY_LEVEL: u32 = 1550;

/// Default model culture.
pub const DEFAULT_CULTURE: &str = "en-US";

/// Default semantic model name.
pub const DEFAULT_MODEL_NAME: &str = "SemanticModel";

/// Data source value for `defaultPowerBIDataSourceVersion`.
pub const POWERBI_DATA_SOURCE_VERSION: &str = "powerBI_V3";

/// Report theme referenced by the generated layout.
pub const REPORT_THEME: &str = "CY24SU06";

/// Report layout config version.
pub const REPORT_LAYOUT_VERSION: &str = "5.43";

/// Tableau's pseudo data source holding workbook parameters.
pub const PARAMETERS_DATASOURCE: &str = "Parameters";

/// Placeholder column for tables without any field.
pub const DEFAULT_COLUMN_NAME: &str = "DefaultColumn";

/// Replacement name for fields whose name sanitizes to nothing.
pub const FALLBACK_FIELD_NAME: &str = "Field";

/// Tabular Editor serialization options annotated on the model.
pub const SERIALIZE_OPTIONS: &str = r#"{"IgnoreInferredObjects":false,"IgnoreInferredProperties":false,"IgnoreTimestamps":false,"SplitMultilineStrings":false,"PrefixFilenames":false,"LocalTranslations":false,"LocalPerspectives":false,"LocalRelationships":false,"Levels":["Data Sources","Shared Expressions","Perspectives","Relationships","Roles","Tables","Tables/Columns","Tables/Hierarchies","Tables/Measures","Tables/Partitions","Tables/Calculation Groups","Translations"]}"#;

// Annotation names
pub const ANNOTATION_SERIALIZE_OPTIONS: &str = "TabularEditor_SerializeOptions";
pub const ANNOTATION_QUERY_ORDER: &str = "PBI_QueryOrder";
pub const ANNOTATION_SOURCE_FIELD_COUNT: &str = "Tableau_SourceFieldCount";
pub const ANNOTATION_CALCULATED_FIELD_COUNT: &str = "Tableau_CalculatedFieldCount";
pub const ANNOTATION_PARAMETERS: &str = "Tableau_Parameters";
pub const ANNOTATION_CALCULATED_FIELDS: &str = "Tableau_CalculatedFields";
pub const ANNOTATION_CAPTION: &str = "Tableau_Caption";

/// Default timeout for blocking external tool invocations.
pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 300;

/// Timeout for tool probes (`pbi-tools info`).
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// How long a launched desktop process is watched for an immediate failure.
pub const DESKTOP_LAUNCH_GRACE_MS: u64 = 2000;

/// Name of the conversion report written into the project directory.
pub const REPORT_FILE_NAME: &str = "conversion-report.json";

/// Environment variable overriding the pbi-tools executable.
pub const ENV_PBI_TOOLS: &str = "TB2PBI_PBI_TOOLS";

/// Environment variable overriding the Tabular Editor executable.
pub const ENV_TABULAR_EDITOR: &str = "TB2PBI_TABULAR_EDITOR";

/// Environment variable overriding the Power BI Desktop executable.
pub const ENV_PBI_DESKTOP: &str = "TB2PBI_PBI_DESKTOP";

/// Package compilation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// `pbi-tools compile`.
    PbiTools,
    /// Tabular Editor export.
    TabularEditor,
    /// In-process zip archive.
    Archive,
    /// Open the project in Power BI Desktop.
    Desktop,
}

impl StrategyKind {
    /// All strategies in default priority order.
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        StrategyKind::PbiTools,
        StrategyKind::TabularEditor,
        StrategyKind::Archive,
        StrategyKind::Desktop,
    ];

    /// Stable name used in logs, reports and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PbiTools => "pbi-tools",
            StrategyKind::TabularEditor => "tabular-editor",
            StrategyKind::Archive => "archive",
            StrategyKind::Desktop => "desktop",
        }
    }

    /// Parse a strategy name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pbi-tools" | "pbitools" => Some(StrategyKind::PbiTools),
            "tabular-editor" | "tabulareditor" => Some(StrategyKind::TabularEditor),
            "archive" | "zip" => Some(StrategyKind::Archive),
            "desktop" => Some(StrategyKind::Desktop),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion options.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Output `.pbit` path. Defaults to the input path with a `.pbit` extension.
    pub output_path: Option<PathBuf>,
    /// Project directory. Defaults to `<output stem>_project` next to the output.
    pub project_dir: Option<PathBuf>,
    /// Strategies to try, in order.
    pub strategies: Vec<StrategyKind>,
    /// Timeout for each blocking external process.
    pub process_timeout: Duration,
    /// Content of the `Settings` document; `{}` when absent.
    pub settings: Option<serde_json::Value>,
    /// Semantic model name.
    pub model_name: String,
    /// Model culture.
    pub culture: String,
    /// Write the conversion report next to the project files.
    pub write_report: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output_path: None,
            project_dir: None,
            strategies: StrategyKind::DEFAULT_ORDER.to_vec(),
            process_timeout: Duration::from_secs(DEFAULT_PROCESS_TIMEOUT_SECS),
            settings: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            culture: DEFAULT_CULTURE.to_string(),
            write_report: true,
        }
    }
}

impl ConvertOptions {
    /// Create options writing the package to `output_path`.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: Some(output_path.into()),
            ..Default::default()
        }
    }

    /// Replace the strategy list.
    pub fn with_strategies(mut self, strategies: &[StrategyKind]) -> Self {
        self.strategies = strategies.to_vec();
        self
    }

    /// Set the project directory.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Resolve the output package path for `input`.
    pub fn resolve_output_path(&self, input: &Path) -> PathBuf {
        self.output_path.clone().unwrap_or_else(|| {
            let mut path = input.to_path_buf();
            path.set_extension("pbit");
            path
        })
    }

    /// Resolve the project directory for a given output path.
    pub fn resolve_project_dir(&self, output: &Path) -> PathBuf {
        self.project_dir.clone().unwrap_or_else(|| {
            let stem = output
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("workbook");
            output.with_file_name(format!("{}_project", stem))
        })
    }
}
