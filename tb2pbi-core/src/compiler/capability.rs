//! External tool discovery.
//!
//! The system inventory is probed once per process. Tests and embedding
//! callers build an inventory explicitly instead.

use super::process::run_with_timeout;
use crate::config::{ENV_PBI_DESKTOP, ENV_PBI_TOOLS, ENV_TABULAR_EDITOR, PROBE_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// External tools the strategies can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalTool {
    PbiTools,
    TabularEditor,
    PbiDesktop,
}

impl ExternalTool {
    pub const ALL: [ExternalTool; 3] = [
        ExternalTool::PbiTools,
        ExternalTool::TabularEditor,
        ExternalTool::PbiDesktop,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExternalTool::PbiTools => "pbi-tools",
            ExternalTool::TabularEditor => "Tabular Editor",
            ExternalTool::PbiDesktop => "Power BI Desktop",
        }
    }

    /// Environment variable pointing at the executable.
    pub fn env_var(&self) -> &'static str {
        match self {
            ExternalTool::PbiTools => ENV_PBI_TOOLS,
            ExternalTool::TabularEditor => ENV_TABULAR_EDITOR,
            ExternalTool::PbiDesktop => ENV_PBI_DESKTOP,
        }
    }

    /// Executable names searched on PATH.
    fn executable_names(&self) -> &'static [&'static str] {
        match self {
            ExternalTool::PbiTools => &["pbi-tools", "pbi-tools.exe", "pbi-tools.core"],
            ExternalTool::TabularEditor => &["TabularEditor", "TabularEditor.exe"],
            ExternalTool::PbiDesktop => &["PBIDesktop", "PBIDesktop.exe"],
        }
    }

    /// Well-known Windows install locations.
    fn known_locations(&self) -> Vec<PathBuf> {
        let program_files = [
            std::env::var_os("ProgramFiles(x86)")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(r"C:\Program Files (x86)")),
            std::env::var_os("ProgramFiles")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(r"C:\Program Files")),
        ];

        match self {
            ExternalTool::PbiTools => Vec::new(),
            ExternalTool::TabularEditor => {
                let mut paths: Vec<PathBuf> = program_files
                    .iter()
                    .flat_map(|base| {
                        [
                            base.join("Tabular Editor").join("TabularEditor.exe"),
                            base.join("Tabular Editor 3").join("TabularEditor3.exe"),
                        ]
                    })
                    .collect();
                if let Some(local) = std::env::var_os("LOCALAPPDATA") {
                    paths.push(
                        PathBuf::from(local)
                            .join("TabularEditor")
                            .join("TabularEditor.exe"),
                    );
                }
                paths
            }
            ExternalTool::PbiDesktop => program_files
                .iter()
                .map(|base| {
                    base.join("Microsoft Power BI Desktop")
                        .join("bin")
                        .join("PBIDesktop.exe")
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether and where a tool is installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ToolCapability {
    #[default]
    Unavailable,
    Available { path: PathBuf },
    Versioned { path: PathBuf, version: String },
}

impl ToolCapability {
    /// Executable path, if available.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ToolCapability::Unavailable => None,
            ToolCapability::Available { path } | ToolCapability::Versioned { path, .. } => {
                Some(path)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.path().is_some()
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            ToolCapability::Versioned { version, .. } => Some(version),
            _ => None,
        }
    }
}

/// Versions reported by `pbi-tools info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PbiToolsInfo {
    pub version: Option<String>,
    /// Desktop build pbi-tools was compiled against.
    pub pbi_build_version: Option<String>,
    /// First installed Desktop version.
    pub desktop_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    version: Option<String>,
    pbi_build_version: Option<String>,
    #[serde(default)]
    pbi_installs: Vec<RawInstall>,
}

#[derive(Deserialize)]
struct RawInstall {
    #[serde(rename = "ProductVersion")]
    product_version: Option<String>,
}

impl PbiToolsInfo {
    /// Parse the JSON printed by `pbi-tools info`.
    pub fn parse(json: &str) -> Option<Self> {
        let raw: RawInfo = serde_json::from_str(json.trim()).ok()?;
        Some(Self {
            version: raw.version,
            pbi_build_version: raw.pbi_build_version,
            desktop_version: raw
                .pbi_installs
                .into_iter()
                .next()
                .and_then(|i| i.product_version),
        })
    }

    /// The installed Desktop differs from the build pbi-tools targets.
    pub fn has_version_mismatch(&self) -> bool {
        match (&self.pbi_build_version, &self.desktop_version) {
            (Some(build), Some(installed)) => build.trim() != installed.trim(),
            _ => false,
        }
    }
}

/// Capabilities of all external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolInventory {
    pub pbi_tools: ToolCapability,
    pub tabular_editor: ToolCapability,
    pub pbi_desktop: ToolCapability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbi_tools_info: Option<PbiToolsInfo>,
}

static SYSTEM_INVENTORY: OnceLock<ToolInventory> = OnceLock::new();

impl ToolInventory {
    /// Inventory with no tool available.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the capability of one tool.
    pub fn with(mut self, tool: ExternalTool, capability: ToolCapability) -> Self {
        *self.slot(tool) = capability;
        self
    }

    pub fn get(&self, tool: ExternalTool) -> &ToolCapability {
        match tool {
            ExternalTool::PbiTools => &self.pbi_tools,
            ExternalTool::TabularEditor => &self.tabular_editor,
            ExternalTool::PbiDesktop => &self.pbi_desktop,
        }
    }

    fn slot(&mut self, tool: ExternalTool) -> &mut ToolCapability {
        match tool {
            ExternalTool::PbiTools => &mut self.pbi_tools,
            ExternalTool::TabularEditor => &mut self.tabular_editor,
            ExternalTool::PbiDesktop => &mut self.pbi_desktop,
        }
    }

    /// The inventory of this machine, probed on first use.
    pub fn system() -> &'static ToolInventory {
        SYSTEM_INVENTORY.get_or_init(ToolInventory::probe)
    }

    /// Discover the installed tools.
    pub fn probe() -> Self {
        let mut inventory = Self::empty();

        for tool in ExternalTool::ALL {
            if let Some(path) = locate(tool) {
                tracing::debug!(tool = %tool, path = %path.display(), "Found external tool");
                *inventory.slot(tool) = ToolCapability::Available { path };
            }
        }

        if let Some(path) = inventory.pbi_tools.path().map(Path::to_path_buf) {
            if let Some(info) = probe_pbi_tools(&path) {
                if let Some(version) = info.version.clone() {
                    inventory.pbi_tools = ToolCapability::Versioned { path, version };
                }
                inventory.pbi_tools_info = Some(info);
            }
        }

        inventory
    }
}

/// Resolve a tool: environment override, then PATH, then install locations.
fn locate(tool: ExternalTool) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(tool.env_var()) {
        let path = PathBuf::from(value);
        if path.is_file() {
            return Some(path);
        }
        tracing::warn!(
            tool = %tool,
            path = %path.display(),
            "{} does not point at a file, ignoring",
            tool.env_var()
        );
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_in_dirs(std::env::split_paths(&path_var), tool.executable_names())
        .or_else(|| tool.known_locations().into_iter().find(|p| p.is_file()))
}

fn find_in_dirs<I>(dirs: I, names: &[&str]) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    dirs.into_iter()
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn probe_pbi_tools(path: &Path) -> Option<PbiToolsInfo> {
    let output = run_with_timeout(
        "pbi-tools",
        path,
        ["info"],
        Duration::from_secs(PROBE_TIMEOUT_SECS),
    )
    .ok()?;

    if !output.success() {
        tracing::debug!(code = ?output.code(), "pbi-tools info failed");
        return None;
    }

    let info = PbiToolsInfo::parse(&output.stdout)?;
    if info.has_version_mismatch() {
        tracing::warn!(
            expected = info.pbi_build_version.as_deref().unwrap_or("unknown"),
            installed = info.desktop_version.as_deref().unwrap_or("unknown"),
            "Version mismatch: pbi-tools targets a different Power BI Desktop build"
        );
    }
    Some(info)
}
