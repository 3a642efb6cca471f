//! Interactive Power BI Desktop handoff.

use super::capability::ToolCapability;
use super::process::launch_detached;
use super::strategy::{CompileContext, CompileStrategy, StrategyFailure, StrategyOutcome};
use crate::config::{StrategyKind, DESKTOP_LAUNCH_GRACE_MS};
use std::path::Path;
use std::time::Duration;

/// Opens the project in Power BI Desktop for the operator to save as `.pbit`.
#[derive(Debug, Clone)]
pub struct DesktopStrategy {
    capability: ToolCapability,
    grace: Duration,
}

impl DesktopStrategy {
    pub fn new(capability: ToolCapability) -> Self {
        Self {
            capability,
            grace: Duration::from_millis(DESKTOP_LAUNCH_GRACE_MS),
        }
    }

    /// How long the launched process is watched for an immediate failure.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

impl CompileStrategy for DesktopStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Desktop
    }

    fn compile(&self, ctx: &CompileContext<'_>) -> Result<StrategyOutcome, StrategyFailure> {
        let tool = self.kind().as_str();
        let program = self
            .capability
            .path()
            .ok_or_else(|| StrategyFailure::Unavailable {
                tool: tool.to_string(),
            })?;

        launch_detached(tool, program, [ctx.project_dir], self.grace)?;

        tracing::info!(project = %ctx.project_dir.display(), "Opened project in Power BI Desktop");
        Ok(StrategyOutcome::HandedOff {
            instructions: handoff_instructions(ctx.project_dir, ctx.output_path),
        })
    }
}

/// Steps for the operator after the desktop handoff.
pub fn handoff_instructions(project_dir: &Path, output_path: &Path) -> Vec<String> {
    vec![
        format!(
            "Power BI Desktop was opened with the project at {}",
            project_dir.display()
        ),
        "Re-point each table's data source in Transform Data".to_string(),
        format!(
            "Use File > Export > Power BI template and save it as {}",
            output_path.display()
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PackageFileSet;

    #[test]
    fn test_handoff_instructions_name_paths() {
        let steps = handoff_instructions(Path::new("out/sales_project"), Path::new("out/sales.pbit"));
        assert_eq!(steps.len(), 3);
        assert!(steps[0].contains("out/sales_project"));
        assert!(steps[2].contains("out/sales.pbit"));
    }

    #[test]
    fn test_unavailable_desktop() {
        let files = PackageFileSet::new();
        let ctx = CompileContext {
            project_dir: Path::new("p"),
            output_path: Path::new("o.pbit"),
            files: &files,
            timeout: Duration::from_secs(1),
        };
        let err = DesktopStrategy::new(ToolCapability::Unavailable)
            .compile(&ctx)
            .unwrap_err();
        assert!(matches!(err, StrategyFailure::Unavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_handoff_with_running_process() {
        let files = PackageFileSet::new();
        let ctx = CompileContext {
            project_dir: Path::new("1"),
            output_path: Path::new("o.pbit"),
            files: &files,
            timeout: Duration::from_secs(1),
        };
        // `sleep 1` stands in for a desktop process that stays open.
        let strategy = DesktopStrategy::new(ToolCapability::Available {
            path: "sleep".into(),
        })
        .with_grace(Duration::from_millis(200));
        let outcome = strategy.compile(&ctx).unwrap();
        assert!(matches!(outcome, StrategyOutcome::HandedOff { .. }));
    }
}
