//! Tabular Editor strategy.

use super::capability::ToolCapability;
use super::process::run_with_timeout;
use super::strategy::{
    classify_process_failure, clear_stale_output, verify_package, CompileContext,
    CompileStrategy, StrategyFailure, StrategyOutcome,
};
use crate::config::StrategyKind;
use std::path::PathBuf;

/// Runs Tabular Editor against the project's model file.
#[derive(Debug, Clone)]
pub struct TabularEditorStrategy {
    capability: ToolCapability,
}

impl TabularEditorStrategy {
    pub fn new(capability: ToolCapability) -> Self {
        Self { capability }
    }

    /// Model file handed to the editor.
    pub fn model_path(ctx: &CompileContext<'_>) -> PathBuf {
        ctx.project_dir.join("DataModelSchema").join("Model.bim")
    }
}

impl CompileStrategy for TabularEditorStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TabularEditor
    }

    fn compile(&self, ctx: &CompileContext<'_>) -> Result<StrategyOutcome, StrategyFailure> {
        let tool = self.kind().as_str();
        let program = self
            .capability
            .path()
            .ok_or_else(|| StrategyFailure::Unavailable {
                tool: tool.to_string(),
            })?;

        clear_stale_output(ctx.output_path)?;
        let output = run_with_timeout(tool, program, [Self::model_path(ctx)], ctx.timeout)?;

        if !output.success() {
            return Err(classify_process_failure(
                tool,
                output.code(),
                &output.stdout,
                &output.stderr,
            ));
        }

        // A clean exit only counts when the package was actually written.
        let package = verify_package(ctx.output_path, self.kind())?;
        Ok(StrategyOutcome::Compiled(package))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::generator::PackageFileSet;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("TabularEditor");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_clean_exit_without_output_is_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exit 0");
        let files = PackageFileSet::new();
        let output = dir.path().join("out.pbit");
        let ctx = CompileContext {
            project_dir: dir.path(),
            output_path: &output,
            files: &files,
            timeout: Duration::from_secs(10),
        };

        let err = TabularEditorStrategy::new(ToolCapability::Available { path: program })
            .compile(&ctx)
            .unwrap_err();
        assert!(matches!(err, StrategyFailure::MissingOutput { .. }));
    }

    #[test]
    fn test_stale_package_is_not_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exit 0");
        let files = PackageFileSet::new();
        let output = dir.path().join("out.pbit");
        std::fs::write(&output, b"package from an earlier run").unwrap();
        let ctx = CompileContext {
            project_dir: dir.path(),
            output_path: &output,
            files: &files,
            timeout: Duration::from_secs(10),
        };

        let err = TabularEditorStrategy::new(ToolCapability::Available { path: program })
            .compile(&ctx)
            .unwrap_err();
        assert!(matches!(err, StrategyFailure::MissingOutput { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_model_path_argument() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pbit");
        // Writes the received argument into the output path.
        let program = script(dir.path(), &format!("echo \"$1\" > '{}'", output.display()));
        let files = PackageFileSet::new();
        let ctx = CompileContext {
            project_dir: dir.path(),
            output_path: &output,
            files: &files,
            timeout: Duration::from_secs(10),
        };

        let outcome = TabularEditorStrategy::new(ToolCapability::Available { path: program })
            .compile(&ctx)
            .unwrap();
        assert!(matches!(outcome, StrategyOutcome::Compiled(_)));
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.trim().ends_with("DataModelSchema/Model.bim"));
    }
}
