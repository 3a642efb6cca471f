//! `pbi-tools compile` strategy.

use super::capability::ToolCapability;
use super::process::run_with_timeout;
use super::strategy::{
    classify_process_failure, clear_stale_output, verify_package, CompileContext,
    CompileStrategy, StrategyFailure, StrategyOutcome,
};
use crate::config::StrategyKind;
use std::ffi::OsString;

/// Compiles the project with pbi-tools.
#[derive(Debug, Clone)]
pub struct PbiToolsStrategy {
    capability: ToolCapability,
}

impl PbiToolsStrategy {
    pub fn new(capability: ToolCapability) -> Self {
        Self { capability }
    }

    /// Command line arguments for one compilation.
    pub fn arguments(ctx: &CompileContext<'_>) -> Vec<OsString> {
        vec![
            OsString::from("compile"),
            ctx.project_dir.as_os_str().to_owned(),
            ctx.output_path.as_os_str().to_owned(),
            OsString::from("PBIT"),
            OsString::from("True"),
        ]
    }
}

impl CompileStrategy for PbiToolsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PbiTools
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
        let output = run_with_timeout(tool, program, Self::arguments(ctx), ctx.timeout)?;

        if !output.success() {
            return Err(classify_process_failure(
                tool,
                output.code(),
                &output.stdout,
                &output.stderr,
            ));
        }

        let package = verify_package(ctx.output_path, self.kind())?;
        Ok(StrategyOutcome::Compiled(package))
    }
}
