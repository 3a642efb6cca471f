//! Ordered strategy chain with fallback.

use super::archive::ArchiveStrategy;
use super::capability::{ExternalTool, ToolInventory};
use super::desktop::DesktopStrategy;
use super::pbi_tools::PbiToolsStrategy;
use super::strategy::{
    clear_stale_output, verify_package, CompileContext, CompileStrategy, CompiledPackage,
    StrategyFailure, StrategyOutcome,
};
use super::tabular_editor::TabularEditorStrategy;
use crate::config::StrategyKind;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

/// State of one strategy within a chain run.
#[derive(Debug)]
pub enum AttemptState {
    NotAttempted,
    Running,
    Succeeded,
    Failed(StrategyFailure),
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::NotAttempted => "not-attempted",
            AttemptState::Running => "running",
            AttemptState::Succeeded => "succeeded",
            AttemptState::Failed(_) => "failed",
        }
    }
}

/// Record of one strategy in a chain run.
#[derive(Debug)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    pub state: AttemptState,
    pub elapsed: Duration,
}

impl StrategyAttempt {
    fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            state: AttemptState::NotAttempted,
            elapsed: Duration::ZERO,
        }
    }

    /// The failure, if this attempt failed.
    pub fn failure(&self) -> Option<&StrategyFailure> {
        match &self.state {
            AttemptState::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl Serialize for StrategyAttempt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let failure = self.failure();
        let mut s = serializer.serialize_struct("StrategyAttempt", 6)?;
        s.serialize_field("strategy", &self.strategy)?;
        s.serialize_field("state", self.state.as_str())?;
        s.serialize_field("elapsed_ms", &(self.elapsed.as_millis() as u64))?;
        s.serialize_field("failure_kind", &failure.map(|f| f.kind()))?;
        s.serialize_field("reason", &failure.map(|f| f.to_string()))?;
        s.serialize_field(
            "remediation",
            &failure.map(|f| f.remediation()).unwrap_or_default(),
        )?;
        s.end()
    }
}

/// Terminal state of a chain run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ChainOutcome {
    /// A non-empty package exists at the output path.
    Compiled(CompiledPackage),
    /// The project was opened interactively.
    HandedOff {
        strategy: StrategyKind,
        instructions: Vec<String>,
    },
    /// Every strategy failed; the project directory is the result.
    Exhausted,
}

/// Result of a chain run: the outcome plus every attempt.
#[derive(Debug, Serialize)]
pub struct ChainReport {
    pub outcome: ChainOutcome,
    pub attempts: Vec<StrategyAttempt>,
}

impl ChainReport {
    pub fn is_compiled(&self) -> bool {
        matches!(self.outcome, ChainOutcome::Compiled(_))
    }

    /// The produced package, if any.
    pub fn package(&self) -> Option<&CompiledPackage> {
        match &self.outcome {
            ChainOutcome::Compiled(package) => Some(package),
            _ => None,
        }
    }

    /// Every failed attempt, in chain order.
    pub fn failures(&self) -> impl Iterator<Item = (StrategyKind, &StrategyFailure)> {
        self.attempts
            .iter()
            .filter_map(|a| a.failure().map(|f| (a.strategy, f)))
    }
}

/// Strategies tried in order until one succeeds.
pub struct StrategyChain {
    strategies: Vec<Box<dyn CompileStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn CompileStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the chain for the given strategy kinds from a tool inventory.
    pub fn from_kinds(kinds: &[StrategyKind], inventory: &ToolInventory) -> Self {
        let strategies = kinds
            .iter()
            .map(|kind| -> Box<dyn CompileStrategy> {
                match kind {
                    StrategyKind::PbiTools => Box::new(PbiToolsStrategy::new(
                        inventory.get(ExternalTool::PbiTools).clone(),
                    )),
                    StrategyKind::TabularEditor => Box::new(TabularEditorStrategy::new(
                        inventory.get(ExternalTool::TabularEditor).clone(),
                    )),
                    StrategyKind::Archive => Box::new(ArchiveStrategy),
                    StrategyKind::Desktop => Box::new(DesktopStrategy::new(
                        inventory.get(ExternalTool::PbiDesktop).clone(),
                    )),
                }
            })
            .collect();
        Self::new(strategies)
    }

    /// Run the strategies in order and stop at the first success.
    pub fn run(&self, ctx: &CompileContext<'_>) -> ChainReport {
        let mut attempts: Vec<StrategyAttempt> = self
            .strategies
            .iter()
            .map(|s| StrategyAttempt::new(s.kind()))
            .collect();

        for (index, strategy) in self.strategies.iter().enumerate() {
            let kind = strategy.kind();
            attempts[index].state = AttemptState::Running;
            tracing::info!(strategy = %kind, "Trying packaging strategy");

            let start = Instant::now();
            // Only a package written by this attempt counts.
            let result = clear_stale_output(ctx.output_path)
                .and_then(|()| strategy.compile(ctx))
                .and_then(|outcome| match outcome {
                    // Trust the file system, not the strategy.
                    StrategyOutcome::Compiled(_) => {
                        verify_package(ctx.output_path, kind).map(StrategyOutcome::Compiled)
                    }
                    handed_off => Ok(handed_off),
                });
            attempts[index].elapsed = start.elapsed();

            match result {
                Ok(StrategyOutcome::Compiled(package)) => {
                    tracing::info!(
                        strategy = %kind,
                        path = %package.path.display(),
                        size = package.size,
                        "Package compiled"
                    );
                    attempts[index].state = AttemptState::Succeeded;
                    return ChainReport {
                        outcome: ChainOutcome::Compiled(package),
                        attempts,
                    };
                }
                Ok(StrategyOutcome::HandedOff { instructions }) => {
                    attempts[index].state = AttemptState::Succeeded;
                    return ChainReport {
                        outcome: ChainOutcome::HandedOff {
                            strategy: kind,
                            instructions,
                        },
                        attempts,
                    };
                }
                Err(failure) => {
                    match &failure {
                        StrategyFailure::Unavailable { .. } => {
                            tracing::debug!(strategy = %kind, "{}", failure)
                        }
                        _ => tracing::warn!(strategy = %kind, kind = failure.kind(), "{}", failure),
                    }
                    attempts[index].state = AttemptState::Failed(failure);
                }
            }
        }

        tracing::warn!("All packaging strategies failed");
        ChainReport {
            outcome: ChainOutcome::Exhausted,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PackageFileSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Strategy with a scripted result that counts its invocations.
    struct Scripted {
        kind: StrategyKind,
        write: Option<&'static [u8]>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn failing(kind: StrategyKind, calls: &Arc<AtomicUsize>) -> Box<dyn CompileStrategy> {
            Box::new(Self {
                kind,
                write: None,
                fail: true,
                calls: Arc::clone(calls),
            })
        }

        fn writing(
            kind: StrategyKind,
            bytes: &'static [u8],
            calls: &Arc<AtomicUsize>,
        ) -> Box<dyn CompileStrategy> {
            Box::new(Self {
                kind,
                write: Some(bytes),
                fail: false,
                calls: Arc::clone(calls),
            })
        }

        /// Reports success without writing anything.
        fn claiming(kind: StrategyKind, calls: &Arc<AtomicUsize>) -> Box<dyn CompileStrategy> {
            Box::new(Self {
                kind,
                write: None,
                fail: false,
                calls: Arc::clone(calls),
            })
        }
    }

    impl CompileStrategy for Scripted {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn compile(&self, ctx: &CompileContext<'_>) -> Result<StrategyOutcome, StrategyFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StrategyFailure::ProcessFailed {
                    tool: self.kind.to_string(),
                    code: Some(1),
                    detail: "forced".to_string(),
                });
            }
            if let Some(bytes) = self.write {
                std::fs::write(ctx.output_path, bytes).unwrap();
            }
            Ok(StrategyOutcome::Compiled(CompiledPackage {
                path: ctx.output_path.to_path_buf(),
                size: 1,
                strategy: self.kind,
            }))
        }
    }

    fn context<'a>(output: &'a Path, files: &'a PackageFileSet) -> CompileContext<'a> {
        CompileContext {
            project_dir: output.parent().unwrap(),
            output_path: output,
            files,
            timeout: Duration::from_secs(1),
        }
    }

    // ==================== fallback tests ====================

    #[test]
    fn test_failure_falls_through_to_next() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pbit");
        let files = PackageFileSet::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let chain = StrategyChain::new(vec![
            Scripted::failing(StrategyKind::PbiTools, &first),
            Scripted::writing(StrategyKind::TabularEditor, b"PK", &second),
            Scripted::writing(StrategyKind::Archive, b"PK", &third),
        ]);
        let report = chain.run(&context(&output, &files));

        assert!(report.is_compiled());
        assert_eq!(report.package().unwrap().strategy, StrategyKind::TabularEditor);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);

        let states: Vec<&str> = report.attempts.iter().map(|a| a.state.as_str()).collect();
        assert_eq!(states, vec!["failed", "succeeded", "not-attempted"]);
    }

    #[test]
    fn test_empty_output_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pbit");
        let files = PackageFileSet::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let chain = StrategyChain::new(vec![
            Scripted::writing(StrategyKind::PbiTools, b"", &calls),
            Scripted::writing(StrategyKind::Archive, b"PK", &calls),
        ]);
        let report = chain.run(&context(&output, &files));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.package().unwrap().strategy, StrategyKind::Archive);
        assert!(matches!(
            report.attempts[0].failure(),
            Some(StrategyFailure::MissingOutput { .. })
        ));
    }

    #[test]
    fn test_stale_package_does_not_count_as_compiled() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pbit");
        std::fs::write(&output, b"package from an earlier run").unwrap();
        let files = PackageFileSet::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let chain = StrategyChain::new(vec![
            Scripted::claiming(StrategyKind::TabularEditor, &first),
            Scripted::writing(StrategyKind::Archive, b"PK", &second),
        ]);
        let report = chain.run(&context(&output, &files));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(matches!(
            report.attempts[0].failure(),
            Some(StrategyFailure::MissingOutput { .. })
        ));
        assert_eq!(report.package().unwrap().strategy, StrategyKind::Archive);
        assert_eq!(std::fs::read(&output).unwrap(), b"PK");
    }

    #[test]
    fn test_all_failing_is_exhausted_with_every_reason() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pbit");
        let files = PackageFileSet::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let chain = StrategyChain::new(vec![
            Scripted::failing(StrategyKind::PbiTools, &calls),
            Scripted::failing(StrategyKind::TabularEditor, &calls),
            Scripted::failing(StrategyKind::Desktop, &calls),
        ]);
        let report = chain.run(&context(&output, &files));

        assert_eq!(report.outcome, ChainOutcome::Exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let failed: Vec<StrategyKind> = report.failures().map(|(k, _)| k).collect();
        assert_eq!(
            failed,
            vec![
                StrategyKind::PbiTools,
                StrategyKind::TabularEditor,
                StrategyKind::Desktop
            ]
        );
    }

    #[test]
    fn test_empty_inventory_reaches_archive() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pbit");
        let files = crate::generator::assemble_package(
            &crate::model::TabularModel::default(),
            &crate::config::ConvertOptions::default(),
        )
        .unwrap();

        let chain = StrategyChain::from_kinds(&StrategyKind::DEFAULT_ORDER, &ToolInventory::empty());
        let report = chain.run(&context(&output, &files));

        assert_eq!(report.package().unwrap().strategy, StrategyKind::Archive);
        let unavailable = report
            .failures()
            .filter(|(_, f)| matches!(f, StrategyFailure::Unavailable { .. }))
            .count();
        assert_eq!(unavailable, 2);
        assert_eq!(report.attempts[3].state.as_str(), "not-attempted");
    }

    #[test]
    fn test_attempt_serialization() {
        let attempt = StrategyAttempt {
            strategy: StrategyKind::PbiTools,
            state: AttemptState::Failed(StrategyFailure::Unavailable {
                tool: "pbi-tools".to_string(),
            }),
            elapsed: Duration::from_millis(3),
        };
        let value = serde_json::to_value(&attempt).unwrap();
        assert_eq!(value["strategy"], "pbi-tools");
        assert_eq!(value["state"], "failed");
        assert_eq!(value["failure_kind"], "unavailable");
        assert_eq!(value["reason"], "pbi-tools is not available");
        assert_eq!(value["elapsed_ms"], 3);
    }
}
