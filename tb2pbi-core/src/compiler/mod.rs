//! Packaging of the project into a `.pbit` through a chain of strategies.

mod archive;
mod capability;
mod chain;
mod desktop;
mod pbi_tools;
mod process;
mod strategy;
mod tabular_editor;

pub use archive::{write_archive, ArchiveStrategy};
pub use capability::{ExternalTool, PbiToolsInfo, ToolCapability, ToolInventory};
pub use chain::{AttemptState, ChainOutcome, ChainReport, StrategyAttempt, StrategyChain};
pub use desktop::{handoff_instructions, DesktopStrategy};
pub use pbi_tools::PbiToolsStrategy;
pub use process::{launch_detached, run_with_timeout, ProcessOutput};
pub use strategy::{
    classify_process_failure, clear_stale_output, verify_package, CompileContext,
    CompileStrategy, CompiledPackage, StrategyFailure, StrategyOutcome,
};
pub use tabular_editor::TabularEditorStrategy;
