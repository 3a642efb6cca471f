//! tb2pbi - CLI tool to convert Tableau workbooks to Power BI templates.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tb2pbi_core::{
    analyze_workbook, convert_workbook, translate_workbook, validate_model, validate_workbook,
    ChainOutcome, ConversionReport, ConvertOptions, StrategyKind, ToolInventory,
};

/// Convert Tableau workbooks (.twb/.twbx) to Power BI templates (.pbit).
#[derive(Parser, Debug)]
#[command(name = "tb2pbi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input workbook path(s)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output .pbit path (single input only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Project directory for the intermediate files (single input only)
    #[arg(short, long)]
    project_dir: Option<PathBuf>,

    /// Packaging strategies to try, in order
    #[arg(
        short,
        long = "strategy",
        value_delimiter = ',',
        value_parser = parse_strategy,
        default_values_t = StrategyKind::DEFAULT_ORDER.to_vec()
    )]
    strategies: Vec<StrategyKind>,

    /// Timeout in seconds for each external tool run
    #[arg(short, long, default_value = "300")]
    timeout: u64,

    /// JSON file used as the project's Settings document
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Don't write conversion-report.json into the project directory
    #[arg(long)]
    no_report: bool,

    /// Print the extracted workbook as JSON, don't convert
    #[arg(long)]
    analyze: bool,

    /// Validate only, don't generate output
    #[arg(long)]
    validate: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_strategy(s: &str) -> std::result::Result<StrategyKind, String> {
    StrategyKind::from_name(s).ok_or_else(|| {
        format!(
            "unknown strategy '{}' (expected one of: pbi-tools, tabular-editor, archive, desktop)",
            s
        )
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if args.inputs.len() > 1 && (args.output.is_some() || args.project_dir.is_some()) {
        anyhow::bail!("--output and --project-dir can only be used with a single input");
    }

    // Analysis mode
    if args.analyze {
        for input in &args.inputs {
            let workbook = analyze_workbook(input)
                .with_context(|| format!("Failed to analyze {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&workbook)?);
        }
        return Ok(());
    }

    let options = build_options(&args)?;

    // Validate-only mode
    if args.validate {
        let mut failed = 0;
        for input in &args.inputs {
            if !validate_input(input, &options)? {
                failed += 1;
            }
        }
        if failed > 0 {
            anyhow::bail!("Validation failed for {} workbook(s)", failed);
        }
        info!("Validation passed");
        return Ok(());
    }

    check_distinct_outputs(&args.inputs, &options)?;

    let tools = ToolInventory::system();

    // One worker per input; they share only the tool inventory.
    let results: Vec<(PathBuf, Result<ConversionReport>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = args
            .inputs
            .iter()
            .map(|input| {
                let options = &options;
                scope.spawn(move || {
                    info!("Processing: {}", input.display());
                    let result = convert_workbook(input, options, tools)
                        .with_context(|| format!("Failed to convert {}", input.display()));
                    (input.clone(), result)
                })
            })
            .collect();

        handles
            .into_iter()
            .zip(args.inputs.iter())
            .map(|(handle, input)| {
                handle.join().unwrap_or_else(|_| {
                    (input.clone(), Err(anyhow::anyhow!("conversion thread panicked")))
                })
            })
            .collect()
    });

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(report) => print_report(report),
            Err(e) => {
                error!("{}: {:#}", input.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} conversion(s) failed", failed, results.len());
    }

    Ok(())
}

fn build_options(args: &Args) -> Result<ConvertOptions> {
    let mut options = ConvertOptions {
        output_path: args.output.clone(),
        project_dir: args.project_dir.clone(),
        process_timeout: Duration::from_secs(args.timeout),
        write_report: !args.no_report,
        ..Default::default()
    }
    .with_strategies(&args.strategies);

    if let Some(path) = &args.settings {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        options.settings = Some(settings);
    }

    Ok(options)
}

/// Fail when two inputs would write the same package or project directory.
fn check_distinct_outputs(inputs: &[PathBuf], options: &ConvertOptions) -> Result<()> {
    let mut claimed: HashMap<PathBuf, &PathBuf> = HashMap::new();

    for input in inputs {
        let output = options.resolve_output_path(input);
        let project_dir = options.resolve_project_dir(&output);
        for path in [output, project_dir] {
            if let Some(previous) = claimed.insert(path.clone(), input) {
                anyhow::bail!(
                    "{} and {} would both write {}",
                    previous.display(),
                    input.display(),
                    path.display()
                );
            }
        }
    }

    Ok(())
}

/// Validate one workbook; returns whether it passed.
fn validate_input(input: &Path, options: &ConvertOptions) -> Result<bool> {
    let workbook = analyze_workbook(input)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    info!(
        "{}: {} data source(s), {} field(s), {} calculated field(s)",
        input.display(),
        workbook.datasources.len(),
        workbook.field_count(),
        workbook.calculated_field_count()
    );

    let model = translate_workbook(&workbook, options);
    let mut validation = validate_workbook(&workbook);
    validation.merge(validate_model(&model)?);

    for warning in &validation.warnings {
        warn!("{}", warning);
    }

    for err in &validation.errors {
        error!("{}", err);
    }

    Ok(validation.passed)
}

fn print_report(report: &ConversionReport) {
    match &report.chain.outcome {
        ChainOutcome::Compiled(package) => {
            info!(
                "Generated: {} ({} bytes, via {})",
                package.path.display(),
                package.size,
                package.strategy
            );
            return;
        }
        ChainOutcome::HandedOff { strategy, .. } => {
            warn!(
                "{}: package not compiled, project handed off via {}",
                report.input.display(),
                strategy
            );
        }
        ChainOutcome::Exhausted => {
            warn!(
                "{}: no packaging strategy succeeded",
                report.input.display()
            );
        }
    }

    for (strategy, failure) in report.chain.failures() {
        warn!("  {}: {}", strategy, failure);
        for hint in failure.remediation() {
            info!("    - {}", hint);
        }
    }

    for step in report.manual_instructions() {
        info!("{}", step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_distinct_outputs_accepted() {
        let inputs = paths(&["books/sales.twbx", "books/returns.twb", "archive/sales.twb"]);
        assert!(check_distinct_outputs(&inputs, &ConvertOptions::default()).is_ok());
    }

    #[test]
    fn test_same_stem_rejected() {
        let inputs = paths(&["books/sales.twb", "books/sales.twbx"]);
        let err = check_distinct_outputs(&inputs, &ConvertOptions::default()).unwrap_err();
        assert!(err.to_string().contains("sales.pbit"));
    }

    #[test]
    fn test_repeated_input_rejected() {
        let inputs = paths(&["sales.twbx", "sales.twbx"]);
        assert!(check_distinct_outputs(&inputs, &ConvertOptions::default()).is_err());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(parse_strategy("archive"), Ok(StrategyKind::Archive));
        assert!(parse_strategy("msbuild").is_err());
    }
}
