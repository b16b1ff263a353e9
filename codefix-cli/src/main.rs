mod config;
mod explain;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use codefix_core::adapters::{FsSnapshotSource, FsWritePort, JsonAnalysisSource};
use codefix_core::pipeline::{FixOutcome, apply_changes, run_fix, write_fix_artifacts};
use codefix_core::settings::FixSettings;
use codefix_domain::{FallbackPolicy, NeverCancel, builtin_provider_metas, builtin_providers};
use codefix_types::report::ToolInfo;
use config::{ConfigMerger, FixOverrides};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "codefix",
    version,
    about = "Apply diagnostic-driven fixes across multi-project source snapshots."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run fix passes over the configured projects (default: dry-run).
    Fix(FixArgs),
    /// Explain how a provider's categories will be applied.
    Explain(ExplainArgs),
    /// List built-in providers with the strategy chosen for each category.
    ListProviders(ListProvidersArgs),
}

#[derive(Debug, Parser)]
struct FixArgs {
    /// Root directory holding codefix.toml (default: current directory).
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    /// Project to load, as NAME=DIR. Repeatable; overrides a config project of the same name.
    #[arg(long = "project", value_name = "NAME=DIR")]
    projects: Vec<String>,

    /// Diagnostics JSON file (default: [input] diagnostics from codefix.toml).
    #[arg(long, value_name = "FILE")]
    diagnostics: Option<Utf8PathBuf>,

    /// Maximum number of passes.
    #[arg(long)]
    max_passes: Option<u32>,

    /// Output directory for codefix artifacts (default: <root>/artifacts/codefix).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Write changed files to disk. If omitted, only artifacts are emitted.
    #[arg(long, default_value_t = false)]
    apply: bool,

    /// Provider option as KEY=VALUE. Repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Never run two provider invocations at once.
    #[arg(long, default_value_t = false)]
    serialize_providers: bool,
}

#[derive(Debug, Parser)]
struct ExplainArgs {
    /// Provider key or category to explain (e.g., "whitespace.trailing", "naming").
    provider: String,

    /// Root directory holding codefix.toml (default: current directory).
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,
}

#[derive(Debug, Parser)]
struct ListProvidersArgs {
    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Root directory holding codefix.toml (default: current directory).
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        error!("{:?}", e);
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Fix(args) => cmd_fix(args),
        Command::Explain(args) => cmd_explain(args),
        Command::ListProviders(args) => cmd_list_providers(args),
    }
}

fn cmd_fix(args: FixArgs) -> anyhow::Result<()> {
    let root = args.root;

    let file_config = config::load_or_default(&root).context("load codefix.toml config")?;
    let overrides = FixOverrides {
        projects: config::parse_project_args(&args.projects)?,
        diagnostics: args.diagnostics,
        max_passes: args.max_passes,
        out_dir: args.out_dir,
        apply: args.apply,
        params: config::parse_cli_params(&args.params)?,
        serialize_providers: args.serialize_providers,
    };
    let settings = ConfigMerger::new(file_config).merge_fix_args(&root, overrides)?;

    debug!(
        "merged config: projects={:?}, max_passes={}, fallback={:?}, params={:?}",
        settings.projects.iter().map(|p| &p.name).collect::<Vec<_>>(),
        settings.max_passes,
        settings.policy.rules(),
        settings.params
    );

    let diagnostics = settings.diagnostics.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "no diagnostics file; pass --diagnostics or set [input] diagnostics in {}",
            config::CONFIG_FILE_NAME
        )
    })?;

    let snapshots = FsSnapshotSource::new(settings.projects.clone());
    let analysis = JsonAnalysisSource::new(diagnostics);
    let providers = builtin_providers();

    let outcome = run_fix(
        &settings,
        &snapshots,
        &analysis,
        &providers,
        &NeverCancel,
        tool_info(),
    )
    .context("run fix passes")?;

    write_fix_artifacts(&outcome, &settings.out_dir, &FsWritePort)?;
    if settings.apply {
        apply_changes(&outcome, &FsWritePort).context("apply changes")?;
    }

    print_summary(&outcome, &settings);
    Ok(())
}

fn print_summary(outcome: &FixOutcome, settings: &FixSettings) {
    let report = &outcome.report;
    let summary = &report.summary;
    println!(
        "codefix: {} pass(es), {} applied, {} skipped, {} diagnostic(s) failed, {} unit(s) changed",
        report.passes,
        summary.applied,
        summary.skipped,
        summary.failed_diagnostics,
        summary.units_changed
    );
    for unit in &report.changed_units {
        let path = unit.path.as_deref().unwrap_or("<no path>");
        println!("  M {}/{}", unit.project, path);
    }
    if !report.converged {
        println!("pass limit reached before convergence; some diagnostics may remain");
    }
    if outcome.changed() && !settings.apply {
        println!(
            "dry run: patch written to {}; re-run with --apply to write changes",
            settings.out_dir.join("patch.diff")
        );
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "codefix".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}

fn load_policy(root: &Utf8Path) -> anyhow::Result<FallbackPolicy> {
    let file_config = config::load_or_default(root).context("load codefix.toml config")?;
    Ok(file_config.policy())
}

fn cmd_explain(args: ExplainArgs) -> anyhow::Result<()> {
    use explain::{
        capability_meaning, category_lines, format_strategy, list_provider_keys, lookup_provider,
        strategy_meaning,
    };

    let Some(meta) = lookup_provider(&args.provider) else {
        let available = list_provider_keys().join(", ");
        anyhow::bail!(
            "Unknown provider: '{}'\n\nAvailable providers: {}",
            args.provider,
            available
        );
    };
    let policy = load_policy(&args.root)?;

    println!("================================================================================");
    println!("PROVIDER: {}", meta.key);
    println!("================================================================================");
    println!();
    println!(
        "Capability:  {} ({})",
        meta.capability.label(),
        capability_meaning(meta.capability)
    );
    println!();

    println!("DESCRIPTION");
    println!("--------------------------------------------------------------------------------");
    println!("{}", meta.description);
    println!();

    println!("CATEGORIES");
    println!("--------------------------------------------------------------------------------");
    for line in category_lines(&meta, &policy) {
        println!("  {}", line);
    }
    println!();

    let mut strategies: Vec<_> = meta
        .categories
        .iter()
        .map(|c| meta.strategy_for(c, &policy))
        .collect();
    strategies.dedup();
    for strategy in strategies {
        println!("STRATEGY: {}", format_strategy(strategy));
        println!("--------------------------------------------------------------------------------");
        println!("{}", strategy_meaning(strategy));
        println!();
    }

    Ok(())
}

fn cmd_list_providers(args: ListProvidersArgs) -> anyhow::Result<()> {
    use explain::format_strategy;

    let policy = load_policy(&args.root)?;
    let metas = builtin_provider_metas();

    match args.format {
        OutputFormat::Text => {
            println!("Available providers:\n");
            println!("  {:<22} {:<16} {:<22} STRATEGY", "KEY", "CAPABILITY", "CATEGORY");
            println!("  {:<22} {:<16} {:<22} --------", "---", "----------", "--------");
            for meta in &metas {
                for category in &meta.categories {
                    println!(
                        "  {:<22} {:<16} {:<22} {}",
                        meta.key,
                        meta.capability.label(),
                        category,
                        format_strategy(meta.strategy_for(category, &policy))
                    );
                }
            }
            println!();
            println!("Use 'codefix explain <key>' for details.");
        }
        OutputFormat::Json => {
            let providers: Vec<_> = metas
                .iter()
                .map(|m| {
                    let categories: Vec<_> = m
                        .categories
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "category": c,
                                "strategy": m.strategy_for(c, &policy),
                                "fallback": policy.rule_for(c),
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "key": m.key,
                        "description": m.description,
                        "capability": m.capability.label(),
                        "categories": categories,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&providers)?);
        }
    }
    Ok(())
}
