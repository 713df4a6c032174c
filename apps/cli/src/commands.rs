//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use structurize_core::{
    AssetGraph, DirectoryInventory, Pipeline, PipelineConfig, PipelineOutcome, PipelineReporter,
    RunSummary, StructurizeReport, UrlClassifier,
};
use structurize_shared::{
    BuildMode, RuleValue, StructurizeError, StructurizeSettings, StructurizerKind, UserConfig,
    builtin_options, default_rules, discover_settings, init_config, load_settings, resolve_rules,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Structurize — tidy a bundler's output directory.
#[derive(Parser)]
#[command(
    name = "structurize",
    version,
    about = "Restructure built web output: relocate assets and rewrite references in HTML.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv). Also enables the asset graph dump.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Build mode as accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ModeArg {
    Production,
    Development,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Production => BuildMode::Production,
            ModeArg::Development => BuildMode::Development,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Restructure a finished build's output directory.
    Run {
        /// Output directory the bundler wrote to.
        #[arg(long, default_value = "dist")]
        out_dir: PathBuf,

        /// Public URL the output is served from.
        #[arg(long, default_value = "/")]
        public_url: String,

        /// Config file (structurize.toml or package.json). Discovered in the
        /// working directory when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Build mode; nothing happens outside production.
        #[arg(long, value_enum, env = "STRUCTURIZE_MODE", default_value = "production")]
        mode: ModeArg,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a structurize.toml with the default rules.
    Init {
        /// Directory to write into.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show the resolved rules.
    Show {
        /// Config file to read instead of discovering one.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "structurize=info",
        1 => "structurize=debug",
        _ => "structurize=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let verbose = cli.verbose > 0;
    match cli.command {
        Command::Run {
            out_dir,
            public_url,
            config,
            mode,
        } => cmd_run(out_dir, public_url, config.as_deref(), mode.into(), verbose).await,
        Command::Config { action } => match action {
            ConfigAction::Init { dir } => cmd_config_init(&dir),
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()),
        },
    }
}

/// Load explicit settings, or discover them in the working directory.
fn settings_for(config: Option<&Path>) -> Result<(StructurizeSettings, Option<PathBuf>)> {
    match config {
        Some(path) => Ok((load_settings(path)?, Some(path.to_path_buf()))),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
            Ok(discover_settings(&cwd)?)
        }
    }
}

async fn cmd_run(
    out_dir: PathBuf,
    public_url: String,
    config: Option<&Path>,
    mode: BuildMode,
    verbose: bool,
) -> Result<()> {
    if !out_dir.is_dir() {
        return Err(eyre!("output directory '{}' does not exist", out_dir.display()));
    }

    let (mut settings, config_path) = settings_for(config)?;
    if let StructurizeSettings::Enabled(user) = &mut settings {
        user.verbose |= verbose;
    }

    info!(out_dir = %out_dir.display(), public_url, %mode, "structurizing build output");

    let inventory = DirectoryInventory::new(&out_dir);
    let pipeline = Pipeline::new(PipelineConfig {
        mode,
        out_dir,
        public_url,
        settings,
        config_path,
        classifier: UrlClassifier::default(),
    });
    let reporter = CliReporter::new();

    match pipeline.run(&inventory, &reporter).await {
        PipelineOutcome::Completed(_) => Ok(()),
        PipelineOutcome::Skipped(reason) => {
            reporter.spinner.finish_and_clear();
            println!("  Structurize skipped: {reason}");
            Ok(())
        }
        PipelineOutcome::Failed(e) => Err(e.into()),
    }
}

fn cmd_config_init(dir: &Path) -> Result<()> {
    let path = init_config(dir)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: Option<&Path>) -> Result<()> {
    let (settings, config_path) = settings_for(config)?;
    match &config_path {
        Some(path) => println!("# source: {}", path.display()),
        None => println!("# source: built-in defaults"),
    }

    let user = match settings {
        StructurizeSettings::Disabled => {
            println!("enabled = false");
            return Ok(());
        }
        StructurizeSettings::Enabled(user) => user,
    };

    let resolved = resolve_rules(&default_rules(), &user)?;
    for key in &resolved.invalid_keys {
        println!("# ignored invalid key: {key}");
    }
    for (kind, value) in &resolved.rules {
        if value.is_disabled() {
            println!("# disabled: {kind}");
        }
    }

    // Every enabled rule with its effective options, in execution order.
    let effective = UserConfig {
        enabled: true,
        verbose: user.verbose,
        rules: resolved
            .plan
            .iter()
            .map(|rule| {
                let options = rule.options.with_fallback(&builtin_options(rule.kind));
                (rule.kind.name().to_string(), serde_json::Value::from(RuleValue::Options(options)))
            })
            .collect(),
    };
    println!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI reporter
// ---------------------------------------------------------------------------

/// Terminal reporter using an indicatif spinner for structurizer progress.
struct CliReporter {
    spinner: ProgressBar,
}

impl CliReporter {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("spinner template is valid")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        Self { spinner }
    }
}

impl PipelineReporter for CliReporter {
    fn welcome(&self, config_source: Option<&Path>) {
        self.spinner
            .enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner.println("  Structurize: restructuring production output");
        if let Some(path) = config_source {
            self.spinner.println(format!("  Config: {}", path.display()));
        }
    }

    fn invalid_config_key(&self, key: &str) {
        self.spinner
            .println(format!("  warning: ignored invalid config key '{key}'"));
    }

    fn no_rules(&self) {
        self.spinner
            .println("  warning: every structurizer is disabled, nothing to do");
    }

    fn structurizer_started(&self, kind: StructurizerKind, index: usize, total: usize) {
        self.spinner
            .set_message(format!("Structurizing [{index}/{total}] {kind}"));
    }

    fn structurizer_finished(&self, report: &StructurizeReport) {
        self.spinner.println(format!(
            "  ✓ {} ({} reference(s) rewritten)",
            report.kind, report.rewritten
        ));
    }

    fn asset_graph(&self, graph: &AssetGraph) {
        let entries: Vec<_> = graph.entries().collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => self.spinner.println(format!("  Asset graph:\n{json}")),
            Err(e) => warn!(error = %e, "failed to render asset graph"),
        }
    }

    fn complete(&self, summary: &RunSummary) {
        self.spinner.finish_and_clear();

        if summary.verbose {
            for line in &summary.file_logs {
                println!("    {line}");
            }
        }

        println!();
        println!("  Structurize complete!");
        println!("  Run:       {}", summary.run_id);
        println!("  Documents: {}", summary.documents);
        println!("  Modified:  {}", summary.files_modified);
        println!(
            "  Time:      {:.1}s",
            summary.elapsed.as_secs_f64()
        );
        println!();
    }

    fn error(&self, error: &StructurizeError) {
        self.spinner.finish_and_clear();
        eprintln!("  Structurize failed: {error}");
    }
}
