//! End-to-end structurize run: config → public path → documents →
//! structurizers → stylesheet references → flush.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use structurize_shared::{
    BuildMode, Result, RunId, StructurizeError, StructurizeSettings, StructurizerKind,
    default_rules, resolve_rules,
};

use crate::flush::{self, FlushPlan, FlushSummary};
use crate::graph::AssetGraph;
use crate::inventory::{BundleInventory, is_markup};
use crate::markup::MarkupDocument;
use crate::references;
use crate::reporter::PipelineReporter;
use crate::structurizer::{self, StructurizeContext};
use crate::url::{PublicPath, UrlClassifier};

/// Inputs supplied by the host build.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: BuildMode,
    /// Output directory the bundler wrote to.
    pub out_dir: PathBuf,
    /// Public URL the output is served from (absolute or path-only).
    pub public_url: String,
    pub settings: StructurizeSettings,
    /// Where the settings were loaded from, if anywhere.
    pub config_path: Option<PathBuf>,
    pub classifier: UrlClassifier,
}

impl PipelineConfig {
    /// Production config with default settings.
    pub fn new(out_dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            mode: BuildMode::Production,
            out_dir: out_dir.into(),
            public_url: public_url.into(),
            settings: StructurizeSettings::default(),
            config_path: None,
            classifier: UrlClassifier::default(),
        }
    }
}

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotProduction,
    Disabled,
    NoRules,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotProduction => f.write_str("not a production build"),
            Self::Disabled => f.write_str("structurize is disabled"),
            Self::NoRules => f.write_str("no structurizer is enabled"),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub public_path: PublicPath,
    /// Structurizers that ran, in order.
    pub structurizers: Vec<StructurizerKind>,
    /// Markup documents loaded.
    pub documents: usize,
    pub flush: FlushSummary,
    /// Total files written, moved or removed.
    pub files_modified: usize,
    pub elapsed: Duration,
    /// Per-file change log from every structurizer.
    pub file_logs: Vec<String>,
    pub verbose: bool,
}

/// How a run ended. A run never returns `Err`; failures land in `Failed`.
#[derive(Debug)]
pub enum PipelineOutcome {
    Skipped(SkipReason),
    Completed(RunSummary),
    Failed(StructurizeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    ConfigResolved,
    ContextResolved,
    DocumentsLoaded,
    Structurizing { index: usize, total: usize },
    Flushed,
    Failed,
}

fn enter(state: PipelineState) {
    debug!(?state, "pipeline state");
}

/// One structurize run for one build.
pub struct Pipeline {
    config: PipelineConfig,
    ran: AtomicBool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            ran: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline. A pipeline runs at most once; later calls fail with
    /// [`StructurizeError::AlreadyRan`] without touching the output.
    #[instrument(skip_all, fields(out_dir = %self.config.out_dir.display(), mode = %self.config.mode))]
    pub async fn run(
        &self,
        inventory: &dyn BundleInventory,
        reporter: &dyn PipelineReporter,
    ) -> PipelineOutcome {
        if self.ran.swap(true, Ordering::SeqCst) {
            let err = StructurizeError::AlreadyRan;
            warn!("pipeline asked to run twice");
            reporter.error(&err);
            return PipelineOutcome::Failed(err);
        }

        match self.execute(inventory, reporter).await {
            Ok(outcome) => outcome,
            Err(e) => {
                enter(PipelineState::Failed);
                error!(error = %e, "structurize run failed, output left untouched");
                reporter.error(&e);
                PipelineOutcome::Failed(e)
            }
        }
    }

    async fn execute(
        &self,
        inventory: &dyn BundleInventory,
        reporter: &dyn PipelineReporter,
    ) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let config = &self.config;

        // --- Gates ---
        if !config.mode.is_production() {
            info!("skipping structurize outside production builds");
            return Ok(PipelineOutcome::Skipped(SkipReason::NotProduction));
        }
        let user = match &config.settings {
            StructurizeSettings::Disabled => {
                info!("structurize disabled by configuration");
                return Ok(PipelineOutcome::Skipped(SkipReason::Disabled));
            }
            StructurizeSettings::Enabled(user) => user,
        };

        let run_id = RunId::new();
        info!(%run_id, "starting structurize run");
        reporter.welcome(config.config_path.as_deref());

        // --- Phase 1: Configuration ---
        let resolved = resolve_rules(&default_rules(), user)?;
        for key in &resolved.invalid_keys {
            reporter.invalid_config_key(key);
        }
        if resolved.plan.is_empty() {
            warn!("every structurizer is disabled, nothing to do");
            reporter.no_rules();
            return Ok(PipelineOutcome::Skipped(SkipReason::NoRules));
        }
        enter(PipelineState::ConfigResolved);

        // --- Phase 2: Public path ---
        let public_path = PublicPath::resolve(&config.public_url);
        info!(origin = %public_path.origin, prefix = %public_path.prefix, "resolved public path");
        enter(PipelineState::ContextResolved);

        // --- Phase 3: Documents ---
        let files = inventory.bundle_files()?;
        let mut markups = load_documents(&config.out_dir, &files).await?;
        enter(PipelineState::DocumentsLoaded);

        // --- Phase 4: Structurizers ---
        let mut graph = AssetGraph::new();
        let total = resolved.plan.len();
        let mut file_logs = Vec::new();

        for (i, rule) in resolved.plan.iter().enumerate() {
            enter(PipelineState::Structurizing {
                index: i + 1,
                total,
            });
            reporter.structurizer_started(rule.kind, i + 1, total);

            let report = structurizer::run(
                rule.kind,
                StructurizeContext {
                    out_dir: &config.out_dir,
                    public_path: &public_path,
                    classifier: &config.classifier,
                    options: &rule.options,
                    markups: &mut markups,
                    graph: &mut graph,
                },
            )
            .await?;

            info!(structurizer = %rule.kind, rewritten = report.rewritten, "structurizer finished");
            reporter.structurizer_finished(&report);
            file_logs.extend(report.file_logs);
        }

        if user.verbose {
            reporter.asset_graph(&graph);
        }

        // --- Phase 5: Stylesheet references and duplicates ---
        let stylesheets = references::rewrite_stylesheets(
            &config.out_dir,
            &files,
            &public_path,
            &config.classifier,
            &graph,
        )
        .await?;
        for sheet in &stylesheets {
            file_logs.push(format!("{}: {} url() reference(s) rewritten", sheet.target, sheet.rewritten));
        }
        let removable =
            references::removable_duplicates(&markups, &public_path, &config.classifier, &graph);

        // --- Phase 6: Flush ---
        let flushed = flush::flush(
            &config.out_dir,
            FlushPlan {
                markups: &markups,
                stylesheets: &stylesheets,
                graph: &graph,
                removable_duplicates: &removable,
            },
        )
        .await?;
        enter(PipelineState::Flushed);

        let summary = RunSummary {
            run_id,
            public_path,
            structurizers: resolved.plan.iter().map(|rule| rule.kind).collect(),
            documents: markups.len(),
            files_modified: flushed.files_modified(),
            flush: flushed,
            elapsed: start.elapsed(),
            file_logs,
            verbose: user.verbose,
        };

        info!(
            run_id = %summary.run_id,
            documents = summary.documents,
            files_modified = summary.files_modified,
            elapsed_ms = summary.elapsed.as_millis(),
            "structurize run complete"
        );
        reporter.complete(&summary);

        Ok(PipelineOutcome::Completed(summary))
    }
}

/// Read and parse every HTML file among `files`.
async fn load_documents(out_dir: &Path, files: &[PathBuf]) -> Result<Vec<MarkupDocument>> {
    let mut markups = Vec::new();

    for file in files.iter().filter(|file| is_markup(file)) {
        markups.push(MarkupDocument::load(out_dir, file).await?);
    }

    info!(files = files.len(), documents = markups.len(), "loaded markup documents");
    Ok(markups)
}
