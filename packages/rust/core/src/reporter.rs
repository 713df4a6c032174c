//! Diagnostics sink injected into the pipeline.

use std::path::Path;

use structurize_shared::{StructurizeError, StructurizerKind};

use crate::graph::AssetGraph;
use crate::pipeline::RunSummary;
use crate::structurizer::StructurizeReport;

/// Receives user-facing progress and diagnostics from a run.
pub trait PipelineReporter: Send + Sync {
    /// Called once a run has passed the mode and enablement gates.
    fn welcome(&self, config_source: Option<&Path>);
    /// Called for every configuration key naming no known structurizer.
    fn invalid_config_key(&self, key: &str);
    /// Called when every structurizer is disabled.
    fn no_rules(&self);
    fn structurizer_started(&self, kind: StructurizerKind, index: usize, total: usize);
    fn structurizer_finished(&self, report: &StructurizeReport);
    /// Called with the final graph, only in verbose runs.
    fn asset_graph(&self, graph: &AssetGraph);
    fn complete(&self, summary: &RunSummary);
    fn error(&self, error: &StructurizeError);
}

/// No-op reporter for headless/test usage.
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {
    fn welcome(&self, _config_source: Option<&Path>) {}
    fn invalid_config_key(&self, _key: &str) {}
    fn no_rules(&self) {}
    fn structurizer_started(&self, _kind: StructurizerKind, _index: usize, _total: usize) {}
    fn structurizer_finished(&self, _report: &StructurizeReport) {}
    fn asset_graph(&self, _graph: &AssetGraph) {}
    fn complete(&self, _summary: &RunSummary) {}
    fn error(&self, _error: &StructurizeError) {}
}
