//! Structurizer contract and the static registry of built-in variants.
//!
//! A structurizer receives every markup document of the run and the shared
//! [`AssetGraph`], rewrites references in memory, and records planned asset
//! relocations in the graph. It never writes output; the orchestrator flushes
//! once every structurizer has finished.

mod assets;
mod relocate;
mod scripts;
mod styles;

use std::path::Path;

use serde::Serialize;

use structurize_shared::{Result, RuleOptions, StructurizeError, StructurizerKind};

use crate::graph::AssetGraph;
use crate::markup::MarkupDocument;
use crate::url::{PublicPath, UrlClassifier};

pub(crate) use relocate::{Reference, classify};

pub use assets::AssetsStructurizer;
pub use scripts::ScriptsStructurizer;
pub use styles::StylesStructurizer;

/// Everything a structurizer may read or mutate during its invocation.
///
/// The borrows end when the invocation returns.
pub struct StructurizeContext<'a> {
    /// Output directory of the build.
    pub out_dir: &'a Path,
    pub public_path: &'a PublicPath,
    pub classifier: &'a UrlClassifier,
    /// Options from the resolved configuration (unset fields fall back to
    /// the structurizer's built-in options).
    pub options: &'a RuleOptions,
    pub markups: &'a mut [MarkupDocument],
    pub graph: &'a mut AssetGraph,
}

/// What a structurizer did.
#[derive(Debug, Clone, Serialize)]
pub struct StructurizeReport {
    pub kind: StructurizerKind,
    /// Attribute values rewritten across all documents.
    pub rewritten: usize,
    /// Human-readable change log lines.
    pub file_logs: Vec<String>,
}

impl StructurizeReport {
    pub fn new(kind: StructurizerKind) -> Self {
        Self {
            kind,
            rewritten: 0,
            file_logs: Vec::new(),
        }
    }
}

/// A pluggable transform over the shared documents and asset graph.
#[allow(async_fn_in_trait)]
pub trait Structurizer {
    fn kind(&self) -> StructurizerKind;

    /// Transform the documents in place. Runs to completion before the next
    /// structurizer starts.
    async fn structurize(&self, cx: StructurizeContext<'_>) -> Result<StructurizeReport>;
}

/// Dispatch `kind` to its registered implementation.
///
/// Errors are attributed to the structurizer that raised them.
pub async fn run(kind: StructurizerKind, cx: StructurizeContext<'_>) -> Result<StructurizeReport> {
    let result = match kind {
        StructurizerKind::Assets => AssetsStructurizer.structurize(cx).await,
        StructurizerKind::Scripts => ScriptsStructurizer.structurize(cx).await,
        StructurizerKind::Styles => StylesStructurizer.structurize(cx).await,
    };
    result.map_err(|e| StructurizeError::in_structurizer(kind.name(), e))
}
