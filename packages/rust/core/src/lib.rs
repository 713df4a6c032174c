//! Core pipeline orchestration and asset restructuring for Structurize.
//!
//! This crate ties together public-path resolution, the shared asset graph,
//! the built-in structurizers, stylesheet reference upkeep and the staged
//! flush into a single run ([`Pipeline::run`]) over a bundler's output
//! directory.

pub mod flush;
pub mod graph;
pub mod inventory;
pub mod markup;
pub mod pipeline;
pub mod references;
pub mod reporter;
pub mod structurizer;
pub mod url;

pub use flush::{FlushPlan, FlushSummary};
pub use graph::{AssetEntry, AssetGraph, AssetLocation, AssetRegistration};
pub use inventory::{BundleInventory, DirectoryInventory, StaticInventory};
pub use markup::MarkupDocument;
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutcome, RunSummary, SkipReason};
pub use references::StylesheetRewrite;
pub use reporter::{PipelineReporter, SilentReporter};
pub use structurizer::{StructurizeContext, StructurizeReport, Structurizer};
pub use crate::url::{PublicPath, UrlClassifier};
