//! Write-back of a completed run.
//!
//! Nothing touches the output directory until every structurizer has
//! succeeded. The flush then:
//! 1. Serializes every document, and every stylesheet whose `url(...)`
//!    references changed, to a temp file next to it
//! 2. Moves relocated assets into place (rolled back on failure)
//! 3. Renames the temp files over their targets
//! 4. Removes duplicate assets nothing references any more

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use structurize_shared::{Result, StructurizeError};

use crate::graph::AssetGraph;
use crate::markup::MarkupDocument;
use crate::references::StylesheetRewrite;

/// Everything a flush persists.
#[derive(Debug, Clone, Copy)]
pub struct FlushPlan<'a> {
    pub markups: &'a [MarkupDocument],
    pub stylesheets: &'a [StylesheetRewrite],
    pub graph: &'a AssetGraph,
    /// Duplicate assets safe to delete, output-relative.
    pub removable_duplicates: &'a [String],
}

/// What the flush changed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub documents_written: usize,
    pub stylesheets_rewritten: usize,
    pub assets_moved: usize,
    pub duplicates_removed: usize,
}

impl FlushSummary {
    /// Total number of file writes, moves and removals.
    pub fn files_modified(&self) -> usize {
        self.documents_written
            + self.stylesheets_rewritten
            + self.assets_moved
            + self.duplicates_removed
    }
}

/// Temp path used to stage `path`: `.<name>.structurize.tmp` in the same dir.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.structurize.tmp"))
}

/// Persist every in-memory change of the run under `out_dir`.
#[instrument(skip_all, fields(out_dir = %out_dir.display(), documents = plan.markups.len()))]
pub async fn flush(out_dir: &Path, plan: FlushPlan<'_>) -> Result<FlushSummary> {
    let mut summary = FlushSummary::default();

    // Stage documents and stylesheets. A stylesheet is staged next to where
    // it was emitted and committed to where it ends up.
    let documents = plan.markups.iter().map(|doc| {
        let target = out_dir.join(doc.path());
        (staging_path(&target), target, doc.serialize())
    });
    let stylesheets = plan.stylesheets.iter().map(|sheet| {
        (
            staging_path(&out_dir.join(&sheet.source)),
            out_dir.join(&sheet.target),
            sheet.content.clone(),
        )
    });

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    for (temp, target, content) in documents.chain(stylesheets) {
        if let Err(e) = tokio::fs::write(&temp, &content).await {
            discard(&staged).await;
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StructurizeError::io(&temp, e));
        }
        debug!(target = %target.display(), size = content.len(), "staged file");
        staged.push((temp, target));
    }

    // Move assets
    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
    for (from, to) in plan.graph.relocations() {
        let source = out_dir.join(from);
        let dest = out_dir.join(to);

        if let Err(e) = move_file(&source, &dest).await {
            roll_back(&moved).await;
            discard(&staged).await;
            return Err(e);
        }
        debug!(from, to, "moved asset");
        moved.push((source, dest));
    }
    summary.assets_moved = moved.len();

    // Commit staged files
    for (i, (temp, target)) in staged.iter().enumerate() {
        if let Err(e) = tokio::fs::rename(temp, target).await {
            discard(&staged[i..]).await;
            return Err(StructurizeError::io(target, e));
        }
    }
    summary.documents_written = plan.markups.len();
    summary.stylesheets_rewritten = plan.stylesheets.len();

    // Drop duplicates
    for id in plan.removable_duplicates {
        let path = out_dir.join(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => summary.duplicates_removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove duplicate asset"),
        }
    }

    info!(
        documents = summary.documents_written,
        stylesheets = summary.stylesheets_rewritten,
        moved = summary.assets_moved,
        duplicates = summary.duplicates_removed,
        "flushed structurized output"
    );

    Ok(summary)
}

async fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StructurizeError::io(parent, e))?;
    }
    tokio::fs::rename(source, dest)
        .await
        .map_err(|e| StructurizeError::io(source, e))
}

/// Undo completed moves, newest first.
async fn roll_back(moved: &[(PathBuf, PathBuf)]) {
    for (source, dest) in moved.iter().rev() {
        if let Err(e) = tokio::fs::rename(dest, source).await {
            warn!(path = %dest.display(), error = %e, "failed to restore moved asset");
        }
    }
}

async fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        let _ = tokio::fs::remove_file(temp).await;
    }
}
