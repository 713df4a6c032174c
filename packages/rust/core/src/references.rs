//! References the structurizers do not rewrite themselves.
//!
//! Structurizers only touch the markup attributes they select. Once every
//! move is planned, stylesheet `url(...)` references are brought in line
//! with the new layout, and duplicate assets are only marked for removal
//! when no markup attribute still points at them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, instrument, warn};

use structurize_shared::{Result, StructurizeError};

use crate::graph::{AssetGraph, AssetLocation};
use crate::markup::{MarkupDocument, output_path};
use crate::structurizer::{Reference, classify};
use crate::url::{PublicPath, UrlClassifier};

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^"')\s]*))\s*\)"#)
        .expect("css url pattern is valid")
});

/// A stylesheet whose content changes at flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetRewrite {
    /// Where the bundler emitted the sheet.
    pub source: String,
    /// Where the sheet lives once the flush is done.
    pub target: String,
    pub content: String,
    /// Number of `url(...)` references changed.
    pub rewritten: usize,
}

fn is_stylesheet(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("css"))
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Location of `id` after the flush: its planned target, or where it is.
fn final_location(graph: &AssetGraph, id: &str) -> String {
    graph
        .get(id)
        .filter(|entry| entry.location == AssetLocation::Local)
        .and_then(|entry| entry.target.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Rewrite `url(...)` references in every stylesheet of the output so they
/// resolve from the sheet's final location to each target's final location.
///
/// Only sheets with at least one changed reference are returned.
#[instrument(skip_all, fields(files = files.len()))]
pub async fn rewrite_stylesheets(
    out_dir: &Path,
    files: &[PathBuf],
    public_path: &PublicPath,
    classifier: &UrlClassifier,
    graph: &AssetGraph,
) -> Result<Vec<StylesheetRewrite>> {
    let mut rewrites = Vec::new();

    for file in files.iter().filter(|file| is_stylesheet(file)) {
        let source = output_path(file);
        if graph.get(&source).is_some_and(|entry| entry.duplicate_of.is_some()) {
            continue;
        }

        let full = out_dir.join(file);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| StructurizeError::io(&full, e))?;
        let Ok(content) = String::from_utf8(bytes) else {
            warn!(stylesheet = %source, "stylesheet is not UTF-8, leaving it untouched");
            continue;
        };

        let target = final_location(graph, &source);
        let (content, rewritten) =
            rewrite_urls(&content, &source, &target, public_path, classifier, graph);
        if rewritten > 0 {
            debug!(stylesheet = %source, target = %target, rewritten, "rewrote stylesheet urls");
            rewrites.push(StylesheetRewrite {
                source,
                target,
                content,
                rewritten,
            });
        }
    }

    Ok(rewrites)
}

fn rewrite_urls(
    content: &str,
    source: &str,
    target: &str,
    public_path: &PublicPath,
    classifier: &UrlClassifier,
    graph: &AssetGraph,
) -> (String, usize) {
    let moved = source != target;
    let dir = parent_dir(source);
    let mut rewritten = 0;

    let output = CSS_URL.replace_all(content, |caps: &Captures<'_>| {
        let (value, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(m), _, _) => (m.as_str(), "\""),
            (_, Some(m), _) => (m.as_str(), "'"),
            (_, _, Some(m)) => (m.as_str(), ""),
            _ => return caps[0].to_string(),
        };
        match replacement(value, dir, moved, public_path, classifier, graph) {
            Some(url) => {
                rewritten += 1;
                format!("url({quote}{url}{quote})")
            }
            None => caps[0].to_string(),
        }
    });

    (output.into_owned(), rewritten)
}

/// New value for one `url(...)` reference, or `None` when it still resolves.
fn replacement(
    value: &str,
    dir: &str,
    sheet_moved: bool,
    public_path: &PublicPath,
    classifier: &UrlClassifier,
    graph: &AssetGraph,
) -> Option<String> {
    let Reference::Local { id, suffix } = classify(value, dir, public_path, classifier) else {
        return None;
    };

    let value = value.trim();
    let relative = !value.starts_with('/') && public_path.same_origin_path(value).is_none();
    let location = final_location(graph, &id);
    if location == id && !(sheet_moved && relative) {
        return None;
    }

    Some(format!("{}{suffix}", public_path.url_for(&location)))
}

/// Values in an attribute that may hold references.
fn reference_values<'a>(name: &str, value: &'a str) -> Vec<&'a str> {
    match name {
        "srcset" | "imagesrcset" => value
            .split(',')
            .filter_map(|candidate| candidate.split_whitespace().next())
            .collect(),
        "style" => CSS_URL
            .captures_iter(value)
            .filter_map(|caps| caps.get(1).or(caps.get(2)).or(caps.get(3)))
            .map(|m| m.as_str())
            .collect(),
        _ => vec![value],
    }
}

/// Duplicate assets no markup attribute refers to once the run's rewrites
/// are applied. Only these are safe to delete.
pub fn removable_duplicates(
    markups: &[MarkupDocument],
    public_path: &PublicPath,
    classifier: &UrlClassifier,
    graph: &AssetGraph,
) -> Vec<String> {
    let duplicates: BTreeSet<&str> = graph.duplicates().map(|entry| entry.id.as_str()).collect();
    if duplicates.is_empty() {
        return Vec::new();
    }

    let mut referenced: BTreeSet<String> = BTreeSet::new();
    for doc in markups {
        for (name, value) in doc.attributes() {
            for candidate in reference_values(&name, &value) {
                if let Reference::Local { id, .. } =
                    classify(candidate, doc.dir(), public_path, classifier)
                {
                    if duplicates.contains(id.as_str()) {
                        debug!(document = doc.path(), duplicate = %id, attribute = %name, "duplicate still referenced, keeping it");
                        referenced.insert(id);
                    }
                }
            }
        }
    }

    duplicates
        .into_iter()
        .filter(|id| !referenced.contains(*id))
        .map(str::to_string)
        .collect()
}
