//! Reference relocation shared by the built-in structurizers.
//!
//! For each matched local reference: register it in the graph, plan where the
//! file moves (first claimant wins), and rewrite the attribute to the public
//! URL of the planned location.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use glob::Pattern;
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use url::Url;

use structurize_shared::{Result, StructurizeError, StructurizerKind, builtin_options};

use super::{StructurizeContext, StructurizeReport};
use crate::graph::{AssetGraph, AssetLocation, AssetRegistration};
use crate::markup::selector;
use crate::url::{PublicPath, UrlClassifier};

static BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://structurize.invalid/").expect("base URL is valid"));

/// An element/attribute pair holding references.
pub(crate) struct ReferenceRule {
    pub selector: &'static str,
    pub attr: &'static str,
}

/// How one reference value is treated.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Reference {
    /// Served from another host; identity is the URL itself.
    Remote(String),
    /// A file in the output directory plus any query/fragment suffix.
    Local { id: String, suffix: String },
    /// Fragments, data URIs, other schemes, directory paths.
    Ignored,
}

/// Run one relocation pass for `kind` over every document.
#[instrument(skip_all, fields(structurizer = %kind))]
pub(crate) async fn relocate(
    kind: StructurizerKind,
    rules: &[ReferenceRule],
    hash_contents: bool,
    cx: StructurizeContext<'_>,
) -> Result<StructurizeReport> {
    let StructurizeContext {
        out_dir,
        public_path,
        classifier,
        options,
        markups,
        graph,
    } = cx;

    let options = options.with_fallback(&builtin_options(kind));
    let patterns = compile_patterns(options.patterns.iter().flat_map(|p| p.iter()))?;
    let folder = target_folder(options.folder.as_deref().unwrap_or_default())?;
    let selectors = rules
        .iter()
        .map(|rule| Ok((selector(rule.selector)?, rule.attr)))
        .collect::<Result<Vec<_>>>()?;

    let mut report = StructurizeReport::new(kind);
    let mut present: HashMap<String, bool> = HashMap::new();

    for doc in markups.iter_mut() {
        let mut replacements: HashMap<String, String> = HashMap::new();

        for (sel, attr) in &selectors {
            for value in doc.attr_values(sel, attr) {
                match classify(&value, doc.dir(), public_path, classifier) {
                    Reference::Ignored => {}
                    Reference::Remote(url) => {
                        graph.register(AssetRegistration {
                            id: &url,
                            location: AssetLocation::Remote,
                            kind,
                            document: doc.path(),
                        })?;
                    }
                    Reference::Local { id, suffix } => {
                        if !matches_any(&patterns, &id) {
                            continue;
                        }
                        if !is_present(&mut present, out_dir, &id).await {
                            debug!(document = doc.path(), reference = %value, "referenced file not in output, skipping");
                            continue;
                        }

                        let entry = graph.register(AssetRegistration {
                            id: &id,
                            location: AssetLocation::Local,
                            kind,
                            document: doc.path(),
                        })?;
                        if entry.url.is_none() && entry.owner == kind {
                            let planned = plan(graph, &id, &folder, hash_contents, out_dir).await?;
                            planned.record(graph, kind, &id, public_path, &mut report)?;
                        }

                        if let Some(url) = graph.get(&id).and_then(|entry| entry.url.as_deref()) {
                            replacements.insert(value.clone(), format!("{url}{suffix}"));
                        }
                    }
                }
            }
        }

        let mut changed = 0;
        for (sel, attr) in &selectors {
            changed += doc.rewrite_attr(sel, attr, |value| replacements.get(value).cloned());
        }
        if changed > 0 {
            debug!(document = doc.path(), changed, "rewrote references");
            report
                .file_logs
                .push(format!("{}: {changed} {kind} reference(s) rewritten", doc.path()));
        }
        report.rewritten += changed;
    }

    Ok(report)
}

/// Where a newly claimed asset ends up.
struct Planned {
    target: String,
    content_hash: Option<String>,
    /// Identity and URL of an identical-content entry, if any.
    original: Option<(String, Option<String>)>,
}

impl Planned {
    fn record(
        self,
        graph: &mut AssetGraph,
        kind: StructurizerKind,
        id: &str,
        public_path: &PublicPath,
        report: &mut StructurizeReport,
    ) -> Result<()> {
        let (duplicate_of, url) = match self.original {
            Some((original, url)) => {
                debug!(id, duplicate_of = %original, "identical content, folding into existing asset");
                report.file_logs.push(format!("{id} = {original} (duplicate)"));
                let url = url.unwrap_or_else(|| public_path.url_for(&self.target));
                (Some(original), url)
            }
            None => {
                if self.target != id {
                    debug!(id, target = %self.target, "planned relocation");
                    report.file_logs.push(format!("{id} -> {}", self.target));
                }
                (None, public_path.url_for(&self.target))
            }
        };

        let entry = graph
            .get_mut(id)
            .ok_or_else(|| StructurizeError::graph(format!("'{id}' vanished during {kind}")))?;
        entry.content_hash = self.content_hash;
        entry.duplicate_of = duplicate_of;
        entry.target = Some(self.target);
        entry.url = Some(url);
        Ok(())
    }
}

async fn plan(
    graph: &AssetGraph,
    id: &str,
    folder: &str,
    hash_contents: bool,
    out_dir: &Path,
) -> Result<Planned> {
    let content_hash = if hash_contents {
        Some(hash_file(&out_dir.join(id)).await?)
    } else {
        None
    };

    let original = content_hash
        .as_deref()
        .and_then(|hash| graph.find_by_hash(hash, id));
    if let Some(original) = original {
        return Ok(Planned {
            target: original.target.clone().unwrap_or_else(|| original.id.clone()),
            original: Some((original.id.clone(), original.url.clone())),
            content_hash,
        });
    }

    Ok(Planned {
        target: choose_target(graph, out_dir, folder, id).await,
        content_hash,
        original: None,
    })
}

/// `folder/<file name>`, or `folder/<path>` when that is taken.
///
/// Assets already inside the folder stay where they are.
async fn choose_target(graph: &AssetGraph, out_dir: &Path, folder: &str, id: &str) -> String {
    if folder.is_empty() || id.starts_with(&format!("{folder}/")) {
        return id.to_string();
    }

    let file_name = id.rsplit('/').next().unwrap_or(id);
    for candidate in [format!("{folder}/{file_name}"), format!("{folder}/{id}")] {
        let occupied = graph.target_in_use(&candidate, id)
            || tokio::fs::try_exists(out_dir.join(&candidate))
                .await
                .unwrap_or(true);
        if !occupied {
            return candidate;
        }
    }

    warn!(id, folder, "no free location in folder, leaving asset in place");
    id.to_string()
}

/// Normalize a configured folder; it must stay inside the output directory.
fn target_folder(raw: &str) -> Result<String> {
    let folder = raw.trim_matches('/');
    if folder.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StructurizeError::config(format!(
            "folder '{raw}' must not leave the output directory"
        )));
    }
    Ok(folder.to_string())
}

fn compile_patterns<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<Vec<Pattern>> {
    patterns
        .map(|raw| {
            Pattern::new(raw)
                .map_err(|e| StructurizeError::config(format!("invalid match pattern '{raw}': {e}")))
        })
        .collect()
}

/// Whether the file name of `id` matches any pattern.
fn matches_any(patterns: &[Pattern], id: &str) -> bool {
    let file_name = id.rsplit('/').next().unwrap_or(id);
    patterns.iter().any(|pattern| pattern.matches(file_name))
}

async fn is_present(cache: &mut HashMap<String, bool>, out_dir: &Path, id: &str) -> bool {
    if let Some(known) = cache.get(id) {
        return *known;
    }
    let present = tokio::fs::metadata(out_dir.join(id))
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    cache.insert(id.to_string(), present);
    present
}

async fn hash_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StructurizeError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Classify a reference found in a file living in `doc_dir`.
pub(crate) fn classify(
    value: &str,
    doc_dir: &str,
    public_path: &PublicPath,
    classifier: &UrlClassifier,
) -> Reference {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return Reference::Ignored;
    }

    let path = match public_path.same_origin_path(value) {
        Some(rest) => rest,
        None if !classifier.is_local_or_relative(value) => {
            return Reference::Remote(value.to_string());
        }
        None if has_scheme(value) => return Reference::Ignored,
        None => value,
    };

    let (path, suffix) = match path.find(['?', '#']) {
        Some(at) => path.split_at(at),
        None => (path, ""),
    };

    let resolved = if path.starts_with('/') {
        resolve_local("", public_path.strip_prefix(path))
    } else {
        resolve_local(doc_dir, path)
    };

    match resolved {
        Some(id) => Reference::Local {
            id,
            suffix: suffix.to_string(),
        },
        None => Reference::Ignored,
    }
}

/// Resolve `path` against `dir` into a normalized output-relative file path.
///
/// `..` segments that climb above the output root are clamped at the root.
fn resolve_local(dir: &str, path: &str) -> Option<String> {
    let base = if dir.is_empty() {
        BASE.clone()
    } else {
        BASE.join(&format!("{dir}/")).ok()?
    };
    let joined = base.join(path).ok()?;
    let decoded = percent_decode_str(joined.path()).decode_utf8().ok()?;
    let id = decoded.trim_start_matches('/');

    (!id.is_empty() && !id.ends_with('/')).then(|| id.to_string())
}

/// `scheme:` prefix such as `data:` or `mailto:`.
fn has_scheme(value: &str) -> bool {
    value.split_once(':').is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: &str, suffix: &str) -> Reference {
        Reference::Local {
            id: id.into(),
            suffix: suffix.into(),
        }
    }

    #[test]
    fn classify_relative_and_rooted() {
        let public = PublicPath::resolve("/app/");
        let classifier = UrlClassifier::default();

        assert_eq!(classify("bundle.js", "", &public, &classifier), local("bundle.js", ""));
        assert_eq!(
            classify("/app/js/a.js?v=2", "", &public, &classifier),
            local("js/a.js", "?v=2")
        );
        assert_eq!(
            classify("../logo.png#top", "blog", &public, &classifier),
            local("logo.png", "#top")
        );
        assert_eq!(
            classify("img/a%20b.png", "blog", &public, &classifier),
            local("blog/img/a b.png", "")
        );
        assert_eq!(
            classify("../../../x.png", "blog", &public, &classifier),
            local("x.png", "")
        );
    }

    #[test]
    fn classify_remote_same_origin_and_ignored() {
        let public = PublicPath::resolve("https://cdn.example.com/app/");
        let classifier = UrlClassifier::default();

        assert_eq!(
            classify("https://cdn.example.com/app/bundle.js", "", &public, &classifier),
            local("bundle.js", "")
        );
        assert_eq!(
            classify("https://fonts.example.org/f.css", "", &public, &classifier),
            Reference::Remote("https://fonts.example.org/f.css".into())
        );
        assert_eq!(
            classify("//cdn.other.net/x.js", "", &public, &classifier),
            Reference::Remote("//cdn.other.net/x.js".into())
        );
        for ignored in ["", "#main", "data:image/png;base64,AAAA", "mailto:a@b.c", "/app/"] {
            assert_eq!(classify(ignored, "", &public, &classifier), Reference::Ignored, "{ignored}");
        }
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("data:text/plain,hi"));
        assert!(has_scheme("javascript:void(0)"));
        assert!(!has_scheme("a.png"));
        assert!(!has_scheme("/a:b.png"));
        assert!(!has_scheme(":x"));
    }

    #[test]
    fn pattern_matching_uses_file_name() {
        let patterns = compile_patterns(["*.png", "*.svg"].into_iter()).unwrap();
        assert!(matches_any(&patterns, "img/logo.png"));
        assert!(matches_any(&patterns, "icon.svg"));
        assert!(!matches_any(&patterns, "bundle.js"));
    }

    #[test]
    fn folder_must_stay_inside_output() {
        assert_eq!(target_folder("/static/js/").unwrap(), "static/js");
        assert_eq!(target_folder("").unwrap(), "");
        assert_eq!(target_folder("a..b").unwrap(), "a..b");
        for escaping in ["../elsewhere", "static/../../x", "..", "a\\..\\b"] {
            let err = target_folder(escaping).unwrap_err();
            assert!(matches!(err, StructurizeError::Config { .. }), "{escaping}");
        }
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = compile_patterns(["[invalid"].into_iter()).unwrap_err();
        assert!(err.to_string().contains("invalid match pattern '[invalid'"));
    }

    #[tokio::test]
    async fn choose_target_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/taken.png"), "").unwrap();
        let mut graph = AssetGraph::new();
        graph
            .register(AssetRegistration {
                id: "a/claimed.png",
                location: AssetLocation::Local,
                kind: StructurizerKind::Assets,
                document: "index.html",
            })
            .unwrap()
            .target = Some("assets/claimed.png".into());

        let out = dir.path();
        assert_eq!(choose_target(&graph, out, "assets", "free.png").await, "assets/free.png");
        assert_eq!(
            choose_target(&graph, out, "assets", "img/taken.png").await,
            "assets/img/taken.png"
        );
        assert_eq!(
            choose_target(&graph, out, "assets", "b/claimed.png").await,
            "assets/b/claimed.png"
        );
        assert_eq!(
            choose_target(&graph, out, "assets", "assets/in-place.png").await,
            "assets/in-place.png"
        );
        assert_eq!(choose_target(&graph, out, "", "x.png").await, "x.png");
    }
}
