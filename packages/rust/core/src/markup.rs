//! Parsed HTML output documents.
//!
//! A [`MarkupDocument`] owns the `scraper` tree of one emitted HTML file for
//! the duration of a run. Structurizers read attribute values through
//! selectors and rewrite them in place; the orchestrator serializes the tree
//! back at flush time.

use std::path::Path;

use scraper::{Html, Node, Selector, StrTendril};
use tracing::debug;

use structurize_shared::{Result, StructurizeError};

/// Compile a CSS selector, mapping failures to a parse error.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| StructurizeError::parse(format!("invalid selector '{css}': {e}")))
}

/// Output-relative path with `/` separators.
pub(crate) fn output_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// One emitted HTML file and its mutable tree.
pub struct MarkupDocument {
    /// Output-relative path with `/` separators.
    path: String,
    html: Html,
    rewrites: usize,
}

impl std::fmt::Debug for MarkupDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupDocument")
            .field("path", &self.path)
            .field("rewrites", &self.rewrites)
            .finish_non_exhaustive()
    }
}

impl MarkupDocument {
    /// Parse a document from source text.
    pub fn parse(path: impl Into<String>, source: &str) -> Self {
        Self {
            path: path.into(),
            html: Html::parse_document(source),
            rewrites: 0,
        }
    }

    /// Read and parse `relative` inside `out_dir`.
    pub async fn load(out_dir: &Path, relative: &Path) -> Result<Self> {
        let full = out_dir.join(relative);
        let source = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| StructurizeError::io(&full, e))?;

        let path = output_path(relative);
        debug!(document = %path, bytes = source.len(), "parsed markup document");

        Ok(Self::parse(path, &source))
    }

    /// Output-relative path of the document.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directory of the document relative to the output root (`""` at root).
    pub fn dir(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Number of attribute values rewritten so far.
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    /// Values of `attr` on every element matching `selector`, in document order.
    pub fn attr_values(&self, selector: &Selector, attr: &str) -> Vec<String> {
        self.html
            .select(selector)
            .filter_map(|el| el.value().attr(attr).map(str::to_string))
            .collect()
    }

    /// Every `(name, value)` attribute pair in the tree, in document order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.html
            .tree
            .values()
            .filter_map(Node::as_element)
            .flat_map(|el| el.attrs().map(|(name, value)| (name.to_string(), value.to_string())))
            .collect()
    }

    /// Rewrite `attr` on every element matching `selector`.
    ///
    /// `rewrite` receives the current value and returns the replacement, or
    /// `None` to leave it. Returns the number of values changed.
    pub fn rewrite_attr<F>(&mut self, selector: &Selector, attr: &str, mut rewrite: F) -> usize
    where
        F: FnMut(&str) -> Option<String>,
    {
        let pending: Vec<_> = self
            .html
            .select(selector)
            .filter_map(|el| {
                let current = el.value().attr(attr)?;
                let replacement = rewrite(current)?;
                (replacement != current).then(|| (el.id(), replacement))
            })
            .collect();

        let mut changed = 0;
        for (id, replacement) in pending {
            let Some(mut node) = self.html.tree.get_mut(id) else {
                continue;
            };
            if let Node::Element(element) = node.value() {
                for (name, value) in element.attrs.iter_mut() {
                    if &*name.local == attr {
                        *value = StrTendril::from(replacement.as_str());
                        changed += 1;
                    }
                }
            }
        }

        self.rewrites += changed;
        changed
    }

    /// Serialize the current tree.
    pub fn serialize(&self) -> String {
        self.html.html()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<link rel="stylesheet" href="main.css">
<script src="bundle.js"></script>
</head><body>
<img src="logo.png" alt="logo"><img src="https://cdn.example.com/remote.png">
</body></html>"#;

    #[test]
    fn attr_values_in_document_order() {
        let doc = MarkupDocument::parse("index.html", PAGE);
        let imgs = selector("img[src]").unwrap();
        assert_eq!(
            doc.attr_values(&imgs, "src"),
            ["logo.png", "https://cdn.example.com/remote.png"]
        );
    }

    #[test]
    fn attributes_cover_every_element() {
        let doc = MarkupDocument::parse("index.html", PAGE);
        let attrs = doc.attributes();
        assert!(attrs.contains(&("rel".to_string(), "stylesheet".to_string())));
        assert!(attrs.contains(&("alt".to_string(), "logo".to_string())));
        assert_eq!(attrs.iter().filter(|(name, _)| name == "src").count(), 3);
    }

    #[test]
    fn rewrite_attr_changes_only_selected_values() {
        let mut doc = MarkupDocument::parse("index.html", PAGE);
        let scripts = selector("script[src]").unwrap();

        let changed = doc.rewrite_attr(&scripts, "src", |src| Some(format!("/js/{src}")));
        assert_eq!(changed, 1);
        assert_eq!(doc.rewrites(), 1);

        let html = doc.serialize();
        assert!(html.contains(r#"<script src="/js/bundle.js"></script>"#));
        assert!(html.contains(r#"href="main.css""#));
        assert!(html.contains(r#"alt="logo""#));
    }

    #[test]
    fn rewrite_to_same_value_is_not_counted() {
        let mut doc = MarkupDocument::parse("index.html", PAGE);
        let imgs = selector("img[src]").unwrap();
        let changed = doc.rewrite_attr(&imgs, "src", |src| Some(src.to_string()));
        assert_eq!(changed, 0);
        let changed = doc.rewrite_attr(&imgs, "src", |_| None);
        assert_eq!(changed, 0);
    }

    #[test]
    fn serialize_keeps_doctype() {
        let doc = MarkupDocument::parse("index.html", PAGE);
        assert!(doc.serialize().starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn dir_of_nested_document() {
        assert_eq!(MarkupDocument::parse("index.html", "").dir(), "");
        assert_eq!(MarkupDocument::parse("blog/post/index.html", "").dir(), "blog/post");
    }

    #[test]
    fn invalid_selector_is_parse_error() {
        let err = selector("img[").unwrap_err();
        assert!(err.to_string().starts_with("parse error"));
    }

    #[tokio::test]
    async fn load_reads_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/index.html"), PAGE).unwrap();

        let doc = MarkupDocument::load(dir.path(), Path::new("blog/index.html"))
            .await
            .unwrap();
        assert_eq!(doc.path(), "blog/index.html");
        assert_eq!(doc.dir(), "blog");

        let missing = MarkupDocument::load(dir.path(), Path::new("nope.html")).await;
        assert!(matches!(missing, Err(StructurizeError::Io { .. })));
    }
}
