//! Stylesheet relocation: `<link rel="stylesheet" href>` references.

use structurize_shared::{Result, StructurizerKind};

use super::relocate::{ReferenceRule, relocate};
use super::{StructurizeContext, StructurizeReport, Structurizer};

const REFERENCES: &[ReferenceRule] = &[ReferenceRule {
    selector: r#"link[rel~="stylesheet"][href]"#,
    attr: "href",
}];

/// Moves emitted stylesheets into their folder (`css/` by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct StylesStructurizer;

impl Structurizer for StylesStructurizer {
    fn kind(&self) -> StructurizerKind {
        StructurizerKind::Styles
    }

    async fn structurize(&self, cx: StructurizeContext<'_>) -> Result<StructurizeReport> {
        relocate(self.kind(), REFERENCES, false, cx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AssetGraph;
    use crate::markup::MarkupDocument;
    use crate::structurizer::testing::{page, write_files};
    use crate::url::{PublicPath, UrlClassifier};
    use structurize_shared::RuleOptions;

    #[tokio::test]
    async fn relocates_stylesheets_with_custom_folder() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &[("main.css", "body{}"), ("print.css", "body{}")]);

        let head = r#"<link rel="stylesheet" href="main.css"><link rel="preload" href="print.css">"#;
        let mut markups = vec![MarkupDocument::parse("index.html", &page(head, ""))];
        let mut graph = AssetGraph::new();
        let options = RuleOptions {
            patterns: None,
            folder: Some("static/styles".into()),
        };

        let report = StylesStructurizer
            .structurize(StructurizeContext {
                out_dir: dir.path(),
                public_path: &PublicPath::resolve("https://example.com/site/"),
                classifier: &UrlClassifier::default(),
                options: &options,
                markups: &mut markups,
                graph: &mut graph,
            })
            .await
            .unwrap();

        assert_eq!(report.rewritten, 1);
        let html = markups[0].serialize();
        assert!(html.contains(r#"href="https://example.com/site/static/styles/main.css""#));
        assert!(html.contains(r#"href="print.css""#));
        assert!(graph.get("print.css").is_none());
    }

    #[tokio::test]
    async fn folder_outside_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &[("main.css", "body{}")]);

        let source = page(r#"<link rel="stylesheet" href="main.css">"#, "");
        let mut markups = vec![MarkupDocument::parse("index.html", &source)];
        let mut graph = AssetGraph::new();
        let options = RuleOptions {
            patterns: None,
            folder: Some("../elsewhere".into()),
        };

        let err = StylesStructurizer
            .structurize(StructurizeContext {
                out_dir: dir.path(),
                public_path: &PublicPath::resolve("/"),
                classifier: &UrlClassifier::default(),
                options: &options,
                markups: &mut markups,
                graph: &mut graph,
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("must not leave the output directory"));
        assert!(graph.is_empty());
        assert_eq!(markups[0].rewrites(), 0);
    }
}
