//! Script relocation: `<script src>` references.

use structurize_shared::{Result, StructurizerKind};

use super::relocate::{ReferenceRule, relocate};
use super::{StructurizeContext, StructurizeReport, Structurizer};

const REFERENCES: &[ReferenceRule] = &[ReferenceRule {
    selector: "script[src]",
    attr: "src",
}];

/// Moves emitted scripts into their folder (`js/` by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptsStructurizer;

impl Structurizer for ScriptsStructurizer {
    fn kind(&self) -> StructurizerKind {
        StructurizerKind::Scripts
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
    async fn rewrites_script_sources_across_documents() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &[("bundle.js", "console.log(1)")]);

        let mut markups = vec![
            MarkupDocument::parse("index.html", &page(r#"<script src="bundle.js"></script>"#, "")),
            MarkupDocument::parse(
                "blog/post.html",
                &page(r#"<script src="../bundle.js?v=3"></script>"#, ""),
            ),
        ];
        let mut graph = AssetGraph::new();
        let public_path = PublicPath::resolve("/");

        let report = ScriptsStructurizer
            .structurize(StructurizeContext {
                out_dir: dir.path(),
                public_path: &public_path,
                classifier: &UrlClassifier::default(),
                options: &RuleOptions::default(),
                markups: &mut markups,
                graph: &mut graph,
            })
            .await
            .unwrap();

        assert_eq!(report.rewritten, 2);
        assert!(markups[0].serialize().contains(r#"src="/js/bundle.js""#));
        assert!(markups[1].serialize().contains(r#"src="/js/bundle.js?v=3""#));

        let entry = graph.get("bundle.js").unwrap();
        assert_eq!(entry.references, 2);
        assert_eq!(entry.target.as_deref(), Some("js/bundle.js"));
        assert_eq!(entry.owner, StructurizerKind::Scripts);
        assert!(report.file_logs.iter().any(|line| line == "bundle.js -> js/bundle.js"));
    }

    #[tokio::test]
    async fn remote_and_missing_scripts_are_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = page(
            r#"<script src="https://cdn.example.org/lib.js"></script><script src="missing.js"></script>"#,
            "",
        );
        let mut markups = vec![MarkupDocument::parse("index.html", &source)];
        let mut graph = AssetGraph::new();

        let report = ScriptsStructurizer
            .structurize(StructurizeContext {
                out_dir: dir.path(),
                public_path: &PublicPath::resolve("/"),
                classifier: &UrlClassifier::default(),
                options: &RuleOptions::default(),
                markups: &mut markups,
                graph: &mut graph,
            })
            .await
            .unwrap();

        assert_eq!(report.rewritten, 0);
        assert_eq!(markups[0].serialize(), MarkupDocument::parse("index.html", &source).serialize());
        assert_eq!(graph.len(), 1);
        assert!(graph.get("https://cdn.example.org/lib.js").is_some());
    }
}
