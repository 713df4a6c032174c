//! Media asset relocation: images, icons, audio and video sources.
//!
//! Asset contents are hashed; references to byte-identical files are folded
//! into the first one claimed. Extra copies are removed at flush once nothing
//! references them any more.

use structurize_shared::{Result, StructurizerKind};

use super::relocate::{ReferenceRule, relocate};
use super::{StructurizeContext, StructurizeReport, Structurizer};

const REFERENCES: &[ReferenceRule] = &[
    ReferenceRule {
        selector: "img[src]",
        attr: "src",
    },
    ReferenceRule {
        selector: "source[src]",
        attr: "src",
    },
    ReferenceRule {
        selector: "video[src]",
        attr: "src",
    },
    ReferenceRule {
        selector: "video[poster]",
        attr: "poster",
    },
    ReferenceRule {
        selector: "audio[src]",
        attr: "src",
    },
    ReferenceRule {
        selector: r#"link[rel~="icon"][href]"#,
        attr: "href",
    },
    ReferenceRule {
        selector: r#"link[rel="apple-touch-icon"][href]"#,
        attr: "href",
    },
];

/// Moves referenced media into their folder (`assets/` by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetsStructurizer;

impl Structurizer for AssetsStructurizer {
    fn kind(&self) -> StructurizerKind {
        StructurizerKind::Assets
    }

    async fn structurize(&self, cx: StructurizeContext<'_>) -> Result<StructurizeReport> {
        relocate(self.kind(), REFERENCES, true, cx).await
    }
}
