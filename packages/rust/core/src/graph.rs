//! Run-scoped asset graph shared by every structurizer.
//!
//! One entry per canonical identity: the normalized output-relative path of a
//! local asset, or the full URL of a remote one. Entries are created on first
//! registration and merged on every later one.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use structurize_shared::{Result, StructurizeError, StructurizerKind};

/// Where an asset is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetLocation {
    Local,
    Remote,
}

impl std::fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Graph metadata for one distinct asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetEntry {
    /// Canonical identity.
    pub id: String,
    pub location: AssetLocation,
    /// Structurizer that registered the asset first.
    pub owner: StructurizerKind,
    /// Documents referencing the asset.
    pub documents: BTreeSet<String>,
    /// Total number of registrations across documents and structurizers.
    pub references: usize,
    /// Planned output-relative location, when the asset is relocated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Public URL references are rewritten to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Hex SHA-256 of the file contents, for local assets that were hashed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Identity of an identical-content entry this one was folded into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

impl AssetEntry {
    /// True when the asset moves away from where the bundler emitted it.
    pub fn is_relocated(&self) -> bool {
        self.duplicate_of.is_none() && self.target.as_deref().is_some_and(|t| t != self.id)
    }
}

/// A request to register one reference to an asset.
#[derive(Debug, Clone)]
pub struct AssetRegistration<'a> {
    pub id: &'a str,
    pub location: AssetLocation,
    pub kind: StructurizerKind,
    /// Output-relative path of the referencing document.
    pub document: &'a str,
}

/// Shared map from canonical asset identity to [`AssetEntry`].
#[derive(Debug, Default)]
pub struct AssetGraph {
    entries: BTreeMap<String, AssetEntry>,
}

impl AssetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry by canonical identity.
    pub fn get(&self, id: &str) -> Option<&AssetEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut AssetEntry> {
        self.entries.get_mut(id)
    }

    /// Register a reference, creating the entry on first sight.
    ///
    /// Re-registering an identity records the document and bumps the
    /// reference count. A registration that disagrees on location is an error.
    pub fn register(&mut self, registration: AssetRegistration<'_>) -> Result<&mut AssetEntry> {
        let AssetRegistration {
            id,
            location,
            kind,
            document,
        } = registration;

        if let Some(existing) = self.entries.get(id) {
            if existing.location != location {
                return Err(StructurizeError::graph(format!(
                    "'{id}' is registered as {} but {document} references it as {location}",
                    existing.location
                )));
            }
        }

        let entry = self.entries.entry(id.to_string()).or_insert_with(|| {
            debug!(id, %location, owner = %kind, "new asset graph entry");
            AssetEntry {
                id: id.to_string(),
                location,
                owner: kind,
                documents: BTreeSet::new(),
                references: 0,
                target: None,
                url: None,
                content_hash: None,
                duplicate_of: None,
            }
        });
        entry.documents.insert(document.to_string());
        entry.references += 1;

        Ok(entry)
    }

    /// Enumerate all entries in identity order.
    pub fn entries(&self) -> impl Iterator<Item = &AssetEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First local entry other than `excluding` with the given content hash
    /// that is not itself a duplicate.
    pub fn find_by_hash(&self, hash: &str, excluding: &str) -> Option<&AssetEntry> {
        self.entries.values().find(|entry| {
            entry.id != excluding
                && entry.duplicate_of.is_none()
                && entry.content_hash.as_deref() == Some(hash)
        })
    }

    /// Whether an entry other than `excluding` already occupies `target`,
    /// either as its planned location or as an asset left in place there.
    pub fn target_in_use(&self, target: &str, excluding: &str) -> bool {
        self.entries.values().any(|entry| {
            entry.id != excluding
                && entry.location == AssetLocation::Local
                && entry.duplicate_of.is_none()
                && (entry.target.as_deref() == Some(target)
                    || (entry.id == target && !entry.is_relocated()))
        })
    }

    /// Planned moves `(from, to)`, both output-relative.
    pub fn relocations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().filter(|e| e.is_relocated()).filter_map(|entry| {
            entry
                .target
                .as_deref()
                .map(|target| (entry.id.as_str(), target))
        })
    }

    /// Local entries folded into an identical-content entry.
    pub fn duplicates(&self) -> impl Iterator<Item = &AssetEntry> {
        self.entries
            .values()
            .filter(|entry| entry.location == AssetLocation::Local && entry.duplicate_of.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local<'a>(id: &'a str, document: &'a str) -> AssetRegistration<'a> {
        AssetRegistration {
            id,
            location: AssetLocation::Local,
            kind: StructurizerKind::Assets,
            document,
        }
    }

    #[test]
    fn register_is_idempotent_merge() {
        let mut graph = AssetGraph::new();
        graph.register(local("logo.png", "index.html")).unwrap();
        graph.register(local("logo.png", "about.html")).unwrap();
        graph.register(local("logo.png", "about.html")).unwrap();

        assert_eq!(graph.len(), 1);
        let entry = graph.get("logo.png").unwrap();
        assert_eq!(entry.references, 3);
        assert_eq!(
            entry.documents.iter().map(String::as_str).collect::<Vec<_>>(),
            ["about.html", "index.html"]
        );
        assert_eq!(entry.owner, StructurizerKind::Assets);
    }

    #[test]
    fn owner_is_first_registrant() {
        let mut graph = AssetGraph::new();
        graph.register(local("app.js", "index.html")).unwrap();
        graph
            .register(AssetRegistration {
                kind: StructurizerKind::Scripts,
                ..local("app.js", "index.html")
            })
            .unwrap();
        assert_eq!(graph.get("app.js").unwrap().owner, StructurizerKind::Assets);
    }

    #[test]
    fn conflicting_location_is_rejected() {
        let mut graph = AssetGraph::new();
        graph.register(local("x.png", "index.html")).unwrap();
        let err = graph
            .register(AssetRegistration {
                location: AssetLocation::Remote,
                ..local("x.png", "about.html")
            })
            .unwrap_err();
        assert!(err.to_string().contains("registered as local"));
        assert_eq!(graph.get("x.png").unwrap().references, 1);
    }

    #[test]
    fn relocations_skip_in_place_and_duplicates() {
        let mut graph = AssetGraph::new();
        graph.register(local("a.png", "index.html")).unwrap().target = Some("assets/a.png".into());
        graph.register(local("assets/b.png", "index.html")).unwrap().target =
            Some("assets/b.png".into());
        let dup = graph.register(local("c.png", "index.html")).unwrap();
        dup.target = Some("assets/a.png".into());
        dup.duplicate_of = Some("a.png".into());

        let moves: Vec<_> = graph.relocations().collect();
        assert_eq!(moves, [("a.png", "assets/a.png")]);
        let dups: Vec<_> = graph.duplicates().map(|e| e.id.as_str()).collect();
        assert_eq!(dups, ["c.png"]);
    }

    #[test]
    fn target_collision_detection() {
        let mut graph = AssetGraph::new();
        graph.register(local("a/logo.png", "index.html")).unwrap().target =
            Some("assets/logo.png".into());
        graph.register(local("assets/icon.png", "index.html")).unwrap();

        assert!(graph.target_in_use("assets/logo.png", "b/logo.png"));
        assert!(!graph.target_in_use("assets/logo.png", "a/logo.png"));
        assert!(graph.target_in_use("assets/icon.png", "icon.png"));
        assert!(!graph.target_in_use("assets/other.png", "other.png"));
    }

    #[test]
    fn find_by_hash_ignores_self_and_duplicates() {
        let mut graph = AssetGraph::new();
        graph.register(local("a.png", "index.html")).unwrap().content_hash = Some("h1".into());
        let b = graph.register(local("b.png", "index.html")).unwrap();
        b.content_hash = Some("h1".into());
        b.duplicate_of = Some("a.png".into());

        assert_eq!(graph.find_by_hash("h1", "c.png").map(|e| e.id.as_str()), Some("a.png"));
        assert!(graph.find_by_hash("h1", "a.png").is_none());
        assert!(graph.find_by_hash("h2", "c.png").is_none());
    }
}
