//! Core domain types for Structurize runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BuildMode
// ---------------------------------------------------------------------------

/// The host build's mode. Structurize only acts on production builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Production,
    Development,
}

impl BuildMode {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

// ---------------------------------------------------------------------------
// StructurizerKind
// ---------------------------------------------------------------------------

/// The closed set of known structurizers.
///
/// This is the static registry: configuration keys are checked against
/// [`StructurizerKind::ALL`] before a run starts, so an unknown name can never
/// reach dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructurizerKind {
    Assets,
    Scripts,
    Styles,
}

impl StructurizerKind {
    /// Every registered structurizer.
    pub const ALL: [StructurizerKind; 3] = [Self::Assets, Self::Scripts, Self::Styles];

    /// Configuration key of this structurizer.
    pub fn name(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Scripts => "scripts",
            Self::Styles => "styles",
        }
    }

    /// Look up a structurizer by its configuration key.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for StructurizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_gate() {
        assert_eq!(BuildMode::Production.to_string(), "production");
        assert!(BuildMode::Production.is_production());
        assert!(!BuildMode::Development.is_production());
    }

    #[test]
    fn structurizer_names_roundtrip() {
        for kind in StructurizerKind::ALL {
            assert_eq!(StructurizerKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StructurizerKind::from_name("fonts"), None);
        assert_eq!(StructurizerKind::from_name("Scripts"), None);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
