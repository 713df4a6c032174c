//! Shared types, error model, and configuration for Structurize.
//!
//! This crate is the foundation depended on by all other Structurize crates.
//! It provides:
//! - [`StructurizeError`] — the unified error type
//! - Domain types ([`BuildMode`], [`StructurizerKind`], [`RunId`])
//! - Configuration ([`UserConfig`], [`RuleOptions`], rule resolution, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, MANIFEST_FILE_NAME, MANIFEST_KEY, MatchPatterns, PlannedRule,
    ResolvedRules, RuleOptions, RuleValue, StructurizeSettings, UserConfig, builtin_options,
    default_config_toml, default_rules, discover_settings, init_config, load_settings,
    parse_manifest_settings, parse_toml_settings, resolve_rules,
};
pub use error::{Result, StructurizeError};
pub use types::{BuildMode, RunId, StructurizerKind};
