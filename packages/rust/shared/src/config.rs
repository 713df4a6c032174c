//! Structurizer configuration: model, defaults, resolution, and loading.
//!
//! Configuration lives either in a standalone `structurize.toml` or under the
//! `structurize` key of a `package.json` manifest. User rules are overlaid
//! onto the built-in defaults key by key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, StructurizeError};
use crate::types::StructurizerKind;

/// Standalone configuration file name.
pub const CONFIG_FILE_NAME: &str = "structurize.toml";

/// Manifest file that may embed the configuration.
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// Key of the embedded configuration inside the manifest.
pub const MANIFEST_KEY: &str = "structurize";

// ---------------------------------------------------------------------------
// Rule model
// ---------------------------------------------------------------------------

/// One glob pattern or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchPatterns {
    One(String),
    Many(Vec<String>),
}

impl MatchPatterns {
    /// Iterate over the patterns regardless of representation.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::One(pattern) => std::slice::from_ref(pattern),
            Self::Many(patterns) => patterns,
        };
        slice.iter().map(String::as_str)
    }
}

/// Options of a single structurizer rule.
///
/// Unset fields fall back to the structurizer's built-in options when the
/// rule runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOptions {
    /// File name patterns the rule applies to.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub patterns: Option<MatchPatterns>,

    /// Folder (relative to the output directory) matched files are moved into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl RuleOptions {
    /// Build fully specified options.
    pub fn new(patterns: &[&str], folder: &str) -> Self {
        Self {
            patterns: Some(MatchPatterns::Many(
                patterns.iter().map(|p| (*p).to_string()).collect(),
            )),
            folder: Some(folder.to_string()),
        }
    }

    /// Fill unset fields from `fallback`.
    pub fn with_fallback(&self, fallback: &RuleOptions) -> RuleOptions {
        RuleOptions {
            patterns: self.patterns.clone().or_else(|| fallback.patterns.clone()),
            folder: self.folder.clone().or_else(|| fallback.folder.clone()),
        }
    }
}

/// Value of a rule key: `false` disables it, `true` enables the built-in
/// options, a table supplies options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Toggle(bool),
    Options(RuleOptions),
}

impl RuleValue {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Toggle(false))
    }

    /// Interpret the raw value stored under the rule key `key`.
    pub fn from_raw(key: &str, raw: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(raw.clone()).map_err(|_| {
            StructurizeError::config(format!(
                "rule '{key}' must be a boolean or a table with 'match' and 'folder', got {raw}"
            ))
        })
    }
}

impl From<RuleValue> for serde_json::Value {
    fn from(value: RuleValue) -> Self {
        match value {
            RuleValue::Toggle(on) => Self::Bool(on),
            RuleValue::Options(options) => {
                let mut table = serde_json::Map::new();
                match options.patterns {
                    Some(MatchPatterns::One(pattern)) => {
                        table.insert("match".into(), Self::String(pattern));
                    }
                    Some(MatchPatterns::Many(patterns)) => {
                        let list = patterns.into_iter().map(Self::String).collect();
                        table.insert("match".into(), Self::Array(list));
                    }
                    None => {}
                }
                if let Some(folder) = options.folder {
                    table.insert("folder".into(), Self::String(folder));
                }
                Self::Object(table)
            }
        }
    }
}

/// Built-in options for each structurizer.
pub fn builtin_options(kind: StructurizerKind) -> RuleOptions {
    match kind {
        StructurizerKind::Assets => RuleOptions::new(
            &[
                "*.png", "*.svg", "*.jpg", "*.jpeg", "*.gif", "*.bmp", "*.webp", "*.webm",
                "*.ico", "*.avif", "*.mp4", "*.mp3", "*.woff", "*.woff2", "*.ttf", "*.eot",
            ],
            "assets",
        ),
        StructurizerKind::Scripts => RuleOptions::new(&["*.js"], "js"),
        StructurizerKind::Styles => RuleOptions::new(&["*.css"], "css"),
    }
}

/// The default rule mapping: every known structurizer with its built-in options.
pub fn default_rules() -> BTreeMap<StructurizerKind, RuleOptions> {
    StructurizerKind::ALL
        .into_iter()
        .map(|kind| (kind, builtin_options(kind)))
        .collect()
}

// ---------------------------------------------------------------------------
// User configuration
// ---------------------------------------------------------------------------

/// User configuration, as written in `structurize.toml` or the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Off switch for the TOML form (`enabled = false`).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Emit per-file change logs and the asset graph dump.
    #[serde(default)]
    pub verbose: bool,

    /// Rule overrides keyed by structurizer name, kept raw until resolution
    /// so a bad value under an unknown key never fails loading.
    #[serde(default)]
    pub rules: BTreeMap<String, serde_json::Value>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            verbose: false,
            rules: BTreeMap::new(),
        }
    }
}

impl UserConfig {
    /// Set the rule stored under `key`.
    pub fn set_rule(&mut self, key: impl Into<String>, value: RuleValue) -> &mut Self {
        self.rules.insert(key.into(), value.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// Effective top-level settings: either switched off or a user config.
#[derive(Debug, Clone, PartialEq)]
pub enum StructurizeSettings {
    Disabled,
    Enabled(UserConfig),
}

impl Default for StructurizeSettings {
    fn default() -> Self {
        Self::Enabled(UserConfig::default())
    }
}

impl From<UserConfig> for StructurizeSettings {
    fn from(config: UserConfig) -> Self {
        if config.enabled {
            Self::Enabled(config)
        } else {
            Self::Disabled
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// One entry of the execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRule {
    pub kind: StructurizerKind,
    pub options: RuleOptions,
}

/// Outcome of overlaying user rules onto the defaults.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRules {
    /// Merged configuration over the known structurizer set.
    pub rules: BTreeMap<StructurizerKind, RuleValue>,
    /// Enabled rules, ordered by ascending structurizer name.
    pub plan: Vec<PlannedRule>,
    /// User keys that name no known structurizer.
    pub invalid_keys: Vec<String>,
}

/// Overlay `user` rules onto `defaults` and derive the ordered execution plan.
///
/// Unknown keys are diagnosed and dropped whatever their value, never fatal.
/// A known key whose value is neither a boolean nor an options table is a
/// [`StructurizeError::Config`].
pub fn resolve_rules(
    defaults: &BTreeMap<StructurizerKind, RuleOptions>,
    user: &UserConfig,
) -> Result<ResolvedRules> {
    let mut rules: BTreeMap<StructurizerKind, RuleValue> = defaults
        .iter()
        .map(|(kind, options)| (*kind, RuleValue::Options(options.clone())))
        .collect();
    let mut invalid_keys = Vec::new();

    for (key, value) in &user.rules {
        match StructurizerKind::from_name(key) {
            Some(kind) => {
                rules.insert(kind, RuleValue::from_raw(key, value)?);
            }
            None => {
                warn!(key = %key, "ignored invalid config key");
                invalid_keys.push(key.clone());
            }
        }
    }

    let mut plan: Vec<PlannedRule> = rules
        .iter()
        .filter_map(|(kind, value)| match value {
            RuleValue::Toggle(false) => None,
            RuleValue::Toggle(true) => Some(PlannedRule {
                kind: *kind,
                options: defaults.get(kind).cloned().unwrap_or_default(),
            }),
            RuleValue::Options(options) => Some(PlannedRule {
                kind: *kind,
                options: options.clone(),
            }),
        })
        .collect();
    plan.sort_by(|a, b| a.kind.name().cmp(b.kind.name()));

    debug!(
        plan = ?plan.iter().map(|rule| rule.kind.name()).collect::<Vec<_>>(),
        invalid = invalid_keys.len(),
        "resolved structurizer rules"
    );

    Ok(ResolvedRules {
        rules,
        plan,
        invalid_keys,
    })
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse settings from `structurize.toml` content.
pub fn parse_toml_settings(content: &str) -> Result<StructurizeSettings> {
    let config: UserConfig = toml::from_str(content)
        .map_err(|e| StructurizeError::config(format!("invalid {CONFIG_FILE_NAME}: {e}")))?;
    Ok(config.into())
}

/// Parse settings embedded in a JSON manifest under [`MANIFEST_KEY`].
///
/// A manifest without the key yields the defaults.
pub fn parse_manifest_settings(content: &str) -> Result<StructurizeSettings> {
    let manifest: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| StructurizeError::parse(format!("invalid manifest JSON: {e}")))?;

    let Some(entry) = manifest.get(MANIFEST_KEY) else {
        return Ok(StructurizeSettings::default());
    };

    match entry {
        serde_json::Value::Bool(false) => Ok(StructurizeSettings::Disabled),
        serde_json::Value::Bool(true) => Ok(StructurizeSettings::default()),
        serde_json::Value::Object(_) => {
            let config: UserConfig = serde_json::from_value(entry.clone()).map_err(|e| {
                StructurizeError::config(format!("invalid '{MANIFEST_KEY}' manifest entry: {e}"))
            })?;
            Ok(config.into())
        }
        other => Err(StructurizeError::config(format!(
            "invalid '{MANIFEST_KEY}' manifest entry: expected a boolean or an object, got {other}"
        ))),
    }
}

/// Load settings from a specific file. `.toml` files are read as a
/// standalone config, anything else as a JSON manifest.
pub fn load_settings(path: &Path) -> Result<StructurizeSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| StructurizeError::io(path, e))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        parse_toml_settings(&content)
    } else {
        parse_manifest_settings(&content)
    }
}

/// Look for `structurize.toml`, then `package.json`, in `dir`.
///
/// Returns the settings and the file they came from (`None` for defaults).
pub fn discover_settings(dir: &Path) -> Result<(StructurizeSettings, Option<PathBuf>)> {
    for name in [CONFIG_FILE_NAME, MANIFEST_FILE_NAME] {
        let path = dir.join(name);
        if path.is_file() {
            debug!(?path, "found structurize configuration");
            let settings = load_settings(&path)?;
            return Ok((settings, Some(path)));
        }
    }

    debug!(dir = %dir.display(), "no configuration found, using defaults");
    Ok((StructurizeSettings::default(), None))
}

/// Render the default configuration as `structurize.toml` content.
pub fn default_config_toml() -> Result<String> {
    let config = UserConfig {
        rules: default_rules()
            .into_iter()
            .map(|(kind, options)| {
                let value = serde_json::Value::from(RuleValue::Options(options));
                (kind.name().to_string(), value)
            })
            .collect(),
        ..UserConfig::default()
    };

    toml::to_string_pretty(&config).map_err(|e| StructurizeError::config(e.to_string()))
}

/// Write a default `structurize.toml` into `dir`. Refuses to overwrite.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(StructurizeError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    std::fs::write(&path, default_config_toml()?).map_err(|e| StructurizeError::io(&path, e))?;
    info!(?path, "created default config file");

    Ok(path)
}
