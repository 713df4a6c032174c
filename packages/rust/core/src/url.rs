//! URL classification and public-path derivation.
//!
//! - [`UrlClassifier`] answers "is this reference local or relative?"
//! - [`PublicPath`] splits the configured public URL into origin and prefix

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Default rule for remote references: an optional `http:`/`https:` scheme
/// followed by `//`.
pub const DEFAULT_REMOTE_PATTERN: &str = r"^(https?:)?//";

static DEFAULT_REMOTE_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_REMOTE_PATTERN).expect("default remote pattern is valid"));

static ORIGIN_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^/]+").expect("origin pattern is valid"));

// ---------------------------------------------------------------------------
// UrlClassifier
// ---------------------------------------------------------------------------

/// Classifies references as remote or local by a matching rule.
///
/// The rule describes *remote* URLs; [`UrlClassifier::is_local_or_relative`]
/// is true when it does not match.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    rule: Regex,
}

impl UrlClassifier {
    /// Use a custom remote rule as given.
    pub fn new(rule: Regex) -> Self {
        Self { rule }
    }

    /// True when `url` does not match the remote rule.
    pub fn is_local_or_relative(&self, url: &str) -> bool {
        !self.rule.is_match(url)
    }
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_RULE.clone())
    }
}

/// [`UrlClassifier::is_local_or_relative`] with the default rule.
pub fn is_local_or_relative(url: &str) -> bool {
    !DEFAULT_REMOTE_RULE.is_match(url)
}

// ---------------------------------------------------------------------------
// PublicPath
// ---------------------------------------------------------------------------

/// Serving origin and path prefix derived from the public URL.
///
/// `origin` is `scheme://host` or empty, never with a path or trailing slash.
/// `prefix` always starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicPath {
    pub origin: String,
    pub prefix: String,
}

impl PublicPath {
    /// Derive origin and prefix from an absolute or path-only public URL.
    pub fn resolve(public_url: &str) -> Self {
        let origin = ORIGIN_RULE
            .find(public_url)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let prefix = normalize_prefix(&public_url[origin.len()..]);

        Self { origin, prefix }
    }

    /// Public URL of an output-relative path.
    pub fn url_for(&self, path: &str) -> String {
        let separator = if self.prefix.ends_with('/') { "" } else { "/" };
        format!(
            "{}{}{}{}",
            self.origin,
            self.prefix,
            separator,
            path.trim_start_matches('/')
        )
    }

    /// The remainder of `url` when it is served from this origin.
    pub fn same_origin_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        if self.origin.is_empty() {
            return None;
        }
        let rest = url.strip_prefix(self.origin.as_str())?;
        (rest.is_empty() || rest.starts_with(['/', '?', '#'])).then_some(rest)
    }

    /// Strip the prefix from a rooted path, yielding an output-relative path.
    ///
    /// Rooted paths outside the prefix are taken relative to the output root.
    pub fn strip_prefix<'a>(&self, rooted: &'a str) -> &'a str {
        let base = self.prefix.trim_end_matches('/');
        let stripped = match rooted.strip_prefix(base) {
            Some(rest) if base.is_empty() || rest.is_empty() || rest.starts_with('/') => rest,
            _ => rooted,
        };
        stripped.trim_start_matches('/')
    }
}

/// Join `rest` onto `/` and normalize it the way a POSIX path join does.
fn normalize_prefix(rest: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut prefix = String::from("/");
    prefix.push_str(&segments.join("/"));
    if !segments.is_empty() && rest.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_polarity() {
        assert!(!is_local_or_relative("https://example.com/a.png"));
        assert!(!is_local_or_relative("http://example.com/a.png"));
        assert!(!is_local_or_relative("//example.com/a.png"));
        assert!(is_local_or_relative("/static/a.png"));
        assert!(is_local_or_relative("a.png"));
    }

    #[test]
    fn classifier_default_matches_free_function() {
        let classifier = UrlClassifier::default();
        for url in ["https://example.com/a.png", "//cdn/x.js", "/a.css", "b.js"] {
            assert_eq!(classifier.is_local_or_relative(url), is_local_or_relative(url));
        }
    }

    #[test]
    fn classifier_override_rule() {
        let classifier = UrlClassifier::new(Regex::new(r"^(https?:)?//|^/cdn/").unwrap());
        assert!(!classifier.is_local_or_relative("/cdn/lib.js"));
        assert!(classifier.is_local_or_relative("/static/lib.js"));
        // Other schemes are not covered by the default-style rule.
        assert!(classifier.is_local_or_relative("ftp://example.com/a.png"));
    }

    #[test]
    fn resolve_absolute_public_url() {
        let public = PublicPath::resolve("https://cdn.example.com/app/");
        assert_eq!(public.origin, "https://cdn.example.com");
        assert_eq!(public.prefix, "/app/");
    }

    #[test]
    fn resolve_path_only_public_url() {
        assert_eq!(
            PublicPath::resolve("/"),
            PublicPath {
                origin: String::new(),
                prefix: "/".into()
            }
        );
        assert_eq!(PublicPath::resolve("").prefix, "/");
        assert_eq!(PublicPath::resolve("dist").prefix, "/dist");
        assert_eq!(PublicPath::resolve("./static/").prefix, "/static/");
        assert_eq!(PublicPath::resolve("/a//b/../c/").prefix, "/a/c/");
        assert!(PublicPath::resolve("/static/").origin.is_empty());
    }

    #[test]
    fn resolve_origin_without_path() {
        let public = PublicPath::resolve("http://localhost:1234");
        assert_eq!(public.origin, "http://localhost:1234");
        assert_eq!(public.prefix, "/");
    }

    #[test]
    fn resolve_is_deterministic_and_rooted() {
        for input in [
            "https://cdn.example.com/app/",
            "/",
            "assets",
            "../up",
            "https://x.io",
            "//weird",
        ] {
            let first = PublicPath::resolve(input);
            assert_eq!(first, PublicPath::resolve(input));
            assert!(first.prefix.starts_with('/'), "{input} -> {}", first.prefix);
            assert!(!first.origin.ends_with('/'));
        }
    }

    #[test]
    fn url_for_joins_parts() {
        let public = PublicPath::resolve("https://cdn.example.com/app/");
        assert_eq!(
            public.url_for("js/bundle.js"),
            "https://cdn.example.com/app/js/bundle.js"
        );
        let public = PublicPath::resolve("/app");
        assert_eq!(public.url_for("/css/main.css"), "/app/css/main.css");
        assert_eq!(PublicPath::resolve("/").url_for("a.png"), "/a.png");
    }

    #[test]
    fn same_origin_path_requires_boundary() {
        let public = PublicPath::resolve("https://cdn.example.com/app/");
        assert_eq!(
            public.same_origin_path("https://cdn.example.com/app/x.js"),
            Some("/app/x.js")
        );
        assert_eq!(public.same_origin_path("https://cdn.example.com.evil/x.js"), None);
        assert_eq!(public.same_origin_path("https://other.com/x.js"), None);
        assert_eq!(PublicPath::resolve("/").same_origin_path("/x.js"), None);
    }

    #[test]
    fn strip_prefix_handles_rooted_paths() {
        let public = PublicPath::resolve("/app/");
        assert_eq!(public.strip_prefix("/app/js/x.js"), "js/x.js");
        assert_eq!(public.strip_prefix("/application.js"), "application.js");
        assert_eq!(public.strip_prefix("/other/x.js"), "other/x.js");
        assert_eq!(PublicPath::resolve("/").strip_prefix("/x.js"), "x.js");
    }
}
