//! Error types for Structurize.
//!
//! Library crates use [`StructurizeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Structurize operations.
#[derive(Debug, thiserror::Error)]
pub enum StructurizeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTML, selector, or manifest parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Conflicting registration in the asset graph.
    #[error("asset graph error: {message}")]
    Graph { message: String },

    /// A structurizer failed while transforming the documents.
    #[error("structurizer '{name}' failed: {source}")]
    Structurizer {
        name: String,
        source: Box<StructurizeError>,
    },

    /// The pipeline was asked to run a second time for the same build.
    #[error("pipeline has already run for this build")]
    AlreadyRan,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StructurizeError>;

impl StructurizeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create an asset graph error from any displayable message.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attribute an error to the structurizer that raised it.
    pub fn in_structurizer(name: impl Into<String>, source: StructurizeError) -> Self {
        Self::Structurizer {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = StructurizeError::config("unknown build mode 'staging'");
        assert_eq!(err.to_string(), "config error: unknown build mode 'staging'");

        let err = StructurizeError::in_structurizer(
            "scripts",
            StructurizeError::graph("'a.png' registered as remote"),
        );
        assert_eq!(
            err.to_string(),
            "structurizer 'scripts' failed: asset graph error: 'a.png' registered as remote"
        );
    }

    #[test]
    fn io_error_keeps_path() {
        let err = StructurizeError::io(
            "dist/index.html",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("dist/index.html"));
        assert!(err.to_string().contains("gone"));
    }
}
