//! Error types for pl-pages-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::tags::{ObjectKind, TagName};

/// All errors that can arise from core operations (settings, cache, tags).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.pl-pages/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// `dirs::cache_dir()` returned `None`: cannot locate the checkout cache.
    #[error("cannot determine the user cache directory")]
    CacheDirNotFound,

    /// A tag that is not part of the object kind's schema.
    #[error("tag '{tag}' is not allowed on a {kind} object")]
    UnexpectedTag { kind: ObjectKind, tag: TagName },

    /// A tag required by the object kind's schema was not supplied.
    #[error("tag '{tag}' is required on a {kind} object")]
    MissingTag { kind: ObjectKind, tag: TagName },

    /// The `user` option could not be split into name and email.
    #[error(
        "Could not parse name and email from user option \"{input}\" (format should be \"Your Name <email@example.com>\")"
    )]
    InvalidUser { input: String },
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
