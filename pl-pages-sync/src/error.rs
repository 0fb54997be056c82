//! Error types for pl-pages-sync.

use std::path::PathBuf;

use thiserror::Error;

use pl_pages_core::CoreError;

/// All errors that can arise while preparing and pushing the deployment branch.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the core crate (cache layout, identity parsing).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The Git executable could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A Git command exited unsuccessfully.
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    /// The cached checkout points at a different repository.
    #[error(
        "Remote url mismatch.  Got \"{got}\" but expected \"{expected}\" in {dir}.  Try running the `pl-pages clean` command first."
    )]
    RemoteMismatch {
        got: String,
        expected: String,
        dir: PathBuf,
    },

    /// No URL is configured for the remote.
    #[error("Failed to get repo URL from options or the current directory (remote \"{remote}\")")]
    NoRemoteUrl { remote: String },

    /// The base path is missing or not a directory.
    #[error("The \"base\" option must be an existing directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The `src` glob selected nothing.
    #[error("The pattern in the \"src\" property didn't match any files.")]
    NoFilesMatched,

    /// A glob in `src` or `remove` could not be parsed.
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Walking a directory tree failed.
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// The `beforeAdd` hook reported a failure.
    #[error("beforeAdd hook failed: {0}")]
    Hook(String),

    /// `git log` output could not be split into oid and message.
    #[error("unexpected commit format from git log: {0:?}")]
    MalformedCommit(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
