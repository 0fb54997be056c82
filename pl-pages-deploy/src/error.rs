//! Error types for pl-pages-deploy.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use pl_pages_core::{Address, CommitOid, CoreError, ObjectId};
use pl_pages_sync::SyncError;

/// Failures talking HTTP to any external service.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("could not read response from {url}: {message}")]
    Body { url: String, message: String },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Wallet loading and signing failures.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid wallet key: {0}")]
    InvalidKey(String),

    #[error("wallet public key does not match its private key")]
    KeyMismatch,

    #[error("invalid wallet JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64url value for {field}")]
    Base64 { field: &'static str },
}

/// A single provider's failure inside the upload chain.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Sign(#[from] SignError),
}

/// One provider attempt recorded by the upload chain.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ {} ] {}", self.provider, self.error)
    }
}

/// The upload chain could not place an object with any provider.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("all upload providers failed: {}", summarize(.attempts))]
    Exhausted { attempts: Vec<ProviderFailure> },
}

fn summarize(attempts: &[ProviderFailure]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_owned();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Registry read and write failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No id to update repo")]
    MissingId,

    #[error("repository {id} not found in the registry")]
    NotFound { id: String },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("registry returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed registry reply: {0}")]
    Malformed(String),

    #[error("registry rejected the message: {0}")]
    Rejected(String),

    #[error(transparent)]
    Sign(#[from] SignError),
}

/// Errors raised by the deployment pipeline.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No wallet keyfile configured. Run 'git config --add protocol.land.keyfile YOUR_WALLET_KEYFILE_FULL_PATH' to set it up")]
    MissingSigner,

    #[error("Not an owner or contributor for deployment (wallet {address})")]
    NotAuthorized { address: Address },

    #[error("The latest commit is already deployed ({oid} -> {tx_id})")]
    AlreadyDeployed { oid: CommitOid, tx_id: ObjectId },

    #[error("Default deployment branch not configured for deployment")]
    NoDeploymentBranch,

    #[error("two files map to the manifest path {path}")]
    DuplicatePath { path: String },

    #[error("no object id resolved for {path}")]
    Unresolved { path: String },

    #[error("could not encode manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("deployment task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors surfaced by [`crate::publish`].
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("publish task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Stand-in for any error when the `silent` option is set.
    #[error("Unspecified error (run without silent option for detail)")]
    Silenced,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::Io {
        path: path.into(),
        source,
    }
}
