//! pl-pages core library: domain types, tag schema, cache layout, settings.
//!
//! - [`types`]: registry records, commits, author identity
//! - [`tags`]: closed tag schema per uploaded object kind
//! - [`cache`]: checkout cache directory keyed by repository URL
//! - [`settings`]: optional YAML endpoint settings
//! - [`error`]: [`CoreError`]

pub mod cache;
pub mod error;
pub mod settings;
pub mod tags;
pub mod types;

pub use error::CoreError;
pub use settings::Settings;
pub use tags::{ObjectKind, Tag, TagName, TagSet};
pub use types::{Address, Commit, CommitOid, Deployment, ObjectId, Repository, UserIdentity};
