//! # pl-pages-sync
//!
//! Publishes a directory of files to a Git branch.
//!
//! Call [`prepare`] to validate the input directory and resolve the
//! repository URL and author, then [`sync_branch`] to clone (or reuse) the
//! cached checkout and commit the files to the deployment branch.

pub mod branch;
pub mod error;
pub mod files;
pub mod git;
pub mod options;

pub use branch::{acquire, prepare, sync_branch, synchronize, Prepared, SyncPlan};
pub use error::SyncError;
pub use git::{CloneOptions, GitCli, GitClient};
pub use options::{BeforeAdd, PublishOptions};
