//! Options recognised by a publish run.

use std::fmt;
use std::sync::Arc;

use pl_pages_core::UserIdentity;

use crate::error::SyncError;
use crate::git::GitClient;

/// Hook run after new files are copied into the checkout and before they
/// are staged.
pub trait BeforeAdd: Send + Sync {
    fn before_add(&self, git: &dyn GitClient) -> Result<(), SyncError>;
}

impl<F> BeforeAdd for F
where
    F: Fn(&dyn GitClient) -> Result<(), SyncError> + Send + Sync,
{
    fn before_add(&self, git: &dyn GitClient) -> Result<(), SyncError> {
        self(git)
    }
}

/// Configuration for one publish call.
#[derive(Clone)]
pub struct PublishOptions {
    /// Destination directory inside the branch.
    pub dest: String,
    /// Keep existing files instead of pruning with `remove`.
    pub add: bool,
    /// Git executable.
    pub git: String,
    /// Clone depth.
    pub depth: u32,
    /// Include dotfiles when enumerating `src`.
    pub dotfiles: bool,
    pub branch: String,
    pub remote: String,
    /// Repository URL; defaults to the URL of `remote` in the current directory.
    pub repo: Option<String>,
    /// Glob selecting the files to publish.
    pub src: String,
    /// Glob selecting files to prune from `dest` (`.` prunes everything).
    pub remove: String,
    pub push: bool,
    /// Keep branch history; `false` squashes to a single parentless commit.
    pub history: bool,
    pub message: String,
    pub tag: Option<String>,
    /// Commit identity; defaults to the current directory's Git config.
    pub user: Option<UserIdentity>,
    pub before_add: Option<Arc<dyn BeforeAdd>>,
    /// Replace error detail with a generic message.
    pub silent: bool,
    /// Run the deployment pipeline after a successful push.
    pub deploy: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            dest: ".".into(),
            add: false,
            git: "git".into(),
            depth: 1,
            dotfiles: false,
            branch: "pl-pages".into(),
            remote: "origin".into(),
            repo: None,
            src: "**/*".into(),
            remove: ".".into(),
            push: true,
            history: true,
            message: "Updates".into(),
            tag: None,
            user: None,
            before_add: None,
            silent: false,
            deploy: true,
        }
    }
}

impl fmt::Debug for PublishOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishOptions")
            .field("dest", &self.dest)
            .field("add", &self.add)
            .field("git", &self.git)
            .field("depth", &self.depth)
            .field("dotfiles", &self.dotfiles)
            .field("branch", &self.branch)
            .field("remote", &self.remote)
            .field("repo", &self.repo)
            .field("src", &self.src)
            .field("remove", &self.remove)
            .field("push", &self.push)
            .field("history", &self.history)
            .field("message", &self.message)
            .field("tag", &self.tag)
            .field("user", &self.user)
            .field("before_add", &self.before_add.as_ref().map(|_| "<hook>"))
            .field("silent", &self.silent)
            .field("deploy", &self.deploy)
            .finish()
    }
}
