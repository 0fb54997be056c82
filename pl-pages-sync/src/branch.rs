//! Branch synchronizer.
//!
//! ## `synchronize`: step order
//!
//! 1. Acquire the cached clone ([`acquire`]).
//! 2. Verify the clone's remote URL.
//! 3. Clean the working tree.
//! 4. Fetch the remote.
//! 5. Check out the branch (orphan when the remote lacks it).
//! 6. Delete the branch ref when history is off.
//! 7. Prune `dest` with the `remove` glob unless `add` is set.
//! 8. Copy the source files into `dest`.
//! 9. Run the `beforeAdd` hook.
//! 10. Stage, set identity, commit, tag (failure tolerated), push.
//!
//! Every step except tagging aborts the run on failure.

use std::path::{Path, PathBuf};

use pl_pages_core::UserIdentity;

use crate::error::SyncError;
use crate::files;
use crate::git::{CloneOptions, GitCli, GitClient};
use crate::options::PublishOptions;

/// Everything a synchronization run needs besides the Git client.
#[derive(Debug, Clone, Copy)]
pub struct SyncPlan<'a> {
    pub options: &'a PublishOptions,
    /// Directory the source files are read from.
    pub base: &'a Path,
    /// Files to publish, relative to `base`.
    pub files: &'a [String],
    /// Repository URL the checkout must point at.
    pub repo_url: &'a str,
    pub user: Option<&'a UserIdentity>,
}

/// Step 1: clone `repo_url` into `checkout_dir`, or reuse an existing clone.
pub fn acquire(
    options: &PublishOptions,
    repo_url: &str,
    checkout_dir: &Path,
) -> Result<GitCli, SyncError> {
    tracing::info!("Cloning {} into {}", repo_url, checkout_dir.display());
    GitCli::clone_into(
        options.git.clone(),
        repo_url,
        checkout_dir,
        &CloneOptions {
            branch: &options.branch,
            remote: &options.remote,
            depth: options.depth,
        },
    )
}

/// Steps 2–10 against an acquired checkout.
pub fn synchronize(git: &dyn GitClient, plan: &SyncPlan<'_>) -> Result<(), SyncError> {
    let opts = plan.options;

    verify_remote(git, &opts.remote, plan.repo_url)?;

    tracing::info!("Cleaning");
    git.clean()?;

    tracing::info!("Fetching {}", opts.remote);
    git.fetch(&opts.remote)?;

    tracing::info!("Checking out {}/{}", opts.remote, opts.branch);
    git.checkout(&opts.remote, &opts.branch)?;

    if !opts.history {
        git.delete_ref(&opts.branch)?;
    }

    let dest_dir = git.cwd().join(&opts.dest);
    if !opts.add {
        tracing::info!("Removing files");
        let targets = files::removal_targets(&dest_dir, &opts.dest, &opts.remove)?;
        git.rm(&targets)?;
    }

    tracing::info!("Copying files");
    files::copy_files(plan.files, plan.base, &dest_dir)?;

    if let Some(hook) = &opts.before_add {
        hook.before_add(git)?;
    }

    tracing::info!("Adding all");
    git.add(".")?;

    if let Some(user) = plan.user {
        git.config("user.email", &user.email)?;
        if let Some(name) = &user.name {
            git.config("user.name", name)?;
        }
    }

    tracing::info!("Committing");
    git.commit(&opts.message)?;

    if let Some(tag) = &opts.tag {
        tracing::info!("Tagging");
        if let Err(err) = git.tag(tag) {
            // Most likely the tag already exists.
            tracing::warn!("Tagging failed, continuing: {err}");
        }
    }

    if opts.push {
        tracing::info!("Pushing");
        git.push(&opts.remote, &opts.branch, !opts.history)?;
    }
    Ok(())
}

/// Steps 1–10: acquire the checkout at `checkout_dir` and synchronize it.
pub fn sync_branch(plan: &SyncPlan<'_>, checkout_dir: &Path) -> Result<GitCli, SyncError> {
    let git = acquire(plan.options, plan.repo_url, checkout_dir)?;
    synchronize(&git, plan)?;
    Ok(git)
}

fn verify_remote(git: &dyn GitClient, remote: &str, expected: &str) -> Result<(), SyncError> {
    let got = git.remote_url(remote)?;
    if got != expected {
        return Err(SyncError::RemoteMismatch {
            got,
            expected: expected.to_owned(),
            dir: git.cwd().to_path_buf(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Run inputs
// ---------------------------------------------------------------------------

/// Inputs resolved before any checkout work starts.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub base: PathBuf,
    pub files: Vec<String>,
    pub repo_url: String,
    pub user: Option<UserIdentity>,
}

/// Validate `base`, enumerate `src`, and resolve the repository URL and
/// author identity. `cwd` is the directory whose Git config supplies the
/// defaults.
///
/// Fails before touching any checkout when `base` is not a directory or
/// `src` matches nothing.
pub fn prepare(base: &Path, options: &PublishOptions, cwd: &Path) -> Result<Prepared, SyncError> {
    files::ensure_base_dir(base)?;
    let files = files::list_files(base, &options.src, options.dotfiles)?;
    if files.is_empty() {
        return Err(SyncError::NoFilesMatched);
    }

    let local = GitCli::new(options.git.clone(), cwd);
    let repo_url = match &options.repo {
        Some(url) => url.clone(),
        None => local.remote_url(&options.remote)?,
    };
    let user = options.user.clone().or_else(|| local.user_identity());

    Ok(Prepared {
        base: base.to_path_buf(),
        files,
        repo_url,
        user,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
