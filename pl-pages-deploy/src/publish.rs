//! One publish run: branch synchronization followed by an optional deployment.
//!
//! Git work is blocking and runs on the blocking pool; the deployment runs on
//! the async runtime once the push has succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pl_pages_core::{cache, Deployment};
use pl_pages_sync::{self as sync, GitClient, PublishOptions, SyncPlan};

use crate::error::PublishError;
use crate::pipeline::{DeployRequest, Deployer};
use crate::signer::Signer;

/// Process-level inputs of a publish run.
#[derive(Clone)]
pub struct PublishContext {
    /// Directory whose Git config supplies the default repository and identity.
    pub cwd: PathBuf,
    /// User cache directory holding the `pl-pages/` checkouts.
    pub cache_home: PathBuf,
    pub deployer: Deployer,
    /// Wallet used for uploads and registry writes.
    pub signer: Option<Arc<dyn Signer>>,
}

/// Publish the files under `base` to the configured branch.
///
/// Returns the recorded deployment when both `push` and `deploy` are set;
/// `None` otherwise. With `silent` set every failure is replaced by
/// [`PublishError::Silenced`].
pub async fn publish(
    base: &Path,
    options: PublishOptions,
    ctx: &PublishContext,
) -> Result<Option<Deployment>, PublishError> {
    let silent = options.silent;
    match run(base, options, ctx).await {
        Ok(deployment) => Ok(deployment),
        Err(err) if silent => {
            tracing::debug!(error = %err, "publish failed");
            Err(PublishError::Silenced)
        }
        Err(err) => Err(err),
    }
}

async fn run(
    base: &Path,
    options: PublishOptions,
    ctx: &PublishContext,
) -> Result<Option<Deployment>, PublishError> {
    let base = base.to_path_buf();
    let cwd = ctx.cwd.clone();
    let prepare_options = options.clone();
    let prepared =
        tokio::task::spawn_blocking(move || sync::prepare(&base, &prepare_options, &cwd)).await??;

    let checkout_dir = cache::checkout_dir_at(&ctx.cache_home, &prepared.repo_url);
    let should_deploy = options.push && options.deploy;

    let blocking = prepared.clone();
    let commit = tokio::task::spawn_blocking(move || {
        let plan = SyncPlan {
            options: &options,
            base: &blocking.base,
            files: &blocking.files,
            repo_url: &blocking.repo_url,
            user: blocking.user.as_ref(),
        };
        let git = sync::sync_branch(&plan, &checkout_dir)?;
        if should_deploy {
            git.latest_commit().map(Some)
        } else {
            Ok(None)
        }
    })
    .await??;
    tracing::info!(repo = %prepared.repo_url, "Published");

    let Some(commit) = commit else {
        return Ok(None);
    };
    let request = DeployRequest {
        commit,
        repo_url: prepared.repo_url,
        base: prepared.base,
        files: prepared.files,
    };
    let deployment = ctx.deployer.deploy(&request, ctx.signer.clone()).await?;
    Ok(Some(deployment))
}
