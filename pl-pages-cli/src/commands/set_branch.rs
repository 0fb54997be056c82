//! `pl-pages set-branch`: configure the deployment branch in the registry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pl_pages_core::{settings, Repository};
use pl_pages_deploy::http::Http;
use pl_pages_deploy::{AoRegistry, DeployError, RegistryClient};
use pl_pages_sync::{GitCli, GitClient};

/// Arguments for `pl-pages set-branch`.
#[derive(Args, Debug)]
pub struct SetBranchArgs {
    /// Branch whose commits get deployed.
    pub branch: String,

    /// Repository URL (defaults to the URL of `--remote`).
    #[arg(short, long)]
    pub repo: Option<String>,

    /// Remote used when `--repo` is not given.
    #[arg(short = 'o', long, default_value = "origin")]
    pub remote: String,

    /// Wallet key file (defaults to `git config protocol.land.keyfile`).
    #[arg(short, long)]
    pub wallet: Option<PathBuf>,

    /// Git executable.
    #[arg(long, default_value = "git")]
    pub git: String,
}

impl SetBranchArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let cwd = std::env::current_dir().context("could not determine current directory")?;
        let settings = settings::load_at(&home).context("failed to load settings")?;

        let repo_url = match self.repo.clone() {
            Some(url) => url,
            None => GitCli::new(self.git.clone(), &cwd)
                .remote_url(&self.remote)
                .context("failed to resolve repository URL")?,
        };
        let signer = super::load_signer(self.wallet.as_deref(), &self.git, &cwd)?
            .ok_or(DeployError::MissingSigner)?;

        let registry = AoRegistry::from_settings(&settings, &Http::new());
        let id = Repository::id_from_url(&repo_url);
        crate::runtime()?.block_on(async {
            let repo = registry
                .view_repository(&id)
                .await
                .with_context(|| format!("failed to read repository {id}"))?;
            registry
                .update_deployment_branch(&repo, &self.branch, signer.as_ref())
                .await
                .context("failed to update deployment branch")
        })?;
        println!("Deployment branch for {id} set to {}", self.branch);
        Ok(())
    }
}
