//! `pl-pages publish`: the default command.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use pl_pages_core::{settings, UserIdentity};
use pl_pages_deploy::{publish, Deployer, PublishContext, PublishError};
use pl_pages_sync::{BeforeAdd, GitClient, PublishOptions, SyncError};

/// Arguments for `pl-pages publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Base directory holding the files to publish.
    #[arg(short = 'd', long)]
    pub dist: Option<PathBuf>,

    /// Pattern selecting the files to publish.
    #[arg(short, long, default_value = "**/*")]
    pub src: String,

    /// Branch to publish to.
    #[arg(short, long, default_value = "pl-pages")]
    pub branch: String,

    /// Target directory within the branch.
    #[arg(short = 'e', long, default_value = ".")]
    pub dest: String,

    /// Only add, and never remove, existing files.
    #[arg(short, long)]
    pub add: bool,

    /// Do not print error details.
    #[arg(short = 'x', long)]
    pub silent: bool,

    /// Commit message.
    #[arg(short, long, default_value = "Updates")]
    pub message: String,

    /// Tag to add to the commit.
    #[arg(short = 'g', long)]
    pub tag: Option<String>,

    /// Include dotfiles.
    #[arg(short = 't', long)]
    pub dotfiles: bool,

    /// URL of the repository to push to.
    #[arg(short, long)]
    pub repo: Option<String>,

    /// Clone depth.
    #[arg(short = 'p', long, default_value_t = 1)]
    pub depth: u32,

    /// Name of the remote.
    #[arg(short = 'o', long, default_value = "origin")]
    pub remote: String,

    /// Commit author, as "Your Name <email@example.com>".
    #[arg(short, long)]
    pub user: Option<String>,

    /// Pattern of files to remove from `dest` before copying.
    #[arg(short = 'v', long, default_value = ".")]
    pub remove: String,

    /// Commit only, without pushing.
    #[arg(short, long)]
    pub no_push: bool,

    /// Push a single commit without branch history.
    #[arg(short = 'f', long)]
    pub no_history: bool,

    /// Shell command run in the checkout after copying and before staging.
    #[arg(long)]
    pub before_add: Option<String>,

    /// Skip the deployment after pushing.
    #[arg(long)]
    pub no_deploy: bool,

    /// Git executable.
    #[arg(long, default_value = "git")]
    pub git: String,

    /// Wallet key file (defaults to `git config protocol.land.keyfile`).
    #[arg(short, long)]
    pub wallet: Option<PathBuf>,

    /// Print the recorded deployment as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PublishArgs {
    pub fn run(self) -> Result<()> {
        let dist = self
            .dist
            .clone()
            .context("missing required option --dist <dir>")?;
        let options = self.options()?;

        let home = dirs::home_dir().context("could not determine home directory")?;
        let cache_home = dirs::cache_dir().context("could not determine cache directory")?;
        let cwd = std::env::current_dir().context("could not determine current directory")?;
        let silent = options.silent;
        let settings = silence(
            silent,
            settings::load_at(&home).context("failed to load settings"),
        )?;

        let signer = if options.push && options.deploy {
            silence(
                silent,
                super::load_signer(self.wallet.as_deref(), &options.git, &cwd),
            )?
        } else {
            None
        };
        let ctx = PublishContext {
            cwd,
            cache_home,
            deployer: Deployer::from_settings(&settings),
            signer,
        };

        let deployment = crate::runtime()?.block_on(publish(&dist, options, &ctx))?;
        println!("Published");
        if let Some(deployment) = deployment {
            if self.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&deployment)
                        .context("failed to render deployment JSON")?
                );
            } else {
                println!("Deployed: {}", ctx.deployer.deployment_link(&deployment.tx_id));
            }
        }
        Ok(())
    }

    fn options(&self) -> Result<PublishOptions> {
        let user = self
            .user
            .as_deref()
            .map(str::parse::<UserIdentity>)
            .transpose()?;
        let before_add = self
            .before_add
            .clone()
            .map(|command| Arc::new(CommandHook { command }) as Arc<dyn BeforeAdd>);

        Ok(PublishOptions {
            dest: self.dest.clone(),
            add: self.add,
            git: self.git.clone(),
            depth: self.depth,
            dotfiles: self.dotfiles,
            branch: self.branch.clone(),
            remote: self.remote.clone(),
            repo: self.repo.clone(),
            src: self.src.clone(),
            remove: self.remove.clone(),
            push: !self.no_push,
            history: !self.no_history,
            message: self.message.clone(),
            tag: self.tag.clone(),
            user,
            before_add,
            silent: self.silent,
            deploy: !self.no_deploy,
        })
    }
}

/// `--before-add` hook: a shell command run inside the checkout.
struct CommandHook {
    command: String,
}

impl BeforeAdd for CommandHook {
    fn before_add(&self, git: &dyn GitClient) -> Result<(), SyncError> {
        let out = Command::new("sh")
            .args(["-c", &self.command])
            .current_dir(git.cwd())
            .output()
            .map_err(|e| SyncError::Hook(format!("{}: {e}", self.command)))?;
        if out.status.success() {
            Ok(())
        } else {
            Err(SyncError::Hook(format!(
                "{} exited with {}: {}",
                self.command,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )))
        }
    }
}

/// Replace error detail with [`PublishError::Silenced`] when `silent` is set.
fn silence<T>(silent: bool, result: Result<T>) -> Result<T> {
    match result {
        Err(err) if silent => {
            tracing::debug!(error = %format!("{err:#}"), "publish setup failed");
            Err(PublishError::Silenced.into())
        }
        other => other,
    }
}
