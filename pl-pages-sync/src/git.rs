//! Git client used to drive the deployment-branch checkout.
//!
//! [`GitClient`] is the seam the synchronizer works against; [`GitCli`] is
//! the implementation that shells out to the `git` executable. Every method
//! runs in the checkout's working directory and fails with
//! [`SyncError::Git`] carrying the command's stderr.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use pl_pages_core::{Commit, CommitOid, UserIdentity};

use crate::error::{io_err, SyncError};

/// Operations the branch synchronizer needs from a Git checkout.
pub trait GitClient: Send {
    /// Root of the working tree.
    fn cwd(&self) -> &Path;
    /// URL configured for `remote`.
    fn remote_url(&self, remote: &str) -> Result<String, SyncError>;
    /// Discard untracked files and directories.
    fn clean(&self) -> Result<(), SyncError>;
    fn fetch(&self, remote: &str) -> Result<(), SyncError>;
    /// Check out `branch` at `remote/branch`, or start it as an orphan when
    /// the remote does not have it yet.
    fn checkout(&self, remote: &str, branch: &str) -> Result<(), SyncError>;
    /// Delete the local branch ref so the next commit has no parent.
    fn delete_ref(&self, branch: &str) -> Result<(), SyncError>;
    /// Remove paths from the index and working tree. Unmatched paths are ignored.
    fn rm(&self, paths: &[String]) -> Result<(), SyncError>;
    fn add(&self, pathspec: &str) -> Result<(), SyncError>;
    /// Set a repository-local config value.
    fn config(&self, key: &str, value: &str) -> Result<(), SyncError>;
    /// Commit staged changes; a clean index is not an error.
    fn commit(&self, message: &str) -> Result<(), SyncError>;
    fn tag(&self, name: &str) -> Result<(), SyncError>;
    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<(), SyncError>;
    /// The tip commit of the current branch.
    fn latest_commit(&self) -> Result<Commit, SyncError>;
}

/// Options for [`GitCli::clone_into`].
#[derive(Debug, Clone)]
pub struct CloneOptions<'a> {
    pub branch: &'a str,
    pub remote: &'a str,
    pub depth: u32,
}

/// [`GitClient`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    cwd: PathBuf,
}

impl GitCli {
    /// Client for an existing working directory.
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
        }
    }

    /// Clone `url` into `dir`, reusing `dir` if it already exists.
    ///
    /// Tries a shallow single-branch clone first and falls back to a full
    /// clone when the branch does not exist on the remote yet.
    pub fn clone_into(
        program: impl Into<String>,
        url: &str,
        dir: &Path,
        opts: &CloneOptions<'_>,
    ) -> Result<Self, SyncError> {
        let program = program.into();
        if dir.exists() {
            return Ok(Self::new(program, dir));
        }
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let dir_arg = dir.to_string_lossy().into_owned();
        let depth = opts.depth.to_string();
        let runner = Self::new(program.clone(), dir.parent().unwrap_or(dir));
        let shallow = runner.run(&[
            "clone",
            url,
            &dir_arg,
            "--branch",
            opts.branch,
            "--single-branch",
            "--origin",
            opts.remote,
            "--depth",
            &depth,
        ]);
        if let Err(err) = shallow {
            tracing::debug!("single-branch clone failed, retrying full clone: {err}");
            runner.run(&["clone", url, &dir_arg, "--origin", opts.remote])?;
        }
        Ok(Self::new(program, dir))
    }

    /// Author identity configured for this working directory, if any.
    ///
    /// Returns `None` when no `user.email` is set.
    pub fn user_identity(&self) -> Option<UserIdentity> {
        let email = self.run(&["config", "--get", "user.email"]).ok()?;
        let email = email.trim();
        if email.is_empty() {
            return None;
        }
        let name = self
            .run(&["config", "--get", "user.name"])
            .ok()
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        Some(UserIdentity {
            name,
            email: email.to_owned(),
        })
    }

    /// Run a command and return its stdout, failing on non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String, SyncError> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(SyncError::Git {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a command and report only whether it exited successfully.
    fn succeeds(&self, args: &[&str]) -> Result<bool, SyncError> {
        Ok(self.output(args)?.status.success())
    }

    fn output(&self, args: &[&str]) -> Result<Output, SyncError> {
        tracing::trace!("{} {}", self.program, args.join(" "));
        Command::new(&self.program)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SyncError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

impl GitClient for GitCli {
    fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn remote_url(&self, remote: &str) -> Result<String, SyncError> {
        let key = format!("remote.{remote}.url");
        let configured = self
            .run(&["config", "--get", &key])
            .or_else(|_| self.run(&["ls-remote", "--get-url", remote]))?;
        let url = configured.trim();
        // ls-remote echoes the remote name back when nothing is configured.
        if url.is_empty() || url == remote {
            return Err(SyncError::NoRemoteUrl {
                remote: remote.to_owned(),
            });
        }
        Ok(url.to_owned())
    }

    fn clean(&self) -> Result<(), SyncError> {
        self.run(&["clean", "-f", "-d"]).map(drop)
    }

    fn fetch(&self, remote: &str) -> Result<(), SyncError> {
        self.run(&["fetch", remote]).map(drop)
    }

    /// Exit code 2 from `ls-remote --exit-code` means no matching ref, so
    /// the branch starts as an orphan. Any other failure aborts.
    fn checkout(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        let tracking = format!("{remote}/{branch}");
        let args = ["ls-remote", "--exit-code", ".", tracking.as_str()];
        let probe = self.output(&args)?;
        match probe.status.code() {
            Some(0) => {
                self.run(&["checkout", branch])?;
                self.run(&["reset", "--hard", &tracking]).map(drop)
            }
            Some(2) => self.run(&["checkout", "--orphan", branch]).map(drop),
            _ => Err(SyncError::Git {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&probe.stderr).trim().to_owned(),
            }),
        }
    }

    fn delete_ref(&self, branch: &str) -> Result<(), SyncError> {
        let refname = format!("refs/heads/{branch}");
        self.run(&["update-ref", "-d", &refname]).map(drop)
    }

    fn rm(&self, paths: &[String]) -> Result<(), SyncError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rm", "--ignore-unmatch", "-r", "-f", "-q", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).map(drop)
    }

    fn add(&self, pathspec: &str) -> Result<(), SyncError> {
        self.run(&["add", pathspec]).map(drop)
    }

    fn config(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.run(&["config", key, value]).map(drop)
    }

    fn commit(&self, message: &str) -> Result<(), SyncError> {
        if self.succeeds(&["diff-index", "--quiet", "HEAD"])? {
            tracing::info!("nothing to commit");
            return Ok(());
        }
        self.run(&["commit", "-m", message]).map(drop)
    }

    fn tag(&self, name: &str) -> Result<(), SyncError> {
        self.run(&["tag", name]).map(drop)
    }

    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<(), SyncError> {
        let mut args = vec!["push", "--tags", remote, branch];
        if force {
            args.push("--force");
        }
        self.run(&args).map(drop)
    }

    fn latest_commit(&self) -> Result<Commit, SyncError> {
        let out = self.run(&["log", "-1", "--format=%H%x00%B"])?;
        parse_log_entry(&out)
    }
}

/// Split `<oid>\0<message>` as printed by `git log --format=%H%x00%B`.
pub(crate) fn parse_log_entry(raw: &str) -> Result<Commit, SyncError> {
    let (oid, message) = raw
        .split_once('\0')
        .ok_or_else(|| SyncError::MalformedCommit(raw.to_owned()))?;
    let oid = oid.trim();
    if oid.is_empty() {
        return Err(SyncError::MalformedCommit(raw.to_owned()));
    }
    Ok(Commit {
        oid: CommitOid::from(oid),
        message: message.trim_end().to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
