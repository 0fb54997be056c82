pub mod clean;
pub mod publish;
pub mod set_branch;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};

use pl_pages_deploy::{load_jwk, Signer};

/// Git config key naming the wallet key file.
pub const KEYFILE_CONFIG_KEY: &str = "protocol.land.keyfile";

/// Resolve the wallet path from `explicit` or the Git config in `cwd`, then
/// load it. `Ok(None)` when no key file is configured.
pub fn load_signer(
    explicit: Option<&Path>,
    git: &str,
    cwd: &Path,
) -> Result<Option<Arc<dyn Signer>>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match configured_keyfile(git, cwd) {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read wallet {}", path.display()))?;
    let signer = load_jwk(&json)
        .with_context(|| format!("failed to load wallet {}", path.display()))?;
    tracing::debug!(address = %signer.address(), "loaded wallet");
    Ok(Some(signer))
}

fn configured_keyfile(git: &str, cwd: &Path) -> Option<PathBuf> {
    let out = Command::new(git)
        .args(["config", "--get", KEYFILE_CONFIG_KEY])
        .current_dir(cwd)
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&out.stdout).trim().to_owned();
    (!value.is_empty()).then(|| PathBuf::from(value))
}
