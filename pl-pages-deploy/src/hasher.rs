//! Content hashing of the published files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use sha2::{Digest as _, Sha256};
use tokio::task::JoinSet;

use crate::error::{io_err, DeployError};

/// SHA-256 of a file's bytes (lowercase hex) and its size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub hash: String,
    pub size: u64,
}

impl Digest {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            hash: hex::encode(Sha256::digest(bytes)),
            size: bytes.len() as u64,
        }
    }
}

/// A file selected for deployment. Content is read on demand; the digest is
/// computed once and memoized.
#[derive(Debug)]
pub struct TrackedFile {
    path: String,
    source: PathBuf,
    digest: OnceLock<Digest>,
}

impl TrackedFile {
    /// `path` is relative to `base`, `/`-separated.
    pub fn new(base: &Path, path: &str) -> Self {
        Self {
            path: path.to_owned(),
            source: base.join(path),
            digest: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub async fn content(&self) -> Result<Vec<u8>, DeployError> {
        tokio::fs::read(&self.source)
            .await
            .map_err(|e| io_err(&self.source, e))
    }

    pub async fn digest(&self) -> Result<&Digest, DeployError> {
        if let Some(digest) = self.digest.get() {
            return Ok(digest);
        }
        let bytes = self.content().await?;
        let computed = Digest::of(&bytes);
        Ok(self.digest.get_or_init(|| computed))
    }
}

/// Hash every file concurrently. The result keeps the order of `paths`.
pub async fn hash_files(base: &Path, paths: &[String]) -> Result<Vec<Arc<TrackedFile>>, DeployError> {
    let files: Vec<Arc<TrackedFile>> = paths
        .iter()
        .map(|p| Arc::new(TrackedFile::new(base, p)))
        .collect();

    let mut tasks = JoinSet::new();
    for file in &files {
        let file = Arc::clone(file);
        tasks.spawn(async move { file.digest().await.map(drop) });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }
    tracing::debug!(files = files.len(), "hashed deployment files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn digest_is_lowercase_sha256_hex() {
        let d = Digest::of(b"abc");
        assert_eq!(
            d.hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(d.size, 3);
    }

    #[tokio::test]
    async fn digest_is_memoized() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();
        let file = TrackedFile::new(dir.path(), "a.txt");
        let before = file.digest().await.unwrap().clone();

        fs::write(dir.path().join("a.txt"), "changed").unwrap();
        assert_eq!(file.digest().await.unwrap(), &before);
        assert_eq!(file.content().await.unwrap(), b"changed");
    }

    #[tokio::test]
    async fn hash_files_keeps_input_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("z.txt"), "z").unwrap();
        fs::write(dir.path().join("sub/a.txt"), "a").unwrap();
        let paths = vec!["z.txt".to_string(), "sub/a.txt".to_string()];

        let files = hash_files(dir.path(), &paths).await.unwrap();
        let got: Vec<&str> = files.iter().map(|f| f.path()).collect();
        assert_eq!(got, ["z.txt", "sub/a.txt"]);
        assert_eq!(files[1].digest().await.unwrap().hash, Digest::of(b"a").hash);
    }

    #[tokio::test]
    async fn missing_file_reports_its_path() {
        let dir = TempDir::new().unwrap();
        let err = hash_files(dir.path(), &["gone.html".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gone.html"), "got: {err}");
    }
}
