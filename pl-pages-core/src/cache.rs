//! Checkout cache layout.
//!
//! # Storage layout
//!
//! ```text
//! <user cache dir>/
//!   pl-pages/
//!     <filenamify(repo url)>/   (one Git checkout per repository URL)
//! ```
//!
//! Like the settings module, every function has an `_at(cache_home, …)` form
//! used by tests and a convenience form that resolves `dirs::cache_dir()`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};

/// Directory name under the user cache dir.
pub const CACHE_NAME: &str = "pl-pages";

/// Replacement for every run of characters that cannot appear in a file name.
const REPLACEMENT: char = '!';

/// Longest file name produced by [`filenamify`].
const MAX_NAME_LEN: usize = 100;

/// `<cache_home>/pl-pages`: pure, no I/O.
pub fn cache_root_at(cache_home: &Path) -> PathBuf {
    cache_home.join(CACHE_NAME)
}

/// `cache_root_at` convenience wrapper.
pub fn cache_root() -> Result<PathBuf, CoreError> {
    Ok(cache_root_at(&cache_home()?))
}

/// `<cache_home>/pl-pages/<filenamify(repo_url)>`: pure, no I/O.
pub fn checkout_dir_at(cache_home: &Path, repo_url: &str) -> PathBuf {
    cache_root_at(cache_home).join(filenamify(repo_url))
}

/// `checkout_dir_at` convenience wrapper.
pub fn checkout_dir(repo_url: &str) -> Result<PathBuf, CoreError> {
    Ok(checkout_dir_at(&cache_home()?, repo_url))
}

/// Remove every cached checkout. A missing cache is not an error.
pub fn clean_at(cache_home: &Path) -> Result<(), CoreError> {
    let root = cache_root_at(cache_home);
    match std::fs::remove_dir_all(&root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(root, e)),
    }
}

/// `clean_at` convenience wrapper.
pub fn clean() -> Result<(), CoreError> {
    clean_at(&cache_home()?)
}

/// Encode `input` as a single safe file name.
///
/// Each run of reserved characters (`<>:"/\|?*` and control characters)
/// becomes one `!`; `.` and `..` become `!`; the result is capped at 100
/// characters.
pub fn filenamify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_run = false;
    for c in input.chars() {
        if is_reserved(c) {
            if !in_run {
                out.push(REPLACEMENT);
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    if out == "." || out == ".." {
        return REPLACEMENT.to_string();
    }
    out.chars().take(MAX_NAME_LEN).collect()
}

fn is_reserved(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

fn cache_home() -> Result<PathBuf, CoreError> {
    dirs::cache_dir().ok_or(CoreError::CacheDirNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
