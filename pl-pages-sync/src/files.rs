//! File enumeration and copying.
//!
//! Paths handed between steps are relative, `/`-separated strings so that
//! the same value can be used as a Git pathspec and as a manifest key.

use std::path::Path;

use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

/// `remove` value meaning "everything under the destination directory".
pub const REMOVE_ALL: &str = ".";

/// Check that `base` exists and is a directory.
pub fn ensure_base_dir(base: &Path) -> Result<(), SyncError> {
    if base.is_dir() {
        Ok(())
    } else {
        Err(SyncError::NotADirectory {
            path: base.to_path_buf(),
        })
    }
}

/// List the files under `base` matching `pattern`, sorted and deduplicated.
///
/// Patterns support `**` and `{a,b}` alternation; `*` never crosses `/`.
/// Directories never appear in the result. With `dotfiles` off, any path
/// with a component starting with `.` is skipped unless some segment of the
/// pattern starts with a literal dot. `.git` directories are never entered.
pub fn list_files(base: &Path, pattern: &str, dotfiles: bool) -> Result<Vec<String>, SyncError> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| SyncError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })?
        .compile_matcher();
    let hidden_ok = dotfiles || names_dot_segment(pattern);

    let mut files = Vec::new();
    let walker = WalkDir::new(base)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == ".git"));
    for entry in walker {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(base) else {
            continue;
        };
        let rel = to_posix(rel);
        if !hidden_ok && rel.split('/').any(|c| c.starts_with('.')) {
            continue;
        }
        if matcher.is_match(&rel) {
            files.push(rel);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn names_dot_segment(pattern: &str) -> bool {
    pattern
        .split(['/', '{', ','])
        .any(|segment| segment.starts_with('.') && segment != "." && segment != "..")
}

/// Resolve the `remove` glob into paths relative to the checkout root.
///
/// `dest_dir` is the destination directory inside the checkout and `dest`
/// its relative name there.
pub fn removal_targets(dest_dir: &Path, dest: &str, pattern: &str) -> Result<Vec<String>, SyncError> {
    if pattern == REMOVE_ALL {
        return Ok(if dest_dir.exists() {
            vec![join_dest(dest, REMOVE_ALL)]
        } else {
            vec![]
        });
    }
    if !dest_dir.exists() {
        return Ok(vec![]);
    }
    Ok(list_files(dest_dir, pattern, false)?
        .into_iter()
        .map(|rel| join_dest(dest, &rel))
        .collect())
}

/// Copy `files` (relative to `base`) into `dest_dir`, creating directories
/// as needed and overwriting existing files.
pub fn copy_files(files: &[String], base: &Path, dest_dir: &Path) -> Result<(), SyncError> {
    for rel in files {
        let from = base.join(rel);
        let to = dest_dir.join(rel);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::copy(&from, &to).map_err(|e| io_err(&from, e))?;
    }
    tracing::debug!("copied {} files into {}", files.len(), dest_dir.display());
    Ok(())
}

/// Join a checkout-relative destination and a path inside it, dropping `.`
/// segments so `dest = "."` yields the bare path.
pub fn join_dest(dest: &str, rel: &str) -> String {
    let parts: Vec<&str> = dest
        .split('/')
        .chain(rel.split('/'))
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    if parts.is_empty() {
        ".".to_owned()
    } else {
        parts.join("/")
    }
}

fn to_posix(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
