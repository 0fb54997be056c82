//! Path manifest routing deployed paths to object ids.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use pl_pages_core::ObjectId;

use crate::error::DeployError;

pub const MANIFEST_FORMAT: &str = "arweave/paths";
pub const MANIFEST_VERSION: &str = "0.1.0";
pub const INDEX_PATH: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIndex {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: ObjectId,
}

/// Path manifest. Each path is written at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest: String,
    pub version: String,
    pub index: ManifestIndex,
    pub paths: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            manifest: MANIFEST_FORMAT.to_owned(),
            version: MANIFEST_VERSION.to_owned(),
            index: ManifestIndex {
                path: INDEX_PATH.to_owned(),
            },
            paths: BTreeMap::new(),
        }
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `path` to `id`. Fails if `path` is already routed.
    pub fn insert(&mut self, path: String, id: ObjectId) -> Result<(), DeployError> {
        if self.paths.contains_key(&path) {
            return Err(DeployError::DuplicatePath { path });
        }
        self.paths.insert(path, ManifestEntry { id });
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.paths.get(path).map(|e| &e.id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DeployError> {
        Ok(serde_json::to_vec(self)?)
    }
}

// ---------------------------------------------------------------------------
// Path rewriting
// ---------------------------------------------------------------------------

/// Rule deciding how file paths appear in the manifest.
pub trait PathRewrite: Send + Sync {
    /// Whether the rule applies to a deployment of `paths`.
    fn applies(&self, paths: &[&str]) -> bool;

    /// Manifest key for `path`, called only when the rule applies.
    fn rewrite(&self, path: &str) -> String;
}

/// Framework static exports link pages without their `.html` extension.
/// When any path contains one of the markers, every `.html` file except the
/// root index loses its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticExportRule {
    markers: Vec<String>,
}

impl StaticExportRule {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl Default for StaticExportRule {
    fn default() -> Self {
        Self::new(vec!["_next/".to_owned()])
    }
}

impl PathRewrite for StaticExportRule {
    fn applies(&self, paths: &[&str]) -> bool {
        paths
            .iter()
            .any(|p| self.markers.iter().any(|m| p.contains(m.as_str())))
    }

    fn rewrite(&self, path: &str) -> String {
        if path == INDEX_PATH {
            return path.to_owned();
        }
        path.strip_suffix(".html").unwrap_or(path).to_owned()
    }
}

/// Manifest keys for `paths` under `rule`, in input order.
pub fn routed_paths(rule: &dyn PathRewrite, paths: &[&str]) -> Vec<String> {
    if rule.applies(paths) {
        paths.iter().map(|p| rule.rewrite(p)).collect()
    } else {
        paths.iter().map(|p| (*p).to_owned()).collect()
    }
}

/// Fail on the first key routed twice, e.g. `about.html` and `about` once
/// the static export rule strips the extension.
pub fn ensure_unique(keys: &[String]) -> Result<(), DeployError> {
    let mut seen = BTreeSet::new();
    for key in keys {
        if !seen.insert(key.as_str()) {
            return Err(DeployError::DuplicatePath { path: key.clone() });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// MIME type for `path` by extension.
pub fn content_type(path: &str) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
