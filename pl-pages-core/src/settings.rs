//! Endpoint settings loaded from `~/.pl-pages/config.yaml`.
//!
//! The file is optional and every field has a default, so a partial file
//! only overrides what it names:
//!
//! ```yaml
//! gateway_url: https://arweave.net
//! static_export_markers: ["_next/", "_astro/"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

/// Network endpoints and heuristics used by the deployment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Gateway serving deployed archives; also the last upload provider.
    pub gateway_url: String,
    /// Base network node answering price queries.
    pub arweave_url: String,
    /// GraphQL index used for content-hash deduplication.
    pub graphql_url: String,
    /// Subsidized upload relay tried first.
    pub subsidize_url: String,
    /// Bundler node tried second.
    pub bundler_url: String,
    /// Registry compute unit (read path).
    pub compute_unit_url: String,
    /// Registry messenger unit (write path).
    pub messenger_unit_url: String,
    /// Id of the registry process holding repository records.
    pub registry_process_id: String,
    /// Primary AR/USD price source.
    pub fiat_primary_url: String,
    /// Secondary AR/USD price source.
    pub fiat_secondary_url: String,
    /// Path fragments marking a framework static export; see the manifest
    /// path-rewrite rule.
    pub static_export_markers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: "https://ar-io.net".into(),
            arweave_url: "https://arweave.net".into(),
            graphql_url: "https://ar-io.net/graphql".into(),
            subsidize_url: "https://subsidize.saikranthi.dev/api/v1/postrepo".into(),
            bundler_url: "https://turbo.ardrive.io".into(),
            compute_unit_url: "https://cu.ao-testnet.xyz".into(),
            messenger_unit_url: "https://mu.ao-testnet.xyz".into(),
            registry_process_id: "bcutzJJDcVV_z2r10vwUK-luIL-a9j8F8a-Nsq-CCKo".into(),
            fiat_primary_url:
                "https://api.coingecko.com/api/v3/simple/price?ids=arweave&vs_currencies=usd".into(),
            fiat_secondary_url:
                "https://api.redstone.finance/prices/?symbol=AR&provider=redstone&limit=1".into(),
            static_export_markers: vec!["_next/".into()],
        }
    }
}

/// `<home>/.pl-pages/config.yaml`: pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    home.join(".pl-pages").join("config.yaml")
}

/// Load settings from `<home>/.pl-pages/config.yaml`.
///
/// Returns defaults if the file is absent,
/// `CoreError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Settings, CoreError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, CoreError> {
    load_at(&home()?)
}

fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_settings(home: &TempDir, yaml: &str) {
        let path = settings_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, yaml).unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().unwrap();
        assert_eq!(load_at(home.path()).unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_overrides_named_fields_only() {
        let home = TempDir::new().unwrap();
        write_settings(&home, "gateway_url: https://arweave.net\nstatic_export_markers: [\"_astro/\"]\n");
        let s = load_at(home.path()).unwrap();
        assert_eq!(s.gateway_url, "https://arweave.net");
        assert_eq!(s.static_export_markers, vec!["_astro/".to_string()]);
        assert_eq!(s.bundler_url, Settings::default().bundler_url);
    }

    #[test]
    fn malformed_file_reports_path() {
        let home = TempDir::new().unwrap();
        write_settings(&home, "gateway_url: [unclosed\n");
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("config.yaml"));
    }
}
