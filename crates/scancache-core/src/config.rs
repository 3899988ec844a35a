//! Proxy configuration management.
//!
//! This module handles loading and saving the proxy configuration: the
//! application origin, the versioned cache name, the precache manifests,
//! the bypass domains and the background sync tag.
//!
//! Configuration is stored at `~/.config/scancache/config.json`. Every
//! field is optional in the file; missing fields fall back to the values
//! the card scanner ships with.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, ProxyResult};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "scancache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides `origin` when set
pub const ENV_ORIGIN: &str = "SCANCACHE_ORIGIN";

/// Overrides `cache_version` when set
pub const ENV_CACHE_VERSION: &str = "SCANCACHE_CACHE_VERSION";

const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
];

const DEFAULT_REMOTE_LIBRARIES: &[&str] = &[
    "https://cdn.tailwindcss.com",
    "https://unpkg.com/react@18/umd/react.production.min.js",
    "https://unpkg.com/react-dom@18/umd/react-dom.production.min.js",
    "https://unpkg.com/@babel/standalone/babel.min.js",
    "https://unpkg.com/tesseract.js@5/dist/tesseract.min.js",
];

/// Power Automate endpoints; the app queues these itself when offline
const DEFAULT_BYPASS_DOMAINS: &[&str] = &["powerplatform.com", "logic.azure.com", "azure-api.net"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Origin the asset manifest paths are resolved against
    pub origin: String,
    pub cache_prefix: String,
    pub cache_version: String,
    pub assets: Vec<String>,
    pub remote_libraries: Vec<String>,
    pub bypass_domains: Vec<String>,
    /// Served from cache when a navigation cannot reach the network
    pub fallback_document: String,
    pub sync_tag: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            cache_prefix: "card-scanner".to_string(),
            cache_version: "v1".to_string(),
            assets: strings(DEFAULT_ASSETS),
            remote_libraries: strings(DEFAULT_REMOTE_LIBRARIES),
            bypass_domains: strings(DEFAULT_BYPASS_DOMAINS),
            fallback_document: "/index.html".to_string(),
            sync_tag: "sync-leads".to_string(),
            cache_dir: None,
        }
    }
}

impl ProxyConfig {
    /// Load from the default location, or defaults if no file exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `SCANCACHE_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(origin) = std::env::var(ENV_ORIGIN) {
            self.origin = origin;
        }
        if let Ok(version) = std::env::var(ENV_CACHE_VERSION) {
            self.cache_version = version;
        }
        self
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Name of the current cache generation, e.g. `card-scanner-v1`
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    pub fn origin_url(&self) -> ProxyResult<Url> {
        Url::parse(&self.origin)
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", self.origin, e)))
    }

    /// Resolve a same-origin path (or pass through an absolute URL)
    pub fn resolve(&self, path: &str) -> ProxyResult<Url> {
        self.origin_url()?
            .join(path)
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// True when the host contains any configured bypass fragment
    pub fn is_bypassed(&self, host: &str) -> bool {
        self.bypass_domains
            .iter()
            .any(|fragment| !fragment.is_empty() && host.contains(fragment.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_name() {
        assert_eq!(ProxyConfig::default().cache_name(), "card-scanner-v1");
    }

    #[test]
    fn test_bypass_matches_substrings() {
        let config = ProxyConfig::default();
        assert!(config.is_bypassed("prod-42.westus.logic.azure.com"));
        assert!(config.is_bypassed("env.api.powerplatform.com"));
        assert!(config.is_bypassed("contoso.azure-api.net"));
        assert!(!config.is_bypassed("graph.microsoft.com"));
        assert!(!config.is_bypassed("unpkg.com"));
    }

    #[test]
    fn test_empty_bypass_fragment_matches_nothing() {
        let config = ProxyConfig {
            bypass_domains: vec![String::new()],
            ..Default::default()
        };
        assert!(!config.is_bypassed("anything.example"));
    }

    #[test]
    fn test_resolve_same_origin_paths() {
        let config = ProxyConfig {
            origin: "https://scan.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.resolve("/index.html").unwrap().as_str(),
            "https://scan.example.com/index.html"
        );
        assert_eq!(config.resolve("/").unwrap().as_str(), "https://scan.example.com/");
        assert_eq!(
            config.resolve("https://unpkg.com/x.js").unwrap().as_str(),
            "https://unpkg.com/x.js"
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ProxyConfig =
            serde_json::from_str(r#"{ "cache_version": "v7" }"#).unwrap();
        assert_eq!(config.cache_name(), "card-scanner-v7");
        assert_eq!(config.sync_tag, "sync-leads");
        assert_eq!(config.assets.len(), 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = ProxyConfig {
            cache_version: "v2".to_string(),
            bypass_domains: vec!["example.net".to_string()],
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(ProxyConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProxyConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ProxyConfig::default());
    }
}
