//! Configuration surface: the external interface table plus the ambient
//! keys layered around it. TOML file with a documented search path, every
//! section `#[serde(default)]`, optional environment overrides for
//! container deployments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub engine: EngineConfig,
    pub strm: StrmConfig,
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            engine: EngineConfig::default(),
            strm: StrmConfig::default(),
            catalog: CatalogConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub data_dir: String,
    pub download_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            data_dir: "./data".to_string(),
            download_dir: "./data/downloads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Engine-level knobs: resolver, scheduler, availability cache, retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Comma-separated provider priority list, e.g. `VOE,Filemoon,Streamtape`.
    pub provider_order: Vec<String>,
    pub max_concurrency: usize,
    pub availability_ttl_hours: i64,
    pub downloads_ttl_hours: i64,
    pub cleanup_scan_interval_minutes: u32,
    /// Optional Torznab `apikey` requirement.
    pub indexer_api_key: Option<String>,
    /// Returns the full catalogue instead of erroring on an unresolvable
    /// absolute-episode-number mapping (§4.4 Open Question).
    pub fallback_all_episodes: bool,
    pub chunk_size_bytes: usize,
    pub default_language: String,
    /// Base URL of the Sonarr-compatible metadata service the specials
    /// mapper uses to resolve canonical episode numbering.
    pub metadata_base_url: String,
    pub metadata_api_key: Option<String>,
    /// Whether `t=search&q=` (empty query) returns a synthetic
    /// connectivity-test item, per §4.8.
    pub torznab_connectivity_test_item: bool,
    /// Logs every candidate's resolver score (not just the winner) at
    /// `debug!` level, since the scoring weights and confidence floor are
    /// empirical constants (§9 Open Questions).
    pub debug_scores: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_order: vec!["VOE".to_string(), "Filemoon".to_string(), "Streamtape".to_string()],
            max_concurrency: crate::constants::scheduler::DEFAULT_MAX_CONCURRENCY,
            availability_ttl_hours: crate::constants::cache::AVAILABILITY_TTL_HOURS,
            downloads_ttl_hours: crate::constants::scheduler::DEFAULT_DOWNLOADS_TTL_HOURS,
            cleanup_scan_interval_minutes: crate::constants::scheduler::DEFAULT_CLEANUP_SCAN_MINUTES,
            indexer_api_key: None,
            fallback_all_episodes: false,
            chunk_size_bytes: crate::constants::strm::DEFAULT_CHUNK_SIZE_BYTES,
            default_language: "German Dub".to_string(),
            metadata_base_url: "http://localhost:8989".to_string(),
            metadata_api_key: None,
            torznab_connectivity_test_item: true,
            debug_scores: false,
        }
    }
}

/// STRM proxy/file knobs (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrmConfig {
    pub files_mode: StrmFilesMode,
    pub proxy_mode: StrmProxyMode,
    pub auth_mode: StrmProxyAuthMode,
    pub secret: StrmProxySecret,
    pub token_ttl_seconds: i64,
    pub hls_remux: bool,
    pub public_base_url: String,
}

impl Default for StrmConfig {
    fn default() -> Self {
        Self {
            files_mode: StrmFilesMode::Both,
            proxy_mode: StrmProxyMode::Proxy,
            auth_mode: StrmProxyAuthMode::Token,
            secret: StrmProxySecret::default(),
            token_ttl_seconds: crate::constants::strm::DEFAULT_TOKEN_TTL_SECONDS,
            hls_remux: false,
            public_base_url: "http://localhost:9696".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrmFilesMode {
    No,
    Both,
    Only,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrmProxyMode {
    Direct,
    Proxy,
    Redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrmProxyAuthMode {
    None,
    ApiKey,
    Token,
}

/// HMAC key for STRM proxy tokens. `Debug` redacts the value so it never
/// ends up in a log line via `{:?}`.
#[derive(Clone, Serialize, Deserialize)]
pub struct StrmProxySecret(pub String);

impl Default for StrmProxySecret {
    fn default() -> Self {
        Self("change-me".to_string())
    }
}

impl std::fmt::Debug for StrmProxySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StrmProxySecret(<redacted>)")
    }
}

impl std::ops::Deref for StrmProxySecret {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Enabled catalogue sites, by host.
    pub sites: Vec<String>,
    pub index_refresh_hours: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sites: crate::domain::Site::all().iter().map(|s| s.host().to_string()).collect(),
            index_refresh_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9696,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub loki_enabled: bool,
    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("anibridge").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".anibridge").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.max_concurrency == 0 {
            anyhow::bail!("engine.max_concurrency must be greater than zero");
        }
        if self.strm.auth_mode == StrmProxyAuthMode::Token && self.strm.secret.0 == "change-me" {
            anyhow::bail!("strm.secret must be set when strm.auth_mode = \"token\"");
        }
        if self.catalog.sites.is_empty() {
            anyhow::bail!("catalog.sites must list at least one enabled site");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[strm]"));
        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.engine.max_concurrency, config.engine.max_concurrency);
    }

    #[test]
    fn validate_rejects_default_secret_under_token_auth() {
        let mut config = Config::default();
        config.strm.auth_mode = StrmProxyAuthMode::Token;
        config.strm.secret = StrmProxySecret("change-me".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_a_configured_secret() {
        let mut config = Config::default();
        config.strm.secret = StrmProxySecret("a-real-secret".to_string());
        assert!(config.validate().is_ok());
    }
}
