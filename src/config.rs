use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub lookup: LookupConfig,
    pub speed_test: SpeedTestConfig,
    pub ui: UiConfig,
}

/// Endpoints for both provider chains, in the order they are tried.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    pub ipwho_is_url: String,
    pub ipwhois_io_url: String,
    pub ipapi_co_url: String,
    pub ipify64_url: String,
    pub ipify_url: String,
    /// Unset means a stalled provider stalls the chain.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpeedTestConfig {
    pub trace_url: String,
    pub download_url: String,
    pub download_bytes: u64,
    pub server_label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
    pub default_view: String, // "Network", "Geo", "Client", "Device", "Speed" or "Raw"
    pub export_path: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            ipwho_is_url: "https://ipwho.is/".to_string(),
            ipwhois_io_url: "https://ipwhois.io/".to_string(),
            ipapi_co_url: "https://ipapi.co/json/".to_string(),
            ipify64_url: "https://api64.ipify.org?format=json".to_string(),
            ipify_url: "https://api.ipify.org?format=json".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            trace_url: "https://www.cloudflare.com/cdn-cgi/trace".to_string(),
            download_url: "https://speed.cloudflare.com/__down".to_string(),
            download_bytes: 5_000_000,
            server_label: "SPEED.CLOUDFLARE.COM".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 150,
            default_view: "Network".to_string(),
            export_path: "whatsmyip-report.json".to_string(),
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        Self::load_or_create(CONFIG_PATH)
    }

    pub fn load_or_create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if path.exists() {
            return match Self::from_path(path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Config::default()
                }
            };
        }

        let default_config = Config::default();
        if let Err(e) = default_config.save(path) {
            warn!("Could not write default {} to disk: {}", path.display(), e);
        }

        info!("Loaded default configuration.");
        default_config
    }

    pub fn from_path(path: impl AsRef<Path>) -> color_eyre::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> color_eyre::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_or_create(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::from_path(&path).unwrap(), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[lookup]\nrequest_timeout_secs = 4\n\n[speed_test]\ndownload_bytes = 1000\n",
        )
        .unwrap();

        let config = Config::load_or_create(&path);
        assert_eq!(config.lookup.request_timeout_secs, Some(4));
        assert_eq!(config.lookup.ipwho_is_url, "https://ipwho.is/");
        assert_eq!(config.speed_test.download_bytes, 1000);
        assert_eq!(config.ui.tick_rate_ms, 150);
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        assert_eq!(Config::load_or_create(&path), Config::default());
    }
}
