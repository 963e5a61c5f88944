use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("kongctl"))
}

/// Get the config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Config File
// ============================================================================

/// `~/.config/kongctl/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub deck_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: konnect::DEFAULT_BASE_URL.to_string(),
            token: None,
            deck_path: PathBuf::from("deck"),
            timeout_secs: konnect::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load the user config; defaults when the file does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load a config file; defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Effective Settings
// ============================================================================

/// Connection settings after applying command-line overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub token: String,
    pub deck_path: PathBuf,
    pub timeout: Duration,
}

impl Settings {
    /// Flags (and `KONGCTL_KONNECT_TOKEN`, via clap) win over the config file.
    pub fn resolve(
        config: Config,
        token: Option<&str>,
        base_url: Option<&str>,
        deck_path: Option<&Path>,
    ) -> Result<Self> {
        let token = token
            .map(ToString::to_string)
            .or(config.token.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                konnect::Error::Config(
                    "Konnect token required: pass --token, set KONGCTL_KONNECT_TOKEN, or add token to config.toml"
                        .to_string(),
                )
            })?;

        Ok(Self {
            base_url: base_url
                .map(ToString::to_string)
                .unwrap_or_else(|| config.base_url.clone()),
            token,
            deck_path: deck_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| config.deck_path.clone()),
            timeout: config.timeout(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, "https://us.api.konghq.com");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "base_url = \"https://eu.api.konghq.com\"\ntimeout_secs = 5\n").unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.base_url, "https://eu.api.konghq.com");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.deck_path, PathBuf::from("deck"));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout_secs = \"soon\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            token: Some("kpat_file".to_string()),
            ..Config::default()
        };

        let settings = Settings::resolve(
            config,
            Some("kpat_flag"),
            Some("http://localhost:8080"),
            Some(Path::new("/opt/deck")),
        )
        .unwrap();

        assert_eq!(settings.token, "kpat_flag");
        assert_eq!(settings.base_url, "http://localhost:8080");
        assert_eq!(settings.deck_path, PathBuf::from("/opt/deck"));
    }

    #[test]
    fn test_token_from_config() {
        let config = Config {
            token: Some("kpat_file".to_string()),
            ..Config::default()
        };

        let settings = Settings::resolve(config, None, None, None).unwrap();

        assert_eq!(settings.token, "kpat_file");
        assert_eq!(settings.base_url, konnect::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_missing_token_is_a_config_error() {
        let err = Settings::resolve(Config::default(), Some("  "), None, None).unwrap_err();

        let konnect_err = err.downcast_ref::<konnect::Error>().unwrap();
        assert_eq!(konnect_err.category(), konnect::ErrorCategory::Config);
    }
}
