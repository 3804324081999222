#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bridge_settings_default() {
        let settings = BridgeSettings::default();

        assert_eq!(settings.server.url, "http://localhost:12341/mcp");
        assert_eq!(settings.server.command, "uvx");
        assert_eq!(
            settings.server.args,
            vec!["--from", "git+https://github.com/oraios/serena", "serena-mcp-server"]
        );
        assert_eq!(settings.timeouts.probe_ms, 2000);
        assert_eq!(settings.timeouts.startup_ms, 120_000);
        assert_eq!(settings.timeouts.poll_interval_ms, 1000);
        assert_eq!(settings.timeouts.reconnect_delay_ms, 1000);
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.file_enabled);
        assert!(settings.repair.enabled);
        assert_eq!(
            settings.repair.default_languages,
            vec!["python", "typescript", "dart", "terraform"]
        );
    }

    #[tokio::test]
    async fn test_load_default_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let settings = BridgeSettings::load_from_path(&temp_dir.path().join("config.toml"))
            .await
            .unwrap();

        assert_eq!(settings.timeouts.startup_ms, 120_000);
    }

    #[tokio::test]
    async fn test_partial_load_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let partial = r#"
[server]
url = "http://127.0.0.1:9000/sse"

[timeouts]
startup_ms = 5000
"#;
        tokio::fs::write(&config_path, partial).await.unwrap();

        let settings = BridgeSettings::load_from_path(&config_path).await.unwrap();
        assert_eq!(settings.server.url, "http://127.0.0.1:9000/sse");
        assert_eq!(settings.timeouts.startup_ms, 5000);
        assert_eq!(settings.timeouts.probe_ms, 2000);
        assert_eq!(settings.server.command, "uvx");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut settings = BridgeSettings::default();
        settings.server.command = "serena".to_string();
        settings.repair.enabled = false;
        settings.save_to_path(&config_path).await.unwrap();

        let loaded = BridgeSettings::load_from_path(&config_path).await.unwrap();
        assert_eq!(loaded.server.command, "serena");
        assert!(!loaded.repair.enabled);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "[timeouts\nprobe_ms = 1")
            .await
            .unwrap();

        let result = BridgeSettings::load_from_path(&config_path).await;
        assert!(matches!(result, Err(BridgeError::ConfigError(_))));
    }

    #[test]
    fn test_validation() {
        let mut settings = BridgeSettings::default();
        assert!(settings.validate().is_ok());

        settings.timeouts.probe_ms = 0;
        assert!(settings.validate().is_err());

        settings = BridgeSettings::default();
        settings.server.command = "  ".to_string();
        assert!(settings.validate().is_err());

        settings = BridgeSettings::default();
        settings.logging.level = "loud".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with(".serena-bridge"));
    }
}

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk bridge settings, `~/.serena-bridge/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeSettings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub repair: RepairSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default = "default_server_command")]
    pub command: String,
    #[serde(default = "default_server_args")]
    pub args: Vec<String>, // launch flags are appended after these
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_probe_ms")]
    pub probe_ms: u64,
    #[serde(default = "default_startup_ms")]
    pub startup_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default)]
    pub file_enabled: bool,
    pub file_path: Option<String>, // If None, uses default ~/.serena-bridge/logs/
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairSettings {
    #[serde(default = "default_repair_enabled")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub default_languages: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            command: default_server_command(),
            args: default_server_args(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            probe_ms: default_probe_ms(),
            startup_ms: default_startup_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            file_path: None,
        }
    }
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            enabled: default_repair_enabled(),
            default_languages: default_languages(),
        }
    }
}

impl BridgeSettings {
    pub async fn load() -> Result<Self> {
        let config_path = get_config_dir()?.join("config.toml");
        Self::load_from_path(&config_path).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let settings: Self = toml::from_str(&content)?;

        settings.validate()?;

        Ok(settings)
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to serialize settings: {e}")))?;

        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.command.trim().is_empty() {
            return Err(BridgeError::ConfigError(
                "Server command must not be empty".to_string(),
            ));
        }

        let timeouts = [
            ("probe_ms", self.timeouts.probe_ms),
            ("startup_ms", self.timeouts.startup_ms),
            ("poll_interval_ms", self.timeouts.poll_interval_ms),
            ("reconnect_delay_ms", self.timeouts.reconnect_delay_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(BridgeError::ConfigError(format!(
                    "Timeout '{name}' must be greater than 0"
                )));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(BridgeError::ConfigError(format!(
                "Invalid logging level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    pub fn get_log_dir(&self) -> PathBuf {
        match &self.logging.file_path {
            Some(path) => PathBuf::from(path),
            None => {
                let config_dir =
                    get_config_dir().unwrap_or_else(|_| PathBuf::from(".serena-bridge"));
                config_dir.join("logs")
            }
        }
    }
}

pub fn get_home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| BridgeError::ConfigError("Could not determine home directory".to_string()))
}

pub fn get_config_dir() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(".serena-bridge"))
}

// Default value functions for serde
fn default_server_url() -> String {
    "http://localhost:12341/mcp".to_string()
}
fn default_server_command() -> String {
    "uvx".to_string()
}
fn default_server_args() -> Vec<String> {
    ["--from", "git+https://github.com/oraios/serena", "serena-mcp-server"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_probe_ms() -> u64 {
    2000
}
fn default_startup_ms() -> u64 {
    120_000
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_repair_enabled() -> bool {
    true
}
fn default_languages() -> Vec<String> {
    ["python", "typescript", "dart", "terraform"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
