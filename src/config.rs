use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::warn;

const APP_DIR: &str = ".justly";
const CONFIG_FILE: &str = "config.json";
pub const API_KEY_ENV: &str = "JUSTLY_AI_API_KEY";
const MIN_AI_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub ai_api_base_url: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
    pub voice_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("justly.db"),
            api_port: 7810,
            ai_enabled: true,
            ai_api_key: None,
            ai_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ai_model: "gemini-2.0-flash".to_string(),
            ai_timeout_seconds: 30,
            voice_command: None,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    /// Writes defaults on first run. An unreadable file is left alone and
    /// defaults are used for this run.
    pub fn load_or_default() -> Result<Self> {
        Self::load_or_default_from(&Self::config_path()?)
    }

    fn load_or_default_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        Self::load_from(config_path).or_else(|error| {
            warn!(error = %error, "config file unreadable; using defaults");
            Ok(Self::default())
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn ai_timeout(&self) -> u64 {
        self.ai_timeout_seconds.max(MIN_AI_TIMEOUT_SECONDS)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "ai_enabled" => {
                self.ai_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("ai_enabled must be true/false"))?;
            }
            "ai_api_key" => {
                self.ai_api_key = (!value.trim().is_empty()).then_some(value.trim().to_string());
            }
            "ai_api_base_url" => {
                self.ai_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "ai_model" => {
                self.ai_model = value.trim().to_string();
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(MIN_AI_TIMEOUT_SECONDS);
            }
            "voice_command" => {
                self.voice_command =
                    (!value.trim().is_empty()).then_some(value.trim().to_string());
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, api_port|api.port, ai_enabled|ai.enabled, ai_api_key|ai.api_key, ai_api_base_url|ai.base_url, ai_model|ai.model, ai_timeout_seconds|ai.timeout_seconds, voice_command|voice.command"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "ai_enabled" => Some(self.ai_enabled.to_string()),
            "ai_api_key" => Some(
                self.ai_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "ai_api_base_url" => Some(self.ai_api_base_url.clone()),
            "ai_model" => Some(self.ai_model.clone()),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            "voice_command" => Some(
                self.voice_command
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "ai_enabled" | "ai.enabled" => "ai_enabled",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_api_base_url" | "ai.base_url" => "ai_api_base_url",
        "ai_model" | "ai.model" => "ai_model",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        "voice_command" | "voice.command" => "voice_command",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 07:30 (24-hour format)"))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_hhmm};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn dotted_aliases_resolve_to_the_same_key() {
        let mut config = Config::default();
        config.set_value("ai.model", "gemini-1.5-pro").expect("set model");
        config.set_value("api.port", "9000").expect("set port");

        assert_eq!(config.get_value("ai_model").as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.api_port, 9000);
    }

    #[test]
    fn api_key_is_masked_on_read() {
        let mut config = Config::default();
        assert_eq!(config.get_value("ai.api_key").as_deref(), Some("not_set"));

        config.set_value("ai.api_key", "secret").expect("set key");
        assert_eq!(config.get_value("ai.api_key").as_deref(), Some("***set***"));
    }

    #[test]
    fn timeout_has_a_floor() {
        let mut config = Config::default();
        config
            .set_value("ai.timeout_seconds", "1")
            .expect("set timeout");
        assert_eq!(config.ai_timeout_seconds, 5);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let mut config = Config::default();
        assert!(config.set_value("report.time", "23:30").is_err());
        assert!(config.set_value("api.port", "not-a-port").is_err());
        assert!(parse_hhmm("25:00").is_err());
    }

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(".justly").join("config.json");

        let config = Config::load_or_default_from(&path).expect("load");
        assert_eq!(config.api_port, Config::default().api_port);
        assert!(path.exists());

        let mut edited = config;
        edited.set_value("api.port", "9100").expect("set port");
        edited.save_to(&path).expect("save");
        assert_eq!(Config::load_or_default_from(&path).expect("reload").api_port, 9100);
    }

    #[test]
    fn unreadable_file_falls_back_without_overwriting() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");

        let config = Config::load_or_default_from(&path).expect("load");
        assert_eq!(config.ai_model, Config::default().ai_model);
        assert_eq!(fs::read_to_string(&path).expect("read"), "{ not json");
    }
}
