//! TOML-based application configuration.
//!
//! Stores:
//! - Focus session tuning (completion threshold, default estimate, tick rate)
//! - AI service endpoint and model choices
//! - The local user identity used for task ownership and points
//!
//! Configuration is stored at `~/.config/cleanswift/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::task::gate::{CompletionGate, MIN_WORK_SECS};
use crate::timer::DEFAULT_ESTIMATE_MINUTES;

/// Focus session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minimum focused seconds before a task may be completed. May be raised,
    /// never lowered below [`MIN_WORK_SECS`].
    #[serde(default = "default_min_work_secs")]
    pub min_work_secs: u64,
    /// Used for the progress display when a task has no estimate.
    #[serde(default = "default_estimate_minutes")]
    pub default_estimate_minutes: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// AI service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_vision_temperature")]
    pub vision_temperature: f64,
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f64,
    #[serde(default = "default_top_p")]
    pub chat_top_p: f64,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Local user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/cleanswift/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub user: UserConfig,
}

// Default functions
fn default_min_work_secs() -> u64 {
    MIN_WORK_SECS
}
fn default_estimate_minutes() -> u32 {
    DEFAULT_ESTIMATE_MINUTES
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_vision_model() -> String {
    "llama-3.2-90b-vision-preview".into()
}
fn default_chat_model() -> String {
    "llama-3-70b-8192".into()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_vision_temperature() -> f64 {
    0.5
}
fn default_chat_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.9
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_owner_id() -> String {
    "local".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_work_secs: default_min_work_secs(),
            default_estimate_minutes: default_estimate_minutes(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            vision_model: default_vision_model(),
            chat_model: default_chat_model(),
            max_tokens: default_max_tokens(),
            vision_temperature: default_vision_temperature(),
            chat_temperature: default_chat_temperature(),
            chat_top_p: default_top_p(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner_id(),
            display_name: None,
        }
    }
}

impl SessionConfig {
    pub fn gate(&self) -> CompletionGate {
        CompletionGate::new(self.min_work_secs)
    }
}

impl AiConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => {
                        return Err(invalid("cannot replace a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// `<data dir>/config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Callers persist with `save`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// into the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` pairs, for listing.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.min_work_secs < MIN_WORK_SECS {
            return Err(ConfigError::InvalidValue {
                key: "session.min_work_secs".into(),
                message: format!("must be at least {MIN_WORK_SECS}"),
            });
        }
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "session.tick_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.session.default_estimate_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "session.default_estimate_minutes".into(),
                message: "must be greater than zero".into(),
            });
        }
        if url::Url::parse(&self.ai.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "ai.base_url".into(),
                message: format!("'{}' is not a URL", self.ai.base_url),
            });
        }
        if self.user.owner_id.trim().is_empty() {
            return Err(ConfigError::MissingKey("user.owner_id".into()));
        }
        Ok(())
    }
}
