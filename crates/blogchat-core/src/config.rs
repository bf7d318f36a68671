use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_ENDPOINT: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_SITE_ORIGIN: &str = "https://jasminerain.github.io";
pub const DEFAULT_FEED_PATH: &str = "/JasmineRain.github.io/search.xml";

/// Environment variables checked for the credential, in priority order.
const API_KEY_VARS: [&str; 2] = ["BLOGCHAT_API_KEY", "DEEPSEEK_API_KEY"];

/// Configuration as stored on disk. Every field is optional; `settings()`
/// fills the gaps, except for the credential which has no default.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub site_origin: Option<String>,
    #[serde(default)]
    pub feed_path: Option<String>,
}

/// Request parameters sent with every completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location, applying environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let config_content = fs::read_to_string(path)?;
            serde_json::from_str(&config_content)
                .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?
        } else {
            Self::new()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override the credential from the environment. `lookup` is injected so
    /// tests don't have to touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
        {
            self.api_key = Some(key);
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("blogchat"))
    }

    /// The credential, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn settings(&self) -> ChatSettings {
        ChatSettings {
            model: self.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Origin used to turn a post's site-relative link into an absolute URL.
    pub fn site_origin(&self) -> &str {
        self.site_origin
            .as_deref()
            .unwrap_or(DEFAULT_SITE_ORIGIN)
            .trim_end_matches('/')
    }

    pub fn feed_location(&self) -> String {
        let path = self.feed_path.as_deref().unwrap_or(DEFAULT_FEED_PATH);
        format!("{}{}", self.site_origin(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let mut config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        config.api_key = None;

        let settings = config.settings();
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(settings.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(
            config.feed_location(),
            "https://jasminerain.github.io/JasmineRain.github.io/search.xml"
        );
    }

    #[test]
    fn reads_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"api_key":"sk-file","model":"deepseek-reasoner","temperature":0.0,"site_origin":"http://localhost:4000/"}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        let settings = config.settings();
        assert_eq!(settings.model, "deepseek-reasoner");
        assert_eq!(settings.temperature, 0.0);
        assert_eq!(settings.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.site_origin(), "http://localhost:4000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn environment_overrides_file_credential() {
        let mut config = Config {
            api_key: Some("sk-file".to_string()),
            ..Config::default()
        };
        config.apply_env(|name| match name {
            "DEEPSEEK_API_KEY" => Some("sk-env".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key(), Some("sk-env"));

        config.apply_env(|name| match name {
            "BLOGCHAT_API_KEY" => Some("sk-blogchat".to_string()),
            "DEEPSEEK_API_KEY" => Some("sk-env".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key(), Some("sk-blogchat"));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let mut config = Config {
            api_key: Some("   ".to_string()),
            ..Config::default()
        };
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config.api_key(), None);
    }
}
