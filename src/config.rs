use crate::error::{PhotoInspectError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_MODEL: &str = "MODEL_NAME";
pub const ENV_SERVICE_URL: &str = "INSPECT_SERVICE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_seconds: u64,
    pub service_url: Option<String>,
    pub service_timeout_seconds: u64,
    pub sheet_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".into(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_seconds: 30,
            service_url: None,
            service_timeout_seconds: 60,
            sheet_name: "写真帳".into(),
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PhotoInspectError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("photo-inspect").join("config.json"))
    }

    /// 環境変数を優先（空文字は未設定扱い）
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model = model;
        }
        if let Some(url) = lookup(ENV_SERVICE_URL) {
            self.service_url = Some(url);
        }
    }

    /// 推論サービス起動時の必須チェック
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(PhotoInspectError::MissingApiKey)
    }

    pub fn has_api_key(&self) -> bool {
        self.require_api_key().is_ok()
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.service_timeout_seconds, 60);
        assert_eq!(config.sheet_name, "写真帳");
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let vars = env(&[(ENV_API_KEY, "secret"), (ENV_MODEL, "gemini-2.0-flash")]);
        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.require_api_key().unwrap(), "secret");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.service_url, None);
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let vars = env(&[(ENV_API_KEY, "  "), (ENV_MODEL, "")]);
        let mut config = Config {
            api_key: Some("from-file".into()),
            ..Default::default()
        };
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_missing_api_key_is_error() {
        let config = Config {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            config.require_api_key(),
            Err(PhotoInspectError::MissingApiKey)
        ));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"model": "gemini-pro-vision"}"#).unwrap();
        assert_eq!(config.model, "gemini-pro-vision");
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.sheet_name, "写真帳");
    }
}
