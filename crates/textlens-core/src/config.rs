use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_CONFIG_FILE: &str = "textlens.toml";

/// Settings for the classification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_retries: u32,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Overrides the built-in evaluation instructions.
    pub instructions: Option<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            max_retries: 3,
            timeout_secs: 120,
            instructions: None,
        }
    }
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub directory: PathBuf,
    pub expiry_days: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("cache"),
            expiry_days: 7,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> TimeDelta {
        TimeDelta::try_days(self.expiry_days).unwrap_or(TimeDelta::MAX)
    }
}

/// Application settings, read from a TOML file and then the environment.
///
/// ```toml
/// [classifier]
/// model = "gpt-4o-mini"
/// max_retries = 3
///
/// [cache]
/// directory = "cache"
/// expiry_days = 7
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub classifier: ClassifierSettings,
    pub cache: CacheSettings,
}

impl Settings {
    /// Loads `path`, applies environment overrides and validates.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let mut settings = Self::from_file(path)?;
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| AppError::ConfigError(format!("Invalid config {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `TEXTLENS_*` overrides. `OPENAI_API_KEY` is the fallback for
    /// the API key. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("TEXTLENS_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.classifier.api_key = key;
        }
        if let Some(model) = var("TEXTLENS_MODEL") {
            self.classifier.model = model;
        }
        if let Some(base_url) = var("TEXTLENS_BASE_URL") {
            self.classifier.base_url = base_url;
        }
        if let Some(dir) = var("TEXTLENS_CACHE_DIR") {
            self.cache.directory = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.classifier.model.trim().is_empty() {
            return Err(AppError::ConfigError("classifier.model must not be empty".into()));
        }
        if self.classifier.max_retries == 0 {
            return Err(AppError::ConfigError(
                "classifier.max_retries must be at least 1".into(),
            ));
        }
        if self.cache.expiry_days < 0 {
            return Err(AppError::ConfigError(format!(
                "cache.expiry_days must be >= 0, got {}",
                self.cache.expiry_days
            )));
        }
        Ok(())
    }
}
