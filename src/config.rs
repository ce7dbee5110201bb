//! Configuration file parser for ~/.config/listicle-studio/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! It carries service endpoints and tuning. API keys may be placed here too,
//! but keys saved with `listicle settings` or set in the environment win.
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::generate::{gemini, ideogram, GeminiOptions, IdeogramOptions};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Debug output masks both API keys.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini API root (without the `/v1beta/...` path).
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,

    /// Ideogram API root; images are requested from `{root}/images`.
    pub ideogram_base_url: String,
    pub ideogram_model: String,

    /// Deadline for every individual HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound on simultaneous image generations or uploads.
    pub max_concurrent_images: usize,

    pub gemini_api_key: Option<String>,
    pub ideogram_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            gemini_model: gemini::DEFAULT_MODEL.to_string(),
            temperature: 0.8,
            max_output_tokens: 2048,
            ideogram_base_url: ideogram::DEFAULT_BASE_URL.to_string(),
            ideogram_model: ideogram::DEFAULT_MODEL.to_string(),
            request_timeout_secs: 120,
            max_concurrent_images: 6,
            gemini_api_key: None,
            ideogram_api_key: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_base_url", &self.gemini_base_url)
            .field("gemini_model", &self.gemini_model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("ideogram_base_url", &self.ideogram_base_url)
            .field("ideogram_model", &self.ideogram_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrent_images", &self.max_concurrent_images)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "ideogram_api_key",
                &self.ideogram_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

const KNOWN_KEYS: [&str; 10] = [
    "gemini_base_url",
    "gemini_model",
    "temperature",
    "max_output_tokens",
    "ideogram_base_url",
    "ideogram_model",
    "request_timeout_secs",
    "max_concurrent_images",
    "gemini_api_key",
    "ideogram_api_key",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), model = %config.gemini_model, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_images == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_images must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gemini_options(&self) -> GeminiOptions {
        GeminiOptions {
            base_url: self.gemini_base_url.clone(),
            model: self.gemini_model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            timeout: self.request_timeout(),
        }
    }

    pub fn ideogram_options(&self) -> IdeogramOptions {
        IdeogramOptions {
            base_url: self.ideogram_base_url.clone(),
            model: self.ideogram_model.clone(),
            timeout: self.request_timeout(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
