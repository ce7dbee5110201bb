//! Credentials: API keys for the generators and the WordPress sites drafts
//! can be pushed to.
//!
//! Keys resolve with precedence environment > settings store > config file.
//! Secrets live in `SecretString` and are redacted from all Debug output.
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::config::Config;
use crate::storage::Database;
use crate::util::validate_base_url;

pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
pub const IDEOGRAM_KEY_ENV: &str = "IDEOGRAM_API_KEY";

/// Settings-store keys.
pub const GEMINI_KEY_PREF: &str = "gemini.api_key";
pub const IDEOGRAM_KEY_PREF: &str = "ideogram.api_key";

// ============================================================================
// Websites
// ============================================================================

/// A WordPress site and the application password used to publish to it.
#[derive(Clone)]
pub struct WebsiteCredential {
    pub id: String,
    pub name: String,
    pub url: String,
    pub username: String,
    pub application_password: SecretString,
}

impl WebsiteCredential {
    /// All four connection fields are non-blank.
    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.application_password.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for WebsiteCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebsiteCredential")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("application_password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebsiteError {
    #[error("Website name must be at least 2 characters")]
    NameTooShort,
    #[error("Website URL must be at least 6 characters")]
    UrlTooShort,
    #[error("Website URL is not usable: {0}")]
    InvalidUrl(String),
    #[error("Username must be at least 2 characters")]
    UsernameTooShort,
    #[error("Application password must be at least 6 characters")]
    PasswordTooShort,
}

/// User-entered fields for a new website, before an id is assigned.
pub struct NewWebsite {
    pub name: String,
    pub url: String,
    pub username: String,
    pub application_password: SecretString,
}

impl NewWebsite {
    /// Validate the form and assign a fresh random id.
    pub fn into_credential(self) -> Result<WebsiteCredential, WebsiteError> {
        let name = self.name.trim();
        let url = self.url.trim();
        let username = self.username.trim();
        let password = self.application_password.expose_secret().trim();

        if name.chars().count() <= 1 {
            return Err(WebsiteError::NameTooShort);
        }
        if url.chars().count() <= 5 {
            return Err(WebsiteError::UrlTooShort);
        }
        validate_base_url(url).map_err(|e| WebsiteError::InvalidUrl(e.to_string()))?;
        if username.chars().count() <= 1 {
            return Err(WebsiteError::UsernameTooShort);
        }
        if password.chars().count() <= 5 {
            return Err(WebsiteError::PasswordTooShort);
        }

        Ok(WebsiteCredential {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: url.to_string(),
            username: username.to_string(),
            application_password: SecretString::from(password.to_string()),
        })
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Resolved credentials for one run.
#[derive(Clone, Default)]
pub struct Settings {
    pub gemini_api_key: Option<SecretString>,
    pub ideogram_api_key: Option<SecretString>,
    pub websites: Vec<WebsiteCredential>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "ideogram_api_key",
                &self.ideogram_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("websites", &self.websites)
            .finish()
    }
}

impl Settings {
    /// Load settings, layering config file < settings store < environment.
    pub async fn load(config: &Config, db: &Database) -> Result<Self> {
        let gemini_api_key = resolve_key(
            std::env::var(GEMINI_KEY_ENV).ok(),
            db.get_setting(GEMINI_KEY_PREF).await?,
            config.gemini_api_key.clone(),
        );
        let ideogram_api_key = resolve_key(
            std::env::var(IDEOGRAM_KEY_ENV).ok(),
            db.get_setting(IDEOGRAM_KEY_PREF).await?,
            config.ideogram_api_key.clone(),
        );
        let websites = db.list_websites().await?;

        tracing::debug!(
            gemini = gemini_api_key.is_some(),
            ideogram = ideogram_api_key.is_some(),
            websites = websites.len(),
            "Loaded settings"
        );

        Ok(Self {
            gemini_api_key,
            ideogram_api_key,
            websites,
        })
    }

    /// Find a website by id, or by name ignoring case.
    pub fn find_website(&self, id_or_name: &str) -> Option<&WebsiteCredential> {
        let needle = id_or_name.trim();
        self.websites
            .iter()
            .find(|w| w.id == needle)
            .or_else(|| {
                self.websites
                    .iter()
                    .find(|w| w.name.eq_ignore_ascii_case(needle))
            })
    }
}

/// First non-blank value in precedence order.
fn resolve_key(
    env: Option<String>,
    stored: Option<String>,
    config: Option<String>,
) -> Option<SecretString> {
    [env, stored, config]
        .into_iter()
        .flatten()
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
        .map(SecretString::from)
}

/// Show only the last four characters of a secret.
pub fn mask_secret(secret: &SecretString) -> String {
    let exposed = secret.expose_secret();
    let count = exposed.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = exposed.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(8), tail)
}
