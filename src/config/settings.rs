//! Settings loading from settings.toml
//!
//! The settings file describes the public site (used to build referral links and
//! checkout return URLs), the payment gateway credentials, and the accounts known
//! to the identity directory. Everything is validated once at load time so the
//! rest of the crate can rely on well-formed values.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable that overrides `payment.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "PAYMENT_ACCESS_TOKEN";

/// Configuration structure representing the entire settings.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Public site settings
    pub site: SiteSettings,
    /// Payment gateway credentials
    pub payment: PaymentSettings,
    /// Accounts served by the identity directory
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Public site settings
#[derive(Debug, Deserialize, Clone)]
pub struct SiteSettings {
    /// Origin of the marketing site, e.g. `https://example.com`
    pub base_url: String,
}

/// Payment gateway credentials
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentSettings {
    /// Bearer token for the checkout API
    #[serde(default)]
    pub access_token: String,
    /// ISO 4217 currency of every checkout
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// A single account (customer or affiliate)
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    /// Stable account identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}

fn default_currency() -> String {
    "BRL".to_string()
}

impl Settings {
    /// Checks every field that the rest of the crate assumes is well-formed.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.site.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(config_error(format!(
                "site.base_url must be an http(s) URL, got '{}'",
                self.site.base_url
            )));
        }

        if self.payment.access_token.trim().is_empty() {
            return Err(config_error("payment.access_token is empty"));
        }

        let currency = &self.payment.currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(config_error(format!(
                "payment.currency must be a 3-letter ISO code, got '{currency}'"
            )));
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.id.trim().is_empty() {
                return Err(config_error("account id cannot be empty"));
            }
            if !seen.insert(account.id.as_str()) {
                return Err(config_error(format!("duplicate account id '{}'", account.id)));
            }
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::Config {
        message: message.into(),
    }
}

/// Parses and validates settings from TOML text, applying the
/// `PAYMENT_ACCESS_TOKEN` override when it is set.
///
/// # Errors
/// Returns [`Error::Config`] if the TOML is invalid or a field fails validation.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    parse_settings_with_token(contents, std::env::var(ACCESS_TOKEN_ENV).ok())
}

/// Parses and validates settings, replacing `payment.access_token` with
/// `token_override` when one is given. The override is validated like a value
/// read from the file.
///
/// # Errors
/// Returns [`Error::Config`] if the TOML is invalid or a field fails validation.
pub fn parse_settings_with_token(
    contents: &str,
    token_override: Option<String>,
) -> Result<Settings> {
    let mut settings: Settings = toml::from_str(contents)
        .map_err(|e| config_error(format!("Failed to parse settings.toml: {e}")))?;

    if let Some(token) = token_override {
        debug!("Using payment access token from {}", ACCESS_TOKEN_ENV);
        settings.payment.access_token = token;
    }

    settings.validate()?;
    Ok(settings)
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field fails validation
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| config_error(format!("Failed to read settings file: {e}")))?;
    let settings = parse_settings(&contents)?;
    info!(
        "Loaded settings for {} with {} accounts",
        settings.site.base_url,
        settings.accounts.len()
    );
    Ok(settings)
}

/// Loads settings from the default location (./settings.toml)
pub fn load_default_settings() -> Result<Settings> {
    load_settings("settings.toml")
}
