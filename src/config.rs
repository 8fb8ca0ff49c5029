//! Configuration for the Stripe page source and for export runs.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STRIPE_API_KEY` - Secret (`sk_...`) or restricted (`rk_...`) API key
//!
//! ## Optional
//! - `STRIPE_API_BASE` - API base URL (default: https://api.stripe.com)
//! - `STRIPE_API_VERSION` - Value of the `Stripe-Version` header (default: 2025-12-15.clover)
//! - `STRIPE_PAGE_LIMIT` - Records per list page, 1 to 100 (default: 100)
//! - `STRIPE_TIMEOUT_SECS` - HTTP request timeout (default: 60)

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_API_VERSION: &str = "2025-12-15.clover";
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
const MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Key prefixes Stripe issues for server-side credentials.
const API_KEY_PREFIXES: &[&str] = &["sk_", "rk_"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

// ─────────────────────────────────────────────────────────────────────────────
// StripeConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Connection settings for the Stripe list endpoints.
///
/// The API key is the only credential the crate ever sees. It is passed
/// explicitly to [`StripeClient::new`](crate::stripe::StripeClient::new).
#[derive(Clone)]
pub struct StripeConfig {
    pub api_key: SecretString,
    pub api_base: String,
    pub api_version: String,
    pub page_limit: u32,
    pub timeout_secs: u64,
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("page_limit", &self.page_limit)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl StripeConfig {
    /// Builds a config with defaults for everything but the key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the key does not look like a
    /// Stripe server-side key.
    pub fn new(api_key: SecretString) -> Result<Self, ConfigError> {
        validate_api_key(&api_key)?;
        Ok(Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Points the client at another base URL (test servers, proxies).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Loads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingEnvVar` if `STRIPE_API_KEY` is absent or empty
    /// - `ConfigError::InvalidEnvVar` if any variable fails to parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("STRIPE_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.trim().to_string()))
            .ok_or_else(|| ConfigError::MissingEnvVar("STRIPE_API_KEY".into()))?;

        let mut config = Self::new(api_key)?;

        if let Some(base) = lookup("STRIPE_API_BASE") {
            Url::parse(&base).map_err(|e| {
                ConfigError::InvalidEnvVar("STRIPE_API_BASE".into(), e.to_string())
            })?;
            config.api_base = base;
        }

        if let Some(version) = lookup("STRIPE_API_VERSION").filter(|v| !v.trim().is_empty()) {
            config.api_version = version.trim().to_string();
        }

        if let Some(limit) = lookup("STRIPE_PAGE_LIMIT") {
            let parsed: u32 = limit.trim().parse().map_err(|_| {
                ConfigError::InvalidEnvVar("STRIPE_PAGE_LIMIT".into(), limit.clone())
            })?;
            if !(1..=MAX_PAGE_LIMIT).contains(&parsed) {
                return Err(ConfigError::InvalidEnvVar(
                    "STRIPE_PAGE_LIMIT".into(),
                    format!("{} is outside 1..={}", parsed, MAX_PAGE_LIMIT),
                ));
            }
            config.page_limit = parsed;
        }

        if let Some(timeout) = lookup("STRIPE_TIMEOUT_SECS") {
            config.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::InvalidEnvVar("STRIPE_TIMEOUT_SECS".into(), timeout.clone())
            })?;
        }

        Ok(config)
    }
}

fn validate_api_key(api_key: &SecretString) -> Result<(), ConfigError> {
    let key = api_key.expose_secret();
    if API_KEY_PREFIXES.iter().any(|p| key.starts_with(p)) {
        Ok(())
    } else {
        // Never echo the key itself.
        Err(ConfigError::InvalidEnvVar(
            "STRIPE_API_KEY".into(),
            "expected a key starting with sk_ or rk_".into(),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExportOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Per-run export settings. Every field has a default, so `{}` is valid JSON.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Output filename. Falls back to the record kind's default name.
    pub filename: Option<String>,
    /// Overrides the output shape's diacritic-stripping default.
    pub strip_diacritics: Option<bool>,
    /// Export what was collected when a later page fails instead of aborting.
    pub partial_on_error: bool,
    /// Drop canceled subscriptions from the rows, not only from the count.
    pub exclude_canceled: bool,
    /// Parse the encoded payload before handing it to the sink.
    pub verify_output: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            filename: None,
            strip_diacritics: None,
            partial_on_error: false,
            exclude_canceled: false,
            verify_output: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = StripeConfig::from_lookup(lookup_from(&[("STRIPE_API_KEY", "sk_test_123")]))
            .expect("config should load");

        assert_eq!(config.api_key.expose_secret(), "sk_test_123");
        assert_eq!(config.api_base, "https://api.stripe.com");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.page_limit, 100);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn missing_key_is_reported() {
        let err = StripeConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "STRIPE_API_KEY"));

        let err = StripeConfig::from_lookup(lookup_from(&[("STRIPE_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn publishable_key_is_rejected_without_echoing_it() {
        let err = StripeConfig::from_lookup(lookup_from(&[("STRIPE_API_KEY", "pk_test_abc")]))
            .unwrap_err();
        assert!(!err.to_string().contains("pk_test_abc"));
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let err = StripeConfig::from_lookup(lookup_from(&[
            ("STRIPE_API_KEY", "sk_test_1"),
            ("STRIPE_API_BASE", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref v, _) if v == "STRIPE_API_BASE"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = StripeConfig::from_lookup(lookup_from(&[
            ("STRIPE_API_KEY", "rk_live_1"),
            ("STRIPE_API_BASE", "http://127.0.0.1:9000"),
            ("STRIPE_API_VERSION", "2024-06-20"),
            ("STRIPE_PAGE_LIMIT", "25"),
            ("STRIPE_TIMEOUT_SECS", "5"),
        ]))
        .expect("config should load");

        assert_eq!(config.api_base, "http://127.0.0.1:9000");
        assert_eq!(config.api_version, "2024-06-20");
        assert_eq!(config.page_limit, 25);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn page_limit_out_of_range_is_rejected() {
        for bad in ["0", "101", "many"] {
            let err = StripeConfig::from_lookup(lookup_from(&[
                ("STRIPE_API_KEY", "sk_test_1"),
                ("STRIPE_PAGE_LIMIT", bad),
            ]))
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnvVar(ref v, _) if v == "STRIPE_PAGE_LIMIT"),
                "limit {} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn debug_redacts_key() {
        let config = StripeConfig::new(SecretString::from("sk_live_secret".to_string()))
            .expect("config should build");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk_live_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn export_options_deserialize_with_defaults() {
        let options: ExportOptions = serde_json::from_str("{}").expect("empty object parses");
        assert_eq!(options, ExportOptions::default());
        assert!(options.verify_output);

        let options: ExportOptions = serde_json::from_str(
            r#"{"filename":"labels.csv","stripDiacritics":false,"excludeCanceled":true}"#,
        )
        .expect("options parse");
        assert_eq!(options.filename.as_deref(), Some("labels.csv"));
        assert_eq!(options.strip_diacritics, Some(false));
        assert!(options.exclude_canceled);
        assert!(!options.partial_on_error);
    }
}
