use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Patterns (lowercase) that indicate sensitive data not safe for UI display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "sk_live_",
    "sk_test_",
    "rk_live_",
    "rk_test_",
    "bearer ",
    "authorization:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for UI display.
/// If sensitive content is detected, returns the fallback instead.
fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for the calling UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Crate-wide error type.
///
/// Page-source failures abort the export; normalization never produces
/// an error.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Page source ───────────────────────────────────────────────────────────
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Page fetch failed: {0}")]
    PageFetch(String),

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Projection ────────────────────────────────────────────────────────────
    #[error("Subscription {subscription_id} has an unexpanded customer reference")]
    MissingExpansion { subscription_id: String },

    // ── Encoding / sink ───────────────────────────────────────────────────────
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Export cancelled")]
    Cancelled,

    // ── Configuration ─────────────────────────────────────────────────────────
    #[error(transparent)]
    Config(#[from] ConfigError),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// True for errors raised by the page source while fetching records.
    pub fn is_page_fetch(&self) -> bool {
        matches!(
            self,
            ExportError::NotAuthenticated
                | ExportError::PageFetch(_)
                | ExportError::RateLimited { .. }
                | ExportError::ConnectionFailed(_)
        )
    }

    /// Converts the error into a user-friendly presentation suitable for UI display.
    /// Never leaks API keys or authorization headers.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            ExportError::NotAuthenticated => ErrorPresentation {
                title: "Not Logged In".into(),
                message: "The Stripe API key was rejected or is missing.".into(),
                action: Some("Log in with a valid API key".into()),
            },

            ExportError::PageFetch(msg) => ErrorPresentation {
                title: "Stripe Error".into(),
                message: sanitize_message(msg, "Stripe returned an error while listing records."),
                action: Some("Try the export again".into()),
            },

            ExportError::RateLimited { retry_after_secs } => {
                let wait_msg = match retry_after_secs {
                    Some(secs) => format!("Please wait {} seconds before trying again.", secs),
                    None => "Please wait a moment before trying again.".into(),
                };
                ErrorPresentation {
                    title: "Too Many Requests".into(),
                    message: format!("Stripe is limiting requests. {}", wait_msg),
                    action: Some("Wait and retry".into()),
                }
            }

            ExportError::ConnectionFailed(_) => ErrorPresentation {
                title: "Connection Failed".into(),
                message: "Could not connect to Stripe. Please check your internet connection.".into(),
                action: Some("Check network and retry".into()),
            },

            ExportError::MissingExpansion { subscription_id } => ErrorPresentation {
                title: "Incomplete Subscription Data".into(),
                message: format!(
                    "Subscription {} was listed without its customer details.",
                    subscription_id
                ),
                action: None,
            },

            ExportError::Encoding(msg) => ErrorPresentation {
                title: "Export Failed".into(),
                message: sanitize_message(msg, "The CSV file could not be written."),
                action: Some("Check available disk space and try again".into()),
            },

            ExportError::Cancelled => ErrorPresentation {
                title: "Cancelled".into(),
                message: "The export was cancelled. No file was written.".into(),
                action: None,
            },

            ExportError::Config(err) => ErrorPresentation {
                title: "Configuration Error".into(),
                message: sanitize_message(&err.to_string(), "The export is misconfigured."),
                action: Some("Fix the configuration and restart".into()),
            },

            ExportError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

impl Serialize for ExportError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns all ExportError variants for exhaustive testing.
    fn all_variants() -> Vec<ExportError> {
        vec![
            ExportError::NotAuthenticated,
            ExportError::PageFetch("[resource_missing] No such customer".into()),
            ExportError::RateLimited { retry_after_secs: Some(30) },
            ExportError::RateLimited { retry_after_secs: None },
            ExportError::ConnectionFailed("timeout".into()),
            ExportError::MissingExpansion { subscription_id: "sub_123".into() },
            ExportError::Encoding("disk full".into()),
            ExportError::Cancelled,
            ExportError::Config(ConfigError::MissingEnvVar("STRIPE_API_KEY".into())),
            ExportError::Internal("something broke".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_title_and_message() {
        for variant in all_variants() {
            let presentation = variant.to_presentation();
            assert!(
                !presentation.title.trim().is_empty(),
                "Empty title for {:?}",
                variant
            );
            assert!(
                !presentation.message.trim().is_empty(),
                "Empty message for {:?}",
                variant
            );
        }
    }

    #[test]
    fn page_fetch_grouping() {
        assert!(ExportError::NotAuthenticated.is_page_fetch());
        assert!(ExportError::PageFetch("x".into()).is_page_fetch());
        assert!(ExportError::RateLimited { retry_after_secs: None }.is_page_fetch());
        assert!(ExportError::ConnectionFailed("x".into()).is_page_fetch());
        assert!(!ExportError::Cancelled.is_page_fetch());
        assert!(!ExportError::Encoding("x".into()).is_page_fetch());
        assert!(!ExportError::MissingExpansion { subscription_id: "sub_1".into() }.is_page_fetch());
    }

    #[test]
    fn rate_limited_mentions_wait_time() {
        let presentation = ExportError::RateLimited { retry_after_secs: Some(30) }.to_presentation();
        assert!(presentation.message.contains("30"));
        let action = presentation.action.expect("RateLimited should have action");
        assert!(action.to_lowercase().contains("wait"));
    }

    #[test]
    fn serialization_produces_valid_json_with_required_fields() {
        for variant in all_variants() {
            let json = serde_json::to_string(&variant)
                .unwrap_or_else(|_| panic!("Failed to serialize {:?}", variant));
            let parsed: serde_json::Value = serde_json::from_str(&json)
                .unwrap_or_else(|_| panic!("Failed to parse JSON for {:?}", variant));

            assert!(parsed.get("title").is_some());
            assert!(parsed.get("message").is_some());
            assert!(parsed.get("action").is_some());
        }
    }

    #[test]
    fn no_secret_leakage_in_presentation() {
        let test_cases: Vec<(&str, ExportError)> = vec![
            ("PageFetch", ExportError::PageFetch("Invalid API Key provided: sk_test_abc123".into())),
            ("Encoding", ExportError::Encoding("Authorization: Bearer rk_live_xyz".into())),
            ("ConnectionFailed", ExportError::ConnectionFailed("sk_live_secret".into())),
            ("Internal", ExportError::Internal("bearer token leaked".into())),
        ];

        for (label, variant) in test_cases {
            let presentation = variant.to_presentation();
            let output_lower = format!(
                "{} {} {}",
                presentation.title,
                presentation.message,
                presentation.action.as_deref().unwrap_or("")
            )
            .to_ascii_lowercase();

            for pattern in SENSITIVE_PATTERNS {
                assert!(
                    !output_lower.contains(pattern),
                    "{} presentation contains sensitive pattern",
                    label
                );
            }
        }
    }
}
