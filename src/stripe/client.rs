//! Stripe HTTP client with explicit credentials and safe logging.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use url::Url;

use crate::config::{ConfigError, StripeConfig};
use crate::error::ExportError;
use crate::model::{Customer, Subscription};
use crate::stripe::list::StripeListSource;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all Stripe API requests.
const CLIENT_USER_AGENT: &str = concat!("billing-export/", env!("CARGO_PKG_VERSION"));

const CUSTOMERS_PATH: &str = "/v1/customers";
const SUBSCRIPTIONS_PATH: &str = "/v1/subscriptions";

// ─────────────────────────────────────────────────────────────────────────────
// StripeClient
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only client for the Stripe list endpoints.
///
/// The API key is handed in through [`StripeConfig`] and lives only inside
/// this client; nothing is read from process-wide state.
pub struct StripeClient {
    http: reqwest::Client,
    api_key: SecretString,
    api_base: Url,
    api_version: String,
    page_limit: u32,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("api_version", &self.api_version)
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

impl StripeClient {
    /// Creates a client from an already validated configuration.
    ///
    /// # Errors
    ///
    /// - `ExportError::Config` if the base URL does not parse
    /// - `ExportError::Internal` if the HTTP client cannot be built
    pub fn new(config: &StripeConfig) -> Result<Self, ExportError> {
        let mut api_base = Url::parse(&config.api_base).map_err(|e| {
            ConfigError::InvalidEnvVar("STRIPE_API_BASE".into(), e.to_string())
        })?;
        // Endpoint paths are joined relative to the base, so a prefix such
        // as `/stripe` must end with a slash to be kept.
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        Ok(Self {
            http: build_http_client(config.timeout_secs)?,
            api_key: config.api_key.clone(),
            api_base,
            api_version: config.api_version.clone(),
            page_limit: config.page_limit,
        })
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    /// Page source over every customer.
    pub fn customer_pages(&self) -> StripeListSource<'_, Customer> {
        StripeListSource::new(self, CUSTOMERS_PATH, &[])
    }

    /// Page source over subscriptions of every status, each with its
    /// customer expanded.
    pub fn subscription_pages(&self) -> StripeListSource<'_, Subscription> {
        StripeListSource::new(
            self,
            SUBSCRIPTIONS_PATH,
            &[("status", "all"), ("expand[]", "data.customer")],
        )
    }

    /// Sends an authenticated GET.
    ///
    /// Only transport failures are errors here; the caller inspects the
    /// status code.
    ///
    /// # Errors
    ///
    /// - `ExportError::Internal` if `path` cannot be joined to the base URL
    /// - `ExportError::ConnectionFailed` on network failure or timeout
    pub(crate) async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ExportError> {
        let mut url = self
            .api_base
            .join(path.trim_start_matches('/'))
            .map_err(|_| ExportError::Internal(format!("Invalid path: {}", path)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let request = self
            .http
            .get(url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .header("Stripe-Version", &self.api_version);

        self.execute_with_logging(request, &url).await
    }

    /// Executes a request with timing and logging.
    ///
    /// Only the path is logged: the query carries cursors and the headers
    /// carry the key.
    async fn execute_with_logging(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, ExportError> {
        let start = Instant::now();
        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                let request_id = response
                    .headers()
                    .get("request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                info!(
                    "[STRIPE] GET {} {} {}ms {}",
                    url.path(),
                    response.status().as_u16(),
                    duration_ms,
                    request_id
                );

                Ok(response)
            }
            Err(e) => {
                info!(
                    "[STRIPE] GET {} FAILED {}ms (timeout={})",
                    url.path(),
                    duration_ms,
                    e.is_timeout()
                );
                Err(ExportError::ConnectionFailed(
                    "Connection to Stripe failed".to_string(),
                ))
            }
        }
    }
}

/// Builds the configured HTTP client.
fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, ExportError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExportError::Internal(format!("Failed to build HTTP client: {}", e)))
}
