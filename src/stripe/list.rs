//! Cursor-paginated Stripe list endpoints as a [`PageSource`].

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::collector::{Page, PageFuture, PageSource};
use crate::error::ExportError;
use crate::model::Identified;
use crate::stripe::client::StripeClient;

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types (match Stripe JSON exactly)
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope of every list endpoint.
#[derive(Debug, Deserialize)]
struct WireList<T> {
    data: Vec<T>,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireStripeError,
}

#[derive(Debug, Deserialize)]
struct WireStripeError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StripeListSource
// ─────────────────────────────────────────────────────────────────────────────

/// One list endpoint with fixed query parameters. Each call fetches one
/// page; the cursor becomes `starting_after`.
pub struct StripeListSource<'c, T> {
    client: &'c StripeClient,
    path: &'static str,
    params: &'static [(&'static str, &'static str)],
    _item: PhantomData<fn() -> T>,
}

impl<'c, T> StripeListSource<'c, T> {
    pub(crate) fn new(
        client: &'c StripeClient,
        path: &'static str,
        params: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            client,
            path,
            params,
            _item: PhantomData,
        }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    fn query(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", self.client.page_limit().to_string())];
        query.extend(self.params.iter().map(|(k, v)| (*k, v.to_string())));
        if let Some(cursor) = cursor {
            query.push(("starting_after", cursor.to_string()));
        }
        query
    }
}

impl<'c, T> PageSource for StripeListSource<'c, T>
where
    T: DeserializeOwned + Identified + Send,
{
    type Item = T;

    fn fetch_page<'a>(&'a self, cursor: Option<&'a str>) -> PageFuture<'a, T> {
        Box::pin(async move {
            let query = self.query(cursor);
            let response = self.client.get(self.path, &query).await?;

            let status = response.status();
            if !status.is_success() {
                return Err(parse_error_response(response, status).await);
            }

            let wire: WireList<T> = response.json().await.map_err(|e| {
                ExportError::PageFetch(format!("Failed to parse list response: {}", e))
            })?;

            Ok(Page {
                data: wire.data,
                has_more: wire.has_more,
            })
        })
    }
}

/// Maps a non-success response to an `ExportError`.
async fn parse_error_response(response: reqwest::Response, status: reqwest::StatusCode) -> ExportError {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return ExportError::NotAuthenticated;
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return ExportError::RateLimited {
            retry_after_secs: retry_after,
        };
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("Unable to read error body"));

    if let Ok(envelope) = serde_json::from_str::<WireErrorEnvelope>(&body) {
        let error = envelope.error;
        let label = error
            .code
            .or(error.error_type)
            .unwrap_or_else(|| status.as_u16().to_string());
        let message = error
            .message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
        return ExportError::PageFetch(format!("[{}] {}", label, message));
    }

    ExportError::PageFetch(format!(
        "HTTP {} - {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown error")
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{collect_all, Paginator};
    use crate::config::{ExportOptions, StripeConfig};
    use crate::model::{Customer, Subscription, SubscriptionStatus};
    use crate::pipeline::ExportPipeline;
    use crate::projector::RecordKind;
    use crate::sink::MemorySink;
    use secrecy::SecretString;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(base: &str, page_limit: u32) -> StripeClient {
        let mut config = StripeConfig::new(SecretString::from("sk_test_123".to_string()))
            .expect("valid key")
            .with_api_base(base);
        config.page_limit = page_limit;
        StripeClient::new(&config).expect("client")
    }

    fn mock_customer(i: usize) -> serde_json::Value {
        json!({
            "id": format!("cus_{}", i),
            "object": "customer",
            "email": format!("user{}@example.com", i),
            "name": format!("User {}", i),
            "shipping": {
                "name": format!("Jean Dupont{}", i),
                "address": {
                    "line1": "12 Rue A",
                    "line2": "Apt 4",
                    "city": "Lyon",
                    "state": "",
                    "postal_code": "69001",
                    "country": "FR"
                }
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pagination
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_customer_pages_follow_cursor() {
        let mock_server = MockServer::start().await;

        // Registered first so it wins over the cursor-less mock below.
        Mock::given(method("GET"))
            .and(path("/v1/customers"))
            .and(query_param("starting_after", "cus_2"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [mock_customer(3)],
                "has_more": false
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/customers"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [mock_customer(1), mock_customer(2)],
                "has_more": true
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let customers: Vec<Customer> = collect_all(&client.customer_pages())
            .await
            .expect("collects");

        let ids: Vec<&str> = customers.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cus_1", "cus_2", "cus_3"]);
    }

    #[tokio::test]
    async fn test_subscription_pages_request_all_statuses_expanded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/subscriptions"))
            .and(query_param("status", "all"))
            .and(query_param("expand[]", "data.customer"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"id": "sub_1", "status": "active", "customer": mock_customer(1)},
                    {"id": "sub_2", "status": "canceled", "customer": mock_customer(2)}
                ],
                "has_more": false
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 100);
        let source = client.subscription_pages();
        let mut paginator = Paginator::new(&source);
        let first = paginator.next_page().await.expect("page").expect("some");

        let subs: &[Subscription] = first;
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1].status, SubscriptionStatus::Canceled);
        assert!(subs[0].customer.expanded().is_some());
        assert!(paginator.is_finished());
    }

    #[tokio::test]
    async fn test_empty_page_with_has_more_stops() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [],
                "has_more": true
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 100);
        let customers = collect_all(&client.customer_pages()).await.expect("collects");
        assert!(customers.is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Error mapping
    // ─────────────────────────────────────────────────────────────────────────

    async fn fetch_first_error(template: ResponseTemplate) -> ExportError {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers"))
            .respond_with(template)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 100);
        let source = client.customer_pages();
        source.fetch_page(None).await.unwrap_err()
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_not_authenticated() {
        let err = fetch_first_error(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Invalid API Key provided: sk_test_***123", "type": "invalid_request_error"}
        })))
        .await;
        assert!(matches!(err, ExportError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let err = fetch_first_error(ResponseTemplate::new(429).insert_header("Retry-After", "60")).await;
        match err {
            ExportError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, Some(60)),
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stripe_error_envelope_is_parsed() {
        let err = fetch_first_error(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "resource_missing",
                "message": "No such customer: 'cus_404'",
                "type": "invalid_request_error"
            }
        })))
        .await;
        match err {
            ExportError::PageFetch(msg) => {
                assert_eq!(msg, "[resource_missing] No such customer: 'cus_404'")
            }
            other => panic!("expected PageFetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_without_envelope_uses_status() {
        let err = fetch_first_error(ResponseTemplate::new(500).set_body_string("<html>oops</html>")).await;
        match err {
            ExportError::PageFetch(msg) => assert_eq!(msg, "HTTP 500 - Internal Server Error"),
            other => panic!("expected PageFetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_list_body_is_page_fetch_error() {
        let err = fetch_first_error(ResponseTemplate::new(200).set_body_string("not json")).await;
        assert!(matches!(err, ExportError::PageFetch(_)));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // End to end
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_subscription_export_end_to_end() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"id": "sub_1", "status": "active", "customer": mock_customer(1)}],
                "has_more": false
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 100);
        let sink = MemorySink::new();
        let report = ExportPipeline::for_kind(RecordKind::Subscriptions, ExportOptions::default())
            .export(&client.subscription_pages(), &sink, &CancellationToken::new())
            .await
            .expect("export succeeds");

        assert_eq!(report.rows_written, 1);
        assert_eq!(report.pages_fetched, 1);

        let payload = sink.take_last().await.expect("delivered");
        assert_eq!(
            String::from_utf8(payload.content).expect("utf-8"),
            "Prénom,Nom,Rue,Code postal,Ville,Dép/Region,Pays\n\
             Jean,Dupont1,\"12 Rue A, Apt 4\",69001,Lyon,,FR"
        );
    }
}
