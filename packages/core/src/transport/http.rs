//! HTTP implementation of the rules-server transport
//!
//! Speaks the REST protocol described in the transport contract:
//!
//! - `GET {base}/rules` with an `If-None-Match` header carrying the client's
//!   `base_version`; `304` means unchanged (no body), `200` carries a full
//!   snapshot
//! - `POST {base}/rules/{endpoint}` with the mutation body; `2xx` carries a
//!   commit receipt, `409` carries the conflict payload with the latest
//!   authoritative snapshot

use crate::transport::api::{
    CommitOutcome, CommitReceipt, CommitRequest, ConflictPayload, FetchOutcome, RuleTransport,
};
use crate::transport::error::{Result, TransportError};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Configuration for [`HttpRuleTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL up to and including any API prefix, without a trailing slash
    /// (e.g. `http://127.0.0.1:8080/api`)
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_string(),
            timeout_secs: 30,
        }
    }
}

/// HTTP client for the rules server
///
/// # Example
///
/// ```rust,no_run
/// use rulespace_core::transport::{HttpRuleTransport, RuleTransport, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpRuleTransport::new(TransportConfig {
///     base_url: "http://localhost:8080/api".into(),
///     ..Default::default()
/// })?;
///
/// // Conditional fetch against the locally cached version
/// let outcome = transport.fetch(Some(5)).await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpRuleTransport {
    config: TransportConfig,
    client: Client,
}

impl HttpRuleTransport {
    /// Create a new transport
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the underlying client cannot be
    /// constructed (e.g. TLS backend initialization failure).
    pub fn new(config: TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn rules_url(&self) -> String {
        format!("{}/rules", self.config.base_url)
    }

    fn mutation_url(&self, request: &CommitRequest) -> String {
        format!("{}/rules/{}", self.config.base_url, request.endpoint.path())
    }

    async fn error_body(response: reqwest::Response) -> (u16, String) {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        (status, message)
    }
}

#[async_trait]
impl RuleTransport for HttpRuleTransport {
    async fn fetch(&self, precondition: Option<i64>) -> Result<FetchOutcome> {
        let mut builder = self.client.get(self.rules_url());
        if let Some(version) = precondition {
            builder = builder.header(header::IF_NONE_MATCH, version.to_string());
        }

        let response = builder.send().await?;
        match response.status() {
            StatusCode::NOT_MODIFIED => {
                debug!(?precondition, "rules unchanged");
                Ok(FetchOutcome::NotModified)
            }
            status if status.is_success() => {
                let snapshot = response.json().await?;
                Ok(FetchOutcome::Snapshot(snapshot))
            }
            _ => {
                let (status, message) = Self::error_body(response).await;
                Err(TransportError::server(status, message))
            }
        }
    }

    async fn submit(&self, request: &CommitRequest) -> Result<CommitOutcome> {
        let response = self
            .client
            .post(self.mutation_url(request))
            .json(&request.body())
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => {
                let payload: ConflictPayload = response.json().await?;
                Ok(CommitOutcome::Conflict(payload))
            }
            status if status.is_success() => {
                let receipt: CommitReceipt = response.json().await?;
                Ok(CommitOutcome::Committed(receipt))
            }
            _ => {
                let (status, message) = Self::error_body(response).await;
                Err(TransportError::server(status, message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::api::MutationEndpoint;
    use serde_json::json;

    #[test]
    fn test_url_construction() {
        let transport = HttpRuleTransport::new(TransportConfig {
            base_url: "http://example.test/api".to_string(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(transport.rules_url(), "http://example.test/api/rules");

        let request = CommitRequest {
            endpoint: MutationEndpoint::HierarchyBatchMove,
            payload: json!({}),
            base_version: 1,
            client_id: "c".to_string(),
        };
        assert_eq!(
            transport.mutation_url(&request),
            "http://example.test/api/rules/hierarchy/batch_move"
        );
    }

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.base_url.starts_with("http://"));
    }
}
