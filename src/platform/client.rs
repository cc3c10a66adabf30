//! Reqwest-backed remote platform client.

use async_trait::async_trait;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use super::{TargetPlatform, UpstreamResponse};
use crate::auth::Credential;
use crate::config::UpstreamConfig;
use crate::error::TransportFault;

/// Fixed listing filter and sort order; only the page number varies.
const LISTING_QUERY: &[(&str, &str)] = &[
    ("filter[primary]", "unregistered"),
    ("filter[secondary]", "all"),
    ("filter[category]", "all"),
    ("sorting[field]", "dateUpdated"),
    ("sorting[direction]", "desc"),
];

/// Errors raised while constructing a [`PlatformClient`].
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid upstream base URL '{value}': {reason}")]
    InvalidBaseUrl { value: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP client for the remote platform API.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Url,
    registration_payload: serde_json::Value,
}

impl PlatformClient {
    /// Build a client from upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientBuildError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
                value: config.base_url.clone(),
                reason: e.to_string(),
            })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::InvalidBaseUrl {
                value: config.base_url.clone(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("enlist/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            registration_payload: config.registration_payload.clone(),
        })
    }

    /// Base URL joined with the given path segments (each segment is percent-encoded).
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn relay(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<UpstreamResponse, TransportFault> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let fault = TransportFault::from(&err);
                warn!(
                    endpoint,
                    error_type = fault.kind,
                    errno = ?fault.errno,
                    "upstream request failed: {}",
                    fault.message
                );
                counter!("enlist_upstream_requests_total", "endpoint" => endpoint, "outcome" => "transport_error")
                    .increment(1);
                return Err(fault);
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|err| {
            counter!("enlist_upstream_requests_total", "endpoint" => endpoint, "outcome" => "transport_error")
                .increment(1);
            TransportFault::from(&err)
        })?;

        info!(endpoint, status = status.as_u16(), "upstream responded");
        let outcome = if status.is_success() { "ok" } else { "status_error" };
        counter!("enlist_upstream_requests_total", "endpoint" => endpoint, "outcome" => outcome)
            .increment(1);

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    fn get(&self, url: Url, credential: &Credential) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(AUTHORIZATION, credential.header_value())
            .header(ACCEPT, "application/json")
    }
}

#[async_trait]
impl TargetPlatform for PlatformClient {
    async fn registered_summary(
        &self,
        credential: &Credential,
    ) -> Result<UpstreamResponse, TransportFault> {
        let url = self.endpoint(&["api", "targets", "registered_summary"]);
        self.relay("summary", self.get(url, credential)).await
    }

    async fn target_detail(
        &self,
        credential: &Credential,
        target_id: &str,
    ) -> Result<UpstreamResponse, TransportFault> {
        let url = self.endpoint(&["api", "targets", target_id]);
        self.relay("target_detail", self.get(url, credential)).await
    }

    async fn listing_page(
        &self,
        credential: &Credential,
        page: u32,
    ) -> Result<UpstreamResponse, TransportFault> {
        let mut url = self.endpoint(&["api", "targets"]);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in LISTING_QUERY {
                query.append_pair(key, value);
            }
            query.append_pair("pagination[page]", &page.to_string());
        }
        self.relay("listing", self.get(url, credential)).await
    }

    async fn signup(
        &self,
        credential: &Credential,
        target_id: &str,
    ) -> Result<UpstreamResponse, TransportFault> {
        let url = self.endpoint(&["api", "targets", target_id, "signup"]);
        let request = self
            .http
            .post(url)
            .header(AUTHORIZATION, credential.header_value())
            .header(ACCEPT, "application/json")
            .json(&self.registration_payload);
        self.relay("signup", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base: &str) -> PlatformClient {
        let config = UpstreamConfig {
            base_url: base.to_string(),
            ..UpstreamConfig::default()
        };
        PlatformClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_segments() {
        let client = client_for("http://localhost:9000/mock");
        let url = client.endpoint(&["api", "targets", "a b/c", "signup"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/mock/api/targets/a%20b%2Fc/signup"
        );

        let client = client_for("https://platform.example/");
        let url = client.endpoint(&["api", "targets", "registered_summary"]);
        assert_eq!(
            url.as_str(),
            "https://platform.example/api/targets/registered_summary"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let config = UpstreamConfig {
            base_url: "mailto:ops@example.com".to_string(),
            ..UpstreamConfig::default()
        };
        assert!(matches!(
            PlatformClient::new(&config),
            Err(ClientBuildError::InvalidBaseUrl { .. })
        ));
    }
}
