//! Orchestrator-side access to the gateway.

use async_trait::async_trait;
use axum::http::{StatusCode, header::AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::auth::Credential;
use crate::error::error_chain;
use crate::models::TargetSummary;
use crate::platform::ClientBuildError;

/// Failures calling the gateway.
#[derive(Debug, Error)]
pub enum GatewayCallError {
    #[error("Failed to fetch unregistered targets: {status}{}", detail_suffix(.detail))]
    ListingRejected {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("{0}")]
    Transport(String),
    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" - {}", d))
        .unwrap_or_default()
}

/// Gateway answer to a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReply {
    pub status: StatusCode,
    pub body: String,
}

/// The two gateway operations the orchestrator depends on.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn list_unregistered(
        &self,
        credential: &Credential,
    ) -> Result<Vec<TargetSummary>, GatewayCallError>;

    /// `Err` only when no HTTP response came back.
    async fn register_target(
        &self,
        credential: &Credential,
        target_id: &str,
    ) -> Result<RegisterReply, GatewayCallError>;
}

/// Reqwest client speaking to a running gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpGatewayClient {
    pub fn new(gateway_url: &str) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(gateway_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
            value: gateway_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::InvalidBaseUrl {
                value: gateway_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Pull a readable reason out of a gateway error body.
fn listing_error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error").and_then(Value::as_str);
    let message = value.get("message").and_then(Value::as_str);
    match (error, message) {
        (Some(error), Some(message)) if !message.is_empty() => {
            Some(format!("{} ({})", error, message))
        }
        (Some(error), _) => Some(error.to_string()),
        _ => Some(value.to_string()),
    }
}

#[async_trait]
impl GatewayApi for HttpGatewayClient {
    async fn list_unregistered(
        &self,
        credential: &Credential,
    ) -> Result<Vec<TargetSummary>, GatewayCallError> {
        let response = self
            .http
            .get(self.endpoint(&["proxy", "unregistered-targets"]))
            .header(AUTHORIZATION, credential.header_value())
            .send()
            .await
            .map_err(|err| GatewayCallError::Transport(error_chain(&err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayCallError::ListingRejected {
                status,
                detail: listing_error_detail(&body),
            });
        }

        response
            .json::<Vec<TargetSummary>>()
            .await
            .map_err(|err| GatewayCallError::InvalidResponse(error_chain(&err)))
    }

    async fn register_target(
        &self,
        credential: &Credential,
        target_id: &str,
    ) -> Result<RegisterReply, GatewayCallError> {
        let response = self
            .http
            .post(self.endpoint(&["proxy", "register-target", target_id]))
            .header(AUTHORIZATION, credential.header_value())
            .send()
            .await
            .map_err(|err| GatewayCallError::Transport(error_chain(&err)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(RegisterReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_rejection_message() {
        let err = GatewayCallError::ListingRejected {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: listing_error_detail(
                r#"{"error":"Failed to fetch unregistered targets","message":"Unauthorized (401) fetching page 1","type":null,"errno":null}"#,
            ),
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch unregistered targets: 500 Internal Server Error - Failed to fetch unregistered targets (Unauthorized (401) fetching page 1)"
        );

        let err = GatewayCallError::ListingRejected {
            status: StatusCode::BAD_GATEWAY,
            detail: listing_error_detail("<html>"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch unregistered targets: 502 Bad Gateway"
        );
    }

    #[test]
    fn test_endpoint_encodes_target_id() {
        let client = HttpGatewayClient::new("http://localhost:3000").unwrap();
        assert_eq!(
            client.endpoint(&["proxy", "register-target", "x/y"]).as_str(),
            "http://localhost:3000/proxy/register-target/x%2Fy"
        );
    }
}
