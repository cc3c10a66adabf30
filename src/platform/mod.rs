//! Remote platform access
//!
//! This module provides:
//! - The `TargetPlatform` trait describing the four upstream calls the gateway relays
//! - `PlatformClient`, the reqwest-backed implementation
//! - Pagination aggregation for the unregistered-target listing

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;

use crate::auth::Credential;
use crate::error::TransportFault;

pub mod client;
pub mod listing;

pub use client::{ClientBuildError, PlatformClient};
pub use listing::{ListingError, aggregate_unregistered};

/// Upstream reply as received, ready to be relayed.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Convenience constructor for JSON bodies.
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: Bytes::from(body.to_string()),
        }
    }
}

/// The upstream calls the gateway performs on behalf of a caller.
///
/// Implementations return `Err` only when no HTTP response was obtained; any received status,
/// success or not, is an `Ok` for the caller to interpret.
#[async_trait]
pub trait TargetPlatform: Send + Sync {
    /// Registered-target summary list.
    async fn registered_summary(
        &self,
        credential: &Credential,
    ) -> Result<UpstreamResponse, TransportFault>;

    /// Detail record of one target.
    async fn target_detail(
        &self,
        credential: &Credential,
        target_id: &str,
    ) -> Result<UpstreamResponse, TransportFault>;

    /// One page (1-based) of the unregistered listing.
    async fn listing_page(
        &self,
        credential: &Credential,
        page: u32,
    ) -> Result<UpstreamResponse, TransportFault>;

    /// Sign up for one target with the configured acceptance payload.
    async fn signup(
        &self,
        credential: &Credential,
        target_id: &str,
    ) -> Result<UpstreamResponse, TransportFault>;
}
