//! # Proxy Handlers
//!
//! Relays for the remote platform. Upstream statuses and bodies are passed through untouched;
//! only failures to reach the upstream at all are turned into gateway errors.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
};
use tracing::{info, warn};

use crate::auth::Credential;
use crate::error::{self, ApiError, missing_target_id};
use crate::models::TargetSummary;
use crate::platform::{UpstreamResponse, aggregate_unregistered};
use crate::server::AppState;

/// Relay an upstream reply: same status, same body, same content type.
fn relay(upstream: UpstreamResponse) -> Response {
    let content_type = upstream
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    (
        upstream.status,
        [(CONTENT_TYPE, content_type)],
        Body::from(upstream.body),
    )
        .into_response()
}

fn require_target_id(target_id: &str) -> Result<&str, ApiError> {
    let target_id = target_id.trim();
    if target_id.is_empty() {
        Err(missing_target_id())
    } else {
        Ok(target_id)
    }
}

/// Relay the registered-target summary list
#[utoipa::path(
    get,
    path = "/proxy/summary",
    params(
        ("Authorization" = String, Header, description = "Caller credential, forwarded unchanged")
    ),
    responses(
        (status = 200, description = "Upstream summary list, relayed verbatim"),
        (status = 401, description = "Authorization header missing", body = ApiError),
        (status = 500, description = "Upstream unreachable", body = ApiError)
    ),
    tag = "proxy"
)]
pub async fn summary(
    State(state): State<AppState>,
    credential: Credential,
) -> Result<Response, ApiError> {
    let upstream = state
        .platform
        .registered_summary(&credential)
        .await
        .map_err(|fault| error::transport("Proxy request failed", &fault))?;

    if !upstream.status.is_success() {
        warn!(status = upstream.status.as_u16(), "Upstream summary error");
    }

    Ok(relay(upstream))
}

/// Relay the detail record of one target
#[utoipa::path(
    get,
    path = "/proxy/target/{target_id}",
    params(
        ("target_id" = String, Path, description = "Opaque target identifier"),
        ("Authorization" = String, Header, description = "Caller credential, forwarded unchanged")
    ),
    responses(
        (status = 200, description = "Upstream target detail, relayed verbatim"),
        (status = 400, description = "Target identifier missing", body = ApiError),
        (status = 401, description = "Authorization header missing", body = ApiError),
        (status = 500, description = "Upstream unreachable", body = ApiError)
    ),
    tag = "proxy"
)]
pub async fn target_detail(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
    credential: Credential,
) -> Result<Response, ApiError> {
    let target_id = require_target_id(&target_id)?;

    let upstream = state
        .platform
        .target_detail(&credential, target_id)
        .await
        .map_err(|fault| error::transport("Proxy request failed", &fault))?;

    if !upstream.status.is_success() {
        warn!(
            target_id,
            status = upstream.status.as_u16(),
            "Upstream target detail error"
        );
    }

    Ok(relay(upstream))
}

/// Aggregate every page of the unregistered-target listing
#[utoipa::path(
    get,
    path = "/proxy/unregistered-targets",
    params(
        ("Authorization" = String, Header, description = "Caller credential, forwarded unchanged")
    ),
    responses(
        (status = 200, description = "All unregistered targets gathered before the listing ended", body = [TargetSummary]),
        (status = 401, description = "Authorization header missing", body = ApiError),
        (status = 500, description = "Upstream rejected the credential or could not be reached", body = ApiError)
    ),
    tag = "proxy"
)]
pub async fn unregistered_targets(
    State(state): State<AppState>,
    credential: Credential,
) -> Result<Json<Vec<TargetSummary>>, ApiError> {
    let targets = aggregate_unregistered(
        state.platform.as_ref(),
        &credential,
        state.config.upstream.listing_max_pages,
    )
    .await
    .map_err(|err| error::listing_failed("Failed to fetch unregistered targets", &err))?;

    Ok(Json(targets))
}

/// Register for one target
///
/// The upstream status is returned as-is. Success carries no body; a rejection carries the
/// upstream body so the caller can show the remote's reason.
#[utoipa::path(
    post,
    path = "/proxy/register-target/{target_id}",
    params(
        ("target_id" = String, Path, description = "Opaque target identifier"),
        ("Authorization" = String, Header, description = "Caller credential, forwarded unchanged")
    ),
    responses(
        (status = 200, description = "Registered"),
        (status = 204, description = "Registered"),
        (status = 400, description = "Target identifier missing", body = ApiError),
        (status = 401, description = "Authorization header missing", body = ApiError),
        (status = 500, description = "Upstream unreachable", body = ApiError)
    ),
    tag = "proxy"
)]
pub async fn register_target(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
    credential: Credential,
) -> Result<Response, ApiError> {
    let target_id = require_target_id(&target_id)?;
    info!(target_id, "Proxying registration");

    let upstream = state
        .platform
        .signup(&credential, target_id)
        .await
        .map_err(|fault| error::transport("Proxy request failed during registration", &fault))?;

    info!(
        target_id,
        status = upstream.status.as_u16(),
        "Registration relayed"
    );

    if upstream.status.is_success() {
        Ok(upstream.status.into_response())
    } else {
        Ok(relay(upstream))
    }
}

/// Fallback for target routes called without an identifier.
pub async fn missing_target() -> ApiError {
    missing_target_id()
}
