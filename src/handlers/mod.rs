//! # API Handlers
//!
//! This module contains all the HTTP endpoint handlers for the gateway.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod proxy;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Gateway is running", body = String)
    ),
    tag = "root"
)]
pub async fn healthz() -> &'static str {
    "ok"
}
