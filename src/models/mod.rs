//! # Data Models
//!
//! This module contains the data models shared by the gateway and the orchestrator.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod registration;
pub mod target;

pub use registration::{RegistrationOutcome, RunSummary};
pub use target::TargetSummary;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "enlist-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
