//! Registration run results.

use serde::{Deserialize, Serialize};

/// Result of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Success,
    /// The remote platform answered with a non-success status.
    RemoteRejected { status: u16, message: String },
    /// No response was received from the gateway.
    TransportError(String),
}

impl RegistrationOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            RegistrationOutcome::Success => "success",
            RegistrationOutcome::RemoteRejected { .. } => "remote_rejected",
            RegistrationOutcome::TransportError(_) => "transport_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RegistrationOutcome::Success)
    }
}

/// Final tally of a registration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success_count: u32,
    pub error_count: u32,
}

impl RunSummary {
    pub(crate) fn record(&mut self, outcome: &RegistrationOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    /// Number of targets attempted.
    pub fn attempted(&self) -> u32 {
        self.success_count + self.error_count
    }
}
