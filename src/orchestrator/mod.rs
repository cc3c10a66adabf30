//! Registration orchestrator
//!
//! Drives one bulk registration run entirely through the gateway: list unregistered targets,
//! keep the ones whose category the caller holds, then register them one at a time. Per-target
//! failures are logged and counted and never stop the run; only a failed listing ends it early.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use metrics::counter;
use serde_json::Value;

use crate::auth::Credential;
use crate::models::{RegistrationOutcome, RunSummary, TargetSummary};

pub mod gateway_client;
pub mod log;
pub mod settings;

pub use gateway_client::{GatewayApi, GatewayCallError, HttpGatewayClient, RegisterReply};
pub use settings::{RunOverrides, RunSettings, SettingsError};
pub use self::log::{FanOutLog, LogEntry, LogSink, MemoryLog, Severity, StdoutLog, TracingLog};

use self::log::RunLog;

/// Sequential, delay-throttled registration driver.
#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn GatewayApi>,
    log: Arc<dyn LogSink>,
    delay: Duration,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn GatewayApi>, log: Arc<dyn LogSink>, delay: Duration) -> Self {
        Self {
            gateway,
            log,
            delay,
        }
    }

    /// Run one registration pass and return the final tally.
    pub async fn run(&self, credential: &Credential, eligible: &[String]) -> RunSummary {
        let mut log = RunLog::new(self.log.as_ref());
        log.info("Starting registration process...");
        log.info("Fetching list of unregistered targets...");

        let unregistered = match self.gateway.list_unregistered(credential).await {
            Ok(targets) => targets,
            Err(err) => {
                log.error(format!("An overall error occurred: {}", err));
                return RunSummary::default();
            }
        };
        log.info(format!(
            "Found {} unregistered targets.",
            unregistered.len()
        ));

        let to_register: Vec<TargetSummary> = unregistered
            .into_iter()
            .filter(|target| target.is_eligible(eligible))
            .collect();

        if to_register.is_empty() {
            log.summary("No targets found matching your qualified categories.");
            return RunSummary::default();
        }

        log.info(format!(
            "Found {} targets to register based on your qualifications: [{}]",
            to_register.len(),
            eligible.join(", ")
        ));

        let mut summary = RunSummary::default();
        for (index, target) in to_register.iter().enumerate() {
            let label = format!("{} ({})", target.display_name(), target.slug);
            log.info(format!("Attempting to register: {}...", label));

            let outcome = self.register_one(credential, target).await;
            match &outcome {
                RegistrationOutcome::Success => {
                    log.success(format!("Successfully registered: {}", label));
                }
                RegistrationOutcome::RemoteRejected { message, .. } => {
                    log.error(format!("Error registering {}: {}", label, message));
                }
                RegistrationOutcome::TransportError(message) => {
                    log.error(format!(
                        "Network/Proxy Error registering {}: {}",
                        label, message
                    ));
                }
            }
            counter!("enlist_registration_outcomes_total", "outcome" => outcome.label())
                .increment(1);
            summary.record(&outcome);

            if index + 1 < to_register.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        log.summary(format!(
            "Registration process completed. Successful: {}, Errors: {}",
            summary.success_count, summary.error_count
        ));
        summary
    }

    async fn register_one(
        &self,
        credential: &Credential,
        target: &TargetSummary,
    ) -> RegistrationOutcome {
        match self.gateway.register_target(credential, &target.slug).await {
            Ok(reply) => classify_reply(&reply),
            Err(err) => RegistrationOutcome::TransportError(err.to_string()),
        }
    }
}

/// Any 2xx is success; anything else is a remote rejection with the best message available.
pub fn classify_reply(reply: &RegisterReply) -> RegistrationOutcome {
    if reply.status.is_success() {
        return RegistrationOutcome::Success;
    }

    let mut message = status_line(reply.status);
    if let Some(reason) = rejection_reason(&reply.body) {
        message.push_str(" - ");
        message.push_str(&reason);
    }

    RegistrationOutcome::RemoteRejected {
        status: reply.status.as_u16(),
        message,
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("Status {} {}", status.as_u16(), reason),
        None => format!("Status {}", status.as_u16()),
    }
}

/// `message`, else `error`, else the raw JSON. Non-JSON bodies yield nothing.
fn rejection_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    field("message")
        .or_else(|| field("error"))
        .or_else(|| Some(value.to_string()))
}
