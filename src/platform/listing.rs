//! Unregistered-target listing aggregation.
//!
//! Pages are requested strictly in order starting at 1. The walk stops at the first empty page,
//! at the first non-success page other than 401 (keeping what was gathered), or at the page
//! ceiling. A 401 on any page, a transport fault, or an undecodable body fails the whole
//! aggregation and discards partial results.

use axum::http::StatusCode;
use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::TargetPlatform;
use crate::auth::Credential;
use crate::error::TransportFault;
use crate::models::TargetSummary;

/// Failures that abort a listing aggregation.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Unauthorized (401) fetching page {page}")]
    Unauthorized { page: u32 },
    #[error("transport failure fetching page {page}: {fault}")]
    Transport { page: u32, fault: TransportFault },
    #[error("page {page} returned invalid JSON: {message}")]
    Decode { page: u32, message: String },
}

impl ListingError {
    /// Transport classification, when the failure was a transport fault.
    pub fn fault(&self) -> Option<&TransportFault> {
        match self {
            ListingError::Transport { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

/// Fetch and project every page of the unregistered listing.
pub async fn aggregate_unregistered(
    platform: &dyn TargetPlatform,
    credential: &Credential,
    max_pages: u32,
) -> Result<Vec<TargetSummary>, ListingError> {
    let mut targets: Vec<TargetSummary> = Vec::new();
    let mut page: u32 = 1;

    info!("Fetching unregistered targets");

    loop {
        if page > max_pages {
            warn!(
                max_pages,
                total = targets.len(),
                "Listing page ceiling reached, returning accumulated targets"
            );
            break;
        }

        debug!(page, "Fetching listing page");
        let response = platform
            .listing_page(credential, page)
            .await
            .map_err(|fault| ListingError::Transport { page, fault })?;
        counter!("enlist_listing_pages_total").increment(1);

        if response.status == StatusCode::UNAUTHORIZED {
            warn!(page, "Listing request unauthorized");
            return Err(ListingError::Unauthorized { page });
        }

        if !response.status.is_success() {
            warn!(
                page,
                status = response.status.as_u16(),
                "Stopping pagination due to upstream error"
            );
            break;
        }

        let body: Value =
            serde_json::from_slice(&response.body).map_err(|e| ListingError::Decode {
                page,
                message: e.to_string(),
            })?;

        let records = match body.as_array() {
            Some(records) if !records.is_empty() => records,
            _ => {
                debug!(page, "Empty or non-array page, stopping");
                break;
            }
        };

        targets.extend(records.iter().map(TargetSummary::from_record));
        info!(
            page,
            page_len = records.len(),
            total = targets.len(),
            "Listing page fetched"
        );
        page = match page.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }

    info!(total = targets.len(), "Finished fetching unregistered targets");
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::UpstreamResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Listing source replaying scripted pages; any page past the script is empty.
    struct ScriptedPages {
        pages: Vec<Result<UpstreamResponse, TransportFault>>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<Result<UpstreamResponse, TransportFault>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TargetPlatform for ScriptedPages {
        async fn registered_summary(
            &self,
            _credential: &Credential,
        ) -> Result<UpstreamResponse, TransportFault> {
            unreachable!("listing tests never ask for the summary")
        }

        async fn target_detail(
            &self,
            _credential: &Credential,
            _target_id: &str,
        ) -> Result<UpstreamResponse, TransportFault> {
            unreachable!("listing tests never ask for details")
        }

        async fn listing_page(
            &self,
            _credential: &Credential,
            page: u32,
        ) -> Result<UpstreamResponse, TransportFault> {
            self.requested.lock().unwrap().push(page);
            self.pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_else(|| Ok(UpstreamResponse::json(StatusCode::OK, &json!([]))))
        }

        async fn signup(
            &self,
            _credential: &Credential,
            _target_id: &str,
        ) -> Result<UpstreamResponse, TransportFault> {
            unreachable!("listing tests never sign up")
        }
    }

    fn page(slugs: &[&str]) -> Result<UpstreamResponse, TransportFault> {
        let records: Vec<Value> = slugs
            .iter()
            .map(|slug| json!({"slug": slug, "name": slug.to_uppercase(), "category": {"name": "Host"}}))
            .collect();
        Ok(UpstreamResponse::json(StatusCode::OK, &Value::Array(records)))
    }

    fn status(code: StatusCode) -> Result<UpstreamResponse, TransportFault> {
        Ok(UpstreamResponse::json(code, &json!({"error": "nope"})))
    }

    fn slugs(targets: &[TargetSummary]) -> Vec<&str> {
        targets.iter().map(|t| t.slug.as_str()).collect()
    }

    fn credential() -> Credential {
        Credential::new("Bearer token").unwrap()
    }

    #[tokio::test]
    async fn test_concatenates_pages_until_empty_page() {
        let source = ScriptedPages::new(vec![page(&["a", "b"]), page(&["c"]), page(&[])]);

        let targets = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap();

        assert_eq!(slugs(&targets), vec!["a", "b", "c"]);
        assert_eq!(source.requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_non_auth_error_after_first_page_returns_partial() {
        let source = ScriptedPages::new(vec![
            page(&["a"]),
            page(&["b"]),
            status(StatusCode::INTERNAL_SERVER_ERROR),
            page(&["never"]),
        ]);

        let targets = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap();

        assert_eq!(slugs(&targets), vec!["a", "b"]);
        assert_eq!(source.requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_non_auth_error_on_first_page_returns_empty() {
        let source = ScriptedPages::new(vec![status(StatusCode::FORBIDDEN)]);

        let targets = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap();

        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_discards_partial_results() {
        let source = ScriptedPages::new(vec![page(&["a"]), status(StatusCode::UNAUTHORIZED)]);

        let err = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap_err();

        assert!(matches!(err, ListingError::Unauthorized { page: 2 }));
        assert_eq!(err.to_string(), "Unauthorized (401) fetching page 2");
    }

    #[tokio::test]
    async fn test_unauthorized_first_page() {
        let source = ScriptedPages::new(vec![status(StatusCode::UNAUTHORIZED)]);

        let err = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap_err();

        assert!(matches!(err, ListingError::Unauthorized { page: 1 }));
        assert_eq!(source.requested(), vec![1]);
    }

    #[tokio::test]
    async fn test_transport_fault_fails_whole_aggregation() {
        let source = ScriptedPages::new(vec![
            page(&["a"]),
            Err(TransportFault::new("reset", "system", Some("ECONNRESET"))),
        ]);

        let err = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap_err();

        assert_eq!(err.fault().and_then(|f| f.errno), Some("ECONNRESET"));
    }

    #[tokio::test]
    async fn test_non_array_page_stops_and_invalid_json_fails() {
        let source = ScriptedPages::new(vec![
            page(&["a"]),
            Ok(UpstreamResponse::json(StatusCode::OK, &json!({"data": []}))),
        ]);
        let targets = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap();
        assert_eq!(slugs(&targets), vec!["a"]);

        let source = ScriptedPages::new(vec![Ok(UpstreamResponse {
            status: StatusCode::OK,
            content_type: Some("text/html".to_string()),
            body: "<html>".into(),
        })]);
        let err = aggregate_unregistered(&source, &credential(), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ListingError::Decode { page: 1, .. }));
    }

    #[tokio::test]
    async fn test_page_ceiling_bounds_endless_listing() {
        let endless: Vec<_> = (0..10).map(|i| page(&[format!("t{i}").as_str()])).collect();
        let source = ScriptedPages::new(endless);

        let targets = aggregate_unregistered(&source, &credential(), 3)
            .await
            .unwrap();

        assert_eq!(slugs(&targets), vec!["t0", "t1", "t2"]);
        assert_eq!(source.requested(), vec![1, 2, 3]);
    }
}
