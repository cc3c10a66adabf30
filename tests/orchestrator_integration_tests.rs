//! Registration runs driven through the HTTP gateway client against a mocked gateway.

use std::sync::Arc;
use std::time::Duration;

use enlist::{
    auth::Credential,
    models::RunSummary,
    orchestrator::{HttpGatewayClient, MemoryLog, Orchestrator, Severity},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn orchestrator_for(gateway: &MockServer, log: Arc<MemoryLog>) -> Orchestrator {
    let client = HttpGatewayClient::new(&gateway.uri()).expect("gateway client builds");
    Orchestrator::new(Arc::new(client), log, Duration::ZERO)
}

fn categories(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

async fn mount_listing(gateway: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/proxy/unregistered-targets"))
        .and(header("authorization", "Bearer tkn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(gateway)
        .await;
}

#[tokio::test]
async fn registers_only_qualified_targets() {
    let gateway = MockServer::start().await;
    mount_listing(
        &gateway,
        json!([
            {"slug": "a", "name": "Alpha", "category": "Web Application"},
            {"slug": "b", "name": "Beta", "category": "Host"}
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/proxy/register-target/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/proxy/register-target/b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    let log = Arc::new(MemoryLog::new());
    let summary = orchestrator_for(&gateway, log.clone())
        .run(
            &Credential::bearer("tkn").unwrap(),
            &categories(&["Web Application"]),
        )
        .await;

    assert_eq!(
        summary,
        RunSummary {
            success_count: 1,
            error_count: 0
        }
    );
    let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
    assert_eq!(
        messages,
        vec![
            "Starting registration process...",
            "Fetching list of unregistered targets...",
            "Found 2 unregistered targets.",
            "Found 1 targets to register based on your qualifications: [Web Application]",
            "Attempting to register: Alpha (a)...",
            "Successfully registered: Alpha (a)",
            "Registration process completed. Successful: 1, Errors: 0",
        ]
    );
}

#[tokio::test]
async fn conflict_is_counted_as_error_with_reason() {
    let gateway = MockServer::start().await;
    mount_listing(
        &gateway,
        json!([{"slug": "a", "name": "Alpha", "category": "Host"}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/proxy/register-target/a"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "already registered"})),
        )
        .mount(&gateway)
        .await;

    let log = Arc::new(MemoryLog::new());
    let summary = orchestrator_for(&gateway, log.clone())
        .run(&Credential::bearer("tkn").unwrap(), &categories(&["Host"]))
        .await;

    assert_eq!(summary.error_count, 1);
    let errors = log.with_severity(Severity::Error);
    assert_eq!(
        errors[0].message,
        "Error registering Alpha (a): Status 409 Conflict - already registered"
    );
}

#[tokio::test]
async fn listing_failure_ends_the_run() {
    let gateway = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proxy/unregistered-targets"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Failed to fetch unregistered targets",
            "message": "Unauthorized (401) fetching page 1",
            "type": null,
            "errno": null
        })))
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    let log = Arc::new(MemoryLog::new());
    let summary = orchestrator_for(&gateway, log.clone())
        .run(&Credential::bearer("tkn").unwrap(), &categories(&["Host"]))
        .await;

    assert_eq!(summary, RunSummary::default());
    let errors = log.with_severity(Severity::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("An overall error occurred:"));
    assert!(errors[0].message.contains("Unauthorized (401) fetching page 1"));
}

#[tokio::test]
async fn unreachable_gateway_is_an_overall_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpGatewayClient::new(&format!("http://{}", addr)).unwrap();
    let log = Arc::new(MemoryLog::new());
    let summary = Orchestrator::new(Arc::new(client), log.clone(), Duration::ZERO)
        .run(&Credential::bearer("tkn").unwrap(), &categories(&["Host"]))
        .await;

    assert_eq!(summary, RunSummary::default());
    assert_eq!(log.with_severity(Severity::Error).len(), 1);
}
