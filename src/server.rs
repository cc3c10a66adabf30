//! # Server Configuration
//!
//! This module contains the router and server setup for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    http::{
        Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers::{self, proxy};
use crate::platform::{PlatformClient, TargetPlatform};
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub platform: Arc<dyn TargetPlatform>,
}

impl AppState {
    /// State backed by the real remote platform.
    pub fn from_config(config: AppConfig) -> Result<Self, crate::platform::ClientBuildError> {
        let platform = PlatformClient::new(&config.upstream)?;
        Ok(Self {
            config: Arc::new(config),
            platform: Arc::new(platform),
        })
    }
}

/// Any origin, with credentials. Browsers reject a literal `*` alongside credentials, so the
/// request origin is mirrored instead.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let proxy_routes = Router::new()
        .route("/proxy/summary", get(proxy::summary))
        .route("/proxy/target", get(proxy::missing_target))
        .route("/proxy/target/", get(proxy::missing_target))
        .route("/proxy/target/{target_id}", get(proxy::target_detail))
        .route(
            "/proxy/unregistered-targets",
            get(proxy::unregistered_targets),
        )
        .route("/proxy/register-target", post(proxy::missing_target))
        .route("/proxy/register-target/", post(proxy::missing_target))
        .route(
            "/proxy/register-target/{target_id}",
            post(proxy::register_target),
        );

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .merge(proxy_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Starts the gateway with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve the configured bind address
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let state = AppState::from_config(config)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::proxy::summary,
        crate::handlers::proxy::target_detail,
        crate::handlers::proxy::unregistered_targets,
        crate::handlers::proxy::register_target,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::TargetSummary,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Enlist Gateway API",
        description = "Same-origin relay for the remote target platform",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
