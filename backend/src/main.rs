//! Telemetry Orchestrator
//!
//! A REST API that stores metric and UE location collection records and
//! keeps one NiFi flow running per record.

use axum::{extract::Request, middleware::Next, response::Response, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry_orchestrator::api;
use telemetry_orchestrator::config::Config;
use telemetry_orchestrator::nifi::NifiDriver;
use telemetry_orchestrator::orchestration::Orchestrator;
use telemetry_orchestrator::state::AppContext;
use telemetry_orchestrator::store::RecordStore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Serialize)]
struct HelloResponse {
    message: String,
    status: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    message: String,
}

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);

    let store = RecordStore::new(&config.persistence.database_url).await?;
    let driver = NifiDriver::new(&config.nifi)?;
    let orchestrator = Orchestrator::new(Arc::new(driver), config.sources.clone());

    // NiFi may still be starting; give up after the configured attempts
    orchestrator
        .wait_for_engine(config.nifi.login_retry_delay, config.nifi.login_max_attempts)
        .await
        .map_err(|e| anyhow::anyhow!("NiFi did not become available: {}", e))?;

    match orchestrator.audit_legacy_instances().await {
        Ok(legacy) if !legacy.is_empty() => {
            warn!(count = legacy.len(), "Legacy flow instances found");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Legacy flow audit failed"),
    }

    tokio::spawn(renew_token(
        orchestrator.clone(),
        config.nifi.token_renewal,
    ));

    let ctx = Arc::new(AppContext::new(
        store,
        orchestrator,
        config.sources.site_id.clone(),
    ));

    // Build our application with routes
    let app = Router::new()
        .route("/", get(hello_world))
        .route("/api/health", get(health_check))
        // Metric records
        .route(
            "/metric",
            get(api::metric::list_metrics).post(api::metric::create_metric),
        )
        .route(
            "/metric/:id",
            get(api::metric::get_metric)
                .put(api::metric::update_metric)
                .delete(api::metric::delete_metric),
        )
        // UE location records
        .route(
            "/ue-location",
            get(api::location::list_locations).post(api::location::create_location),
        )
        .route(
            "/ue-location/:id",
            get(api::location::get_location)
                .put(api::location::update_location)
                .delete(api::location::delete_location),
        )
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx);

    // Bind to address from config
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("Server running on http://{}", addr);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Setup graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Renew the NiFi access token so it never lapses between requests
async fn renew_token(orchestrator: Orchestrator, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    // The first tick completes immediately; startup already logged in
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = orchestrator.renew_credentials().await {
            warn!(error = %e, "NiFi token renewal failed");
        }
    }
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

async fn hello_world() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: "Welcome to the Telemetry Orchestrator!".to_string(),
        status: "ok".to_string(),
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Telemetry Orchestrator is healthy".to_string(),
    })
}
