//! Starter Pack Curator
//!
//! Keeps a curated Bluesky list of the most active accounts around a seed
//! account and serves the ranking over HTTP.
//! Handles:
//! - Login and session refresh against the Bluesky service
//! - Scheduled refresh cycles (crawl, score, publish)
//! - JSON API and HTML overview of the current ranking
//! - Observability (logging, metrics, tracing)

mod analysis;
mod cycle;
mod handlers;
mod list;
mod middleware;
mod scheduler;
#[cfg(test)]
mod testing;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use cycle::CycleController;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use starterpack_common::{
    bluesky::{BlueskyApi, XrpcClient},
    config::AppConfig,
    metrics::{self, CYCLE_BUCKETS, METRICS_PREFIX},
    retry::RetryPolicy,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub controller: Arc<CycleController>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    let config = Arc::new(config);

    init_tracing(&config);
    info!(
        service = %config.observability.service_name,
        "Starting Starter Pack Curator v{}",
        starterpack_common::VERSION
    );

    init_metrics(&config)?;

    // Log in; a failed login keeps the server up and reporting "not initialized"
    let client = Arc::new(XrpcClient::new(&config.bluesky)?);
    if !config.has_credentials() {
        warn!("No Bluesky credentials configured, list publishing disabled");
    } else {
        let policy = RetryPolicy::from(&config.retry);
        match policy
            .run("com.atproto.server.createSession", || client.login())
            .await
        {
            Ok(session) => info!(handle = %session.handle, did = %session.did, "Logged in"),
            Err(e) => error!(error = %e, "Failed to initialize Bluesky agent"),
        }
    }

    let api: Arc<dyn BlueskyApi> = client;
    let controller = Arc::new(CycleController::new(api, &config));

    if config.schedule.run_on_startup {
        scheduler::spawn_initial(controller.clone());
    }
    let mut sched = scheduler::start(&config.schedule, controller.clone()).await?;

    let state = AppState {
        config: config.clone(),
        controller,
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let stopping = Arc::new(Notify::new());
    let server = {
        let stopping = stopping.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    stopping.notify_one();
                })
                .await
        }
    };
    drain_with_deadline(server, stopping, config.shutdown_timeout()).await?;

    if let Some(sched) = sched.as_mut() {
        if let Err(e) = sched.shutdown().await {
            warn!(error = %e, "Failed to stop scheduler");
        }
    }

    info!(service = %config.observability.service_name, "Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus exporter; port 0 disables it
fn init_metrics(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_cycle_duration_seconds", METRICS_PREFIX)),
            CYCLE_BUCKETS,
        )?
        .with_http_listener(addr)
        .install()?;

    metrics::register_metrics();
    info!(port = config.observability.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS is open on the public API only
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/starter-pack", get(handlers::starter_pack::get_starter_pack))
        .layer(cors);

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        api_routes = api_routes.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Public pages
        .route("/", get(handlers::page::index))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Run `server` to completion, giving up once `deadline` has passed after `stopping` fires
async fn drain_with_deadline<F>(
    server: F,
    stopping: Arc<Notify>,
    deadline: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let expired = async {
        stopping.notified().await;
        tokio::time::sleep(deadline).await;
    };

    tokio::select! {
        result = server => result,
        _ = expired => {
            warn!(
                timeout_secs = deadline.as_secs(),
                "Graceful shutdown timed out, dropping open connections"
            );
            Ok(())
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
