//! HTTP surface of the coffee-shop backend.
//!
//! Serves the REST API under `/api`, a health check and prometheus
//! metrics. Every request passes through a middleware that records its
//! method, route, status and duration.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use service::Services;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

pub mod error;
pub mod routes;

/// Server represents the HTTP server of the coffee shop.
pub struct Server {
    services: Services,
    port: u16,
    metrics: Arc<Metrics>,
}

/// Metrics collects and exposes HTTP server metrics.
struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )?;
        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of failed HTTP requests"),
            &["endpoint", "status"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
        })
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, endpoint: &str, status: u16) {
        let status = status.to_string();
        self.errors_total
            .with_label_values(&[endpoint, status.as_str()])
            .inc();
    }

    fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Application state shared between request handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    metrics: Arc<Metrics>,
}

impl Server {
    /// # Errors
    /// Fails if the metrics cannot be registered.
    pub fn new(port: u16, services: Services) -> Result<Self> {
        info!("Initializing HTTP server on port {}", port);
        let metrics = Metrics::new().context("Failed to register metrics")?;
        Ok(Self {
            services,
            port,
            metrics: Arc::new(metrics),
        })
    }

    /// Serves requests until `shutdown` resolves, then drains open
    /// connections.
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .nest("/categories", routes::categories::router())
            .nest("/positions", routes::positions::router())
            .nest("/users", routes::users::router())
            .nest("/orders", routes::orders::router())
            .nest("/carts", routes::carts::router());

        Router::new()
            .nest("/api", api)
            .route("/health", get(handle_health))
            .route("/metrics", get(handle_metrics))
            .layer(axum::middleware::from_fn_with_state(
                self.metrics.clone(),
                metrics_middleware,
            ))
            .with_state(AppState {
                services: self.services.clone(),
                metrics: self.metrics.clone(),
            })
    }
}

/// Records every request. Routes are labelled by their pattern, so ids in
/// the path do not create new series.
async fn metrics_middleware(
    State(metrics): State<Arc<Metrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();

    metrics.record_request(&method, &endpoint, status, start.elapsed());
    if status >= 400 {
        metrics.record_error(&endpoint, status);
    }
    response
}

async fn handle_health() -> &'static str {
    "OK"
}

async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
