mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use db::queries::PgTicketStore;
use services::{analysis::OllamaClient, queue::AnalysisQueue};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing feature-triage server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("analysis_jobs_total", "Total analysis jobs submitted");
    metrics::describe_counter!("analysis_jobs_completed", "Total analysis jobs completed");
    metrics::describe_counter!("analysis_jobs_failed", "Total analysis jobs that failed");
    metrics::describe_counter!(
        "analysis_items_succeeded",
        "Items analyzed and written back successfully"
    );
    metrics::describe_counter!(
        "analysis_items_failed",
        "Items whose analysis or write-back failed"
    );
    metrics::describe_gauge!(
        "analysis_queue_depth",
        "Current number of jobs waiting in the queue"
    );
    metrics::describe_histogram!("analysis_job_seconds", "Time to drain one analysis job");

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize Ollama analysis client
    tracing::info!(
        url = %config.ollama_url,
        model = %config.ollama_model,
        "Initializing Ollama analysis client"
    );
    let analysis = Arc::new(
        OllamaClient::new(&config.ollama_url, &config.ollama_model)
            .expect("Failed to initialize Ollama client"),
    );

    // Start the in-memory analysis job queue and its worker/cleanup tasks
    let store = Arc::new(PgTicketStore::new(db_pool.clone()));
    let queue = AnalysisQueue::start(Arc::clone(&analysis), store, config.queue_options());

    // Create shared application state
    let state = AppState::new(db_pool, analysis, queue);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/analysis/bulk", post(routes::analysis::submit_bulk))
        .route(
            "/api/v1/analysis/items/{key}",
            post(routes::analysis::submit_single),
        )
        .route(
            "/api/v1/analysis/jobs/{job_id}",
            get(routes::analysis::get_job_status),
        )
        .route(
            "/api/v1/analysis/stats",
            get(routes::analysis::queue_stats),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)); // 2 MB limit

    tracing::info!("Starting feature-triage on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
