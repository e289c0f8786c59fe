use std::future::Future;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::models::analysis::FeatureAnalysis;

pub mod queries;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Write-back seam for per-item analysis outcomes, so the worker can run
/// against a test double. The production impl is [`queries::PgTicketStore`].
pub trait TicketStore: Send + Sync {
    /// Keyed upsert of the six analysis fields plus an analyzed-at
    /// timestamp. Best-effort from the queue's point of view; a failure here
    /// is recorded against the item, not the whole job.
    fn record_analysis(
        &self,
        item_key: &str,
        analysis: &FeatureAnalysis,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("analysis write-back failed: {0}")]
    WriteFailed(String),
}
