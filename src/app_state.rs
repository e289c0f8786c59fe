use sqlx::PgPool;
use std::sync::Arc;

use crate::db::queries::PgTicketStore;
use crate::services::{analysis::OllamaClient, queue::AnalysisQueue};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub analysis: Arc<OllamaClient>,
    pub queue: Arc<AnalysisQueue<OllamaClient, PgTicketStore>>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        analysis: Arc<OllamaClient>,
        queue: Arc<AnalysisQueue<OllamaClient, PgTicketStore>>,
    ) -> Self {
        Self {
            db,
            analysis,
            queue,
        }
    }
}
