use sqlx::PgPool;

use crate::db::{StoreError, TicketStore};
use crate::models::analysis::FeatureAnalysis;

/// Postgres-backed ticket store for analysis write-backs.
#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TicketStore for PgTicketStore {
    async fn record_analysis(
        &self,
        item_key: &str,
        analysis: &FeatureAnalysis,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ticket_analysis (
                ticket_key, engineering_score, clarity_score, completeness_score,
                implementability_score, overall_score, suggested_priority, analyzed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (ticket_key) DO UPDATE SET
                engineering_score = EXCLUDED.engineering_score,
                clarity_score = EXCLUDED.clarity_score,
                completeness_score = EXCLUDED.completeness_score,
                implementability_score = EXCLUDED.implementability_score,
                overall_score = EXCLUDED.overall_score,
                suggested_priority = EXCLUDED.suggested_priority,
                analyzed_at = NOW()
            "#,
        )
        .bind(item_key)
        .bind(analysis.engineering_score as i16)
        .bind(analysis.clarity_score as i16)
        .bind(analysis.completeness_score as i16)
        .bind(analysis.implementability_score as i16)
        .bind(analysis.overall_score as i16)
        .bind(analysis.suggested_priority.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
