use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::recommendation::{
    RecommendationResult, RecommendationRow, StoredRecommendation,
};
use crate::storage::RecommendationStore;

/// Postgres-backed history. Schema: `migrations/0001_recommendations.sql`.
///
/// CRITICAL: This is append-only. Never UPDATE or DELETE existing rows.
pub struct PgRecommendationStore {
    pool: PgPool,
}

impl PgRecommendationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecommendationStore for PgRecommendationStore {
    async fn load(&self) -> Result<Vec<StoredRecommendation>> {
        let rows = sqlx::query_as::<_, RecommendationRow>(
            "SELECT * FROM recommendations ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recommendation history")?;

        rows.into_iter()
            .map(|row| StoredRecommendation::try_from(row).context("Malformed media_ref column"))
            .collect()
    }

    async fn append(&self, result: RecommendationResult) -> Result<StoredRecommendation> {
        let record = StoredRecommendation::new(result);
        let r = &record.result;
        let media_ref = r
            .media_ref
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO recommendations
                (id, created_at, operator_id, price, scope_type, description,
                 ai_low, ai_high, upsell_potential, notes, implied_hourly_rate,
                 pricing_rule, media_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id)
        .bind(record.created_at)
        .bind(&r.operator_id)
        .bind(r.price)
        .bind(r.scope_type.as_str())
        .bind(&r.description)
        .bind(r.ai_low)
        .bind(r.ai_high)
        .bind(r.upsell_potential as i32)
        .bind(&r.notes)
        .bind(r.implied_hourly_rate)
        .bind(r.pricing_rule.as_str())
        .bind(media_ref)
        .execute(&self.pool)
        .await
        .context("Failed to insert recommendation")?;

        info!("Inserted recommendation {}", record.id);
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredRecommendation>> {
        let row = sqlx::query_as::<_, RecommendationRow>(
            "SELECT * FROM recommendations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch recommendation")?;

        row.map(StoredRecommendation::try_from)
            .transpose()
            .context("Malformed media_ref column")
    }
}
