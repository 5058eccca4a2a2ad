//! PostgreSQL repository: publications, processing status, error log.
//!
//! Write contract (schema managed outside this crate):
//!   publications(pmc_id PK, pmid, doi, title, abstract, journal,
//!       publication_date, authors JSONB, keywords JSONB, hypothesis,
//!       key_findings JSONB, organisms_studied JSONB,
//!       space_conditions JSONB, full_text, created_at, updated_at)
//!   processing_status(pmc_id PK, status, started_at, completed_at,
//!       attempts, last_error)
//!   processing_errors(id, pmc_id, error_message, error_type, timestamp)

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::instrument;

use spacebio_common::config::PostgresConfig;
use spacebio_enrich::EnrichedFacts;
use spacebio_ingestion::Document;

use crate::status::{ProcessingState, StatusStore};

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(cfg: &PostgresConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(5)
            .max_connections(20)
            .connect(&cfg.url())
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Upsert one publication row. On conflict only title, abstract,
    /// full text and the updated timestamp change; enrichment-derived
    /// columns from the original insert stay untouched.
    #[instrument(skip(self, doc, facts), fields(pmc_id = %doc.pmc_id))]
    pub async fn upsert_publication(
        &self,
        doc: &Document,
        facts: &EnrichedFacts,
    ) -> Result<(), sqlx::Error> {
        let meta = &doc.metadata;
        sqlx::query(
            r#"
            INSERT INTO publications (
                pmc_id, pmid, doi, title, abstract, journal, publication_date,
                authors, keywords, hypothesis, key_findings, organisms_studied,
                space_conditions, full_text, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,NOW())
            ON CONFLICT (pmc_id) DO UPDATE SET
                updated_at = NOW(),
                title = EXCLUDED.title,
                abstract = EXCLUDED.abstract,
                full_text = EXCLUDED.full_text
            "#,
        )
        .bind(&doc.pmc_id)
        .bind(&meta.pmid)
        .bind(&meta.doi)
        .bind(&meta.title)
        .bind(&meta.abstract_text)
        .bind(&meta.journal)
        .bind(&meta.publication_date)
        .bind(serde_json::json!(meta.authors))
        .bind(serde_json::json!(meta.keywords))
        .bind(&facts.hypothesis)
        .bind(serde_json::json!(facts.key_findings))
        .bind(serde_json::json!(facts.organisms))
        .bind(serde_json::json!(facts.space_conditions))
        .bind(&doc.full_text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for PgRepository {
    async fn completed_ids(&self) -> anyhow::Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT pmc_id FROM processing_status WHERE status = $1",
        )
        .bind(ProcessingState::Completed.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn mark_processing(&self, pmc_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processing_status (pmc_id, status, started_at, attempts)
            VALUES ($1, $2, NOW(), 1)
            ON CONFLICT (pmc_id) DO UPDATE SET
                status = $2,
                started_at = NOW(),
                attempts = processing_status.attempts + 1
            "#,
        )
        .bind(pmc_id)
        .bind(ProcessingState::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_completed(&self, pmc_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE processing_status SET status = $2, completed_at = NOW() WHERE pmc_id = $1",
        )
        .bind(pmc_id)
        .bind(ProcessingState::Completed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, pmc_id: &str, error: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE processing_status SET status = $2, last_error = $3 WHERE pmc_id = $1",
        )
        .bind(pmc_id)
        .bind(ProcessingState::Failed.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_skipped_no_sections(&self, pmc_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE processing_status SET status = $2 WHERE pmc_id = $1",
        )
        .bind(pmc_id)
        .bind(ProcessingState::SkippedNoSections.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_error(&self, pmc_id: &str, message: &str, kind: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO processing_errors (pmc_id, error_message, error_type, timestamp) VALUES ($1, $2, $3, NOW())",
        )
        .bind(pmc_id)
        .bind(message)
        .bind(kind)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
