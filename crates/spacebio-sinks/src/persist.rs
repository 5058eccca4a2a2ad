//! Fan-out of one enriched document to all four sinks.
//!
//! Order is fixed: relational, vector, search, graph. There is no rollback;
//! a failure surfaces which sink broke and leaves earlier writes in place.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use spacebio_enrich::{Embeddings, EnrichedFacts};
use spacebio_ingestion::Document;

use crate::elastic::ElasticClient;
use crate::graph::GraphBuilder;
use crate::postgres::PgRepository;
use crate::weaviate::WeaviateClient;
use crate::HttpSinkError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("relational sink: {0}")]
    Relational(#[from] sqlx::Error),

    #[error("vector sink: {0}")]
    Vector(#[source] HttpSinkError),

    #[error("search sink: {0}")]
    Search(#[source] HttpSinkError),

    #[error("graph sink: {0}")]
    Graph(#[from] neo4rs::Error),
}

/// Seam between the scheduler and the persistence layer.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn persist(
        &self,
        doc: &Document,
        facts: &EnrichedFacts,
        embeddings: &Embeddings,
    ) -> Result<(), PersistenceError>;
}

pub struct SinkSet {
    pub relational: PgRepository,
    pub vector: WeaviateClient,
    /// `None` when the search cluster was unreachable at startup; indexing
    /// is then skipped for the whole run.
    pub search: Option<ElasticClient>,
    pub graph: GraphBuilder,
}

#[async_trait]
impl DocumentSink for SinkSet {
    #[instrument(skip_all, fields(pmc_id = %doc.pmc_id))]
    async fn persist(
        &self,
        doc: &Document,
        facts: &EnrichedFacts,
        embeddings: &Embeddings,
    ) -> Result<(), PersistenceError> {
        self.relational.upsert_publication(doc, facts).await?;

        self.vector
            .insert_publication(doc, facts, &embeddings.full_text)
            .await
            .map_err(PersistenceError::Vector)?;
        for (key, vector) in &embeddings.sections {
            let Some(text) = doc.section(key) else { continue };
            self.vector
                .insert_section(doc, key, text, vector)
                .await
                .map_err(PersistenceError::Vector)?;
        }

        match &self.search {
            Some(search) => {
                search
                    .index_publication(doc)
                    .await
                    .map_err(PersistenceError::Search)?;
            }
            None => debug!("search sink disabled, skipping"),
        }

        self.graph.merge_publication(doc, facts).await?;
        Ok(())
    }
}
