//! Wiring of the real clients into a scheduler.
//!
//! Postgres, Weaviate and Neo4j are required at startup; Elasticsearch is
//! best-effort and a failed connection only disables search indexing for
//! the run.

use anyhow::Context;
use std::sync::Arc;
use tracing::warn;

use spacebio_common::Config;
use spacebio_enrich::{EmbeddingClient, EmbeddingConfig, GroqClient};
use spacebio_ingestion::PmcClient;
use spacebio_sinks::{ElasticClient, GraphBuilder, PgRepository, SinkSet, WeaviateClient};

use crate::scheduler::BatchScheduler;

pub struct Services {
    repository: PgRepository,
    scheduler: BatchScheduler,
}

impl Services {
    pub async fn init(cfg: &Config) -> anyhow::Result<Self> {
        let repository = PgRepository::connect(&cfg.postgres)
            .await
            .context("connecting to Postgres")?;
        let vector = WeaviateClient::connect(&cfg.weaviate.url())
            .await
            .context("connecting to Weaviate")?;
        let graph = GraphBuilder::connect(&cfg.neo4j)
            .await
            .context("connecting to Neo4j")?;
        let search = match ElasticClient::connect(&cfg.elasticsearch.url()).await {
            Ok(client) => Some(client),
            Err(err) => {
                warn!(error = %err, "Elasticsearch unavailable, search indexing disabled");
                None
            }
        };

        let source = PmcClient::new(&cfg.pmc).context("building PMC client")?;
        let extractor = GroqClient::new(&cfg.ai).context("building Groq client")?;
        let embedder = EmbeddingClient::new(EmbeddingConfig::from(&cfg.ai))
            .context("building embedding client")?;

        let sink = SinkSet {
            relational: repository.clone(),
            vector,
            search,
            graph,
        };
        let scheduler = BatchScheduler::new(
            Arc::new(source),
            Arc::new(extractor),
            Arc::new(embedder),
            Arc::new(sink),
            Arc::new(repository.clone()),
        );

        Ok(Self { repository, scheduler })
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    pub async fn close(&self) {
        self.repository.close().await;
    }
}
