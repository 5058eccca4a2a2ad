//! Batch scheduler: drives identifiers through fetch, parse, enrich and
//! persist in concurrent batches with durable per-identifier status.
//!
//! Already-completed identifiers are skipped up front, so a rerun of the
//! same list only touches what previous runs did not finish. Within a batch
//! all identifiers run concurrently; the PMC client's own gate bounds
//! outbound request concurrency independently.

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use spacebio_common::text::truncate_chars;
use spacebio_enrich::{Embedder, Embeddings, FactExtractor};
use spacebio_ingestion::jats::parse_article;
use spacebio_ingestion::models::extract_pmc_id;
use spacebio_ingestion::{ArticleSource, Document, FetchError, ParseError};
use spacebio_sinks::persist::{DocumentSink, PersistenceError};
use spacebio_sinks::status::StatusStore;

/// Per-text character cap for embedding inputs.
const EMBED_CHAR_LIMIT: usize = 8_000;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("persist: {0}")]
    Persist(#[from] PersistenceError),

    #[error("status store: {0}")]
    Status(anyhow::Error),
}

impl PipelineError {
    /// Stage label recorded in the error log.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Parse(_) => "parse",
            PipelineError::Persist(_) => "persist",
            PipelineError::Status(_) => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    SkippedNoSections,
    Failed,
}

/// Tally for one `run` call. `success + errors + skipped == total` always
/// holds; `skipped` counts both resumption skips and empty-body documents.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub skipped: usize,
    pub duration: Duration,
}

pub struct BatchScheduler {
    source: Arc<dyn ArticleSource>,
    extractor: Arc<dyn FactExtractor>,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn DocumentSink>,
    status: Arc<dyn StatusStore>,
    batch_pause: Duration,
}

impl BatchScheduler {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        extractor: Arc<dyn FactExtractor>,
        embedder: Arc<dyn Embedder>,
        sink: Arc<dyn DocumentSink>,
        status: Arc<dyn StatusStore>,
    ) -> Self {
        Self {
            source,
            extractor,
            embedder,
            sink,
            status,
            batch_pause: Duration::from_secs(1),
        }
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    /// Process a list of identifiers (bare IDs or article URLs) in batches
    /// of `batch_size`. Fails fast on unrecognizable input or an unreadable
    /// status store; everything after that is tallied, not propagated.
    pub async fn run(&self, inputs: &[String], batch_size: usize) -> anyhow::Result<RunStats> {
        let started = Instant::now();
        let total = inputs.len();

        let mut ids = Vec::with_capacity(total);
        for input in inputs {
            let id = extract_pmc_id(input)
                .ok_or_else(|| anyhow::anyhow!("unrecognized PMC identifier: {input}"))?;
            ids.push(id);
        }

        let completed = self.status.completed_ids().await?;
        let mut skipped = ids.iter().filter(|id| completed.contains(*id)).count();
        let pending: Vec<String> = ids.into_iter().filter(|id| !completed.contains(id)).collect();
        if skipped > 0 {
            info!(skipped, "skipping already-completed identifiers");
        }

        let mut success = 0usize;
        let mut errors = 0usize;
        let batch_size = batch_size.max(1);
        let batches = pending.chunks(batch_size).count();

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            let outcomes = join_all(batch.iter().map(|id| self.process_one(id))).await;
            for outcome in outcomes {
                match outcome {
                    Outcome::Completed => success += 1,
                    Outcome::SkippedNoSections => skipped += 1,
                    Outcome::Failed => errors += 1,
                }
            }
            info!(
                batch = index + 1,
                batches,
                success,
                errors,
                skipped,
                "batch finished"
            );
            if index + 1 < batches {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        debug_assert_eq!(success + errors + skipped, total);
        Ok(RunStats {
            total,
            success,
            errors,
            skipped,
            duration: started.elapsed(),
        })
    }

    async fn process_one(&self, pmc_id: &str) -> Outcome {
        if let Err(err) = self.status.mark_processing(pmc_id).await {
            warn!(pmc_id, error = %err, "could not mark processing");
            return Outcome::Failed;
        }
        match self.ingest_one(pmc_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(pmc_id, stage = err.kind(), error = %err, "pipeline stage failed");
                let message = err.to_string();
                if let Err(status_err) = self.status.mark_failed(pmc_id, &message).await {
                    warn!(pmc_id, error = %status_err, "could not mark failed");
                }
                if let Err(log_err) = self.status.log_error(pmc_id, &message, err.kind()).await {
                    warn!(pmc_id, error = %log_err, "could not append error log");
                }
                Outcome::Failed
            }
        }
    }

    async fn ingest_one(&self, pmc_id: &str) -> Result<Outcome, PipelineError> {
        let xml = self.source.fetch_article(pmc_id).await?;
        let doc = parse_article(&xml, pmc_id)?;

        if !doc.has_content_sections() {
            self.status
                .mark_skipped_no_sections(pmc_id)
                .await
                .map_err(PipelineError::Status)?;
            info!(pmc_id, "no body sections, skipping");
            return Ok(Outcome::SkippedNoSections);
        }

        // Facts and embeddings degrade internally; only persistence can fail.
        let facts = self.extractor.extract_facts(&doc).await;
        let embeddings = self.embed_document(&doc).await;
        self.sink.persist(&doc, &facts, &embeddings).await?;
        self.status
            .mark_completed(pmc_id)
            .await
            .map_err(PipelineError::Status)?;
        Ok(Outcome::Completed)
    }

    /// One embedding call covers the full text plus every non-empty section.
    async fn embed_document(&self, doc: &Document) -> Embeddings {
        let mut texts = vec![truncate_chars(&doc.full_text, EMBED_CHAR_LIMIT).to_string()];
        let mut keys = Vec::new();
        for section in &doc.sections {
            if section.text.trim().is_empty() {
                continue;
            }
            keys.push(section.key.clone());
            texts.push(truncate_chars(&section.text, EMBED_CHAR_LIMIT).to_string());
        }

        let mut vectors = self.embedder.embed(&texts).await;
        let full_text = if vectors.is_empty() {
            Vec::new()
        } else {
            vectors.remove(0)
        };
        Embeddings {
            full_text,
            sections: keys.into_iter().zip(vectors).collect(),
        }
    }
}
