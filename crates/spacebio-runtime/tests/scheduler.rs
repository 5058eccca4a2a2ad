//! Scheduler behavior against in-memory fakes: resumption, tallying,
//! empty-body skips and failure recording.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spacebio_enrich::{Embedder, Embeddings, EnrichedFacts, FactExtractor};
use spacebio_ingestion::{ArticleSource, Document, FetchError};
use spacebio_runtime::BatchScheduler;
use spacebio_sinks::persist::{DocumentSink, PersistenceError};
use spacebio_sinks::status::StatusStore;
use spacebio_sinks::HttpSinkError;

const GOOD_XML: &str = r#"<article>
  <front><article-meta>
    <title-group><article-title>Bone loss in orbit</article-title></title-group>
  </article-meta></front>
  <body>
    <sec><title>Results</title><p>Trabecular bone volume decreased.</p></sec>
  </body>
</article>"#;

const EMPTY_BODY_XML: &str = r#"<article>
  <front><article-meta>
    <title-group><article-title>Abstract only</article-title></title-group>
  </article-meta></front>
</article>"#;

struct FakeSource {
    articles: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn new(articles: &[(&str, &str)]) -> Self {
        Self {
            articles: articles
                .iter()
                .map(|(id, xml)| (id.to_string(), xml.to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleSource for FakeSource {
    async fn fetch_article(&self, pmc_id: &str) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.articles
            .get(pmc_id)
            .cloned()
            .ok_or(FetchError::Api { status: 404, body: "not found".to_string() })
    }
}

struct FakeExtractor {
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl FactExtractor for FakeExtractor {
    async fn extract_facts(&self, _doc: &Document) -> EnrichedFacts {
        self.calls.fetch_add(1, Ordering::SeqCst);
        EnrichedFacts {
            organisms: vec!["Mus musculus".to_string()],
            ..EnrichedFacts::default()
        }
    }
}

struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect()
    }
}

struct RecordingSink {
    persisted: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSink {
    fn new() -> Self {
        Self { persisted: Mutex::new(Vec::new()), fail: false }
    }

    fn failing() -> Self {
        Self { persisted: Mutex::new(Vec::new()), fail: true }
    }

    fn persisted(&self) -> Vec<String> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn persist(
        &self,
        doc: &Document,
        _facts: &EnrichedFacts,
        embeddings: &Embeddings,
    ) -> Result<(), PersistenceError> {
        if self.fail {
            return Err(PersistenceError::Vector(HttpSinkError::Api {
                status: 503,
                body: "unavailable".to_string(),
            }));
        }
        assert!(!embeddings.full_text.is_empty());
        self.persisted.lock().unwrap().push(doc.pmc_id.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStatusStore {
    states: Mutex<HashMap<String, (String, u32)>>,
    errors: Mutex<Vec<(String, String, String)>>,
}

impl MemoryStatusStore {
    fn with_completed(ids: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut states = store.states.lock().unwrap();
            for id in ids {
                states.insert(id.to_string(), ("completed".to_string(), 1));
            }
        }
        store
    }

    fn state_of(&self, pmc_id: &str) -> Option<String> {
        self.states.lock().unwrap().get(pmc_id).map(|(s, _)| s.clone())
    }

    fn attempts(&self, pmc_id: &str) -> u32 {
        self.states.lock().unwrap().get(pmc_id).map(|(_, a)| *a).unwrap_or(0)
    }

    fn errors(&self) -> Vec<(String, String, String)> {
        self.errors.lock().unwrap().clone()
    }

    fn set(&self, pmc_id: &str, state: &str) {
        let mut states = self.states.lock().unwrap();
        let attempts = states.get(pmc_id).map(|(_, a)| *a).unwrap_or(0);
        states.insert(pmc_id.to_string(), (state.to_string(), attempts));
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn completed_ids(&self) -> anyhow::Result<HashSet<String>> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (state, _))| state == "completed")
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn mark_processing(&self, pmc_id: &str) -> anyhow::Result<()> {
        let mut states = self.states.lock().unwrap();
        let attempts = states.get(pmc_id).map(|(_, a)| *a).unwrap_or(0);
        states.insert(pmc_id.to_string(), ("processing".to_string(), attempts + 1));
        Ok(())
    }

    async fn mark_completed(&self, pmc_id: &str) -> anyhow::Result<()> {
        self.set(pmc_id, "completed");
        Ok(())
    }

    async fn mark_failed(&self, pmc_id: &str, _error: &str) -> anyhow::Result<()> {
        self.set(pmc_id, "failed");
        Ok(())
    }

    async fn mark_skipped_no_sections(&self, pmc_id: &str) -> anyhow::Result<()> {
        self.set(pmc_id, "skipped_no_sections");
        Ok(())
    }

    async fn log_error(&self, pmc_id: &str, message: &str, kind: &str) -> anyhow::Result<()> {
        self.errors.lock().unwrap().push((
            pmc_id.to_string(),
            message.to_string(),
            kind.to_string(),
        ));
        Ok(())
    }
}

fn scheduler(
    source: Arc<FakeSource>,
    extractor: Arc<FakeExtractor>,
    sink: Arc<RecordingSink>,
    status: Arc<MemoryStatusStore>,
) -> BatchScheduler {
    BatchScheduler::new(source, extractor, Arc::new(FakeEmbedder), sink, status)
        .with_batch_pause(Duration::ZERO)
}

#[tokio::test]
async fn test_completed_identifiers_are_not_refetched() {
    let source = Arc::new(FakeSource::new(&[("PMC1", GOOD_XML), ("PMC2", GOOD_XML)]));
    let status = Arc::new(MemoryStatusStore::default());
    let sink = Arc::new(RecordingSink::new());
    let sched = scheduler(source.clone(), Arc::new(FakeExtractor::new()), sink.clone(), status.clone());

    let ids = vec!["PMC1".to_string(), "PMC2".to_string()];
    let first = sched.run(&ids, 10).await.unwrap();
    assert_eq!(first.success, 2);
    assert_eq!(source.fetch_count(), 2);

    let second = sched.run(&ids, 10).await.unwrap();
    assert_eq!(second.success, 0);
    assert_eq!(second.skipped, 2);
    // Nothing was fetched again.
    assert_eq!(source.fetch_count(), 2);
    assert_eq!(sink.persisted(), vec!["PMC1", "PMC2"]);
}

#[tokio::test]
async fn test_stats_partition_the_input() {
    let source = Arc::new(FakeSource::new(&[
        ("PMC1", GOOD_XML),
        ("PMC2", EMPTY_BODY_XML),
        ("PMC3", "<article><body><sec>"),
        // PMC4 missing: the source returns 404.
    ]));
    let status = Arc::new(MemoryStatusStore::with_completed(&["PMC5"]));
    let sink = Arc::new(RecordingSink::new());
    let sched = scheduler(source, Arc::new(FakeExtractor::new()), sink, status.clone());

    let ids: Vec<String> = ["PMC1", "PMC2", "PMC3", "PMC4", "PMC5"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let stats = sched.run(&ids, 2).await.unwrap();

    assert_eq!(stats.total, 5);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.success + stats.errors + stats.skipped, stats.total);

    assert_eq!(status.state_of("PMC1").as_deref(), Some("completed"));
    assert_eq!(status.state_of("PMC2").as_deref(), Some("skipped_no_sections"));
    assert_eq!(status.state_of("PMC3").as_deref(), Some("failed"));
    assert_eq!(status.state_of("PMC4").as_deref(), Some("failed"));
    assert_eq!(status.state_of("PMC5").as_deref(), Some("completed"));
}

#[tokio::test]
async fn test_empty_body_skips_enrichment_and_persistence() {
    let source = Arc::new(FakeSource::new(&[("PMC9", EMPTY_BODY_XML)]));
    let status = Arc::new(MemoryStatusStore::default());
    let sink = Arc::new(RecordingSink::new());
    let extractor = Arc::new(FakeExtractor::new());
    let sched = scheduler(source, extractor.clone(), sink.clone(), status.clone());

    let stats = sched.run(&["PMC9".to_string()], 10).await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(sink.persisted().is_empty());
    assert_eq!(status.state_of("PMC9").as_deref(), Some("skipped_no_sections"));
}

/// Extractor in its degraded state: every call yields the defaults.
struct DefaultExtractor;

#[async_trait]
impl FactExtractor for DefaultExtractor {
    async fn extract_facts(&self, _doc: &Document) -> EnrichedFacts {
        EnrichedFacts::default()
    }
}

#[tokio::test]
async fn test_default_facts_do_not_block_completion() {
    let source = Arc::new(FakeSource::new(&[("PMC5", GOOD_XML)]));
    let status = Arc::new(MemoryStatusStore::default());
    let sink = Arc::new(RecordingSink::new());
    let sched = BatchScheduler::new(
        source,
        Arc::new(DefaultExtractor),
        Arc::new(FakeEmbedder),
        sink.clone(),
        status.clone(),
    )
    .with_batch_pause(Duration::ZERO);

    let stats = sched.run(&["PMC5".to_string()], 10).await.unwrap();
    assert_eq!(stats.success, 1);
    assert_eq!(status.state_of("PMC5").as_deref(), Some("completed"));
    assert_eq!(sink.persisted(), vec!["PMC5"]);
}

#[tokio::test]
async fn test_malformed_xml_is_recorded_as_parse_failure() {
    let source = Arc::new(FakeSource::new(&[("PMC3", "this is not xml <")]));
    let status = Arc::new(MemoryStatusStore::default());
    let sched = scheduler(
        source,
        Arc::new(FakeExtractor::new()),
        Arc::new(RecordingSink::new()),
        status.clone(),
    );

    let stats = sched.run(&["PMC3".to_string()], 10).await.unwrap();
    assert_eq!(stats.errors, 1);

    let errors = status.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "PMC3");
    assert_eq!(errors[0].2, "parse");
}

#[tokio::test]
async fn test_persistence_failure_marks_failed() {
    let source = Arc::new(FakeSource::new(&[("PMC1", GOOD_XML)]));
    let status = Arc::new(MemoryStatusStore::default());
    let sched = scheduler(
        source,
        Arc::new(FakeExtractor::new()),
        Arc::new(RecordingSink::failing()),
        status.clone(),
    );

    let stats = sched.run(&["PMC1".to_string()], 10).await.unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(status.state_of("PMC1").as_deref(), Some("failed"));
    assert_eq!(status.errors()[0].2, "persist");
}

#[tokio::test]
async fn test_unrecognized_identifier_aborts_the_run() {
    let source = Arc::new(FakeSource::new(&[]));
    let status = Arc::new(MemoryStatusStore::default());
    let sched = scheduler(
        source.clone(),
        Arc::new(FakeExtractor::new()),
        Arc::new(RecordingSink::new()),
        status,
    );

    let result = sched.run(&["not-an-id".to_string()], 10).await;
    assert!(result.is_err());
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn test_urls_and_bare_numbers_normalize_to_the_same_id() {
    let source = Arc::new(FakeSource::new(&[("PMC77", GOOD_XML)]));
    let status = Arc::new(MemoryStatusStore::default());
    let sink = Arc::new(RecordingSink::new());
    let sched = scheduler(source, Arc::new(FakeExtractor::new()), sink.clone(), status.clone());

    let ids = vec!["https://pmc.ncbi.nlm.nih.gov/articles/PMC77/".to_string()];
    let stats = sched.run(&ids, 10).await.unwrap();
    assert_eq!(stats.success, 1);
    assert_eq!(sink.persisted(), vec!["PMC77"]);
    // A second attempt counts against the same canonical identifier.
    assert_eq!(status.attempts("PMC77"), 1);
}
