//! spacebio-sinks — the four persistence targets and their orchestrator.
//! - Postgres: publications, processing status, error log
//! - Weaviate: document- and section-level vectors
//! - Elasticsearch: full-text search index (best-effort)
//! - Neo4j: publication knowledge graph
//!
//! Writes fan out in a fixed order with no cross-sink transaction; a later
//! failure leaves earlier writes in place and the identifier is retried on
//! the next run via its processing status.

pub mod elastic;
pub mod graph;
pub mod persist;
pub mod postgres;
pub mod status;
pub mod weaviate;

use thiserror::Error;

pub use elastic::ElasticClient;
pub use graph::GraphBuilder;
pub use persist::{DocumentSink, PersistenceError, SinkSet};
pub use postgres::PgRepository;
pub use status::{ProcessingState, StatusStore};
pub use weaviate::WeaviateClient;

/// Error shape shared by the two HTTP-API sinks (Elasticsearch, Weaviate).
#[derive(Debug, Error)]
pub enum HttpSinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error [{status}]: {body}")]
    Api { status: u16, body: String },
}

pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, HttpSinkError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(HttpSinkError::Api {
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}
