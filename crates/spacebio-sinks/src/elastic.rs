//! Elasticsearch search sink (best-effort).
//!
//! `connect` creates the `publications` index with its mappings when
//! missing. If the cluster is unreachable at startup the caller drops the
//! client and indexing becomes a no-op for the whole run.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use spacebio_ingestion::Document;

use crate::{check_status, HttpSinkError};

pub const INDEX: &str = "publications";

pub struct ElasticClient {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticClient {
    /// Connect and ensure the index exists. An error here means the search
    /// sink is unavailable for the run.
    pub async fn connect(base_url: &str) -> Result<Self, HttpSinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let this = Self { client, base_url: base_url.trim_end_matches('/').to_string() };
        this.ensure_index().await?;
        Ok(this)
    }

    async fn ensure_index(&self) -> Result<(), HttpSinkError> {
        let url = format!("{}/{INDEX}", self.base_url);
        let head = self.client.head(&url).send().await?;
        if head.status().is_success() {
            return Ok(());
        }
        let resp = self.client.put(&url).json(&index_mappings()).send().await?;
        check_status(resp).await?;
        debug!(index = INDEX, "search index created");
        Ok(())
    }

    #[instrument(skip(self, doc), fields(pmc_id = %doc.pmc_id))]
    pub async fn index_publication(&self, doc: &Document) -> Result<(), HttpSinkError> {
        let url = format!("{}/{INDEX}/_doc/{}", self.base_url, doc.pmc_id);
        let resp = self.client.put(&url).json(&search_document(doc)).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

fn index_mappings() -> Value {
    json!({
        "mappings": {
            "properties": {
                "pmc_id": { "type": "keyword" },
                "title": { "type": "text" },
                "abstract": { "type": "text" },
                "full_text": { "type": "text" },
                "keywords": { "type": "keyword" },
                "publication_date": {
                    "type": "date",
                    "format": "yyyy-MM-dd||yyyy-MM||yyyy"
                }
            }
        }
    })
}

/// The indexed document: flat searchable fields plus the section map.
fn search_document(doc: &Document) -> Value {
    let meta = &doc.metadata;
    let authors: Vec<String> = meta.authors.iter().map(|a| a.full_name()).collect();
    let sections: serde_json::Map<String, Value> = doc
        .sections
        .iter()
        .map(|s| (s.key.clone(), Value::String(s.text.clone())))
        .collect();
    json!({
        "pmc_id": doc.pmc_id,
        "title": meta.title,
        "abstract": meta.abstract_text,
        "full_text": doc.full_text,
        "authors": authors,
        "keywords": meta.keywords,
        "journal": meta.journal,
        "publication_date": meta.publication_date,
        "sections": Value::Object(sections),
    })
}
