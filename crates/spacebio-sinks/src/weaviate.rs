//! Weaviate vector sink.
//!
//! Two collections with externally supplied vectors: `Publication`
//! (document-level) and `PublicationSection` (one object per non-empty
//! section). Text payloads are capped at 50 000 characters.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use spacebio_common::text::truncate_chars;
use spacebio_enrich::EnrichedFacts;
use spacebio_ingestion::Document;

use crate::{check_status, HttpSinkError};

const MAX_TEXT_CHARS: usize = 50_000;
const CLASSES: [&str; 2] = ["Publication", "PublicationSection"];

pub struct WeaviateClient {
    client: reqwest::Client,
    base_url: String,
}

impl WeaviateClient {
    /// Connect, verify the instance answers, and ensure both classes exist.
    pub async fn connect(base_url: &str) -> Result<Self, HttpSinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let this = Self { client, base_url: base_url.trim_end_matches('/').to_string() };
        let resp = this.client.get(format!("{}/v1/meta", this.base_url)).send().await?;
        check_status(resp).await?;
        this.ensure_schema().await?;
        Ok(this)
    }

    async fn ensure_schema(&self) -> Result<(), HttpSinkError> {
        for class in CLASSES {
            let url = format!("{}/v1/schema/{class}", self.base_url);
            let existing = self.client.get(&url).send().await?;
            if existing.status().is_success() {
                continue;
            }
            let body = json!({
                "class": class,
                // Vectors are computed by the pipeline, not by Weaviate.
                "vectorizer": "none",
            });
            let resp = self
                .client
                .post(format!("{}/v1/schema", self.base_url))
                .json(&body)
                .send()
                .await?;
            check_status(resp).await?;
            debug!(class, "vector class created");
        }
        Ok(())
    }

    async fn insert_object(&self, body: &Value) -> Result<(), HttpSinkError> {
        let resp = self
            .client
            .post(format!("{}/v1/objects", self.base_url))
            .json(body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(pmc_id = %doc.pmc_id))]
    pub async fn insert_publication(
        &self,
        doc: &Document,
        facts: &EnrichedFacts,
        vector: &[f32],
    ) -> Result<(), HttpSinkError> {
        self.insert_object(&publication_object(doc, facts, vector)).await
    }

    #[instrument(skip_all, fields(pmc_id = %doc.pmc_id, section = section_key))]
    pub async fn insert_section(
        &self,
        doc: &Document,
        section_key: &str,
        section_text: &str,
        vector: &[f32],
    ) -> Result<(), HttpSinkError> {
        let body = json!({
            "class": "PublicationSection",
            "properties": {
                "pmcId": doc.pmc_id,
                "sectionName": section_key,
                "sectionText": truncate_chars(section_text, MAX_TEXT_CHARS),
                "parentTitle": doc.metadata.title.as_deref().unwrap_or(""),
            },
            "vector": vector,
        });
        self.insert_object(&body).await
    }
}

fn publication_object(doc: &Document, facts: &EnrichedFacts, vector: &[f32]) -> Value {
    let meta = &doc.metadata;
    json!({
        "class": "Publication",
        "properties": {
            "pmcId": doc.pmc_id,
            "title": meta.title.as_deref().unwrap_or(""),
            "abstract": meta.abstract_text.as_deref().unwrap_or(""),
            "fullText": truncate_chars(&doc.full_text, MAX_TEXT_CHARS),
            "publicationDate": meta.publication_date.as_deref().unwrap_or(""),
            "organisms": facts.organisms,
            "keywords": meta.keywords,
            "journal": meta.journal.as_deref().unwrap_or(""),
        },
        "vector": vector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacebio_ingestion::models::Metadata;

    #[test]
    fn test_publication_object_shape() {
        let doc = Document {
            pmc_id: "PMC7".to_string(),
            metadata: Metadata {
                title: Some("T".to_string()),
                keywords: vec!["bone".to_string()],
                ..Metadata::default()
            },
            sections: vec![],
            references: vec![],
            figures: vec![],
            tables: vec![],
            full_text: "x".repeat(60_000),
        };
        let facts = EnrichedFacts {
            organisms: vec!["Mus musculus".to_string()],
            ..EnrichedFacts::default()
        };
        let body = publication_object(&doc, &facts, &[0.5, 0.5]);
        assert_eq!(body["class"], "Publication");
        assert_eq!(body["properties"]["pmcId"], "PMC7");
        assert_eq!(body["properties"]["organisms"][0], "Mus musculus");
        // Full text is capped at 50k characters.
        assert_eq!(
            body["properties"]["fullText"].as_str().unwrap().len(),
            MAX_TEXT_CHARS
        );
        assert_eq!(body["vector"].as_array().unwrap().len(), 2);
    }
}
