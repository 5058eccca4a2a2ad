//! Groq structured-extraction client (OpenAI-compatible chat completions).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use spacebio_common::config::AiConfig;
use spacebio_common::retry::RetryPolicy;
use spacebio_ingestion::Document;

use crate::facts::{build_prompt, strip_code_fence, EnrichedFacts, SYSTEM_PROMPT};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },

    #[error("response decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Seam between the scheduler and the fact-extraction model.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Derive structured facts from a document. Never fails outward:
    /// exhausted retries and undecodable responses yield the defaults.
    async fn extract_facts(&self, doc: &Document) -> EnrichedFacts;
}

pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GroqClient {
    pub fn new(cfg: &AiConfig) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key: cfg.groq_api_key.clone(),
            model: cfg.model.clone(),
            base_url: GROQ_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, EnrichError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.1,
            "max_tokens": 4000,
        });
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        parse_chat_content(&json)
            .ok_or_else(|| EnrichError::Malformed("no message content in response".to_string()))
    }

    /// One extraction attempt including retries; the caller decides what a
    /// failure means.
    pub async fn try_extract(&self, doc: &Document) -> Result<EnrichedFacts, EnrichError> {
        let prompt = build_prompt(doc);
        let text = self
            .retry
            .run("groq extraction", || self.complete(&prompt))
            .await?;
        let facts = serde_json::from_str(strip_code_fence(&text))?;
        Ok(facts)
    }
}

#[async_trait]
impl FactExtractor for GroqClient {
    #[instrument(skip(self, doc), fields(pmc_id = %doc.pmc_id))]
    async fn extract_facts(&self, doc: &Document) -> EnrichedFacts {
        match self.try_extract(doc).await {
            Ok(facts) => {
                debug!(
                    organisms = facts.organisms.len(),
                    findings = facts.key_findings.len(),
                    "facts extracted"
                );
                facts
            }
            Err(err) => {
                warn!(error = %err, "fact extraction failed, using defaults");
                EnrichedFacts::default()
            }
        }
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<Value, EnrichError> {
    let status = resp.status().as_u16();
    let body: Value = resp.json().await?;
    if status >= 400 {
        let message = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(EnrichError::Api { status, message });
    }
    Ok(body)
}

fn parse_chat_content(json: &Value) -> Option<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(String::from)
}
