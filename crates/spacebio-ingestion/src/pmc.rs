//! PMC E-utilities efetch client.
//!
//! Endpoint: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi
//!
//! Outbound concurrency is bounded by a semaphore sized to NCBI's request
//! tiers: 3 simultaneous requests without an API key, 10 with one. The gate
//! is independent of batch-level concurrency; batch members queue here.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use spacebio_common::config::PmcConfig;
use spacebio_common::retry::RetryPolicy;
use thiserror::Error;

const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PMC API error [{status}]: {body}")]
    Api { status: u16, body: String },

    #[error("fetch gate closed")]
    GateClosed,
}

/// Seam between the scheduler and the remote article source.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch the raw JATS XML for one `PMC<digits>` identifier.
    async fn fetch_article(&self, pmc_id: &str) -> Result<String, FetchError>;
}

pub struct PmcClient {
    client: reqwest::Client,
    email: String,
    api_key: Option<String>,
    gate: Semaphore,
    retry: RetryPolicy,
}

impl PmcClient {
    pub fn new(cfg: &PmcConfig) -> Result<Self, FetchError> {
        // 3 req/s without a key, 10 with one.
        let permits = if cfg.api_key.is_some() { 10 } else { 3 };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("spacebio/0.1 (research)")
            .build()?;
        Ok(Self {
            client,
            email: cfg.email.clone(),
            api_key: cfg.api_key.clone(),
            gate: Semaphore::new(permits),
            retry: RetryPolicy::default(),
        })
    }

    pub fn gate_size(&self) -> usize {
        self.gate.available_permits()
    }

    async fn fetch_xml(&self, numeric_id: &str) -> Result<String, FetchError> {
        let mut params = vec![
            ("db", "pmc".to_string()),
            ("id", numeric_id.to_string()),
            ("retmode", "xml".to_string()),
            ("email", self.email.clone()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let resp = self.client.get(EFETCH_URL).query(&params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl ArticleSource for PmcClient {
    #[instrument(skip(self))]
    async fn fetch_article(&self, pmc_id: &str) -> Result<String, FetchError> {
        // Normalize to the canonical prefixed form, then strip the prefix:
        // the efetch API wants the numeric part only.
        let canonical = if pmc_id.starts_with("PMC") {
            pmc_id.to_string()
        } else {
            format!("PMC{pmc_id}")
        };
        let numeric = canonical.trim_start_matches("PMC").to_string();

        // Permit held across retries: a retrying fetch still occupies a slot.
        let _permit = self.gate.acquire().await.map_err(|_| FetchError::GateClosed)?;
        debug!(pmc_id = %canonical, "fetching article XML");
        self.retry
            .run("pmc efetch", || self.fetch_xml(&numeric))
            .await
    }
}
