//! Typed configuration loaded from environment variables.
//!
//! Every service the pipeline talks to gets its own config struct with
//! explicit defaults; only credentials that cannot be guessed are required.
//! Call `dotenvy::dotenv().ok()` before `Config::from_env()` if you keep a
//! `.env` file.

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

fn with_default(var: &str, default: &str) -> String {
    optional(var).unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(var) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(default),
    }
}

/// NCBI E-utilities access. The API key raises the request-rate tier.
#[derive(Debug, Clone)]
pub struct PmcConfig {
    pub email: String,
    pub api_key: Option<String>,
}

/// Model-call and embedding-call settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub groq_api_key: String,
    pub model: String,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    /// Fallback dimensionality when the embedding service cannot be probed.
    pub embedding_dim: usize,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl PostgresConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    pub host: String,
    pub port: u16,
}

impl ElasticsearchConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
}

impl WeaviateConfig {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pmc: PmcConfig,
    pub ai: AiConfig,
    pub postgres: PostgresConfig,
    pub neo4j: Neo4jConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub weaviate: WeaviateConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pmc: PmcConfig {
                email: required("NCBI_EMAIL")?,
                api_key: optional("NCBI_API_KEY"),
            },
            ai: AiConfig {
                groq_api_key: required("GROQ_API_KEY")?,
                model: with_default("GROQ_MODEL", "llama-3.3-70b-versatile"),
                embedding_base_url: with_default("EMBEDDING_BASE_URL", "http://localhost:8002/v1"),
                embedding_model: with_default("EMBEDDING_MODEL", "all-MiniLM-L6-v2"),
                embedding_api_key: optional("EMBEDDING_API_KEY"),
                embedding_dim: parse_var("EMBEDDING_DIM", 384)?,
            },
            postgres: PostgresConfig {
                host: with_default("POSTGRES_HOST", "localhost"),
                port: parse_var("POSTGRES_PORT", 5432)?,
                user: with_default("POSTGRES_USER", "postgres"),
                password: required("POSTGRES_PASSWORD")?,
                database: with_default("POSTGRES_DB", "pmc_bioscience"),
            },
            neo4j: Neo4jConfig {
                uri: required("NEO4J_URI")?,
                user: with_default("NEO4J_USER", "neo4j"),
                password: required("NEO4J_PASSWORD")?,
            },
            elasticsearch: ElasticsearchConfig {
                host: with_default("ELASTICSEARCH_HOST", "localhost"),
                port: parse_var("ELASTICSEARCH_PORT", 9200)?,
            },
            weaviate: WeaviateConfig {
                host: with_default("WEAVIATE_HOST", "localhost"),
                port: parse_var("WEAVIATE_PORT", 8080)?,
                scheme: with_default("WEAVIATE_SCHEME", "http"),
            },
        })
    }
}
