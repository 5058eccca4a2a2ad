//! spacebio-enrich — machine-derived facts and embeddings.
//! - `EnrichedFacts` model with field-level defaults
//! - Groq structured-extraction client
//! - Embedding client with zero-vector degradation
//!
//! Enrichment is strictly non-fatal: both clients degrade to documented
//! defaults instead of surfacing errors to the pipeline, and facts and
//! embeddings fail independently of each other.

pub mod embed;
pub mod facts;
pub mod llm;

pub use embed::{Embedder, Embeddings, EmbeddingClient, EmbeddingConfig};
pub use facts::{EnrichedFacts, EntityMention, SpaceCondition};
pub use llm::{EnrichError, FactExtractor, GroqClient};
