//! spacebio-ingestion — PMC article retrieval and canonicalization.
//! - Canonical `Document` model with derived full text
//! - Rate-limited E-utilities efetch client
//! - JATS XML parser

pub mod jats;
pub mod models;
pub mod pmc;

pub use jats::{parse_article, ParseError};
pub use models::{extract_pmc_id, Document, Metadata, Section};
pub use pmc::{ArticleSource, FetchError, PmcClient};
