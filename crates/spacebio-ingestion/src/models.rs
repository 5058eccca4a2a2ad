//! Canonical document model produced by the JATS parser.
//!
//! A `Document` is created once per fetch and never mutated downstream:
//! enrichment and persistence only read it. `full_text` is derived from the
//! abstract and the normalized sections, never stored independently.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical body-section order used for `full_text` derivation.
pub const CANONICAL_SECTIONS: [&str; 5] =
    ["introduction", "methods", "results", "discussion", "conclusion"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
    /// Partial ISO date: `YYYY`, `YYYY-MM` or `YYYY-MM-DD`. None without a year.
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub authors: Vec<Author>,
    pub keywords: Vec<String>,
    pub affiliations: HashMap<String, String>,
}

/// One normalized body section. Sections keep encounter order and unique
/// keys; duplicate normalizations are concatenated at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub citation: Option<String>,
    pub pmid: Option<String>,
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub id: String,
    pub label: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub label: Option<String>,
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Canonical representation of one PMC article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub pmc_id: String,
    pub metadata: Metadata,
    pub sections: Vec<Section>,
    pub references: Vec<Reference>,
    pub figures: Vec<Figure>,
    pub tables: Vec<Table>,
    pub full_text: String,
}

impl Document {
    pub fn section(&self, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.text.as_str())
    }

    /// Whether any section carries non-empty text. Articles without content
    /// sections are skipped before enrichment.
    pub fn has_content_sections(&self) -> bool {
        self.sections.iter().any(|s| !s.text.trim().is_empty())
    }
}

/// Insert a section, concatenating with a blank line when the key already
/// exists (two source headings can normalize to the same key).
pub fn push_section(sections: &mut Vec<Section>, key: String, text: String) {
    if let Some(existing) = sections.iter_mut().find(|s| s.key == key) {
        existing.text.push_str("\n\n");
        existing.text.push_str(&text);
    } else {
        sections.push(Section { key, text });
    }
}

/// Map a source heading onto one of the five canonical keys, or a slug of
/// the original heading. Substring rules apply in listed order.
pub fn normalize_section_title(title: &str) -> String {
    let lower = title.to_lowercase();
    let lower = lower.trim();
    if lower.contains("introduction") || lower.contains("background") {
        "introduction".to_string()
    } else if lower.contains("method") || lower.contains("material") {
        "methods".to_string()
    } else if lower.contains("result") {
        "results".to_string()
    } else if lower.contains("discussion") {
        "discussion".to_string()
    } else if lower.contains("conclusion") {
        "conclusion".to_string()
    } else {
        lower.replace(' ', "_")
    }
}

/// Derive the document full text: abstract first, then canonical sections
/// in fixed order, then any remaining sections in encounter order, each
/// block prefixed by its upper-cased header.
pub fn derive_full_text(abstract_text: Option<&str>, sections: &[Section]) -> String {
    let mut parts = Vec::new();

    if let Some(abs) = abstract_text {
        if !abs.is_empty() {
            parts.push(format!("ABSTRACT\n{abs}"));
        }
    }

    for key in CANONICAL_SECTIONS {
        if let Some(section) = sections.iter().find(|s| s.key == key) {
            parts.push(format!("{}\n{}", key.to_uppercase(), section.text));
        }
    }

    for section in sections {
        if !CANONICAL_SECTIONS.contains(&section.key.as_str()) {
            parts.push(format!("{}\n{}", section.key.to_uppercase(), section.text));
        }
    }

    parts.join("\n\n")
}

fn pmc_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PMC(\d+)").unwrap())
}

/// Extract a canonical `PMC<digits>` identifier from a URL or bare id.
/// Returns None when the input carries no PMC identifier.
pub fn extract_pmc_id(input: &str) -> Option<String> {
    pmc_id_regex()
        .captures(input)
        .map(|cap| format!("PMC{}", &cap[1]))
}

/// Whether a URL is a canonical PMC article URL.
pub fn validate_pmc_url(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://pmc\.ncbi\.nlm\.nih\.gov/articles/PMC\d+/?$").unwrap())
        .is_match(url)
}
