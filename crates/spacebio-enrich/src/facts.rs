//! Structured facts extracted from a publication, and the prompt that
//! requests them.
//!
//! Every field has a safe default so a partially-filled model response
//! still deserializes; a fully-failed extraction falls back to
//! `EnrichedFacts::default()`.

use serde::{Deserialize, Serialize};
use spacebio_ingestion::Document;

const NOT_EXTRACTED: &str = "Not extracted";

/// Sections worth spending prompt budget on, in priority order.
const PRIORITY_SECTIONS: [&str; 4] = ["introduction", "results", "conclusion", "discussion"];

/// Word cap per section excerpt in the prompt.
const SECTION_WORD_LIMIT: usize = 500;

fn default_not_extracted() -> String {
    NOT_EXTRACTED.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceCondition {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityMention {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedFacts {
    #[serde(default = "default_not_extracted")]
    pub hypothesis: String,
    #[serde(default)]
    pub organisms: Vec<String>,
    #[serde(default)]
    pub space_conditions: Vec<SpaceCondition>,
    /// Finding order is meaningful: the index keys Finding nodes in the
    /// graph sink.
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default = "default_not_extracted")]
    pub implications: String,
    #[serde(default)]
    pub knowledge_gaps: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntityMention>,
}

impl Default for EnrichedFacts {
    fn default() -> Self {
        Self {
            hypothesis: NOT_EXTRACTED.to_string(),
            organisms: Vec::new(),
            space_conditions: Vec::new(),
            key_findings: Vec::new(),
            implications: NOT_EXTRACTED.to_string(),
            knowledge_gaps: Vec::new(),
            entities: Vec::new(),
        }
    }
}

pub const SYSTEM_PROMPT: &str = "You are an expert analyst of scientific \
publications. Respond ONLY with a valid JSON object, without explanations \
or markdown formatting.";

/// Build the bounded-size extraction prompt: title + abstract + the first
/// 500 words of each priority section present in the document.
pub fn build_prompt(doc: &Document) -> String {
    let mut content_parts = Vec::new();
    for key in PRIORITY_SECTIONS {
        if let Some(text) = doc.section(key) {
            let words: Vec<&str> = text.split_whitespace().take(SECTION_WORD_LIMIT).collect();
            content_parts.push(format!("{}: {}", key.to_uppercase(), words.join(" ")));
        }
    }

    format!(
        r#"Analyze this NASA space bioscience publication and extract the following information as JSON:

1. **hypothesis**: The main hypothesis tested (string)
2. **organisms**: Organisms studied (array of strings)
3. **space_conditions**: Space conditions tested (array of objects with 'type' and 'value')
4. **key_findings**: 3-5 major findings (array of strings)
5. **implications**: Implications for lunar/Martian missions (string)
6. **knowledge_gaps**: Unresolved questions (array of strings)
7. **entities**: Biological entities mentioned - genes, proteins, pathways (array of objects with 'name' and 'type')

Publication:
Title: {}
Abstract: {}
{}

Respond ONLY with a valid JSON object, without markdown or explanations."#,
        doc.metadata.title.as_deref().unwrap_or(""),
        doc.metadata.abstract_text.as_deref().unwrap_or(""),
        content_parts.join("\n\n"),
    )
}

/// Strip one leading/trailing fenced code block marker, if present.
/// Models sometimes wrap the JSON despite instructions.
pub fn strip_code_fence(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacebio_ingestion::models::{derive_full_text, Metadata, Section};

    fn doc_with_sections(sections: Vec<Section>) -> Document {
        let metadata = Metadata {
            title: Some("Bone loss in mice".to_string()),
            abstract_text: Some("Microgravity induces bone loss.".to_string()),
            ..Metadata::default()
        };
        let full_text = derive_full_text(metadata.abstract_text.as_deref(), &sections);
        Document {
            pmc_id: "PMC1".to_string(),
            metadata,
            sections,
            references: vec![],
            figures: vec![],
            tables: vec![],
            full_text,
        }
    }

    #[test]
    fn test_default_facts() {
        let facts = EnrichedFacts::default();
        assert_eq!(facts.hypothesis, "Not extracted");
        assert_eq!(facts.implications, "Not extracted");
        assert!(facts.organisms.is_empty());
        assert!(facts.key_findings.is_empty());
        assert!(facts.entities.is_empty());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let facts: EnrichedFacts = serde_json::from_str(
            r#"{"organisms": ["Mus musculus"], "key_findings": ["Bone loss"]}"#,
        )
        .unwrap();
        assert_eq!(facts.hypothesis, "Not extracted");
        assert_eq!(facts.organisms, vec!["Mus musculus"]);
        assert_eq!(facts.key_findings, vec!["Bone loss"]);
    }

    #[test]
    fn test_condition_and_entity_tag_names() {
        let facts: EnrichedFacts = serde_json::from_str(
            r#"{
                "space_conditions": [{"type": "gravity", "value": "microgravity"}],
                "entities": [{"name": "RUNX2", "type": "gene"}]
            }"#,
        )
        .unwrap();
        assert_eq!(facts.space_conditions[0].kind, "gravity");
        assert_eq!(facts.space_conditions[0].value, "microgravity");
        assert_eq!(facts.entities[0].name, "RUNX2");
        assert_eq!(facts.entities[0].kind, "gene");
    }

    #[test]
    fn test_build_prompt_priority_sections_and_word_cap() {
        let long_text = (0..600).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let doc = doc_with_sections(vec![
            Section { key: "methods".to_string(), text: "Protocol.".to_string() },
            Section { key: "results".to_string(), text: long_text },
        ]);
        let prompt = build_prompt(&doc);
        assert!(prompt.contains("Title: Bone loss in mice"));
        assert!(prompt.contains("RESULTS: w0"));
        assert!(prompt.contains("w499"));
        assert!(!prompt.contains("w500"));
        // Methods is not a priority section.
        assert!(!prompt.contains("METHODS:"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }
}
