//! Identifier-list loading.
//!
//! Two formats are accepted: a JSON array whose entries are either bare
//! strings or objects carrying a `url` or `pmc_id` field, and plain text
//! with one identifier per line (`#` comments allowed). Object `url`
//! entries must be canonical PMC article URLs.

use serde_json::Value;
use spacebio_ingestion::models::validate_pmc_url;
use std::path::Path;

/// Read identifiers from `path`. Entries are returned as written; the
/// scheduler normalizes them to canonical `PMC<digits>` form.
pub fn load_id_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("cannot read {}: {err}", path.display()))?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        parse_json_list(&raw)
    } else {
        Ok(parse_lines(&raw))
    }
}

fn parse_json_list(raw: &str) -> anyhow::Result<Vec<String>> {
    let value: Value = serde_json::from_str(raw)?;
    let entries = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("identifier file must be a JSON array"))?;

    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = match entry {
            Value::String(s) => s.clone(),
            Value::Object(map) => {
                if let Some(url) = map.get("url").and_then(Value::as_str) {
                    if !validate_pmc_url(url) {
                        anyhow::bail!("not a PMC article URL: {url}");
                    }
                    url.to_string()
                } else if let Some(id) = map.get("pmc_id").and_then(Value::as_str) {
                    id.to_string()
                } else {
                    anyhow::bail!("object entry has neither a `url` nor a `pmc_id` field");
                }
            }
            other => anyhow::bail!("unsupported entry: {other}"),
        };
        ids.push(id);
    }
    Ok(ids)
}

fn parse_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_strings_and_objects() {
        let raw = r#"[
            "PMC123",
            {"url": "https://pmc.ncbi.nlm.nih.gov/articles/PMC456/"},
            {"pmc_id": "PMC789", "title": "ignored"}
        ]"#;
        let ids = parse_json_list(raw).unwrap();
        assert_eq!(
            ids,
            vec![
                "PMC123",
                "https://pmc.ncbi.nlm.nih.gov/articles/PMC456/",
                "PMC789"
            ]
        );
    }

    #[test]
    fn test_json_object_without_id_field_is_an_error() {
        assert!(parse_json_list(r#"[{"title": "no id"}]"#).is_err());
    }

    #[test]
    fn test_json_url_entries_must_be_pmc_article_urls() {
        assert!(parse_json_list(r#"[{"url": "https://example.org/articles/PMC1/"}]"#).is_err());
    }

    #[test]
    fn test_plain_lines_skip_blanks_and_comments() {
        let ids = parse_lines("PMC1\n\n# comment\n  PMC2  \n");
        assert_eq!(ids, vec!["PMC1", "PMC2"]);
    }
}
