//! Text helpers shared by the parser, the sinks and the run summary.

use regex::Regex;
use std::sync::OnceLock;

fn control_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x00-\x1f\x7f]").unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Collapse whitespace runs (tabs, newlines included) to single spaces,
/// then strip any remaining control characters.
pub fn sanitize_text(text: &str) -> String {
    let collapsed = whitespace_runs().replace_all(text, " ");
    control_chars().replace_all(&collapsed, "").trim().to_string()
}

/// Truncate to at most `max` characters, respecting char boundaries.
/// Sink payload limits are counted in characters, not bytes.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Human-readable duration for run summaries: `12.3s`, `2m 5s`, `1h 1m 5s`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let total = seconds as u64;
    let minutes = total / 60;
    let secs = total % 60;
    if minutes < 60 {
        return format!("{minutes}m {secs}s");
    }
    format!("{}h {}m {secs}s", minutes / 60, minutes % 60)
}
