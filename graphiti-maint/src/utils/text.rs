//! Text processing utilities.

use regex::Regex;
use std::sync::OnceLock;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
static PLAIN_IDENT_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("static regex is valid"))
}

fn plain_ident_re() -> &'static Regex {
    PLAIN_IDENT_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex is valid"))
}

/// Replace consecutive whitespace (spaces, tabs, newlines) with a single space
/// and trim leading/trailing whitespace.
///
/// Returns an empty string for inputs that are entirely whitespace.
pub fn normalize_whitespace(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    whitespace_re().replace_all(s, " ").trim().to_string()
}

/// Truncate `s` to at most `max_len` Unicode scalar values, appending `"..."` if
/// truncation occurred. `max_len` counts characters (not bytes), making this safe
/// for multi-byte UTF-8 content.
///
/// Special cases:
/// - `max_len == 0` → empty string
/// - `max_len <= 3` → up to `max_len` dots (e.g. `max_len=2` → `".."`)
pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max_len {
        return s.to_string();
    }

    if max_len <= 3 {
        return ".".repeat(max_len);
    }

    let keep_chars = max_len - 3;
    let byte_offset = s
        .char_indices()
        .nth(keep_chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    format!("{}...", &s[..byte_offset])
}

/// Collapse a (possibly multi-line) error message into one line of at most
/// `max_len` characters, for console reports.
pub fn one_line(s: &str, max_len: usize) -> String {
    truncate_with_ellipsis(&normalize_whitespace(s), max_len)
}

/// Whether `s` can appear in Cypher as a bare identifier.
pub fn is_plain_identifier(s: &str) -> bool {
    plain_ident_re().is_match(s)
}

/// Quote a label, relationship type, property or index name for Cypher.
///
/// Plain identifiers are returned unchanged; anything else is wrapped in
/// backticks with embedded backticks doubled.
pub fn quote_ident(s: &str) -> String {
    if is_plain_identifier(s) {
        return s.to_string();
    }
    format!("`{}`", s.replace('`', "``"))
}
