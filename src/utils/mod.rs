//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Turn feed markup into plain display text
///
/// Decodes HTML entities, drops tags and collapses whitespace.
pub fn clean_text(text: &str) -> String {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();

    let re = TAG_RE.get_or_init(|| Regex::new(r"(?is)<[^>]*>").expect("Invalid regex pattern"));

    let decoded = html_escape::decode_html_entities(text);
    let stripped = re.replace_all(&decoded, " ");
    normalize_whitespace(&stripped)
}
