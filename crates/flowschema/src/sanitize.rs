//! Key sanitizer
//!
//! Turns arbitrary user text into an identifier matching
//! `[A-Za-z_][A-Za-z0-9_]*`. Every run of disallowed characters collapses to
//! a single underscore and a leading digit gets an underscore prefix. Case is
//! preserved. The mapping is deterministic and idempotent.

use std::collections::HashSet;

/// Character emitted for runs of disallowed input.
pub const PLACEHOLDER: char = '_';

/// Result of sanitizing a raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedKey {
    pub key: String,
    /// Output differs from the input; callers raise the whitespace notice.
    pub changed: bool,
    /// Input was non-empty but held no legal character at all.
    pub degenerate: bool,
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

pub fn sanitize(raw: &str) -> SanitizedKey {
    let mut key = String::with_capacity(raw.len() + 1);
    let mut in_illegal_run = false;
    let mut any_legal = false;

    for ch in raw.chars() {
        if is_key_char(ch) {
            key.push(ch);
            in_illegal_run = false;
            any_legal = true;
        } else if !in_illegal_run {
            key.push(PLACEHOLDER);
            in_illegal_run = true;
        }
    }

    if key.starts_with(|c: char| c.is_ascii_digit()) {
        key.insert(0, PLACEHOLDER);
    }

    SanitizedKey {
        changed: key != raw,
        degenerate: !raw.is_empty() && !any_legal,
        key,
    }
}

/// Whether `key` already satisfies the identifier grammar.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => chars.all(is_key_char),
        _ => false,
    }
}

/// Returns `base` if unused, otherwise `base` followed by the smallest
/// numeric suffix that is free.
pub fn unique_key<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let taken: HashSet<&str> = existing.into_iter().map(String::as_str).collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    (1u64..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
