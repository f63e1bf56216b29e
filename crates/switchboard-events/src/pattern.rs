//! Event type patterns
//!
//! A pattern is either an exact event type or a glob where `*` matches any run
//! of characters and `?` matches exactly one character. Globs are anchored: they
//! must match the whole event type, never a substring.

use regex::Regex;
use std::fmt;
use tracing::warn;

/// Compiled event type pattern
#[derive(Clone)]
pub struct Pattern {
    raw: String,
    regex: Option<Regex>,
}

impl Pattern {
    /// Compile a pattern
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let regex = if is_glob(&raw) {
            match Regex::new(&glob_to_regex(&raw)) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = %raw, error = %e, "Pattern too large, matching exactly");
                    None
                }
            }
        } else {
            None
        };

        Self { raw, regex }
    }

    /// Pattern source text
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern contains wildcard tokens
    pub fn is_wildcard(&self) -> bool {
        self.regex.is_some()
    }

    /// Check if an event type matches this pattern
    pub fn matches(&self, event_type: &str) -> bool {
        if self.raw == event_type {
            return true;
        }

        self.regex
            .as_ref()
            .map(|regex| regex.is_match(event_type))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.raw).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut literal = String::new();
    out.push('^');

    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }

    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}
