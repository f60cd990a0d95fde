//! Wildcard (shell glob) to regular expression translation
//!
//! `*` matches any run of characters and `?` matches exactly one; every
//! other character is literal. The produced source is valid both for the
//! `regex` crate and for script regex literals (after [`escape_slash`]).
//!
//! # Examples
//!
//! ```
//! use pc_core::glob::compile_glob;
//!
//! assert_eq!(compile_glob("*.example.com", false), r"^.*\.example\.com$");
//! assert_eq!(compile_glob("*.example.com", true), r"\.example\.com$");
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// Characters that must be escaped in the translated regex.
const REGEX_META: &[char] = &['\\', '[', ']', '^', '$', '.', '|', '?', '*', '+', '(', ')', '{', '}'];

// =============================================================================
// Glob Translation
// =============================================================================

/// Translate a glob into an anchored regex source.
///
/// With `trim_asterisk`, leading and trailing `*` runs are dropped and the
/// matching anchor is left out, so `*foo*` becomes a plain substring search.
pub fn compile_glob(pattern: &str, trim_asterisk: bool) -> String {
    let mut body = pattern;
    if trim_asterisk {
        body = body.trim_start_matches('*').trim_end_matches('*');
    }

    let keeps_start = body.len() == pattern.len() || !pattern.starts_with('*');
    let keeps_end = body.len() == pattern.len() || !pattern.ends_with('*');

    let mut regex = String::with_capacity(body.len() * 2 + 2);
    if keeps_start {
        regex.push('^');
    }
    push_glob_body(body, &mut regex);
    if keeps_end {
        regex.push('$');
    }
    regex
}

/// Translate a `|`-separated glob list, dropping empty segments.
pub fn compile_glob_list(list: &str, trim_asterisk: bool) -> String {
    list.split('|')
        .filter(|segment| !segment.is_empty())
        .map(|segment| compile_glob(segment, trim_asterisk))
        .collect::<Vec<_>>()
        .join("|")
}

/// Translate a glob without any anchors, for embedding into a larger regex.
pub fn glob_body(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    push_glob_body(pattern, &mut regex);
    regex
}

fn push_glob_body(pattern: &str, out: &mut String) {
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => {
                if REGEX_META.contains(&ch) {
                    out.push('\\');
                }
                out.push(ch);
            }
        }
    }
}

// =============================================================================
// Regex Literal Helpers
// =============================================================================

/// Escape every `/` that is not already escaped, so the source can be
/// written between the slashes of a regex literal.
pub fn escape_slash(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len() + 4);
    let mut escaped = false;
    for ch in pattern.chars() {
        if ch == '/' && !escaped {
            result.push('\\');
        }
        escaped = ch == '\\' && !escaped;
        result.push(ch);
    }
    result
}

/// Extract the host glob from a URL wildcard of the form `*://<host>/*`.
///
/// Such URL wildcards are equivalent to a host wildcard and are usually
/// rewritten into one by editors.
pub fn url_wildcard_to_host_wildcard(pattern: &str) -> Option<&str> {
    static URL_HOST_WILDCARD: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = URL_HOST_WILDCARD
        .get_or_init(|| Regex::new(r"^\*://((?:\w|[?*._\-])+)/\*$").ok())
        .as_ref()?;
    regex
        .captures(pattern)
        .and_then(|caps| caps.get(1))
        .map(|host| host.as_str())
}
