//! Regex, wildcard and keyword conditions

use fancy_regex::Regex;

use crate::expr::{regex_test, BinaryOp, Node};
use crate::glob::{compile_glob, compile_glob_list};
use crate::script_regex;
use crate::types::Request;

/// Script regex source that never matches.
pub const NEVER_SOURCE: &str = "(?!)";

// =============================================================================
// Safe Regex
// =============================================================================

/// A script regex that degrades to "never matches" on bad source.
///
/// The script source is kept for output; matching runs on its
/// `fancy-regex` translation.
#[derive(Debug, Clone)]
pub enum SafeRegex {
    Compiled { regex: Regex, source: String },
    Never,
}

impl SafeRegex {
    /// Compile `source`; source a script engine would reject yields
    /// [`SafeRegex::Never`].
    pub fn new(source: &str) -> Self {
        match script_regex::compile(source) {
            Ok(regex) => Self::Compiled {
                regex,
                source: source.to_string(),
            },
            Err(e) => {
                log::warn!("Invalid pattern {:?}, condition will never match: {}", source, e);
                Self::Never
            }
        }
    }

    /// Backtracking that exceeds the engine's limit counts as no match.
    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Compiled { regex, .. } => matches!(regex.is_match(text), Ok(true)),
            Self::Never => false,
        }
    }

    /// Regex source for script output.
    pub fn source(&self) -> &str {
        match self {
            Self::Compiled { source, .. } => source,
            Self::Never => NEVER_SOURCE,
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Regex for URL/host regex conditions.
pub fn analyze_regex(pattern: &str) -> SafeRegex {
    SafeRegex::new(pattern)
}

/// Regex for URL wildcard conditions.
pub fn analyze_url_wildcard(pattern: &str) -> SafeRegex {
    SafeRegex::new(&compile_glob_list(pattern, true))
}

/// Regex for host wildcard conditions.
pub fn analyze_host_wildcard(pattern: &str) -> SafeRegex {
    SafeRegex::new(&host_wildcard_regex(pattern))
}

/// Translate a host wildcard list.
///
/// Per segment:
/// - `.example.com` is read as `*.example.com`
/// - `**.example.com` matches strict subdomains only
/// - `*.example.com` matches `example.com` and its subdomains
/// - anything else is an ordinary glob
pub fn host_wildcard_regex(pattern: &str) -> String {
    pattern
        .split('|')
        .filter(|segment| !segment.is_empty())
        .map(host_wildcard_segment)
        .collect::<Vec<_>>()
        .join("|")
}

fn host_wildcard_segment(segment: &str) -> String {
    let dotted;
    let segment = if segment.starts_with('.') {
        dotted = format!("*{}", segment);
        dotted.as_str()
    } else {
        segment
    };

    if segment.starts_with("**.") {
        compile_glob(&segment[1..], true)
    } else if let Some(rest) = segment.strip_prefix("*.") {
        let regex = compile_glob(rest, false);
        let body = regex.strip_prefix('^').unwrap_or(&regex);
        let body = body.strip_suffix(".*$").unwrap_or(body);
        format!(r"(?:^|\.){}", body)
    } else {
        compile_glob(segment, true)
    }
}

// =============================================================================
// Match / Compile
// =============================================================================

/// `/regex/.test(<subject>)`
pub fn compile_regex_test(subject: &str, regex: &SafeRegex) -> Node {
    regex_test(Node::ident(subject), regex.source())
}

/// Keyword conditions only look at plain-HTTP URLs.
pub fn keyword_matches(pattern: &str, request: &Request) -> bool {
    request.scheme == "http" && request.url.contains(pattern)
}

pub fn compile_keyword(pattern: &str) -> Node {
    Node::ident("scheme")
        .strict_eq(Node::string("http"))
        .and(
            Node::ident("url")
                .method("indexOf", vec![Node::string(pattern)])
                .binary(BinaryOp::Ge, Node::number(0)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_regex_degrades() {
        let regex = SafeRegex::new("(unclosed");
        assert!(regex.is_never());
        assert!(!regex.is_match("(unclosed"));
        assert_eq!(regex.source(), NEVER_SOURCE);
    }

    #[test]
    fn test_safe_regex_uses_script_dialect() {
        // Inline flags are not script syntax.
        let flagged = analyze_regex(r"(?i)EXAMPLE\.com");
        assert!(flagged.is_never());
        assert!(!flagged.is_match("example.com"));
        assert!(!flagged.is_match("EXAMPLE.com"));
        assert!(analyze_regex(r"^\d+(?P<port>:\d+)?$").is_never());

        let lookahead = analyze_regex(r"^(?!www\.).*example\.com$");
        assert!(!lookahead.is_never());
        assert!(lookahead.is_match("api.example.com"));
        assert!(!lookahead.is_match("www.example.com"));
        assert_eq!(lookahead.source(), r"^(?!www\.).*example\.com$");

        let backref = analyze_regex(r"^https?://([a-z]+)\.\1\.");
        assert!(backref.is_match("http://abc.abc.com/"));
        assert!(!backref.is_match("http://abc.def.com/"));

        // `\z` is a plain `z` in script regexes.
        let identity = analyze_regex(r"com\z");
        assert!(identity.is_match("a.comz"));
        assert!(!identity.is_match("a.com"));
    }

    #[test]
    fn test_host_wildcard_star_dot() {
        assert_eq!(host_wildcard_regex("*.example.com"), r"(?:^|\.)example\.com$");
        let regex = analyze_host_wildcard("*.example.com");
        assert!(regex.is_match("example.com"));
        assert!(regex.is_match("a.example.com"));
        assert!(regex.is_match("a.b.example.com"));
        assert!(!regex.is_match("xexample.com"));
        assert!(!regex.is_match("example.org"));
    }

    #[test]
    fn test_host_wildcard_leading_dot() {
        assert_eq!(host_wildcard_regex(".example.com"), host_wildcard_regex("*.example.com"));
    }

    #[test]
    fn test_host_wildcard_double_star() {
        let regex = analyze_host_wildcard("**.example.com");
        assert!(regex.is_match("a.b.example.com"));
        assert!(regex.is_match("a.example.com"));
        assert!(!regex.is_match("example.com"));
    }

    #[test]
    fn test_host_wildcard_trailing_star() {
        assert_eq!(host_wildcard_regex("*.google.*"), r"(?:^|\.)google\.");
        let regex = analyze_host_wildcard("*.google.*");
        assert!(regex.is_match("www.google.co.uk"));
        assert!(regex.is_match("google.com"));
    }

    #[test]
    fn test_host_wildcard_list() {
        let regex = analyze_host_wildcard("example.com|*.example.org||");
        assert!(regex.is_match("example.com"));
        assert!(!regex.is_match("www.example.com"));
        assert!(regex.is_match("www.example.org"));
    }

    #[test]
    fn test_url_wildcard() {
        let regex = analyze_url_wildcard("*://*.example.com/*");
        assert!(regex.is_match("https://www.example.com/a"));
        assert!(!regex.is_match("https://example.com/a"));
    }

    #[test]
    fn test_keyword() {
        let http = Request::new("http://example.com/search?q=foo", "example.com", "http");
        let https = Request::new("https://example.com/search?q=foo", "example.com", "https");
        assert!(keyword_matches("q=foo", &http));
        assert!(!keyword_matches("q=foo", &https));
        assert!(!keyword_matches("bar", &http));
    }
}
