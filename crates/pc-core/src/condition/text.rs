//! Compact text form: `"<abbr>: <part>"` or a bare host wildcard

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use super::bypass::BypassAnalysis;
use super::network::{ip_kind_from_text, ip_string_form};
use super::range::{host_levels_from_text, range_string_form, time_from_text, weekday_from_text};
use super::Condition;
use crate::error::ConditionError;
use crate::types::{ConditionKind, ConditionType};

/// Uppercased abbreviations and type names to their type.
fn abbr_index() -> &'static HashMap<String, ConditionType> {
    static INDEX: OnceLock<HashMap<String, ConditionType>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for ty in ConditionType::ALL {
            index.insert(ty.name().to_ascii_uppercase(), ty);
            for abbr in ty.abbrs() {
                index.insert(abbr.to_ascii_uppercase(), ty);
            }
        }
        index
    })
}

/// Resolve a type abbreviation case-insensitively. The empty abbreviation
/// is the host wildcard.
pub fn type_from_abbr(abbr: &str) -> Option<ConditionType> {
    abbr_index().get(&abbr.to_ascii_uppercase()).copied()
}

/// Variant-specific part of the text form.
fn string_part(kind: &ConditionKind) -> Option<String> {
    match kind {
        ConditionKind::True => None,
        ConditionKind::Bypass { pattern } => {
            let normalized = BypassAnalysis::analyze(pattern).normalized;
            if normalized.is_empty() {
                Some(pattern.clone())
            } else {
                Some(normalized)
            }
        }
        ConditionKind::Ip { ip, prefix_length } => Some(ip_string_form(ip, *prefix_length)),
        ConditionKind::HostLevels {
            min_value,
            max_value,
        } => Some(range_string_form(min_value, max_value)),
        ConditionKind::Weekday {
            days: Some(days), ..
        } if !days.is_empty() => Some(days.clone()),
        ConditionKind::Weekday {
            start_day, end_day, ..
        } => Some(range_string_form(start_day, end_day)),
        ConditionKind::Time {
            start_hour,
            end_hour,
        } => Some(range_string_form(start_hour, end_hour)),
        other => other.pattern().map(str::to_string),
    }
}

/// Build condition fields from the text after the type prefix.
fn kind_from_text(ty: ConditionType, text: &str) -> ConditionKind {
    let pattern = || text.to_string();
    match ty {
        ConditionType::True => ConditionKind::True,
        ConditionType::False => ConditionKind::False {
            pattern: (!text.is_empty()).then(pattern),
        },
        ConditionType::UrlRegex => ConditionKind::UrlRegex { pattern: pattern() },
        ConditionType::UrlWildcard => ConditionKind::UrlWildcard { pattern: pattern() },
        ConditionType::HostRegex => ConditionKind::HostRegex { pattern: pattern() },
        ConditionType::HostWildcard => ConditionKind::HostWildcard { pattern: pattern() },
        ConditionType::Bypass => ConditionKind::Bypass { pattern: pattern() },
        ConditionType::Keyword => ConditionKind::Keyword { pattern: pattern() },
        ConditionType::Ip => ip_kind_from_text(text),
        ConditionType::HostLevels => host_levels_from_text(text),
        ConditionType::Weekday => weekday_from_text(text),
        ConditionType::Time => time_from_text(text),
    }
}

impl Condition {
    /// Text form with the type prefix picked from the abbreviation list.
    ///
    /// `abbr` indexes the list from the end when negative (`-1` is the
    /// canonical prefix); `None` prints the full type name. Host wildcards
    /// print bare unless that would be ambiguous.
    pub fn to_string_with(&self, abbr: Option<isize>) -> String {
        let ty = self.condition_type();
        let abbrs = ty.abbrs();
        if abbrs[0].is_empty() {
            if let Some(pattern) = self.kind.pattern() {
                if !pattern.ends_with(':') && !pattern.contains(' ') {
                    return pattern.to_string();
                }
            }
        }

        let prefix = match abbr {
            Some(index) => {
                let len = abbrs.len() as isize;
                abbrs[index.rem_euclid(len) as usize]
            }
            None => ty.name(),
        };
        let mut result = format!("{}:", prefix);
        if let Some(part) = string_part(&self.kind).filter(|part| !part.is_empty()) {
            result.push(' ');
            result.push_str(&part);
        }
        result
    }

    /// Parse the compact text form. `None` when the prefix is unknown.
    ///
    /// The prefix ends at the first space when that space follows a `:`;
    /// otherwise the whole text is a host wildcard.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let space = text.find(' ').unwrap_or(text.len());
        let (prefix, rest) = match text[..space].strip_suffix(':') {
            Some(prefix) => (prefix, text[space..].trim()),
            None => ("", text),
        };
        let ty = type_from_abbr(prefix)?;
        Some(Self::new(kind_from_text(ty, rest)))
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConditionError::Unparsable(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Request;

    fn parse(text: &str) -> Condition {
        Condition::parse(text).expect("parsable condition")
    }

    #[test]
    fn test_type_from_abbr() {
        assert_eq!(type_from_abbr(""), Some(ConditionType::HostWildcard));
        assert_eq!(type_from_abbr("ur"), Some(ConditionType::UrlRegex));
        assert_eq!(type_from_abbr("hostlevelscondition"), Some(ConditionType::HostLevels));
        assert_eq!(type_from_abbr("Disabled"), Some(ConditionType::False));
        assert_eq!(type_from_abbr("nope"), None);
    }

    #[test]
    fn test_bare_host_wildcard() {
        let c = parse("*.example.com");
        assert_eq!(
            c.kind,
            ConditionKind::HostWildcard {
                pattern: "*.example.com".to_string()
            }
        );
        assert_eq!(c.to_string(), "*.example.com");
    }

    #[test]
    fn test_ambiguous_host_wildcard_gets_prefix() {
        let c = Condition::new(ConditionKind::HostWildcard {
            pattern: "foo:".to_string(),
        });
        assert_eq!(c.to_string(), "HostWildcard: foo:");
        assert_eq!(parse(&c.to_string()), c);

        let c = Condition::new(ConditionKind::HostWildcard {
            pattern: "a b".to_string(),
        });
        assert_eq!(c.to_string(), "HostWildcard: a b");
        assert_eq!(parse(&c.to_string()), c);
    }

    #[test]
    fn test_abbr_selection() {
        let c = Condition::new(ConditionKind::UrlRegex {
            pattern: "^https:".to_string(),
        });
        assert_eq!(c.to_string_with(Some(0)), "UR: ^https:");
        assert_eq!(c.to_string_with(Some(-1)), "UrlRegex: ^https:");
        assert_eq!(c.to_string_with(Some(-2)), "UrlR: ^https:");
        assert_eq!(c.to_string_with(None), "UrlRegexCondition: ^https:");
    }

    #[test]
    fn test_prefix_without_part() {
        assert_eq!(Condition::new(ConditionKind::True).to_string(), "True:");
        assert_eq!(parse("True:").kind, ConditionKind::True);
        assert_eq!(parse("  false:  ").kind, ConditionKind::False { pattern: None });
        assert_eq!(
            parse("Disabled: *.ads.com").kind,
            ConditionKind::False {
                pattern: Some("*.ads.com".to_string())
            }
        );
    }

    #[test]
    fn test_structured_forms() {
        assert_eq!(
            parse("Ip: 10.0.0.0/8").kind,
            ConditionKind::Ip {
                ip: "10.0.0.0".to_string(),
                prefix_length: 8
            }
        );
        assert_eq!(
            parse("Lv: 1~3").kind,
            ConditionKind::HostLevels {
                min_value: 1,
                max_value: 3
            }
        );
        assert_eq!(
            parse("WD: 1~5").to_string(),
            "Weekday: 1~5"
        );
        assert_eq!(parse("Week: S-----S").to_string(), "Weekday: S-----S");
        assert_eq!(parse("T: 9~17").to_string(), "Hour: 9~17");
    }

    #[test]
    fn test_bypass_string_form_is_normalized() {
        let c = parse("B: http://[0::1]:8080");
        assert_eq!(c.to_string(), "Bypass: http://[::1]:8080");
        let c = parse("Bypass: .example.com");
        assert_eq!(c.to_string(), "Bypass: *.example.com");
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(Condition::parse("Nope: x").is_none());
        assert!(matches!(
            "Nope: x".parse::<Condition>(),
            Err(ConditionError::Unparsable(_))
        ));
    }

    #[test]
    fn test_round_trip_preserves_matching() {
        let requests = [
            "http://example.com/",
            "https://www.example.com/search?q=ads",
            "http://10.1.2.3/",
            "http://[::1]:8080/",
            "http://intranet/",
            "ftp://a.b.c.d.example.org/file.pdf",
        ]
        .map(|url| Request::from_url(url).expect("valid url"));

        let conditions = [
            "True:",
            "Disabled: whatever",
            "*.example.com",
            "**.example.org",
            "H: example.com|10.*",
            "UrlWildcard: *.pdf",
            "UR: ^https://",
            "R: ^[a-z]+$",
            "K: ads",
            "Ip: 10.0.0.0/8",
            "Ip: ::1/128",
            "Lv: 0~1",
            "B: <local>",
            "B: http://*.example.com",
            "B: example.com:443",
            "B: [::1]:8080",
            "B: 10.0.0.0/8",
        ];
        for text in conditions {
            let c = parse(text);
            let again = parse(&c.to_string());
            for req in &requests {
                assert_eq!(c.matches(req), again.matches(req), "{} on {}", text, req.url);
            }
        }
    }
}
