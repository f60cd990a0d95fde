use pc_core::Condition;
use serde::Deserialize;

use crate::error::ListError;

/// Parse a condition list: one compact condition per line.
///
/// Blank lines and lines starting with `!`, `#` or `[` are skipped. The
/// first line with an unknown type prefix aborts parsing.
pub fn parse_condition_list(text: &str) -> Result<Vec<Condition>, ListError> {
    let mut conditions = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }

        match Condition::parse(line) {
            Some(condition) => conditions.push(condition),
            None => {
                return Err(ListError::Parse {
                    line: index + 1,
                    text: line.to_string(),
                })
            }
        }
    }

    log::debug!("parsed {} conditions", conditions.len());
    Ok(conditions)
}

/// Parse a JSON condition document: a single condition object or an array.
pub fn parse_condition_json(text: &str) -> Result<Vec<Condition>, ListError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Document {
        One(Condition),
        Many(Vec<Condition>),
    }

    Ok(match serde_json::from_str(text)? {
        Document::One(condition) => vec![condition],
        Document::Many(conditions) => conditions,
    })
}

/// Format conditions back into list text, one canonical line each.
pub fn format_condition_list(conditions: &[Condition]) -> String {
    let mut out = String::new();
    for condition in conditions {
        out.push_str(&condition.to_string());
        out.push('\n');
    }
    out
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

#[cfg(test)]
mod tests {
    use pc_core::{ConditionKind, ConditionType};

    use super::*;

    #[test]
    fn parses_list_with_comments() {
        let text = "[Proxy Conditions]\n\
                    ! exported list\n\
                    \n\
                    *.example.com\n\
                    # internal\n\
                    Ip: 10.0.0.0/8\n\
                    Disabled: ads.example.com\n";
        let conditions = parse_condition_list(text).expect("valid list");
        let types: Vec<_> = conditions.iter().map(Condition::condition_type).collect();
        assert_eq!(
            types,
            vec![ConditionType::HostWildcard, ConditionType::Ip, ConditionType::False]
        );
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_condition_list("example.com\n\nBogus: x\n").expect_err("bad prefix");
        match err {
            ListError::Parse { line, text } => {
                assert_eq!(line, 3);
                assert_eq!(text, "Bogus: x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parses_json_documents() {
        let one = parse_condition_json(r#"{"conditionType":"KeywordCondition","pattern":"ads"}"#)
            .expect("single condition");
        assert_eq!(
            one[0].kind,
            ConditionKind::Keyword {
                pattern: "ads".to_string()
            }
        );

        let many = parse_condition_json(
            r#"[{"conditionType":"TrueCondition"},
                {"conditionType":"TimeCondition","startHour":9,"endHour":17}]"#,
        )
        .expect("condition array");
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].to_string(), "Hour: 9~17");

        assert!(matches!(
            parse_condition_json(r#"{"conditionType":"NopeCondition"}"#),
            Err(ListError::Json(_))
        ));
    }

    #[test]
    fn formats_canonical_lines() {
        let conditions = parse_condition_list("W: *.example.com\nlv: 1~2\n").expect("valid list");
        assert_eq!(format_condition_list(&conditions), "*.example.com\nHostLevels: 1~2\n");
    }
}
