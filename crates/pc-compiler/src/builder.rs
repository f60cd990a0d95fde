use pc_core::expr::{BinaryOp, Node};
use pc_core::{Condition, Result};

use crate::printer::render;

/// Parameters of the compiled matcher function.
pub const MATCHER_PARAMS: [&str; 3] = ["url", "host", "scheme"];

/// Disjunction of the compiled conditions, each annotated with its text
/// form. An empty list compiles to `false`.
pub fn build_predicate(conditions: &[Condition]) -> Result<Node> {
    let mut predicate: Option<Node> = None;
    for condition in conditions {
        let node = condition
            .compile()?
            .with_comment(Some(&condition.to_string()));
        predicate = Some(match predicate {
            Some(left) => left.or(node),
            None => node,
        });
    }
    Ok(predicate.unwrap_or(Node::Bool(false)))
}

/// `function (url, host, scheme) { return <predicate>; }`
pub fn build_matcher(conditions: &[Condition]) -> Result<Node> {
    Ok(Node::function(&MATCHER_PARAMS, build_predicate(conditions)?))
}

/// A complete PAC script sending matching requests to `proxy` and
/// everything else `DIRECT`.
pub fn build_script(conditions: &[Condition], proxy: &str) -> Result<String> {
    let matcher = build_matcher(conditions)?;
    let url = || Node::ident("url");
    let scheme = url().method(
        "substr",
        vec![
            Node::number(0),
            url().method("indexOf", vec![Node::string(":")]),
        ],
    );
    let decision = Node::conditional(
        Node::ident("matches").call(MATCHER_PARAMS.iter().map(|p| Node::ident(*p)).collect()),
        Node::string(proxy),
        Node::string("DIRECT"),
    );

    let mut script = String::new();
    script.push_str("function FindProxyForURL(url, host) {\n");
    script.push_str(&format!("    var scheme = {};\n", render(&scheme)));
    script.push_str(&format!("    var matches = {};\n", render(&matcher)));
    script.push_str(&format!("    return {};\n", render(&decision)));
    script.push_str("}\n");
    Ok(script)
}

/// Reference form of `min <= value && value <= max`, without the range
/// optimizer.
pub fn plain_range_check(value: Node, min: i64, max: i64) -> Node {
    Node::number(min)
        .binary(BinaryOp::Le, value.clone())
        .and(value.binary(BinaryOp::Le, Node::number(max)))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use pc_core::expr::between;
    use pc_core::Request;

    use crate::eval::{eval_bool, Env, Value};
    use crate::parser::parse_condition_list;

    use super::*;

    const CONDITIONS: &str = "\
True:
False:
Disabled: something
*.example.com
**.example.com
.example.org
example.net|*.test
H: a?c.*
Host: foo:
UrlWildcard: *://*.example.com/*|*.pdf
U: http://*
UR: ^https://[^/]+/admin
UR: (unclosed
R: ^(www|api)\\.
R: ^[0-9.]+$
R: (?i)EXAMPLE\\.com
R: ^(?!www\\.).*example\\.com$
UR: ^https?://([a-z]+)\\.\\1\\.
UR: \\bpdf$
K: ads
K: /search?
Ip: 192.168.1.0/24
Ip: 10.0.0.1
Ip: ::1/128
Ip: fe80::/10
Ip: ::/0
Lv: 1~1
Lv: 0~2
Lv: 2~40
Lv: 5~2
Weekday: S-----S
Weekday: -MTWTF-
Weekday: 1~5
Weekday: 4~2
Hour: 9~17
Hour: 0~23
Hour: 20~20
Hour: 18~9
B: <local>
B: .example.com
B: https://*.example.com
B: http://example.com
B: example.com:8080
B: https://example.com:443
B: [::1]:8080
B: 127.0.0.1
B: 10.0.0.0/8
B: https://192.168.0.0/16
B: *
B: fe80::/10
";

    const URLS: &[&str] = &[
        "http://example.com/",
        "https://www.example.com/admin/panel",
        "https://a.b.example.com/doc.pdf",
        "http://xexample.com/",
        "http://example.org/",
        "https://sub.example.org/",
        "http://example.net/search?q=ads",
        "http://abc.test/",
        "http://abc.def/",
        "http://api.service.test:8080/",
        "http://example.com:8080/x",
        "https://example.com:443/",
        "http://192.168.1.55/",
        "http://192.168.2.1/",
        "http://10.0.0.1/",
        "http://10.200.3.4:3128/",
        "http://[::1]/",
        "http://[::1]:8080/",
        "http://[fe80::1]/",
        "http://[2001:db8::1]/",
        "http://127.0.0.1/",
        "http://intranet/",
        "ftp://files.example.com/a.pdf",
        "http://a.b.c.d.e.f/",
    ];

    fn times() -> Vec<NaiveDateTime> {
        // Sunday through Saturday of one week, at varying hours.
        (7..=13)
            .zip([0, 6, 9, 12, 17, 20, 23])
            .filter_map(|(day, hour)| {
                NaiveDate::from_ymd_opt(2024, 1, day).and_then(|date| date.and_hms_opt(hour, 15, 0))
            })
            .collect()
    }

    fn requests() -> Vec<Request> {
        URLS.iter()
            .map(|url| Request::from_url(url).expect("valid url"))
            .collect()
    }

    #[test]
    fn compiled_conditions_agree_with_matching() {
        let conditions = parse_condition_list(CONDITIONS).expect("valid list");
        let requests = requests();
        let times = times();
        assert_eq!(times.len(), 7);

        for condition in &conditions {
            let node = condition.compile().expect("compiles");
            for request in &requests {
                for now in &times {
                    let native = condition.matches_at(request, *now).expect("matches");
                    let env = Env::for_request(request, *now);
                    let compiled = eval_bool(&node, &env).expect("evaluates");
                    assert_eq!(
                        native,
                        compiled,
                        "{} on {} at {}: {}",
                        condition,
                        request.url,
                        now,
                        render(&node)
                    );

                    // Runtimes without isInNetEx take the isInNet branch.
                    let legacy = eval_bool(&node, &env.clone().without("isInNetEx"))
                        .expect("evaluates");
                    assert_eq!(native, legacy, "{} on {} without isInNetEx", condition, request.url);
                }
            }
        }
    }

    #[test]
    fn zero_prefix_ipv4_only_checks_shape() {
        // The compiled form only looks at the last character of the host.
        let condition = Condition::parse("Ip: 0.0.0.0/0").expect("parsable");
        let node = condition.compile().expect("compiles");
        let now = times()[0];
        for url in ["http://10.0.0.1/", "http://example.com/", "http://[::1]/"] {
            let request = Request::from_url(url).expect("valid url");
            let env = Env::for_request(&request, now);
            let compiled = eval_bool(&node, &env).expect("evaluates");
            assert_eq!(compiled, url != "http://example.com/", "{}", url);
        }
        let v6 = Request::from_url("http://[::1]/").expect("valid url");
        assert_eq!(condition.matches_at(&v6, now), Ok(false));
    }

    #[test]
    fn range_optimizer_matches_plain_comparison() {
        let now = times()[0];
        for min in -3i64..=40 {
            for max in min..min + 32 {
                let optimized = between(Node::ident("v"), min, max, None);
                let plain = plain_range_check(Node::ident("v"), min, max);
                for v in (min - 5)..=(max + 5) {
                    let env = Env::new(now).with("v", Value::Number(v as f64));
                    let expected = min <= v && v <= max;
                    assert_eq!(eval_bool(&optimized, &env), Ok(expected), "{min}..={max} at {v}");
                    assert_eq!(eval_bool(&plain, &env), Ok(expected), "{min}..={max} at {v}");
                }
            }
        }
    }

    #[test]
    fn general_range_form_is_equivalent() {
        let now = times()[0];
        let node = between(Node::ident("v"), 10, 100, None);
        assert!(matches!(node, Node::Call { .. }));
        for v in [-1i64, 9, 10, 55, 100, 101] {
            let env = Env::new(now).with("v", Value::Number(v as f64));
            assert_eq!(eval_bool(&node, &env), Ok((10..=100).contains(&v)));
        }
    }

    #[test]
    fn predicate_is_disjunction() {
        let conditions =
            parse_condition_list("*.example.com\nIp: 10.0.0.0/8\nK: ads\n").expect("valid list");
        let predicate = build_predicate(&conditions).expect("compiles");
        let now = times()[3];
        for request in requests() {
            let expected = conditions
                .iter()
                .any(|c| c.matches_at(&request, now).unwrap_or(false));
            let env = Env::for_request(&request, now);
            assert_eq!(eval_bool(&predicate, &env), Ok(expected), "{}", request.url);
        }
        assert_eq!(build_predicate(&[]), Ok(Node::Bool(false)));
    }

    #[test]
    fn builds_script() {
        let conditions = parse_condition_list("*.example.com\n").expect("valid list");
        let script = build_script(&conditions, "PROXY 127.0.0.1:8080").expect("compiles");
        let expected = "function FindProxyForURL(url, host) {\n\
            \x20   var scheme = url.substr(0, url.indexOf(\":\"));\n\
            \x20   var matches = function (url, host, scheme) { return /* *.example.com */ /(?:^|\\.)example\\.com$/.test(host); };\n\
            \x20   return matches(url, host, scheme) ? \"PROXY 127.0.0.1:8080\" : \"DIRECT\";\n\
            }\n";
        assert_eq!(script, expected);
    }
}
