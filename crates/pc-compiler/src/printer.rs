//! PAC source printer
//!
//! Renders expression trees as single-line script source with the minimum
//! parentheses operator precedence requires. Strings use JSON quoting,
//! which is valid script syntax; comments are written before the node they
//! annotate.

use pc_core::expr::{BinaryOp, Node, UnaryOp};

// Precedence levels, higher binds tighter.
const PREC_FUNCTION: u8 = 1;
const PREC_CONDITIONAL: u8 = 3;
const PREC_OR: u8 = 5;
const PREC_AND: u8 = 6;
const PREC_EQUALITY: u8 = 10;
const PREC_RELATIONAL: u8 = 11;
const PREC_ADDITIVE: u8 = 13;
const PREC_UNARY: u8 = 15;
const PREC_CALL: u8 = 18;
const PREC_PRIMARY: u8 = 20;

/// Render an expression.
pub fn render(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, 0, &mut out);
    out
}

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => PREC_OR,
        BinaryOp::And => PREC_AND,
        BinaryOp::StrictEq => PREC_EQUALITY,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => PREC_RELATIONAL,
        BinaryOp::Sub => PREC_ADDITIVE,
    }
}

fn precedence(node: &Node) -> u8 {
    match node {
        Node::Bool(_) | Node::String(_) | Node::Regex(_) | Node::Identifier(_) => PREC_PRIMARY,
        Node::Number(n) if *n < 0 => PREC_UNARY,
        Node::Number(_) => PREC_PRIMARY,
        Node::Binary { op, .. } => binary_prec(*op),
        Node::Unary { .. } => PREC_UNARY,
        Node::Call { .. } | Node::New { .. } | Node::Member { .. } | Node::Subscript { .. } => {
            PREC_CALL
        }
        Node::Conditional { .. } => PREC_CONDITIONAL,
        Node::Function { .. } => PREC_FUNCTION,
        Node::Commented { node, .. } => precedence(node),
    }
}

/// Write `node`, parenthesized when it binds looser than `min_prec`.
fn write_node(node: &Node, min_prec: u8, out: &mut String) {
    if let Node::Commented { comment, node } = node {
        out.push_str("/* ");
        out.push_str(&comment.replace("*/", "* /"));
        out.push_str(" */ ");
        write_node(node, min_prec, out);
        return;
    }

    let parens = precedence(node) < min_prec;
    if parens {
        out.push('(');
    }
    write_bare(node, out);
    if parens {
        out.push(')');
    }
}

fn write_bare(node: &Node, out: &mut String) {
    match node {
        Node::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Node::Number(value) => out.push_str(&value.to_string()),
        Node::String(value) => write_string(value, out),
        Node::Regex(source) => {
            out.push('/');
            out.push_str(if source.is_empty() { "(?:)" } else { source });
            out.push('/');
        }
        Node::Identifier(name) => out.push_str(name),
        Node::Binary { op, left, right } => {
            let prec = binary_prec(*op);
            write_node(left, prec, out);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            // Left-associative: an equal-precedence right operand needs parens.
            write_node(right, prec + 1, out);
        }
        Node::Unary { op, operand } => {
            out.push_str(op.as_str());
            if *op == UnaryOp::Typeof {
                out.push(' ');
            }
            write_node(operand, PREC_UNARY, out);
        }
        Node::Call { callee, args } => {
            write_node(callee, PREC_CALL, out);
            write_args(args, out);
        }
        Node::New { callee, args } => {
            out.push_str("new ");
            write_node(callee, PREC_CALL, out);
            write_args(args, out);
        }
        Node::Member { object, property } => {
            write_member_object(object, out);
            out.push('.');
            out.push_str(property);
        }
        Node::Subscript { object, index } => {
            write_member_object(object, out);
            out.push('[');
            write_node(index, 0, out);
            out.push(']');
        }
        Node::Conditional {
            test,
            consequent,
            alternative,
        } => {
            write_node(test, PREC_CONDITIONAL + 1, out);
            out.push_str(" ? ");
            write_node(consequent, PREC_CONDITIONAL, out);
            out.push_str(" : ");
            write_node(alternative, PREC_CONDITIONAL, out);
        }
        Node::Function { params, body } => {
            out.push_str("function (");
            out.push_str(&params.join(", "));
            out.push_str(") { return ");
            write_node(body, 0, out);
            out.push_str("; }")
        }
        Node::Commented { node, .. } => write_bare(node, out),
    }
}

fn write_member_object(object: &Node, out: &mut String) {
    // `1.x` would lex as a decimal literal.
    if matches!(object.uncommented(), Node::Number(_)) {
        out.push('(');
        write_node(object, 0, out);
        out.push(')');
    } else {
        write_node(object, PREC_CALL, out);
    }
}

fn write_args(args: &[Node], out: &mut String) {
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_node(arg, PREC_CONDITIONAL, out);
    }
    out.push(')');
}

fn write_string(value: &str, out: &mut String) {
    match serde_json::to_string(value) {
        Ok(quoted) => out.push_str(&quoted),
        Err(e) => {
            log::error!("failed to quote string literal: {}", e);
            out.push_str("\"\"");
        }
    }
}

#[cfg(test)]
mod tests {
    use pc_core::expr::between;
    use pc_core::{Condition, ConditionKind};

    use super::*;

    fn compiled(text: &str) -> String {
        let condition = Condition::parse(text).expect("parsable condition");
        render(&condition.compile().expect("compiles"))
    }

    #[test]
    fn renders_regex_tests() {
        assert_eq!(compiled("*.example.com"), r"/(?:^|\.)example\.com$/.test(host)");
        assert_eq!(compiled("UR: ^https://a/b"), r"/^https:\/\/a\/b/.test(url)");
    }

    #[test]
    fn renders_keyword() {
        assert_eq!(
            compiled("K: ads"),
            r#"scheme === "http" && url.indexOf("ads") >= 0"#
        );
    }

    #[test]
    fn renders_ip_conditions() {
        assert_eq!(
            compiled("Ip: 192.168.0.0/16"),
            r#"host[host.length - 1] >= 0 && isInNet(host, "192.168.0.0", "255.255.0.0")"#
        );
        assert_eq!(
            compiled("Ip: fe80::/10"),
            r#"host.indexOf(":") >= 0 && (typeof isInNetEx === "function" ? isInNetEx(host, "fe80::/10") : isInNet(host, "fe80::", "ffc0::"))"#
        );
    }

    #[test]
    fn renders_ranges() {
        assert_eq!(
            compiled("Lv: 1~2"),
            r#"/* 1 <= hostLevels <= 2 */ "23".charCodeAt(host.split(".").length - 2) > 0"#
        );
        assert_eq!(
            compiled("Hour: 0~6"),
            r#"/* 0 <= value && value <= 6 */ "0123456".charCodeAt(new Date().getHours()) > 0"#
        );
        assert_eq!(
            compiled("Weekday: S-----S"),
            r#""S-----S".charCodeAt(new Date().getDay()) > 64"#
        );
        assert_eq!(
            render(&between(Node::ident("v"), 0, 100, None)),
            "(function (value, min, max) { return min <= value && value <= max; })(v, 0, 100)"
        );
    }

    #[test]
    fn renders_local_bypass() {
        assert_eq!(
            compiled("B: <local>"),
            r#"host === "127.0.0.1" || host === "::1" || host.indexOf(".") < 0"#
        );
    }

    #[test]
    fn parenthesizes_by_precedence() {
        let a = || Node::ident("a");
        let b = || Node::ident("b");
        let c = || Node::ident("c");
        assert_eq!(render(&a().or(b()).and(c())), "(a || b) && c");
        assert_eq!(render(&a().and(b()).or(c())), "a && b || c");
        assert_eq!(render(&a().or(b().or(c()))), "a || (b || c)");
        assert_eq!(
            render(&Node::number(-1).member("toString").call(vec![])),
            "(-1).toString()"
        );
        assert_eq!(
            render(&Node::unary(UnaryOp::Not, a().and(b()))),
            "!(a && b)"
        );
    }

    #[test]
    fn escapes_strings_and_comments() {
        let node = Node::string("say \"hi\"\n").with_comment(Some("a */ b"));
        assert_eq!(render(&node), r#"/* a * / b */ "say \"hi\"\n""#);
        let disabled = Condition::new(ConditionKind::False { pattern: None });
        assert_eq!(render(&disabled.compile().expect("compiles")), "false");
    }
}
