//! Expression trees for PAC script predicates
//!
//! Conditions compile to a small expression algebra that mirrors the
//! subset of the script dialect PAC files use. The tree is independent of
//! any printer; `pc-compiler` renders it to source text.
//!
//! Free identifiers produced by the engine are `url`, `host`, `scheme`,
//! `isInNet`, `isInNetEx` and `Date`.

use crate::glob::escape_slash;

// =============================================================================
// Operators
// =============================================================================

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `===`
    StrictEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `-`
    Sub,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOp {
    /// Source token of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrictEq => "===",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Sub => "-",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `typeof`
    Typeof,
    /// `!`
    Not,
}

impl UnaryOp {
    /// Source token of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Typeof => "typeof",
            Self::Not => "!",
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Number(i64),
    /// String literal (unescaped contents)
    String(String),
    /// Regex literal; the source is already slash-escaped
    Regex(String),
    /// Identifier reference
    Identifier(String),
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    /// `callee(args...)`
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    /// `new callee(args...)`
    New {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    /// `object.property`
    Member {
        object: Box<Node>,
        property: String,
    },
    /// `object[index]`
    Subscript {
        object: Box<Node>,
        index: Box<Node>,
    },
    /// `test ? consequent : alternative`
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternative: Box<Node>,
    },
    /// `function (params...) { return body; }`
    Function {
        params: Vec<String>,
        body: Box<Node>,
    },
    /// A node annotated with an explanatory comment. Evaluates to `node`.
    Commented {
        comment: String,
        node: Box<Node>,
    },
}

impl Node {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn number(value: i64) -> Self {
        Self::Number(value)
    }

    /// Regex literal from regex source; unescaped slashes get escaped.
    pub fn regex(source: &str) -> Self {
        Self::Regex(escape_slash(source))
    }

    pub fn member(self, property: impl Into<String>) -> Self {
        Self::Member {
            object: Box::new(self),
            property: property.into(),
        }
    }

    pub fn index(self, index: Node) -> Self {
        Self::Subscript {
            object: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn call(self, args: Vec<Node>) -> Self {
        Self::Call {
            callee: Box::new(self),
            args,
        }
    }

    /// Call a method on this node: `self.method(args...)`.
    pub fn method(self, method: &str, args: Vec<Node>) -> Self {
        self.member(method).call(args)
    }

    pub fn construct(self, args: Vec<Node>) -> Self {
        Self::New {
            callee: Box::new(self),
            args,
        }
    }

    pub fn binary(self, op: BinaryOp, right: Node) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn and(self, right: Node) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: Node) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    pub fn strict_eq(self, right: Node) -> Self {
        self.binary(BinaryOp::StrictEq, right)
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn conditional(test: Node, consequent: Node, alternative: Node) -> Self {
        Self::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternative: Box::new(alternative),
        }
    }

    pub fn function(params: &[&str], body: Node) -> Self {
        Self::Function {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Box::new(body),
        }
    }

    /// Attach a comment; `None` or an empty comment leaves the node as is.
    pub fn with_comment(self, comment: Option<&str>) -> Self {
        match comment {
            Some(comment) if !comment.is_empty() => Self::Commented {
                comment: comment.to_string(),
                node: Box::new(self),
            },
            _ => self,
        }
    }

    /// Strip comment wrappers.
    pub fn uncommented(&self) -> &Node {
        match self {
            Self::Commented { node, .. } => node.uncommented(),
            other => other,
        }
    }
}

// =============================================================================
// Common Shapes
// =============================================================================

/// `/regex/.test(subject)`
pub fn regex_test(subject: Node, source: &str) -> Node {
    Node::regex(source).method("test", vec![subject])
}

/// Alphabet used by the lookup-table form of [`between`].
const RANGE_TABLE: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

/// Largest span (`max - min`) compiled to a lookup table.
const RANGE_TABLE_SPAN: i64 = 32;

/// Compile `min <= value && value <= max` into the cheapest equivalent tree.
///
/// - equal bounds become a strict equality
/// - inverted bounds become `false` (the rule can never match)
/// - short integer ranges become one string probe:
///   `"<chars>".charCodeAt(value - min) > 0`
/// - anything else calls an inline range-check function
pub fn between(value: Node, min: i64, max: i64, comment: Option<&str>) -> Node {
    if min == max {
        return value.strict_eq(Node::number(min)).with_comment(comment);
    }
    if min > max {
        return Node::Bool(false).with_comment(comment);
    }
    if max - min < RANGE_TABLE_SPAN {
        let default_comment;
        let comment = match comment {
            Some(comment) => comment,
            None => {
                default_comment = format!("{} <= value && value <= {}", min, max);
                &default_comment
            }
        };
        let len = (max - min + 1) as usize;
        let table = if min >= 0 && max < RANGE_TABLE.len() as i64 {
            &RANGE_TABLE[min as usize..=max as usize]
        } else {
            &RANGE_TABLE[..len]
        };
        let pos = if min == 0 {
            value
        } else {
            value.binary(BinaryOp::Sub, Node::number(min))
        };
        return Node::string(table)
            .method("charCodeAt", vec![pos])
            .binary(BinaryOp::Gt, Node::number(0))
            .with_comment(Some(comment));
    }

    let check = Node::ident("min")
        .binary(BinaryOp::Le, Node::ident("value"))
        .and(Node::ident("value").binary(BinaryOp::Le, Node::ident("max")));
    Node::function(&["value", "min", "max"], check)
        .call(vec![value, Node::number(min), Node::number(max)])
        .with_comment(comment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_equal_bounds() {
        let node = between(Node::ident("v"), 3, 3, None);
        assert_eq!(node, Node::ident("v").strict_eq(Node::number(3)));
    }

    #[test]
    fn test_between_inverted_bounds() {
        let node = between(Node::ident("v"), 5, 2, Some("never"));
        assert_eq!(node.uncommented(), &Node::Bool(false));
        assert!(matches!(node, Node::Commented { ref comment, .. } if comment == "never"));
    }

    #[test]
    fn test_between_table_form() {
        let node = between(Node::ident("v"), 2, 4, None);
        let Node::Commented { comment, node } = node else {
            panic!("table form carries a default comment");
        };
        assert_eq!(comment, "2 <= value && value <= 4");
        let expected = Node::string("234")
            .method(
                "charCodeAt",
                vec![Node::ident("v").binary(BinaryOp::Sub, Node::number(2))],
            )
            .binary(BinaryOp::Gt, Node::number(0));
        assert_eq!(*node, expected);
    }

    #[test]
    fn test_between_table_from_zero_skips_subtraction() {
        let node = between(Node::ident("v"), 0, 6, None);
        let expected = Node::string("0123456")
            .method("charCodeAt", vec![Node::ident("v")])
            .binary(BinaryOp::Gt, Node::number(0));
        assert_eq!(node.uncommented(), &expected);
    }

    #[test]
    fn test_between_table_high_range_uses_prefix() {
        let node = between(Node::ident("v"), 40, 42, None);
        let Node::Binary { left, .. } = node.uncommented() else {
            panic!("expected comparison");
        };
        let Node::Call { callee, .. } = left.as_ref() else {
            panic!("expected charCodeAt call");
        };
        let Node::Member { object, .. } = callee.as_ref() else {
            panic!("expected member access");
        };
        assert_eq!(object.as_ref(), &Node::string("012"));
    }

    #[test]
    fn test_between_general_form() {
        let node = between(Node::ident("v"), 0, 100, None);
        let Node::Call { callee, args } = node else {
            panic!("expected inline function call");
        };
        assert!(matches!(*callee, Node::Function { ref params, .. } if params == &["value", "min", "max"]));
        assert_eq!(args, vec![Node::ident("v"), Node::number(0), Node::number(100)]);
    }

    #[test]
    fn test_regex_test_escapes_slash() {
        let node = regex_test(Node::ident("url"), "^https://");
        let expected = Node::Regex(r"^https:\/\/".to_string()).method("test", vec![Node::ident("url")]);
        assert_eq!(node, expected);
    }
}
