//! Reference evaluator for compiled expressions
//!
//! Executes expression trees with the script semantics the compiled
//! conditions rely on (loose comparisons, UTF-16 string indexing,
//! `charCodeAt`, `indexOf`, `split`, regex literals, `new Date()` and the
//! PAC helpers `isInNet` / `isInNetEx`). It exists to check that a compiled
//! condition agrees with native matching without a script engine.
//!
//! `isInNet` only accepts IP literal hosts; no name resolution happens.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use ipnet::IpNet;

use pc_core::expr::{BinaryOp, Node, UnaryOp};
use pc_core::ip::{is_in_subnet, parse_addr, parse_ip};
use pc_core::script_regex;
use pc_core::Request;

use crate::error::EvalError;

/// Host functions available to expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    IsInNet,
    IsInNetEx,
    Date,
}

/// Runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    /// Regex literal with its slash escapes removed
    Regex(String),
    Array(Vec<Value>),
    Date(NaiveDateTime),
    Builtin(Builtin),
    Function { params: Vec<String>, body: Node },
    /// Property of a value that is called as a method
    Method { receiver: Box<Value>, name: String },
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined => false,
            Self::Bool(value) => *value,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Regex(_) | Self::Array(_) | Self::Date(_) => "object",
            Self::Builtin(_) | Self::Function { .. } | Self::Method { .. } => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Bool(value) => f64::from(u8::from(*value)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            _ => f64::NAN,
        }
    }

    fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.clone(),
            Self::Regex(source) => format!("/{}/", source),
            Self::Array(items) => items
                .iter()
                .map(Value::to_js_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Date(date) => date.to_string(),
            _ => "function".to_string(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            other => other.type_of().to_string(),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    let plain = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !plain {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Variable bindings plus the clock used by `new Date()`.
#[derive(Debug, Clone)]
pub struct Env {
    vars: HashMap<String, Value>,
    now: NaiveDateTime,
}

impl Env {
    /// Environment with only the PAC helpers bound.
    pub fn new(now: NaiveDateTime) -> Self {
        let mut vars = HashMap::new();
        vars.insert("isInNet".to_string(), Value::Builtin(Builtin::IsInNet));
        vars.insert("isInNetEx".to_string(), Value::Builtin(Builtin::IsInNetEx));
        vars.insert("Date".to_string(), Value::Builtin(Builtin::Date));
        Self { vars, now }
    }

    /// Bind `url`, `host` and `scheme` from a request.
    pub fn for_request(request: &Request, now: NaiveDateTime) -> Self {
        Self::new(now)
            .with("url", Value::String(request.url.clone()))
            .with("host", Value::String(request.host.clone()))
            .with("scheme", Value::String(request.scheme.clone()))
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.vars.insert(name.to_string(), value);
        self
    }

    /// Remove a binding, e.g. to emulate a runtime without `isInNetEx`.
    pub fn without(mut self, name: &str) -> Self {
        self.vars.remove(name);
        self
    }

    fn lookup(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or(Value::Undefined)
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Evaluate an expression to a boolean.
pub fn eval_bool(node: &Node, env: &Env) -> Result<bool, EvalError> {
    Ok(eval(node, env)?.truthy())
}

/// Evaluate an expression.
pub fn eval(node: &Node, env: &Env) -> Result<Value, EvalError> {
    match node {
        Node::Bool(value) => Ok(Value::Bool(*value)),
        Node::Number(n) => Ok(Value::Number(*n as f64)),
        Node::String(s) => Ok(Value::String(s.clone())),
        Node::Regex(source) => {
            let source = unescape_slash(source);
            if script_regex::translate(&source).is_err() {
                return Err(EvalError::InvalidRegex(source));
            }
            Ok(Value::Regex(source))
        }
        Node::Identifier(name) => match env.vars.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(EvalError::Unbound(name.clone())),
        },
        Node::Binary { op, left, right } => eval_binary(*op, left, right, env),
        Node::Unary { op, operand } => match op {
            // typeof tolerates unbound identifiers.
            UnaryOp::Typeof => {
                let value = match operand.uncommented() {
                    Node::Identifier(name) => env.lookup(name),
                    other => eval(other, env)?,
                };
                Ok(Value::String(value.type_of().to_string()))
            }
            UnaryOp::Not => Ok(Value::Bool(!eval(operand, env)?.truthy())),
        },
        Node::Call { callee, args } => {
            let callee = eval(callee, env)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            call(callee, args, env)
        }
        Node::New { callee, .. } => match eval(callee, env)? {
            Value::Builtin(Builtin::Date) => Ok(Value::Date(env.now)),
            other => Err(EvalError::NotCallable(other.describe())),
        },
        Node::Member { object, property } => member(eval(object, env)?, property),
        Node::Subscript { object, index } => {
            let object = eval(object, env)?;
            let index = eval(index, env)?;
            subscript(object, &index)
        }
        Node::Conditional {
            test,
            consequent,
            alternative,
        } => {
            if eval(test, env)?.truthy() {
                eval(consequent, env)
            } else {
                eval(alternative, env)
            }
        }
        Node::Function { params, body } => Ok(Value::Function {
            params: params.clone(),
            body: body.as_ref().clone(),
        }),
        Node::Commented { node, .. } => eval(node, env),
    }
}

fn eval_binary(op: BinaryOp, left: &Node, right: &Node, env: &Env) -> Result<Value, EvalError> {
    let left = eval(left, env)?;
    match op {
        BinaryOp::And if !left.truthy() => return Ok(left),
        BinaryOp::Or if left.truthy() => return Ok(left),
        BinaryOp::And | BinaryOp::Or => return eval(right, env),
        _ => {}
    }

    let right = eval(right, env)?;
    Ok(match op {
        BinaryOp::StrictEq => Value::Bool(strict_equals(&left, &right)),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Lt => Value::Bool(compare(&left, &right, |o| o.is_lt())),
        BinaryOp::Le => Value::Bool(compare(&left, &right, |o| o.is_le())),
        BinaryOp::Gt => Value::Bool(compare(&left, &right, |o| o.is_gt())),
        BinaryOp::Ge => Value::Bool(compare(&left, &right, |o| o.is_ge())),
        BinaryOp::And | BinaryOp::Or => Value::Undefined,
    })
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

/// Relational comparison: strings compare by UTF-16 units, everything else
/// numerically, and NaN compares false.
fn compare(left: &Value, right: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return accept(a.encode_utf16().cmp(b.encode_utf16()));
    }
    left.to_number()
        .partial_cmp(&right.to_number())
        .is_some_and(accept)
}

fn member(object: Value, property: &str) -> Result<Value, EvalError> {
    let is_method = matches!(
        (&object, property),
        (Value::String(_), "charCodeAt" | "indexOf" | "split")
            | (Value::Regex(_), "test")
            | (Value::Date(_), "getDay" | "getHours")
    );
    if is_method {
        return Ok(Value::Method {
            receiver: Box::new(object),
            name: property.to_string(),
        });
    }
    match (&object, property) {
        (Value::Undefined, _) => Err(EvalError::BadProperty {
            target: object.describe(),
            property: property.to_string(),
        }),
        (Value::String(s), "length") => Ok(Value::Number(s.encode_utf16().count() as f64)),
        (Value::Array(items), "length") => Ok(Value::Number(items.len() as f64)),
        _ => Ok(Value::Undefined),
    }
}

fn subscript(object: Value, index: &Value) -> Result<Value, EvalError> {
    let index = index.to_number();
    let valid = |len: usize| index.fract() == 0.0 && index >= 0.0 && (index as usize) < len;
    match object {
        Value::String(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            if valid(units.len()) {
                let i = index as usize;
                Ok(Value::String(String::from_utf16_lossy(&units[i..=i])))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Array(items) => {
            if valid(items.len()) {
                Ok(items[index as usize].clone())
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Undefined => Err(EvalError::BadProperty {
            target: "undefined".to_string(),
            property: number_to_string(index),
        }),
        _ => Ok(Value::Undefined),
    }
}

fn call(callee: Value, args: Vec<Value>, env: &Env) -> Result<Value, EvalError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    match callee {
        Value::Method { receiver, name } => Ok(call_method(*receiver, &name, &arg(0))),
        Value::Builtin(Builtin::IsInNet) => Ok(Value::Bool(is_in_net(
            &arg(0).to_js_string(),
            &arg(1).to_js_string(),
            &arg(2).to_js_string(),
        ))),
        Value::Builtin(Builtin::IsInNetEx) => Ok(Value::Bool(is_in_net_ex(
            &arg(0).to_js_string(),
            &arg(1).to_js_string(),
        ))),
        Value::Builtin(Builtin::Date) => Ok(Value::String(env.now.to_string())),
        Value::Function { params, body } => {
            let mut scope = env.clone();
            for (i, param) in params.iter().enumerate() {
                scope.vars.insert(param.clone(), arg(i));
            }
            eval(&body, &scope)
        }
        other => Err(EvalError::NotCallable(other.describe())),
    }
}

fn call_method(receiver: Value, name: &str, arg: &Value) -> Value {
    match (receiver, name) {
        (Value::String(s), "charCodeAt") => {
            let index = match arg {
                Value::Undefined => 0.0,
                other => other.to_number().trunc(),
            };
            let unit = (index >= 0.0)
                .then(|| s.encode_utf16().nth(index as usize))
                .flatten();
            Value::Number(unit.map_or(f64::NAN, f64::from))
        }
        (Value::String(s), "indexOf") => {
            let needle = arg.to_js_string();
            let position = s
                .find(&needle)
                .map_or(-1.0, |byte| s[..byte].encode_utf16().count() as f64);
            Value::Number(position)
        }
        (Value::String(s), "split") => {
            let separator = arg.to_js_string();
            Value::Array(
                s.split(separator.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            )
        }
        (Value::Regex(source), "test") => {
            let subject = arg.to_js_string();
            // Engine limits such as unbounded lookbehind count as no match.
            Value::Bool(
                script_regex::compile(&source)
                    .is_ok_and(|regex| matches!(regex.is_match(&subject), Ok(true))),
            )
        }
        (Value::Date(now), "getDay") => {
            Value::Number(f64::from(now.weekday().num_days_from_sunday()))
        }
        (Value::Date(now), "getHours") => Value::Number(f64::from(now.hour())),
        _ => Value::Undefined,
    }
}

/// Inverse of `escape_slash`: `\/` becomes `/`, other escapes are kept.
fn unescape_slash(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('/') => result.push('/'),
            Some(next) => {
                result.push('\\');
                result.push(next);
            }
            None => result.push('\\'),
        }
    }
    result
}

fn is_in_net(host: &str, pattern: &str, mask: &str) -> bool {
    let (Some(host), Some(pattern), Some(mask)) =
        (parse_addr(host), parse_addr(pattern), parse_addr(mask))
    else {
        return false;
    };
    let Ok(prefix) = ipnet::ip_mask_to_prefix(mask) else {
        return false;
    };
    match (pattern, mask) {
        (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
            IpNet::new(pattern, prefix).is_ok_and(|network| is_in_subnet(&host, &network))
        }
        _ => false,
    }
}

fn is_in_net_ex(host: &str, prefix: &str) -> bool {
    match (parse_addr(host), parse_ip(prefix)) {
        (Some(host), Some(network)) => is_in_subnet(&host, &network),
        _ => false,
    }
}
