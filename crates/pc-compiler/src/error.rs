//! Error types for condition lists and expression evaluation.

/// Error loading a condition list.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("line {line}: unparsable condition {text:?}")]
    Parse { line: usize, text: String },
    #[error("invalid condition document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error evaluating an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("{0} is not defined")]
    Unbound(String),
    #[error("{0} is not a function")]
    NotCallable(String),
    #[error("cannot read property {property} of {target}")]
    BadProperty { target: String, property: String },
    #[error("invalid regular expression /{0}/")]
    InvalidRegex(String),
}
