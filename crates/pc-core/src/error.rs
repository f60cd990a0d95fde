//! Error type for condition handling.

/// Error type for condition analysis and construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("Unknown condition type: {0}")]
    UnknownType(String),
    #[error("Invalid IP address {0}")]
    InvalidIp(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Unparsable condition: {0}")]
    Unparsable(String),
}

pub type Result<T> = std::result::Result<T, ConditionError>;

/// Error translating a script regex literal. Offsets count characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptRegexError {
    #[error("unsupported group syntax at {0}")]
    UnsupportedGroup(usize),
    #[error("invalid group name at {0}")]
    InvalidGroupName(usize),
    #[error("unbalanced parenthesis")]
    UnbalancedGroup,
    #[error("unterminated character class")]
    UnterminatedClass,
    #[error("character class range out of order at {0}")]
    RangeOutOfOrder(usize),
    #[error("nothing to repeat at {0}")]
    NothingToRepeat(usize),
    #[error("invalid escape at {0}")]
    InvalidEscape(usize),
    #[error("pattern ends with a backslash")]
    TrailingBackslash,
    #[error("{0}")]
    Engine(String),
}
