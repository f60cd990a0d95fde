//! Proxy Condition Core Library
//!
//! This crate provides the condition engine behind proxy routing rules: it
//! matches conditions against requests, compiles them into PAC expression
//! trees and converts them to and from a compact text form.
//!
//! # Architecture
//!
//! A [`Condition`] is a closed enum of twelve variants plus a private cache.
//! Each operation looks up the condition's analysis (compiled regex, parsed
//! network, decomposed bypass entry) in that cache, keyed by a tag derived
//! from the condition's text form, and recomputes it when the fields changed.
//! Compiled expression trees are memoized next to the analysis.
//!
//! # Modules
//!
//! - `glob`: Shell glob to regex translation
//! - `script_regex`: Script regex literals on top of `fancy-regex`
//! - `ip`: IP/CIDR parsing, normalization and subnet tests
//! - `expr`: PAC expression tree and the range optimizer
//! - `condition`: Variant handlers, dispatch, cache and text form
//! - `url`: Request construction from URL strings
//! - `domain`: Base-domain and IP-literal helpers
//! - `types`: Shared type definitions

pub mod condition;
pub mod domain;
pub mod error;
pub mod expr;
pub mod glob;
pub mod ip;
pub mod script_regex;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use condition::{type_from_abbr, Analysis, Condition};
pub use error::{ConditionError, Result, ScriptRegexError};
pub use expr::{between, BinaryOp, Node, UnaryOp};
pub use types::{ConditionKind, ConditionType, Request, Weekdays};
