//! Proxy Condition Compiler
//!
//! This crate loads condition lists and compiles them into PAC script
//! source: a predicate over `url`, `host` and `scheme`, or a complete
//! `FindProxyForURL` script.

pub mod builder;
pub mod check;
pub mod error;
pub mod eval;
pub mod optimizer;
pub mod parser;
pub mod printer;

pub use builder::{build_matcher, build_predicate, build_script};
pub use check::{check_conditions, Problem, ProblemKind};
pub use error::{EvalError, ListError};
pub use optimizer::{optimize_conditions, OptimizeStats};
pub use parser::{format_condition_list, parse_condition_json, parse_condition_list};
pub use printer::render;
