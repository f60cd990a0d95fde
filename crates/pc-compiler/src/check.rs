//! Condition list diagnostics

use std::fmt;

use pc_core::condition::bypass::BypassHost;
use pc_core::{Analysis, Condition, ConditionError};

/// What is wrong with a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKind {
    /// Analysis failed
    Invalid(ConditionError),
    /// The pattern did not compile and the condition never matches
    BrokenPattern,
    /// The range is inverted or empty and the condition never matches
    EmptyRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// Position in the checked slice
    pub index: usize,
    /// Text form of the condition
    pub condition: String,
    pub kind: ProblemKind,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {:?}: ", self.index + 1, self.condition)?;
        match &self.kind {
            ProblemKind::Invalid(e) => write!(f, "{}", e),
            ProblemKind::BrokenPattern => f.write_str("invalid pattern, never matches"),
            ProblemKind::EmptyRange => f.write_str("empty range, never matches"),
        }
    }
}

/// Analyze every condition and report the ones that are invalid or can
/// never match.
pub fn check_conditions(conditions: &[Condition]) -> Vec<Problem> {
    conditions
        .iter()
        .enumerate()
        .filter_map(|(index, condition)| {
            let kind = match condition.analyze() {
                Err(e) => Some(ProblemKind::Invalid(e)),
                Ok(record) => problem_of(record.analysis()),
            }?;
            Some(Problem {
                index,
                condition: condition.to_string(),
                kind,
            })
        })
        .collect()
}

fn problem_of(analysis: &Analysis) -> Option<ProblemKind> {
    let broken = match analysis {
        Analysis::Url(regex) | Analysis::Host(regex) => regex.is_never(),
        Analysis::Bypass(bypass) => {
            matches!(&bypass.host, BypassHost::Pattern(regex) if regex.is_never())
                || bypass.url.as_ref().is_some_and(|url| url.is_never())
        }
        _ => false,
    };
    if broken {
        return Some(ProblemKind::BrokenPattern);
    }

    let empty = match analysis {
        Analysis::HostLevels { min, max } => min > max,
        Analysis::Time { start, end } => start > end,
        Analysis::Weekday(weekday) => weekday.days.is_empty(),
        _ => false,
    };
    empty.then_some(ProblemKind::EmptyRange)
}
