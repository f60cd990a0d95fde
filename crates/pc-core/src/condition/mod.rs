//! Condition dispatch
//!
//! A [`Condition`] pairs its fields ([`ConditionKind`]) with a private
//! analysis cache. Every operation first asks the cache for an up-to-date
//! [`Analysis`], then dispatches on it:
//!
//! ```text
//! Condition::matches ──► analyze() ──► tag == cached tag? ──► Analysis::matches
//! Condition::compile ──►     │                 │ no        └─► Analysis::compile (memoized)
//!                            │                 └──► recompute + swap record
//! ```
//!
//! Editing `kind` in place changes the tag, so the next call re-analyzes.

pub mod bypass;
pub mod cache;
pub mod network;
pub mod pattern;
pub mod range;
mod text;

use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expr::Node;
use crate::types::{ConditionKind, ConditionType, Request};

use self::bypass::BypassAnalysis;
use self::cache::{AnalysisCache, CacheRecord};
use self::network::IpAnalysis;
use self::pattern::{compile_keyword, compile_regex_test, keyword_matches, SafeRegex};
use self::range::{
    compile_host_levels, compile_time, host_levels_match, hour_in_range, WeekdayAnalysis,
};

pub use self::text::type_from_abbr;

// =============================================================================
// Analysis
// =============================================================================

/// Derived, ready-to-run form of a condition.
#[derive(Debug, Clone)]
pub enum Analysis {
    /// True / False
    Constant(bool),
    /// Regex tested against the URL
    Url(SafeRegex),
    /// Regex tested against the host
    Host(SafeRegex),
    Bypass(Box<BypassAnalysis>),
    Keyword(String),
    Ip(IpAnalysis),
    HostLevels { min: u32, max: u32 },
    Weekday(WeekdayAnalysis),
    Time { start: u8, end: u8 },
}

impl Analysis {
    /// Analyze condition fields. Fails only for IP conditions whose address
    /// does not parse.
    pub fn of(kind: &ConditionKind) -> Result<Self> {
        Ok(match kind {
            ConditionKind::True => Self::Constant(true),
            ConditionKind::False { .. } => Self::Constant(false),
            ConditionKind::UrlRegex { pattern } => Self::Url(pattern::analyze_regex(pattern)),
            ConditionKind::UrlWildcard { pattern } => {
                Self::Url(pattern::analyze_url_wildcard(pattern))
            }
            ConditionKind::HostRegex { pattern } => Self::Host(pattern::analyze_regex(pattern)),
            ConditionKind::HostWildcard { pattern } => {
                Self::Host(pattern::analyze_host_wildcard(pattern))
            }
            ConditionKind::Bypass { pattern } => {
                Self::Bypass(Box::new(BypassAnalysis::analyze(pattern)))
            }
            ConditionKind::Keyword { pattern } => Self::Keyword(pattern.clone()),
            ConditionKind::Ip { ip, prefix_length } => {
                Self::Ip(IpAnalysis::analyze(ip, *prefix_length)?)
            }
            ConditionKind::HostLevels {
                min_value,
                max_value,
            } => Self::HostLevels {
                min: *min_value,
                max: *max_value,
            },
            ConditionKind::Weekday {
                days,
                start_day,
                end_day,
            } => Self::Weekday(WeekdayAnalysis::new(days.as_deref(), *start_day, *end_day)),
            ConditionKind::Time {
                start_hour,
                end_hour,
            } => Self::Time {
                start: *start_hour,
                end: *end_hour,
            },
        })
    }

    /// Evaluate against a request at local time `now`.
    pub fn matches(&self, request: &Request, now: NaiveDateTime) -> bool {
        match self {
            Self::Constant(value) => *value,
            Self::Url(regex) => regex.is_match(&request.url),
            Self::Host(regex) => regex.is_match(&request.host),
            Self::Bypass(bypass) => bypass.matches(request),
            Self::Keyword(pattern) => keyword_matches(pattern, request),
            Self::Ip(ip) => ip.matches(&request.host),
            Self::HostLevels { min, max } => host_levels_match(&request.host, *min, *max),
            Self::Weekday(weekday) => weekday.matches(now.weekday().num_days_from_sunday()),
            Self::Time { start, end } => hour_in_range(now.hour(), *start, *end),
        }
    }

    /// Expression over `url`, `host` and `scheme` equivalent to [`matches`].
    ///
    /// [`matches`]: Analysis::matches
    pub fn compile(&self) -> Node {
        match self {
            Self::Constant(value) => Node::Bool(*value),
            Self::Url(regex) => compile_regex_test("url", regex),
            Self::Host(regex) => compile_regex_test("host", regex),
            Self::Bypass(bypass) => bypass.compile(),
            Self::Keyword(pattern) => compile_keyword(pattern),
            Self::Ip(ip) => ip.compile(),
            Self::HostLevels { min, max } => compile_host_levels(*min, *max),
            Self::Weekday(weekday) => weekday.compile(),
            Self::Time { start, end } => compile_time(*start, *end),
        }
    }
}

// =============================================================================
// Condition
// =============================================================================

/// A proxy condition with its analysis cache.
///
/// Serializes exactly like its [`ConditionKind`]; the cache is never
/// serialized, cloned or compared.
#[derive(Debug, Serialize, Deserialize)]
#[serde(from = "ConditionKind", into = "ConditionKind")]
pub struct Condition {
    pub kind: ConditionKind,
    cache: AnalysisCache,
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            cache: AnalysisCache::default(),
        }
    }

    #[inline]
    pub fn condition_type(&self) -> ConditionType {
        self.kind.condition_type()
    }

    /// Fingerprint of the fields the analysis depends on.
    pub fn tag(&self) -> String {
        match &self.kind {
            // The bypass string form needs a full analysis; the raw pattern
            // determines it anyway.
            ConditionKind::Bypass { pattern } => {
                format!("{}${}", ConditionType::Bypass.name(), pattern)
            }
            _ => format!("{}${}", self.condition_type().name(), self),
        }
    }

    /// Current analysis, recomputed when the fields changed since the last
    /// call.
    pub fn analyze(&self) -> Result<Arc<CacheRecord>> {
        self.cache.get_or_refresh(self.tag(), || Analysis::of(&self.kind))
    }

    /// Match against a request using the local clock.
    pub fn matches(&self, request: &Request) -> Result<bool> {
        self.matches_at(request, Local::now().naive_local())
    }

    /// Match against a request at a given local time.
    pub fn matches_at(&self, request: &Request, now: NaiveDateTime) -> Result<bool> {
        Ok(self.analyze()?.analysis().matches(request, now))
    }

    /// Compile to an expression tree over `url`, `host` and `scheme`.
    pub fn compile(&self) -> Result<Node> {
        let record = self.analyze()?;
        if let Some(node) = record.compiled() {
            return Ok(node.clone());
        }
        let node = record.analysis().compile();
        Ok(record.compiled_or_init(node).clone())
    }
}

impl From<ConditionKind> for Condition {
    fn from(kind: ConditionKind) -> Self {
        Self::new(kind)
    }
}

impl From<Condition> for ConditionKind {
    fn from(condition: Condition) -> Self {
        condition.kind
    }
}

impl Clone for Condition {
    fn clone(&self) -> Self {
        Self::new(self.kind.clone())
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Condition {}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(Some(-1)))
    }
}
