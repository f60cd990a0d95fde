//! Core type definitions for proxy conditions
//!
//! These types map directly to the JSON documents the surrounding
//! configuration stores (`conditionType` tag plus camelCase fields) and
//! are used throughout the condition engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConditionError;

// =============================================================================
// Condition Types (discriminant + abbreviation table)
// =============================================================================

/// Discriminant of a condition variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConditionType {
    /// Always matches
    True = 0,
    /// Never matches
    False = 1,
    /// Regex against the full URL
    UrlRegex = 2,
    /// Glob list against the full URL
    UrlWildcard = 3,
    /// Regex against the host
    HostRegex = 4,
    /// Glob list against the host
    HostWildcard = 5,
    /// Browser bypass-list entry
    Bypass = 6,
    /// Substring of plain-HTTP URLs
    Keyword = 7,
    /// IP literal host inside a network
    Ip = 8,
    /// Number of host labels
    HostLevels = 9,
    /// Day of the week
    Weekday = 10,
    /// Hour of the day
    Time = 11,
}

impl ConditionType {
    /// Every condition type, in discriminant order.
    pub const ALL: [ConditionType; 12] = [
        Self::True,
        Self::False,
        Self::UrlRegex,
        Self::UrlWildcard,
        Self::HostRegex,
        Self::HostWildcard,
        Self::Bypass,
        Self::Keyword,
        Self::Ip,
        Self::HostLevels,
        Self::Weekday,
        Self::Time,
    ];

    /// The `conditionType` discriminant string.
    pub const fn name(self) -> &'static str {
        match self {
            Self::True => "TrueCondition",
            Self::False => "FalseCondition",
            Self::UrlRegex => "UrlRegexCondition",
            Self::UrlWildcard => "UrlWildcardCondition",
            Self::HostRegex => "HostRegexCondition",
            Self::HostWildcard => "HostWildcardCondition",
            Self::Bypass => "BypassCondition",
            Self::Keyword => "KeywordCondition",
            Self::Ip => "IpCondition",
            Self::HostLevels => "HostLevelsCondition",
            Self::Weekday => "WeekdayCondition",
            Self::Time => "TimeCondition",
        }
    }

    /// Abbreviations accepted in the compact text form.
    ///
    /// The first entry is the shorthand prefix (empty for host wildcards,
    /// which may be written bare); the last one is the canonical prefix.
    pub const fn abbrs(self) -> &'static [&'static str] {
        match self {
            Self::True => &["True"],
            Self::False => &["False", "Disabled"],
            Self::UrlRegex => &["UR", "URegex", "UrlR", "UrlRegex"],
            Self::UrlWildcard => &[
                "U", "UW", "Url", "UrlW", "UWild", "UWildcard", "UrlWild", "UrlWildcard",
            ],
            Self::HostRegex => &["R", "HR", "Regex", "HostR", "HRegex", "HostRegex"],
            Self::HostWildcard => &[
                "", "H", "W", "HW", "Wild", "Wildcard", "Host", "HostW", "HWild", "HWildcard",
                "HostWild", "HostWildcard",
            ],
            Self::Bypass => &["B", "Bypass"],
            Self::Keyword => &["K", "KW", "Keyword"],
            Self::Ip => &["Ip"],
            Self::HostLevels => &[
                "Lv", "Level", "Levels", "HL", "HLv", "HLevel", "HLevels", "HostL", "HostLv",
                "HostLevel", "HostLevels",
            ],
            Self::Weekday => &["WD", "Week", "Day", "Weekday"],
            Self::Time => &["T", "Time", "Hour"],
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConditionType {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| ConditionError::UnknownType(s.to_string()))
    }
}

impl TryFrom<u8> for ConditionType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(())
    }
}

// =============================================================================
// Condition Fields
// =============================================================================

/// Variant-specific fields of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "conditionType")]
pub enum ConditionKind {
    #[serde(rename = "TrueCondition")]
    True,
    #[serde(rename = "FalseCondition")]
    False {
        /// Free-text annotation, kept when a rule is disabled
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    #[serde(rename = "UrlRegexCondition")]
    UrlRegex { pattern: String },
    #[serde(rename = "UrlWildcardCondition")]
    UrlWildcard { pattern: String },
    #[serde(rename = "HostRegexCondition")]
    HostRegex { pattern: String },
    #[serde(rename = "HostWildcardCondition")]
    HostWildcard { pattern: String },
    #[serde(rename = "BypassCondition")]
    Bypass { pattern: String },
    #[serde(rename = "KeywordCondition")]
    Keyword { pattern: String },
    #[serde(rename = "IpCondition", rename_all = "camelCase")]
    Ip { ip: String, prefix_length: u8 },
    #[serde(rename = "HostLevelsCondition", rename_all = "camelCase")]
    HostLevels { min_value: u32, max_value: u32 },
    #[serde(rename = "WeekdayCondition", rename_all = "camelCase")]
    Weekday {
        /// Seven-character mask; a letter marks the day, `-` leaves it out
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days: Option<String>,
        #[serde(default)]
        start_day: u8,
        #[serde(default)]
        end_day: u8,
    },
    #[serde(rename = "TimeCondition", rename_all = "camelCase")]
    Time { start_hour: u8, end_hour: u8 },
}

impl ConditionKind {
    /// The discriminant of this variant.
    pub fn condition_type(&self) -> ConditionType {
        match self {
            Self::True => ConditionType::True,
            Self::False { .. } => ConditionType::False,
            Self::UrlRegex { .. } => ConditionType::UrlRegex,
            Self::UrlWildcard { .. } => ConditionType::UrlWildcard,
            Self::HostRegex { .. } => ConditionType::HostRegex,
            Self::HostWildcard { .. } => ConditionType::HostWildcard,
            Self::Bypass { .. } => ConditionType::Bypass,
            Self::Keyword { .. } => ConditionType::Keyword,
            Self::Ip { .. } => ConditionType::Ip,
            Self::HostLevels { .. } => ConditionType::HostLevels,
            Self::Weekday { .. } => ConditionType::Weekday,
            Self::Time { .. } => ConditionType::Time,
        }
    }

    /// The raw pattern text, for variants that carry one.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::False { pattern } => pattern.as_deref(),
            Self::UrlRegex { pattern }
            | Self::UrlWildcard { pattern }
            | Self::HostRegex { pattern }
            | Self::HostWildcard { pattern }
            | Self::Bypass { pattern }
            | Self::Keyword { pattern } => Some(pattern),
            _ => None,
        }
    }

    /// Days selected by a weekday condition, `None` for other variants.
    pub fn weekdays(&self) -> Option<Weekdays> {
        match self {
            Self::Weekday { days: Some(days), .. } if !days.is_empty() => {
                Some(Weekdays::from_mask(days))
            }
            Self::Weekday { start_day, end_day, .. } => {
                Some(Weekdays::from_range(*start_day, *end_day))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Weekday Set
// =============================================================================

bitflags::bitflags! {
    /// Set of days, indexed like `Date.getDay()` (Sunday = 0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Weekdays: u8 {
        const SUNDAY = 1 << 0;
        const MONDAY = 1 << 1;
        const TUESDAY = 1 << 2;
        const WEDNESDAY = 1 << 3;
        const THURSDAY = 1 << 4;
        const FRIDAY = 1 << 5;
        const SATURDAY = 1 << 6;

        const WEEKEND = Self::SUNDAY.bits() | Self::SATURDAY.bits();
        const ALL = 0x7F;
    }
}

impl Weekdays {
    /// Parse a day mask. A day is marked when its UTF-16 unit is above `@`
    /// (code 64), so letters select and `-` does not.
    pub fn from_mask(mask: &str) -> Self {
        mask.encode_utf16()
            .take(7)
            .enumerate()
            .filter(|(_, unit)| *unit > 64)
            .fold(Self::empty(), |acc, (i, _)| acc | Self::from_bits_truncate(1 << i))
    }

    /// Inclusive day range; empty when `start > end`.
    pub fn from_range(start: u8, end: u8) -> Self {
        (start..=end.min(6)).fold(Self::empty(), |acc, day| {
            acc | Self::from_bits_truncate(1 << day)
        })
    }

    /// Check whether the day with the given index (Sunday = 0) is selected.
    #[inline]
    pub fn contains_day(self, day: u32) -> bool {
        day < 7 && self.bits() & (1 << day) != 0
    }
}

// =============================================================================
// Request
// =============================================================================

/// Normalized view of a request URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Full reassembled URL
    pub url: String,
    /// Hostname only, without port or IPv6 brackets
    pub host: String,
    /// Scheme without the trailing colon
    pub scheme: String,
}

impl Request {
    /// Create a request from already-normalized parts.
    pub fn new(url: impl Into<String>, host: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            host: host.into(),
            scheme: scheme.into(),
        }
    }
}
