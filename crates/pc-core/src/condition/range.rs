//! Numeric range conditions: host levels, weekday and time of day

use crate::expr::{between, BinaryOp, Node};
use crate::types::{ConditionKind, Weekdays};

// =============================================================================
// Host Levels
// =============================================================================

/// Count the dots in `host`, giving up as soon as the count exceeds `max`.
pub fn host_levels_match(host: &str, min: u32, max: u32) -> bool {
    let mut dots = 0u32;
    for b in host.bytes() {
        if b == b'.' {
            dots += 1;
            if dots > max {
                return false;
            }
        }
    }
    dots >= min
}

/// `host.split(".").length` counts labels, one more than the dots.
pub fn compile_host_levels(min: u32, max: u32) -> Node {
    let labels = Node::ident("host")
        .method("split", vec![Node::string(".")])
        .member("length");
    let comment = format!("{} <= hostLevels <= {}", min, max);
    between(labels, i64::from(min) + 1, i64::from(max) + 1, Some(&comment))
}

// =============================================================================
// Weekday
// =============================================================================

/// Analyzed weekday condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekdayAnalysis {
    /// Day mask text, when the condition uses the mask form
    pub mask: Option<String>,
    pub start_day: u8,
    pub end_day: u8,
    /// Selected days in either form
    pub days: Weekdays,
}

impl WeekdayAnalysis {
    pub fn new(days: Option<&str>, start_day: u8, end_day: u8) -> Self {
        let mask = days.filter(|days| !days.is_empty()).map(str::to_string);
        let days = match &mask {
            Some(mask) => Weekdays::from_mask(mask),
            None => Weekdays::from_range(start_day, end_day),
        };
        Self {
            mask,
            start_day,
            end_day,
            days,
        }
    }

    /// `day` is indexed from Sunday = 0.
    #[inline]
    pub fn matches(&self, day: u32) -> bool {
        self.days.contains_day(day)
    }

    pub fn compile(&self) -> Node {
        let get_day = Node::ident("Date")
            .construct(Vec::new())
            .method("getDay", Vec::new());
        match &self.mask {
            Some(mask) => Node::string(mask.as_str())
                .method("charCodeAt", vec![get_day])
                .binary(BinaryOp::Gt, Node::number(64)),
            None => between(
                get_day,
                i64::from(self.start_day),
                i64::from(self.end_day),
                None,
            ),
        }
    }
}

// =============================================================================
// Time
// =============================================================================

#[inline]
pub fn hour_in_range(hour: u32, start: u8, end: u8) -> bool {
    u32::from(start) <= hour && hour <= u32::from(end)
}

pub fn compile_time(start: u8, end: u8) -> Node {
    let get_hours = Node::ident("Date")
        .construct(Vec::new())
        .method("getHours", Vec::new());
    between(get_hours, i64::from(start), i64::from(end), None)
}

// =============================================================================
// Text Forms
// =============================================================================

/// `a~b`
pub fn range_string_form(start: impl std::fmt::Display, end: impl std::fmt::Display) -> String {
    format!("{}~{}", start, end)
}

/// Leading integer of `text`, after optional whitespace and sign.
/// `None` when no digit follows. Saturates instead of overflowing.
pub fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut seen = false;
    let mut value: i64 = 0;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        seen = true;
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    seen.then_some(if negative { -value } else { value })
}

fn split_range(text: &str) -> (Option<i64>, Option<i64>) {
    let mut parts = text.split('~');
    let start = parts.next().and_then(parse_int_prefix);
    let end = parts.next().and_then(parse_int_prefix);
    (start, end)
}

fn clamp_or_zero(value: Option<i64>, max: i64) -> u8 {
    value
        .filter(|v| (0..=max).contains(v))
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(0)
}

/// `min~max`; non-positive or missing bounds become 1.
pub fn host_levels_from_text(text: &str) -> ConditionKind {
    let (min, max) = split_range(text);
    let positive = |v: Option<i64>| {
        v.filter(|v| *v > 0)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(1)
    };
    ConditionKind::HostLevels {
        min_value: positive(min),
        max_value: positive(max),
    }
}

/// A seven-unit text without `~` is a day mask, anything else a
/// `start~end` range with out-of-range days reset to 0.
pub fn weekday_from_text(text: &str) -> ConditionKind {
    if !text.contains('~') && text.encode_utf16().count() == 7 {
        return ConditionKind::Weekday {
            days: Some(text.to_string()),
            start_day: 0,
            end_day: 0,
        };
    }
    let (start, end) = split_range(text);
    ConditionKind::Weekday {
        days: None,
        start_day: clamp_or_zero(start, 6),
        end_day: clamp_or_zero(end, 6),
    }
}

/// `start~end` hours; out-of-range hours reset to 0.
pub fn time_from_text(text: &str) -> ConditionKind {
    let (start, end) = split_range(text);
    ConditionKind::Time {
        start_hour: clamp_or_zero(start, 23),
        end_hour: clamp_or_zero(end, 23),
    }
}
