//! Script regex literals
//!
//! Condition patterns are regex literals of the PAC script language, which
//! is not the dialect of the `regex` crate. Lookaround and backreferences
//! exist there while inline flags, `(?P<name>...)` and possessive
//! quantifiers do not. `\d`, `\w` and `\b` are ASCII only, an unknown
//! escape stands for the escaped character and a `{` that does not start a
//! quantifier is literal.
//!
//! [`translate`] rewrites a script pattern into `fancy-regex` syntax and
//! rejects what a script engine rejects, so a pattern matches natively
//! exactly when its regex literal would.
//!
//! ```
//! use pc_core::script_regex::compile;
//!
//! let regex = compile(r"^(?!www\.)\w+\.example\.com$").unwrap();
//! assert!(regex.is_match("api.example.com").unwrap());
//! assert!(!regex.is_match("www.example.com").unwrap());
//! assert!(compile("(?i)example").is_err());
//! ```

use fancy_regex::Regex;

use crate::error::ScriptRegexError;

type Ranges = Vec<(u32, u32)>;

const MAX_CHAR: u32 = 0x10FFFF;
const SURROGATES: (u32, u32) = (0xD800, 0xDFFF);

const DIGIT: &[(u32, u32)] = &[(0x30, 0x39)];
const WORD: &[(u32, u32)] = &[(0x30, 0x39), (0x41, 0x5A), (0x5F, 0x5F), (0x61, 0x7A)];
const SPACE: &[(u32, u32)] = &[
    (0x09, 0x0D),
    (0x20, 0x20),
    (0xA0, 0xA0),
    (0x1680, 0x1680),
    (0x2000, 0x200A),
    (0x2028, 0x2029),
    (0x202F, 0x202F),
    (0x205F, 0x205F),
    (0x3000, 0x3000),
    (0xFEFF, 0xFEFF),
];
const LINE_TERMINATOR: &[(u32, u32)] = &[(0x0A, 0x0A), (0x0D, 0x0D), (0x2028, 0x2029)];

const WORD_BOUNDARY: &str =
    r"(?:(?<=[0-9A-Z_a-z])(?![0-9A-Z_a-z])|(?<![0-9A-Z_a-z])(?=[0-9A-Z_a-z]))";
const NOT_WORD_BOUNDARY: &str =
    r"(?:(?<=[0-9A-Z_a-z])(?=[0-9A-Z_a-z])|(?<![0-9A-Z_a-z])(?![0-9A-Z_a-z]))";
const EMPTY_CLASS: &str = r"[^\x{0}-\x{10FFFF}]";

/// Compile a script regex source.
pub fn compile(source: &str) -> Result<Regex, ScriptRegexError> {
    let translated = translate(source)?;
    Regex::new(&translated).map_err(|e| ScriptRegexError::Engine(e.to_string()))
}

/// Rewrite a script regex source into `fancy-regex` syntax.
pub fn translate(source: &str) -> Result<String, ScriptRegexError> {
    Translator::new(source).run()
}

enum ClassAtom {
    Char(char),
    Set(Ranges),
}

impl ClassAtom {
    fn add_to(self, ranges: &mut Ranges) {
        match self {
            Self::Char(ch) => ranges.push((ch as u32, ch as u32)),
            Self::Set(set) => ranges.extend(set),
        }
    }
}

struct Translator {
    chars: Vec<char>,
    pos: usize,
    out: String,
    captures: usize,
    named: bool,
}

impl Translator {
    fn new(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let (captures, named) = count_captures(&chars);
        Self {
            chars,
            pos: 0,
            out: String::with_capacity(source.len() * 2),
            captures,
            named,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn eat(&mut self, expected: &str) -> bool {
        let len = expected.chars().count();
        let found = self
            .chars
            .get(self.pos..self.pos + len)
            .is_some_and(|window| window.iter().copied().eq(expected.chars()));
        if found {
            self.pos += len;
        }
        found
    }

    fn run(mut self) -> Result<String, ScriptRegexError> {
        let mut depth = 0usize;
        while let Some(ch) = self.bump() {
            let start = self.pos - 1;
            match ch {
                '\\' => self.escape(start)?,
                '[' => self.class()?,
                '(' => {
                    self.group(start)?;
                    depth += 1;
                }
                ')' => {
                    depth = depth.checked_sub(1).ok_or(ScriptRegexError::UnbalancedGroup)?;
                    self.out.push(')');
                }
                '.' => push_ranges(&mut self.out, &complement(LINE_TERMINATOR)),
                '*' | '+' | '?' => {
                    self.out.push(ch);
                    self.quantifier_suffix()?;
                }
                '{' => match brace_quantifier_len(&self.chars, start) {
                    Some(len) => {
                        self.out.extend(&self.chars[start..start + len]);
                        self.pos = start + len;
                        self.quantifier_suffix()?;
                    }
                    None => self.out.push_str(r"\{"),
                },
                '}' => self.out.push_str(r"\}"),
                ']' => self.out.push_str(r"\]"),
                _ => self.out.push(ch),
            }
        }
        if depth > 0 {
            return Err(ScriptRegexError::UnbalancedGroup);
        }
        Ok(self.out)
    }

    /// Lazy marker after a quantifier; a second quantifier is an error,
    /// which also rules out possessive `*+`.
    fn quantifier_suffix(&mut self) -> Result<(), ScriptRegexError> {
        if self.peek() == Some('?') {
            self.pos += 1;
            self.out.push('?');
        }
        let repeated = match self.peek() {
            Some('*' | '+' | '?') => true,
            Some('{') => brace_quantifier_len(&self.chars, self.pos).is_some(),
            _ => false,
        };
        if repeated {
            return Err(ScriptRegexError::NothingToRepeat(self.pos));
        }
        Ok(())
    }

    fn group(&mut self, start: usize) -> Result<(), ScriptRegexError> {
        if self.peek() != Some('?') {
            self.out.push('(');
            return Ok(());
        }
        for prefix in ["?:", "?=", "?!", "?<=", "?<!"] {
            if self.eat(prefix) {
                self.out.push('(');
                self.out.push_str(prefix);
                return Ok(());
            }
        }
        if self.eat("?<") {
            let name = self
                .group_name()
                .ok_or(ScriptRegexError::InvalidGroupName(start))?;
            self.out.push_str("(?<");
            self.out.push_str(&name);
            self.out.push('>');
            return Ok(());
        }
        Err(ScriptRegexError::UnsupportedGroup(start))
    }

    /// Name up to and including the closing `>`.
    fn group_name(&mut self) -> Option<String> {
        let mut name = String::new();
        loop {
            match self.bump()? {
                '>' if !name.is_empty() => return Some(name),
                ch if ch == '_' || ch.is_ascii_alphabetic() => name.push(ch),
                ch if ch.is_ascii_digit() && !name.is_empty() => name.push(ch),
                _ => return None,
            }
        }
    }

    fn escape(&mut self, start: usize) -> Result<(), ScriptRegexError> {
        let ch = self.bump().ok_or(ScriptRegexError::TrailingBackslash)?;
        if let Some(set) = class_escape(ch) {
            push_ranges(&mut self.out, &set);
            return Ok(());
        }
        match ch {
            'b' => self.out.push_str(WORD_BOUNDARY),
            'B' => self.out.push_str(NOT_WORD_BOUNDARY),
            '1'..='9' => match self.backreference(start) {
                Some(group) => self.out.push_str(&format!(r"(?:\{})", group)),
                None => {
                    let literal = self.char_escape(ch, start)?;
                    push_char(&mut self.out, literal);
                }
            },
            'k' if self.named => {
                let name = if self.eat("<") { self.group_name() } else { None };
                let name = name.ok_or(ScriptRegexError::InvalidEscape(start))?;
                self.out.push_str(&format!(r"\k<{}>", name));
            }
            _ => {
                let literal = self.char_escape(ch, start)?;
                push_char(&mut self.out, literal);
            }
        }
        Ok(())
    }

    /// Decimal escape naming an existing group. Anything else falls back
    /// to an octal or identity escape.
    fn backreference(&mut self, start: usize) -> Option<usize> {
        let digits = self.chars[start + 1..]
            .iter()
            .take_while(|ch| ch.is_ascii_digit())
            .count();
        let group: usize = self.chars[start + 1..start + 1 + digits]
            .iter()
            .collect::<String>()
            .parse()
            .ok()?;
        if group > self.captures {
            return None;
        }
        self.pos = start + 1 + digits;
        Some(group)
    }

    /// Escapes standing for one character, valid inside and outside classes.
    fn char_escape(&mut self, ch: char, start: usize) -> Result<char, ScriptRegexError> {
        let literal = match ch {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'f' => '\u{0C}',
            'v' => '\u{0B}',
            '0'..='7' => self.octal(ch),
            'x' => match self.hex(2) {
                Some(value) => char::from_u32(value).ok_or(ScriptRegexError::InvalidEscape(start))?,
                None => 'x',
            },
            'u' => match self.hex(4) {
                Some(value) => self.utf16_unit(value, start)?,
                None => 'u',
            },
            'c' => match self.peek() {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    self.pos += 1;
                    char::from(letter as u8 % 32)
                }
                // A lone `\c` is a backslash followed by a plain `c`.
                _ => {
                    self.pos -= 1;
                    '\\'
                }
            },
            other => other,
        };
        Ok(literal)
    }

    fn octal(&mut self, first: char) -> char {
        let mut value = first.to_digit(8).unwrap_or(0);
        let max_len = if value <= 3 { 3 } else { 2 };
        for _ in 1..max_len {
            match self.peek().and_then(|ch| ch.to_digit(8)) {
                Some(digit) => {
                    value = value * 8 + digit;
                    self.pos += 1;
                }
                None => break,
            }
        }
        char::from(value as u8)
    }

    fn hex(&mut self, len: usize) -> Option<u32> {
        let digits = self.chars.get(self.pos..self.pos + len)?;
        let mut value = 0;
        for ch in digits {
            value = value * 16 + ch.to_digit(16)?;
        }
        self.pos += len;
        Some(value)
    }

    /// `\uHHHH`, joining a surrogate pair written as two escapes.
    fn utf16_unit(&mut self, unit: u32, start: usize) -> Result<char, ScriptRegexError> {
        if !(SURROGATES.0..=SURROGATES.1).contains(&unit) {
            return char::from_u32(unit).ok_or(ScriptRegexError::InvalidEscape(start));
        }
        let resume = self.pos;
        if unit < 0xDC00 && self.eat("\\u") {
            if let Some(low @ 0xDC00..=0xDFFF) = self.hex(4) {
                let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(code).ok_or(ScriptRegexError::InvalidEscape(start));
            }
        }
        self.pos = resume;
        Err(ScriptRegexError::InvalidEscape(start))
    }

    fn class(&mut self) -> Result<(), ScriptRegexError> {
        let negated = self.eat("^");
        let mut ranges = Vec::new();
        loop {
            let start = self.pos;
            let first = match self.bump() {
                None => return Err(ScriptRegexError::UnterminatedClass),
                Some(']') => break,
                Some(ch) => self.class_atom(ch, start)?,
            };

            let is_range = self.peek() == Some('-')
                && self.chars.get(self.pos + 1).is_some_and(|next| *next != ']');
            if !is_range {
                first.add_to(&mut ranges);
                continue;
            }

            self.pos += 1;
            let at = self.pos;
            let ch = self.bump().ok_or(ScriptRegexError::UnterminatedClass)?;
            match (first, self.class_atom(ch, at)?) {
                (ClassAtom::Char(low), ClassAtom::Char(high)) => {
                    if low > high {
                        return Err(ScriptRegexError::RangeOutOfOrder(start));
                    }
                    ranges.push((low as u32, high as u32));
                }
                // A set next to `-` leaves the dash literal.
                (low, high) => {
                    low.add_to(&mut ranges);
                    ranges.push(('-' as u32, '-' as u32));
                    high.add_to(&mut ranges);
                }
            }
        }

        let ranges = if negated {
            complement(&ranges)
        } else {
            normalize(ranges)
        };
        push_ranges(&mut self.out, &ranges);
        Ok(())
    }

    fn class_atom(&mut self, ch: char, start: usize) -> Result<ClassAtom, ScriptRegexError> {
        if ch != '\\' {
            return Ok(ClassAtom::Char(ch));
        }
        let escaped = self.bump().ok_or(ScriptRegexError::UnterminatedClass)?;
        if let Some(set) = class_escape(escaped) {
            return Ok(ClassAtom::Set(set));
        }
        // Inside a class `\b` is a backspace.
        if escaped == 'b' {
            return Ok(ClassAtom::Char('\u{08}'));
        }
        Ok(ClassAtom::Char(self.char_escape(escaped, start)?))
    }
}

fn class_escape(ch: char) -> Option<Ranges> {
    let set = match ch {
        'd' => DIGIT.to_vec(),
        'D' => complement(DIGIT),
        'w' => WORD.to_vec(),
        'W' => complement(WORD),
        's' => SPACE.to_vec(),
        'S' => complement(SPACE),
        _ => return None,
    };
    Some(set)
}

/// Length of a `{n}`, `{n,}` or `{n,m}` quantifier starting at `at`.
fn brace_quantifier_len(chars: &[char], at: usize) -> Option<usize> {
    let rest = chars.get(at + 1..)?;
    let min = rest.iter().take_while(|ch| ch.is_ascii_digit()).count();
    if min == 0 {
        return None;
    }
    let mut len = min;
    if rest.get(len) == Some(&',') {
        len += 1;
        len += rest[len..].iter().take_while(|ch| ch.is_ascii_digit()).count();
    }
    (rest.get(len) == Some(&'}')).then_some(len + 2)
}

/// Number of capturing groups and whether any of them is named.
fn count_captures(chars: &[char]) -> (usize, bool) {
    let mut count = 0;
    let mut named = false;
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class => match (chars.get(i + 1), chars.get(i + 2), chars.get(i + 3)) {
                (Some('?'), Some('<'), Some(next)) if *next != '=' && *next != '!' => {
                    count += 1;
                    named = true;
                }
                (Some('?'), _, _) => {}
                _ => count += 1,
            },
            _ => {}
        }
        i += 1;
    }
    (count, named)
}

fn normalize(mut ranges: Ranges) -> Ranges {
    ranges.sort_unstable();
    let mut merged: Ranges = Vec::with_capacity(ranges.len());
    for (low, high) in ranges {
        match merged.last_mut() {
            Some(last) if low <= last.1.saturating_add(1) => last.1 = last.1.max(high),
            _ => merged.push((low, high)),
        }
    }
    merged
}

fn complement(ranges: &[(u32, u32)]) -> Ranges {
    let mut result = Vec::new();
    let mut next = 0u32;
    for (low, high) in normalize(ranges.to_vec()) {
        if low > next {
            result.push((next, low - 1));
        }
        next = high + 1;
    }
    if next <= MAX_CHAR {
        result.push((next, MAX_CHAR));
    }
    result
}

fn push_char(out: &mut String, ch: char) {
    out.push_str(&format!(r"\x{{{:X}}}", ch as u32));
}

/// Emit a class; surrogate code points are not characters and are skipped.
fn push_ranges(out: &mut String, ranges: &[(u32, u32)]) {
    let mut body = String::new();
    for &(low, high) in ranges {
        let low = if (SURROGATES.0..=SURROGATES.1).contains(&low) { SURROGATES.1 + 1 } else { low };
        let high = if (SURROGATES.0..=SURROGATES.1).contains(&high) { SURROGATES.0 - 1 } else { high };
        let (Some(first), Some(last)) = (char::from_u32(low), char::from_u32(high)) else {
            continue;
        };
        if first > last {
            continue;
        }
        push_char(&mut body, first);
        if last != first {
            body.push('-');
            push_char(&mut body, last);
        }
    }
    if body.is_empty() {
        out.push_str(EMPTY_CLASS);
    } else {
        out.push('[');
        out.push_str(&body);
        out.push(']');
    }
}
