//! Character classes.
//!
//! A class is a set of inclusive ranges plus optional named categories, with
//! an overall negation flag. The emitter interrogates the shape of a class
//! (one char, one range, a few enumerable chars, a lone category) to pick the
//! cheapest inline test; everything else falls back to the runtime matcher.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive character range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharRange {
    pub first: char,
    pub last: char,
}

impl CharRange {
    pub fn new(first: char, last: char) -> Self {
        Self { first, last }
    }

    pub fn len(&self) -> usize {
        self.last as usize - self.first as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Named character categories understood by the runtime helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharCategory {
    Word,
    NotWord,
    Digit,
    NotDigit,
    Space,
    NotSpace,
}

impl CharCategory {
    pub fn description(self) -> &'static str {
        match self {
            CharCategory::Word => "\\w",
            CharCategory::NotWord => "\\W",
            CharCategory::Digit => "\\d",
            CharCategory::NotDigit => "\\D",
            CharCategory::Space => "\\s",
            CharCategory::NotSpace => "\\S",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharClass {
    #[serde(default)]
    negated: bool,
    #[serde(default)]
    ranges: Vec<CharRange>,
    #[serde(default)]
    categories: Vec<CharCategory>,
}

impl CharClass {
    pub fn new(negated: bool, ranges: Vec<CharRange>, categories: Vec<CharCategory>) -> Self {
        Self {
            negated,
            ranges,
            categories,
        }
    }

    /// The `.` class under the Singleline option: matches every character.
    pub fn anything() -> Self {
        Self::new(false, vec![CharRange::new('\0', char::MAX)], Vec::new())
    }

    /// The default `.` class: every character except `\n`.
    pub fn any_but_newline() -> Self {
        Self::new(true, vec![CharRange::new('\n', '\n')], Vec::new())
    }

    pub fn from_chars(chars: &[char]) -> Self {
        Self::new(
            false,
            chars.iter().map(|&c| CharRange::new(c, c)).collect(),
            Vec::new(),
        )
    }

    pub fn from_range(first: char, last: char) -> Self {
        Self::new(false, vec![CharRange::new(first, last)], Vec::new())
    }

    pub fn word() -> Self {
        Self::new(false, Vec::new(), vec![CharCategory::Word])
    }

    pub fn digit() -> Self {
        Self::new(false, Vec::new(), vec![CharCategory::Digit])
    }

    pub fn space() -> Self {
        Self::new(false, Vec::new(), vec![CharCategory::Space])
    }

    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn ranges(&self) -> &[CharRange] {
        &self.ranges
    }

    pub fn categories(&self) -> &[CharCategory] {
        &self.categories
    }

    /// True when the class matches every possible character.
    pub fn is_anything(&self) -> bool {
        if self.negated {
            return self.ranges.is_empty() && self.categories.is_empty();
        }
        self.categories.is_empty()
            && self.ranges.len() == 1
            && self.ranges[0].first == '\0'
            && self.ranges[0].last == char::MAX
    }

    /// The class's ranges when it consists of exactly `n` plain ranges and
    /// nothing else.
    pub fn get_if_n_ranges(&self, n: usize) -> Option<&[CharRange]> {
        if self.categories.is_empty() && self.ranges.len() == n {
            Some(&self.ranges)
        } else {
            None
        }
    }

    /// Enumerates the class's members when they are few enough; `None` when
    /// the class uses categories or has more than `max` characters. The
    /// negation flag is not applied; callers consult `is_negated`.
    pub fn get_set_chars(&self, max: usize) -> Option<Vec<char>> {
        if !self.categories.is_empty() {
            return None;
        }
        let total: usize = self.ranges.iter().map(CharRange::len).sum();
        if total == 0 || total > max {
            return None;
        }
        let mut chars = Vec::with_capacity(total);
        for range in &self.ranges {
            let mut c = range.first;
            loop {
                chars.push(c);
                if c == range.last {
                    break;
                }
                c = char::from_u32(c as u32 + 1)?;
            }
        }
        Some(chars)
    }

    /// The lone category when the class is exactly one category and nothing
    /// else, folding the outer negation in.
    pub fn get_if_only_category(&self) -> Option<(CharCategory, bool)> {
        if self.ranges.is_empty() && self.categories.len() == 1 {
            Some((self.categories[0], self.negated))
        } else {
            None
        }
    }
}

impl fmt::Display for CharClass {
    /// Canonical pattern text, also used by the runtime `CharInClass` helper.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anything() {
            return write!(f, "{}", if self.negated { "[^]" } else { "." });
        }
        if !self.negated && self.ranges.is_empty() && self.categories.len() == 1 {
            return write!(f, "{}", self.categories[0].description());
        }

        write!(f, "[")?;
        if self.negated {
            write!(f, "^")?;
        }
        for range in &self.ranges {
            if range.first == range.last {
                write_class_char(f, range.first)?;
            } else {
                write_class_char(f, range.first)?;
                write!(f, "-")?;
                write_class_char(f, range.last)?;
            }
        }
        for category in &self.categories {
            write!(f, "{}", category.description())?;
        }
        write!(f, "]")
    }
}

fn write_class_char(f: &mut fmt::Formatter<'_>, ch: char) -> fmt::Result {
    match ch {
        '\\' | ']' | '^' | '-' => write!(f, "\\{ch}"),
        '\n' => write!(f, "\\n"),
        '\r' => write!(f, "\\r"),
        '\t' => write!(f, "\\t"),
        c if (c as u32) < 0x20 || c == char::MAX => write!(f, "\\u{:04X}", c as u32),
        c => write!(f, "{c}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anything_matches_everything() {
        assert!(CharClass::anything().is_anything());
        assert!(!CharClass::digit().is_anything());
        assert!(!CharClass::any_but_newline().is_anything());
    }

    #[test]
    fn set_chars_enumerates_small_classes() {
        let class = CharClass::from_chars(&['a', 'b', 'c']);
        assert_eq!(class.get_set_chars(64), Some(vec!['a', 'b', 'c']));

        let wide = CharClass::from_range('a', 'z');
        assert_eq!(wide.get_set_chars(5), None);
        assert_eq!(wide.get_set_chars(26).map(|v| v.len()), Some(26));

        assert_eq!(CharClass::word().get_set_chars(64), None);
    }

    #[test]
    fn n_ranges_only_for_plain_ranges() {
        let class = CharClass::from_range('0', '9');
        let ranges = class.get_if_n_ranges(1).unwrap();
        assert_eq!(ranges[0], CharRange::new('0', '9'));
        assert!(class.get_if_n_ranges(2).is_none());
        assert!(CharClass::digit().get_if_n_ranges(1).is_none());
    }

    #[test]
    fn display_renders_canonical_pattern() {
        assert_eq!(CharClass::from_range('a', 'z').to_string(), "[a-z]");
        assert_eq!(
            CharClass::from_chars(&['x', 'y']).negated().to_string(),
            "[^xy]"
        );
        assert_eq!(CharClass::digit().to_string(), "\\d");
        assert_eq!(CharClass::anything().to_string(), ".");
    }
}
