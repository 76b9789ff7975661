// src/query/cmp.rs

//! Comparison operators and the matchers they compile to

use crate::error::{Error, Result};
use regex::{Regex, RegexSet, RegexSetBuilder};
use std::collections::HashSet;
use std::fmt;

/// Comparison applied by a query filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryCmp {
    /// Case-sensitive equality
    #[default]
    Eq,
    Neq,
    /// Case-insensitive equality
    IEq,
    /// `fnmatch`-style glob anchored to the whole value; `*` crosses `/`
    Glob,
    NotGlob,
    IGlob,
    /// Regular expression anchored to the whole value
    Regex,
    IRegex,
    Contains,
    IContains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl QueryCmp {
    /// Whether the comparison inverts its positive counterpart
    pub fn is_negated(self) -> bool {
        matches!(self, QueryCmp::Neq | QueryCmp::NotGlob)
    }
}

impl fmt::Display for QueryCmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

enum StringPattern {
    Exact(HashSet<String>),
    /// Lowercased patterns
    IExact(HashSet<String>),
    /// Globs and regexes, anchored
    Regex(RegexSet),
    Contains(Vec<String>),
    /// Lowercased patterns
    IContains(Vec<String>),
    StartsWith(Vec<String>),
    EndsWith(Vec<String>),
}

/// String predicate compiled when a filter is attached.
///
/// A value matches when it matches any pattern; negated comparisons match
/// when no pattern matches.
pub(crate) struct StringMatcher {
    pattern: StringPattern,
    negate: bool,
}

impl StringMatcher {
    pub(crate) fn new<S: AsRef<str>>(
        filter: &'static str,
        cmp: QueryCmp,
        patterns: &[S],
    ) -> Result<Self> {
        let owned = || patterns.iter().map(|p| p.as_ref().to_string());
        let lowered = || patterns.iter().map(|p| p.as_ref().to_lowercase());

        let pattern = match cmp {
            QueryCmp::Eq | QueryCmp::Neq => StringPattern::Exact(owned().collect()),
            QueryCmp::IEq => StringPattern::IExact(lowered().collect()),
            QueryCmp::Glob | QueryCmp::NotGlob => {
                StringPattern::Regex(build_globs(patterns, false)?)
            }
            QueryCmp::IGlob => StringPattern::Regex(build_globs(patterns, true)?),
            QueryCmp::Regex => StringPattern::Regex(build_regexes(patterns, false)?),
            QueryCmp::IRegex => StringPattern::Regex(build_regexes(patterns, true)?),
            QueryCmp::Contains => StringPattern::Contains(owned().collect()),
            QueryCmp::IContains => StringPattern::IContains(lowered().collect()),
            QueryCmp::StartsWith => StringPattern::StartsWith(owned().collect()),
            QueryCmp::EndsWith => StringPattern::EndsWith(owned().collect()),
            QueryCmp::Gt | QueryCmp::Gte | QueryCmp::Lt | QueryCmp::Lte => {
                return Err(Error::UnsupportedCmp { filter, cmp });
            }
        };

        Ok(Self {
            pattern,
            negate: cmp.is_negated(),
        })
    }

    pub(crate) fn is_match(&self, value: &str) -> bool {
        self.positive(value) != self.negate
    }

    /// Match a multi-valued attribute: any value matching counts, then negation applies
    pub(crate) fn is_match_any<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> bool {
        values.into_iter().any(|v| self.positive(v)) != self.negate
    }

    fn positive(&self, value: &str) -> bool {
        match &self.pattern {
            StringPattern::Exact(set) => set.contains(value),
            StringPattern::IExact(set) => set.contains(&value.to_lowercase()),
            StringPattern::Regex(set) => set.is_match(value),
            StringPattern::Contains(subs) => subs.iter().any(|s| value.contains(s.as_str())),
            StringPattern::IContains(subs) => {
                let value = value.to_lowercase();
                subs.iter().any(|s| value.contains(s.as_str()))
            }
            StringPattern::StartsWith(prefixes) => {
                prefixes.iter().any(|p| value.starts_with(p.as_str()))
            }
            StringPattern::EndsWith(suffixes) => {
                suffixes.iter().any(|s| value.ends_with(s.as_str()))
            }
        }
    }
}

fn build_globs<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> Result<RegexSet> {
    RegexSetBuilder::new(patterns.iter().map(|p| glob_to_regex(p.as_ref())))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| Error::InvalidPattern(e.to_string()))
}

fn build_regexes<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> Result<RegexSet> {
    // each pattern alone, so `a)|(b` cannot escape the anchors
    for pattern in patterns {
        Regex::new(pattern.as_ref()).map_err(|e| Error::InvalidPattern(e.to_string()))?;
    }
    RegexSetBuilder::new(patterns.iter().map(|p| format!("^(?:{})$", p.as_ref())))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| Error::InvalidPattern(e.to_string()))
}

/// Translate an `fnmatch` pattern (no flags) into an anchored regex.
///
/// `*` and `?` work on characters, not bytes. Braces are literal.
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("^(?s:");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                push_literal(&mut out, chars[i]);
            }
            '[' => match bracket_class(&chars, i + 1) {
                Some((class, end)) => {
                    out.push_str(&class);
                    i = end;
                }
                None => push_literal(&mut out, '['),
            },
            c => push_literal(&mut out, c),
        }
        i += 1;
    }
    out.push_str(")$");
    out
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Bracket expression starting after `[`; returns the regex class and the
/// index of the closing `]`, or `None` when unclosed.
fn bracket_class(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start;
    let mut class = String::from("[");
    if matches!(chars.get(i), Some('!' | '^')) {
        class.push('^');
        i += 1;
    }
    let first = i;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && i > first {
            class.push(']');
            return Some((class, i));
        }
        let is_range = c == '-' && i > first && chars.get(i + 1).is_some_and(|&n| n != ']');
        if is_range {
            class.push('-');
        } else if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
            class.push('\\');
            class.push(c);
        } else {
            class.push(c);
        }
        i += 1;
    }
}

/// Numeric predicate; a value matches when the comparison holds against any operand
pub(crate) struct NumberMatcher {
    cmp: QueryCmp,
    operands: Vec<i64>,
}

impl NumberMatcher {
    pub(crate) fn new(filter: &'static str, cmp: QueryCmp, operands: &[i64]) -> Result<Self> {
        match cmp {
            QueryCmp::Eq
            | QueryCmp::Neq
            | QueryCmp::Gt
            | QueryCmp::Gte
            | QueryCmp::Lt
            | QueryCmp::Lte => Ok(Self {
                cmp,
                operands: operands.to_vec(),
            }),
            _ => Err(Error::UnsupportedCmp { filter, cmp }),
        }
    }

    pub(crate) fn is_match(&self, value: i64) -> bool {
        let mut ops = self.operands.iter().copied();
        match self.cmp {
            QueryCmp::Eq => ops.any(|o| value == o),
            QueryCmp::Neq => !ops.any(|o| value == o),
            QueryCmp::Gt => ops.any(|o| value > o),
            QueryCmp::Gte => ops.any(|o| value >= o),
            QueryCmp::Lt => ops.any(|o| value < o),
            QueryCmp::Lte => ops.any(|o| value <= o),
            _ => false,
        }
    }
}
