//! Query model: the tag matchers a filter inspects.
//!
//! A [`FetchQuery`] is an ordered list of [`TagMatcher`]s. Filters only care
//! about which matchers are present and which label each one targets; order is
//! irrelevant. Names and values are raw bytes, as the storage layer sees them.
//!
//! `TagMatcher` parses from and renders as the familiar selector syntax:
//!
//! ```
//! use routefilter::{MatchType, TagMatcher};
//!
//! let m: TagMatcher = r#"__storage_name__=~"shard-a|shard-b""#.parse().unwrap();
//! assert_eq!(m.match_type(), MatchType::Regexp);
//! assert_eq!(m.value(), b"shard-a|shard-b");
//! assert_eq!(m.to_string(), r#"__storage_name__=~"shard-a|shard-b""#);
//! ```

use crate::ParseError;
use std::fmt;
use std::str::FromStr;

/// How a [`TagMatcher`] compares its label against its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchType {
    /// `name="value"`
    Equal,
    /// `name!="value"`
    NotEqual,
    /// `name=~"pattern"`
    Regexp,
    /// `name!~"pattern"`
    NotRegexp,
}

impl MatchType {
    /// The selector operator for this match type.
    #[must_use]
    pub fn operator(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Regexp => "=~",
            Self::NotRegexp => "!~",
        }
    }

    /// Whether this match type inverts its positive counterpart.
    #[must_use]
    pub fn is_negated(self) -> bool {
        matches!(self, Self::NotEqual | Self::NotRegexp)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

/// A single tag matcher: `name <op> value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct TagMatcher {
    match_type: MatchType,
    name: Vec<u8>,
    value: Vec<u8>,
}

impl TagMatcher {
    /// Create a matcher from its parts.
    pub fn new(match_type: MatchType, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            match_type,
            name: name.into(),
            value: value.into(),
        }
    }

    /// `name="value"`
    pub fn equal(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(MatchType::Equal, name, value)
    }

    /// `name!="value"`
    pub fn not_equal(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(MatchType::NotEqual, name, value)
    }

    /// `name=~"pattern"`
    pub fn regexp(name: impl Into<Vec<u8>>, pattern: impl Into<Vec<u8>>) -> Self {
        Self::new(MatchType::Regexp, name, pattern)
    }

    /// `name!~"pattern"`
    pub fn not_regexp(name: impl Into<Vec<u8>>, pattern: impl Into<Vec<u8>>) -> Self {
        Self::new(MatchType::NotRegexp, name, pattern)
    }

    #[must_use]
    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// The label key this matcher targets.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// The literal (Equal/NotEqual) or pattern (Regexp/NotRegexp).
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

impl fmt::Display for TagMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = String::from_utf8_lossy(&self.value);
        write!(
            f,
            "{}{}\"{}\"",
            String::from_utf8_lossy(&self.name),
            self.match_type,
            value.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }
}

impl FromStr for TagMatcher {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let missing_operator = || ParseError::MissingOperator {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        let op_start = trimmed.find(['=', '!']).ok_or_else(missing_operator)?;
        let (name, rest) = trimmed.split_at(op_start);

        // Two-byte operators first: "=~" must not be read as "=" + "~...".
        let (match_type, raw_value) = if let Some(v) = rest.strip_prefix("=~") {
            (MatchType::Regexp, v)
        } else if let Some(v) = rest.strip_prefix("!~") {
            (MatchType::NotRegexp, v)
        } else if let Some(v) = rest.strip_prefix("!=") {
            (MatchType::NotEqual, v)
        } else if let Some(v) = rest.strip_prefix('=') {
            (MatchType::Equal, v)
        } else {
            return Err(missing_operator());
        };

        let name = name.trim();
        if !is_valid_label_name(name) {
            return Err(ParseError::InvalidLabelName {
                name: name.to_string(),
            });
        }

        let value = unquote(raw_value.trim(), input)?;
        Ok(Self::new(match_type, name, value))
    }
}

impl TryFrom<String> for TagMatcher {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TagMatcher> for String {
    fn from(matcher: TagMatcher) -> Self {
        matcher.to_string()
    }
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip surrounding double quotes, resolving `\"` and `\\`.
///
/// Other escapes are kept verbatim so regex escapes like `\.` survive unquoting.
/// Unquoted values are taken as-is.
fn unquote(raw: &str, input: &str) -> Result<String, ParseError> {
    let Some(body) = raw.strip_prefix('"') else {
        return Ok(raw.to_string());
    };

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            '"' if chars.as_str().is_empty() => return Ok(out),
            '"' => break,
            c => out.push(c),
        }
    }

    Err(ParseError::UnterminatedQuote {
        input: input.to_string(),
    })
}

/// The tag matchers of one logical query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FetchQuery {
    matchers: Vec<TagMatcher>,
}

impl FetchQuery {
    /// Create a query with no matchers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a matcher (builder pattern).
    #[must_use]
    pub fn with(mut self, matcher: TagMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    #[must_use]
    pub fn matchers(&self) -> &[TagMatcher] {
        &self.matchers
    }

    /// Matchers whose label key equals `name`.
    pub fn matchers_for<'a>(&'a self, name: &'a [u8]) -> impl Iterator<Item = &'a TagMatcher> + 'a {
        self.matchers.iter().filter(move |m| m.name() == name)
    }
}

impl From<Vec<TagMatcher>> for FetchQuery {
    fn from(matchers: Vec<TagMatcher>) -> Self {
        Self { matchers }
    }
}

impl FromIterator<TagMatcher> for FetchQuery {
    fn from_iter<I: IntoIterator<Item = TagMatcher>>(iter: I) -> Self {
        Self {
            matchers: iter.into_iter().collect(),
        }
    }
}
