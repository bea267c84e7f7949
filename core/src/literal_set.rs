//! `LiteralSet`: routing patterns as a set of literal rules.
//!
//! Routing hints use a tiny subset of regex: a flat alternation of literals,
//! each optionally ending in `.*`. This module recognizes exactly that subset
//! and nothing more. It is deliberately not a regex engine: any other shape
//! falls back to [`LiteralRule::MatchAny`], which can only cause an extra
//! backend query, never a dropped result.
//!
//! # Grammar
//!
//! ```text
//! pattern     = alternative ( "|" alternative )*
//! alternative = ".*"                     → MatchAny (whole pattern)
//!             | literal ".*"             → PrefixWildcard(literal)
//!             | literal                  → Exact(literal)
//! literal     = ( plain-byte | "\" meta )*
//! ```
//!
//! A `plain-byte` is anything except `\ . + * ? ( ) [ ] { } ^ $ |`.
//!
//! # Evaluation
//!
//! Backend names look like `<environment>-<cloud>-<identity>`, so rules are
//! matched against the tail of the name:
//!
//! | Rule | Matches candidate `s` when |
//! |------|----------------------------|
//! | `Exact(l)` | `s` ends with `l` |
//! | `PrefixWildcard(l)` | `s` contains `l` |
//! | `MatchAny` | always |

use crate::MAX_PATTERN_LENGTH;
use std::fmt;

/// One alternative of a routing pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralRule {
    /// A literal alternative; matches names ending with it.
    Exact(Vec<u8>),
    /// A literal followed by `.*`; matches names containing it.
    PrefixWildcard(Vec<u8>),
    /// Matches every name.
    MatchAny,
}

impl LiteralRule {
    /// Evaluate this rule against a candidate backend name.
    #[must_use]
    pub fn matches(&self, candidate: &[u8]) -> bool {
        match self {
            Self::Exact(literal) => candidate.ends_with(literal),
            Self::PrefixWildcard(literal) => contains(candidate, literal),
            Self::MatchAny => true,
        }
    }
}

impl fmt::Display for LiteralRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(l) => write!(f, "Exact(\"{}\")", String::from_utf8_lossy(l)),
            Self::PrefixWildcard(l) => {
                write!(f, "PrefixWildcard(\"{}\")", String::from_utf8_lossy(l))
            }
            Self::MatchAny => f.write_str("MatchAny"),
        }
    }
}

/// A parsed routing pattern: rules combined with OR.
///
/// # INV: fallback is conservative
///
/// When the pattern is not in the recognized grammar, the set is a lone
/// [`LiteralRule::MatchAny`] with [`is_fallback()`](Self::is_fallback) set.
/// Callers negating the result (`!~`) must check the flag: negating an
/// unrecognized pattern proves nothing.
///
/// # Example
///
/// ```
/// use routefilter::{LiteralRule, LiteralSet};
///
/// let set = LiteralSet::parse("shard-a|shard-a-.*");
/// assert_eq!(
///     set.rules(),
///     &[
///         LiteralRule::Exact(b"shard-a".to_vec()),
///         LiteralRule::PrefixWildcard(b"shard-a-".to_vec()),
///     ]
/// );
/// assert!(set.matches(b"prod-aws-shard-a"));
/// assert!(set.matches(b"prod-aws-shard-a-aa"));
/// assert!(!set.matches(b"prod-aws-shard-aa"));
///
/// let set = LiteralSet::parse("shard-[ab]");
/// assert!(set.is_fallback());
/// assert!(set.matches(b"anything"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralSet {
    rules: Vec<LiteralRule>,
    fallback: bool,
}

impl LiteralSet {
    /// Parse a routing pattern. Never fails; see the module docs for the grammar.
    pub fn parse(pattern: impl AsRef<[u8]>) -> Self {
        let pattern = pattern.as_ref();
        if pattern.len() > MAX_PATTERN_LENGTH {
            tracing::debug!(
                len = pattern.len(),
                max = MAX_PATTERN_LENGTH,
                "routing pattern too long, matching all backends"
            );
            return Self::fallback();
        }

        let mut rules = Vec::new();
        for alternative in split_alternatives(pattern) {
            match classify(alternative) {
                Some(LiteralRule::MatchAny) => return Self::match_any(),
                Some(rule) => rules.push(rule),
                None => {
                    tracing::debug!(
                        pattern = %String::from_utf8_lossy(pattern),
                        alternative = %String::from_utf8_lossy(alternative),
                        "unrecognized routing pattern, matching all backends"
                    );
                    return Self::fallback();
                }
            }
        }
        Self {
            rules,
            fallback: false,
        }
    }

    fn match_any() -> Self {
        Self {
            rules: vec![LiteralRule::MatchAny],
            fallback: false,
        }
    }

    fn fallback() -> Self {
        Self {
            rules: vec![LiteralRule::MatchAny],
            fallback: true,
        }
    }

    /// True if any rule matches the candidate.
    #[must_use]
    pub fn matches(&self, candidate: &[u8]) -> bool {
        self.rules.iter().any(|rule| rule.matches(candidate))
    }

    /// The parsed rules, in pattern order.
    #[must_use]
    pub fn rules(&self) -> &[LiteralRule] {
        &self.rules
    }

    /// True if the set matches every candidate.
    #[must_use]
    pub fn is_match_any(&self) -> bool {
        self.rules.contains(&LiteralRule::MatchAny)
    }

    /// True if the pattern was outside the recognized grammar.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

impl fmt::Display for LiteralSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{rule}")?;
        }
        if self.fallback {
            f.write_str(" (fallback)")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Bytes with regex meaning outside a character class. `|` is handled by the splitter.
fn is_meta(b: u8) -> bool {
    matches!(
        b,
        b'\\' | b'.' | b'+' | b'*' | b'?' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'^' | b'$'
    )
}

/// Bytes that may follow a backslash and stand for themselves.
fn is_escapable(b: u8) -> bool {
    is_meta(b) || matches!(b, b'|' | b'-' | b'#' | b'&' | b'~')
}

/// Split on unescaped `|`.
fn split_alternatives(pattern: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            b'\\' => i += 2,
            b'|' => {
                out.push(&pattern[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push(&pattern[start.min(pattern.len())..]);
    out
}

/// Classify one alternative, or `None` if it uses unsupported regex syntax.
fn classify(alternative: &[u8]) -> Option<LiteralRule> {
    if alternative == b".*" {
        return Some(LiteralRule::MatchAny);
    }

    let mut literal = Vec::with_capacity(alternative.len());
    let mut i = 0;
    while i < alternative.len() {
        match alternative[i] {
            b'\\' => {
                let escaped = *alternative.get(i + 1)?;
                if !is_escapable(escaped) {
                    return None;
                }
                literal.push(escaped);
                i += 2;
            }
            b'.' if &alternative[i..] == b".*" => {
                return Some(LiteralRule::PrefixWildcard(literal));
            }
            b if is_meta(b) => return None,
            b => {
                literal.push(b);
                i += 1;
            }
        }
    }
    Some(LiteralRule::Exact(literal))
}

/// Substring search over bytes, linear in `haystack.len() + needle.len()`.
/// The empty needle is contained everywhere.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    memchr::memmem::find(haystack, needle).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(l: &str) -> LiteralRule {
        LiteralRule::Exact(l.as_bytes().to_vec())
    }

    fn wildcard(l: &str) -> LiteralRule {
        LiteralRule::PrefixWildcard(l.as_bytes().to_vec())
    }

    #[test]
    fn parse_literal_alternation() {
        let set = LiteralSet::parse("shard-a|shard-b-bb-bbb|shard-c-ccc-d");
        assert_eq!(
            set.rules(),
            &[exact("shard-a"), exact("shard-b-bb-bbb"), exact("shard-c-ccc-d")]
        );
        assert!(!set.is_fallback());
        assert!(!set.is_match_any());
    }

    #[test]
    fn parse_trailing_wildcard() {
        let set = LiteralSet::parse("shard-a|shard-a-.*");
        assert_eq!(set.rules(), &[exact("shard-a"), wildcard("shard-a-")]);
    }

    #[test]
    fn parse_match_any_stops_early() {
        let set = LiteralSet::parse("shard-a|.*|shard-[b");
        assert_eq!(set.rules(), &[LiteralRule::MatchAny]);
        assert!(set.is_match_any());
        assert!(!set.is_fallback());
    }

    #[test]
    fn parse_escapes() {
        let set = LiteralSet::parse(r"shard\.a|a\|b|c\-d.*");
        assert_eq!(set.rules(), &[exact("shard.a"), exact("a|b"), wildcard("c-d")]);
    }

    #[test]
    fn escaped_dot_star_is_not_a_wildcard() {
        // `\.*` means "zero or more literal dots", which is not in the grammar.
        assert!(LiteralSet::parse(r"shard\.*").is_fallback());
    }

    #[test]
    fn unsupported_shapes_fall_back() {
        for pattern in [
            "shard-[ab]",
            "^shard-a$",
            "(shard-a|shard-b)",
            "shard-a+",
            "shard-?",
            "shard.a",
            "shard-a.*.*",
            "shard{2}",
            r"shard-\d",
            "shard-a\\",
            ".+",
        ] {
            let set = LiteralSet::parse(pattern);
            assert!(set.is_fallback(), "{pattern} should fall back");
            assert!(set.matches(b"anything"), "{pattern} should match anything");
        }
    }

    #[test]
    fn one_bad_alternative_poisons_the_pattern() {
        let set = LiteralSet::parse("shard-a|shard-[b]");
        assert!(set.is_fallback());
        assert!(set.matches(b"prod-aws-shard-z"));
    }

    #[test]
    fn oversized_pattern_falls_back() {
        let pattern = "a".repeat(MAX_PATTERN_LENGTH + 1);
        assert!(LiteralSet::parse(&pattern).is_fallback());
    }

    #[test]
    fn pattern_at_length_limit_is_parsed() {
        let pattern = "a".repeat(MAX_PATTERN_LENGTH);
        let set = LiteralSet::parse(&pattern);
        assert!(!set.is_fallback());
        assert_eq!(set.rules(), &[exact(&pattern)]);
    }

    #[test]
    fn wildcard_near_miss_on_long_name() {
        let literal = format!("{}b", "a".repeat(MAX_PATTERN_LENGTH - 4));
        let set = LiteralSet::parse(format!("{literal}.*"));
        assert_eq!(set.rules(), &[wildcard(&literal)]);

        let mut name = vec![b'a'; 200_000];
        assert!(!set.matches(&name));
        name.push(b'b');
        assert!(set.matches(&name));
    }

    #[test]
    fn contains_handles_edges() {
        assert!(contains(b"", b""));
        assert!(contains(b"shard", b""));
        assert!(!contains(b"", b"a"));
        assert!(!contains(b"ab", b"abc"));
        assert!(contains(b"prod-shard-a-7", b"shard-a-"));
    }

    #[test]
    fn empty_alternatives_match_everything() {
        assert!(LiteralSet::parse("").matches(b"prod-aws-shard-a"));
        assert!(LiteralSet::parse("shard-z|").matches(b"prod-aws-shard-a"));
    }

    #[test]
    fn exact_is_a_suffix_test() {
        let set = LiteralSet::parse("shard-a");
        assert!(set.matches(b"prod-aws-shard-a"));
        assert!(set.matches(b"shard-a"));
        assert!(!set.matches(b"prod-aws-shard-aa"));
        assert!(!set.matches(b"shard-a-prod"));
    }

    #[test]
    fn wildcard_is_a_contains_test() {
        let set = LiteralSet::parse("shard-a-.*");
        assert!(set.matches(b"prod-aws-shard-a-"));
        assert!(set.matches(b"prod-aws-shard-a-aa"));
        assert!(set.matches(b"shard-a-x-prod"));
        assert!(!set.matches(b"prod-aws-shard-a"));
    }

    #[test]
    fn concrete_shard_scenario() {
        let set = LiteralSet::parse("shard-a|shard-a-.*");
        assert!(set.matches(b"prod-aws-shard-a"));
        assert!(!set.matches(b"prod-aws-shard-aa"));
        assert!(set.matches(b"prod-aws-shard-a-"));
        assert!(set.matches(b"prod-aws-shard-a-aa"));
    }

    #[test]
    fn contains_edge_cases() {
        assert!(contains(b"abc", b""));
        assert!(contains(b"", b""));
        assert!(!contains(b"", b"a"));
        assert!(!contains(b"ab", b"abc"));
        assert!(contains(b"xabcx", b"abc"));
    }

    #[test]
    fn display() {
        assert_eq!(
            LiteralSet::parse("a|b.*").to_string(),
            r#"Exact("a") | PrefixWildcard("b")"#
        );
        assert_eq!(LiteralSet::parse("[a]").to_string(), "MatchAny (fallback)");
    }
}
