//! `ReadOptimizedFilter`: prune remote backends using routing hints.
//!
//! Queries may carry matchers on the reserved [`STORAGE_NAME_LABEL`] label.
//! These are routing hints, not metric data: `__storage_name__="oregon-dev"`
//! says only backends whose identity ends in `oregon-dev` can hold results.
//!
//! # Decision
//!
//! 1. Local backend → include (only remote fan-out is pruned).
//! 2. No matcher on the routing label → include.
//! 3. Otherwise every routing-hint matcher must allow the backend name:
//!
//! | Matcher | Allows name `n` when |
//! |---------|----------------------|
//! | `= V`  | `n` ends with `V` |
//! | `!= V` | `n` does not end with `V` |
//! | `=~ P` | [`LiteralSet::parse(P)`](LiteralSet::parse) matches `n` |
//! | `!~ P` | the rule set does not match `n`, or `P` was not recognized |
//!
//! Matchers on other labels are ignored; the backend resolves those against
//! real data.

use crate::{
    Backend, FetchQuery, FilterTrace, HintTrace, LiteralSet, Locality, MatchType, PatternCache,
    StorageFilter, TagMatcher, STORAGE_NAME_LABEL,
};
use std::sync::Arc;

/// Routing-hint filter. See the [module docs](self) for the decision table.
///
/// # Example
///
/// ```
/// use routefilter::prelude::*;
///
/// let filter = ReadOptimizedFilter::new().with_cache(256);
/// let query = FetchQuery::new().with(TagMatcher::equal(STORAGE_NAME_LABEL, "oregon-dev"));
///
/// assert!(filter.allows(&query, &BackendDescriptor::remote("fed-remote/dev-aws-oregon-dev")));
/// assert!(!filter.allows(&query, &BackendDescriptor::remote("fed-remote/dev-aws-us-east-1")));
/// assert!(filter.allows(&query, &BackendDescriptor::local("fed-local")));
/// ```
#[derive(Debug)]
pub struct ReadOptimizedFilter {
    label_key: Vec<u8>,
    cache: Option<PatternCache>,
}

impl ReadOptimizedFilter {
    /// Filter on [`STORAGE_NAME_LABEL`], parsing patterns on every call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            label_key: STORAGE_NAME_LABEL.as_bytes().to_vec(),
            cache: None,
        }
    }

    /// Read routing hints from a different label key.
    #[must_use]
    pub fn with_label_key(mut self, label_key: impl Into<Vec<u8>>) -> Self {
        self.label_key = label_key.into();
        self
    }

    /// Memoize parsed patterns, retaining at most `capacity` of them.
    #[must_use]
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = Some(PatternCache::with_capacity(capacity));
        self
    }

    /// The label key routing hints are read from.
    #[must_use]
    pub fn label_key(&self) -> &[u8] {
        &self.label_key
    }

    /// The pattern cache, if enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&PatternCache> {
        self.cache.as_ref()
    }

    fn literal_set(&self, pattern: &[u8]) -> Arc<LiteralSet> {
        match &self.cache {
            Some(cache) => cache.get_or_parse(pattern),
            None => Arc::new(LiteralSet::parse(pattern)),
        }
    }

    /// Whether one routing-hint matcher allows `name`.
    fn hint_allows(&self, hint: &TagMatcher, name: &[u8]) -> bool {
        match hint.match_type() {
            MatchType::Equal => name.ends_with(hint.value()),
            MatchType::NotEqual => !name.ends_with(hint.value()),
            MatchType::Regexp => self.literal_set(hint.value()).matches(name),
            MatchType::NotRegexp => {
                let set = self.literal_set(hint.value());
                // An unrecognized pattern proves nothing, so its negation can't exclude.
                set.is_fallback() || !set.matches(name)
            }
        }
    }

    fn trace_hint(&self, hint: &TagMatcher, name: &[u8]) -> HintTrace {
        let (rules, matched, allowed) = match hint.match_type() {
            MatchType::Equal | MatchType::NotEqual => {
                let matched = name.ends_with(hint.value());
                (None, matched, matched != hint.match_type().is_negated())
            }
            MatchType::Regexp | MatchType::NotRegexp => {
                let set = self.literal_set(hint.value());
                let matched = set.matches(name);
                let allowed = match hint.match_type() {
                    MatchType::NotRegexp => set.is_fallback() || !matched,
                    _ => matched,
                };
                (Some(set.to_string()), matched, allowed)
            }
        };
        HintTrace {
            matcher: hint.to_string(),
            rules,
            matched,
            allowed,
        }
    }
}

impl Default for ReadOptimizedFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageFilter for ReadOptimizedFilter {
    fn allows(&self, query: &FetchQuery, backend: &dyn Backend) -> bool {
        if backend.locality() == Locality::Local {
            return true;
        }

        let name = backend.name().as_bytes();
        let allowed = query
            .matchers_for(&self.label_key)
            .all(|hint| self.hint_allows(hint, name));
        if !allowed {
            tracing::debug!(
                backend = backend.name(),
                "backend ruled out by routing hint"
            );
        }
        allowed
    }

    fn allows_with_trace(&self, query: &FetchQuery, backend: &dyn Backend) -> FilterTrace {
        if backend.locality() == Locality::Local {
            return FilterTrace::LocalBypass;
        }

        let name = backend.name().as_bytes();
        let hints: Vec<HintTrace> = query
            .matchers_for(&self.label_key)
            .map(|hint| self.trace_hint(hint, name))
            .collect();
        if hints.is_empty() {
            return FilterTrace::NoRoutingHint {
                label: String::from_utf8_lossy(&self.label_key).into_owned(),
            };
        }

        FilterTrace::RoutingHint {
            allowed: hints.iter().all(|h| h.allowed),
            hints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackendDescriptor;

    const PREFIX: &str = "fed-remote/";

    fn remote(identity: &str) -> BackendDescriptor {
        BackendDescriptor::remote(format!("{PREFIX}{identity}"))
    }

    fn hint_query(hint: TagMatcher) -> FetchQuery {
        FetchQuery::new()
            .with(hint)
            .with(TagMatcher::regexp("some-other-label", "suffix-d"))
    }

    fn filters() -> [ReadOptimizedFilter; 2] {
        [ReadOptimizedFilter::new(), ReadOptimizedFilter::new().with_cache(16)]
    }

    #[test]
    fn local_always_included() {
        let local = BackendDescriptor::local("fed-local");
        for filter in &filters() {
            for hint in [
                TagMatcher::equal(STORAGE_NAME_LABEL, "nothing"),
                TagMatcher::not_equal(STORAGE_NAME_LABEL, "fed-local"),
                TagMatcher::regexp(STORAGE_NAME_LABEL, "nothing"),
                TagMatcher::not_regexp(STORAGE_NAME_LABEL, ".*"),
            ] {
                assert!(filter.allows(&hint_query(hint), &local));
            }
        }
    }

    #[test]
    fn no_hint_includes() {
        let query = FetchQuery::new().with(TagMatcher::equal("region", "oregon-dev"));
        for filter in &filters() {
            assert!(filter.allows(&query, &remote("dev-aws-us-east-1")));
            assert!(filter.allows(&FetchQuery::new(), &BackendDescriptor::multi("m")));
        }
    }

    #[test]
    fn equal_is_suffix() {
        let query = hint_query(TagMatcher::equal(STORAGE_NAME_LABEL, "oregon-dev"));
        for filter in &filters() {
            assert!(filter.allows(&query, &remote("dev-aws-oregon-dev")));
            assert!(!filter.allows(&query, &remote("dev-aws-us-east-1")));
        }
    }

    #[test]
    fn not_equal_negates() {
        let query = hint_query(TagMatcher::not_equal(STORAGE_NAME_LABEL, "oregon-dev"));
        for filter in &filters() {
            assert!(!filter.allows(&query, &remote("dev-aws-oregon-dev")));
            assert!(filter.allows(&query, &remote("dev-aws-us-east-1")));
        }
    }

    #[test]
    fn regexp_literal_alternation() {
        let query = hint_query(TagMatcher::regexp(
            STORAGE_NAME_LABEL,
            "shard-a|shard-b-bb-bbb|shard-c-ccc-d",
        ));
        for filter in &filters() {
            assert!(filter.allows(&query, &remote("prod-aws-shard-a")));
            assert!(filter.allows(&query, &remote("prod-aws-shard-b-bb-bbb")));
            assert!(filter.allows(&query, &remote("prod-aws-shard-c-ccc-d")));
            assert!(!filter.allows(&query, &remote("prod-aws-shard-e")));
        }
    }

    #[test]
    fn not_regexp_literal_alternation() {
        let query = hint_query(TagMatcher::not_regexp(
            STORAGE_NAME_LABEL,
            "shard-a|shard-b-bb-bbb|shard-c-ccc-d",
        ));
        for filter in &filters() {
            assert!(!filter.allows(&query, &remote("prod-aws-shard-a")));
            assert!(!filter.allows(&query, &remote("prod-aws-shard-b-bb-bbb")));
            assert!(!filter.allows(&query, &remote("prod-aws-shard-c-ccc-d")));
            assert!(filter.allows(&query, &remote("prod-aws-shard-e")));
        }
    }

    #[test]
    fn regexp_with_wildcard() {
        let query = hint_query(TagMatcher::regexp(STORAGE_NAME_LABEL, "shard-a|shard-a-.*"));
        for filter in &filters() {
            assert!(filter.allows(&query, &remote("prod-aws-shard-a")));
            assert!(!filter.allows(&query, &remote("prod-aws-shard-aa")));
            assert!(filter.allows(&query, &remote("prod-aws-shard-a-")));
            assert!(filter.allows(&query, &remote("prod-aws-shard-a-aa")));
        }
    }

    #[test]
    fn regexp_match_any() {
        let query = hint_query(TagMatcher::regexp(STORAGE_NAME_LABEL, ".*"));
        for filter in &filters() {
            for identity in ["prod-aws-shard-a", "prod-aws-shard-aa", "prod-aws-shard-a-"] {
                assert!(filter.allows(&query, &remote(identity)));
            }
        }
    }

    #[test]
    fn not_regexp_match_any_excludes_remote() {
        let query = hint_query(TagMatcher::not_regexp(STORAGE_NAME_LABEL, ".*"));
        assert!(!ReadOptimizedFilter::new().allows(&query, &remote("prod-aws-shard-a")));
    }

    #[test]
    fn unrecognized_patterns_never_exclude() {
        for hint in [
            TagMatcher::regexp(STORAGE_NAME_LABEL, "shard-[ab]"),
            TagMatcher::not_regexp(STORAGE_NAME_LABEL, "shard-[ab]"),
        ] {
            let query = hint_query(hint);
            for filter in &filters() {
                assert!(filter.allows(&query, &remote("prod-aws-shard-a")));
                assert!(filter.allows(&query, &remote("prod-aws-shard-z")));
            }
        }
    }

    #[test]
    fn multiple_hints_must_all_allow() {
        let query = FetchQuery::new()
            .with(TagMatcher::regexp(STORAGE_NAME_LABEL, "shard-a|shard-b"))
            .with(TagMatcher::not_equal(STORAGE_NAME_LABEL, "shard-b"));
        let filter = ReadOptimizedFilter::new();
        assert!(filter.allows(&query, &remote("prod-shard-a")));
        assert!(!filter.allows(&query, &remote("prod-shard-b")));
        assert!(!filter.allows(&query, &remote("prod-shard-c")));
    }

    #[test]
    fn multi_locality_is_filtered_like_remote() {
        let query = hint_query(TagMatcher::equal(STORAGE_NAME_LABEL, "oregon-dev"));
        let filter = ReadOptimizedFilter::new();
        assert!(!filter.allows(&query, &BackendDescriptor::multi("global-us-east-1")));
        assert!(filter.allows(&query, &BackendDescriptor::multi("global-oregon-dev")));
    }

    #[test]
    fn custom_label_key() {
        assert_eq!(ReadOptimizedFilter::new().label_key(), STORAGE_NAME_LABEL.as_bytes());
        let filter = ReadOptimizedFilter::new().with_label_key("__route__");
        assert_eq!(filter.label_key(), b"__route__");
        let query = FetchQuery::new()
            .with(TagMatcher::equal("__route__", "oregon-dev"))
            .with(TagMatcher::equal(STORAGE_NAME_LABEL, "us-east-1"));
        assert!(filter.allows(&query, &remote("dev-aws-oregon-dev")));
        assert!(!filter.allows(&query, &remote("dev-aws-us-east-1")));
    }

    #[test]
    fn cache_is_populated_by_regexp_hints_only() {
        assert!(ReadOptimizedFilter::new().cache().is_none());
        let filter = ReadOptimizedFilter::new().with_cache(16);
        assert_eq!(filter.cache().map(PatternCache::capacity), Some(16));
        let backend = remote("prod-aws-shard-a");
        filter.allows(&hint_query(TagMatcher::equal(STORAGE_NAME_LABEL, "x")), &backend);
        assert_eq!(filter.cache().map(PatternCache::len), Some(0));
        filter.allows(&hint_query(TagMatcher::regexp(STORAGE_NAME_LABEL, "a|b")), &backend);
        filter.allows(&hint_query(TagMatcher::not_regexp(STORAGE_NAME_LABEL, "a|b")), &backend);
        assert_eq!(filter.cache().map(PatternCache::len), Some(1));
    }

    #[test]
    fn trace_agrees_with_allows() {
        let backends = [
            BackendDescriptor::local("fed-local"),
            remote("prod-aws-shard-a"),
            remote("prod-aws-shard-aa"),
            remote("prod-aws-shard-a-aa"),
        ];
        let queries = [
            FetchQuery::new(),
            hint_query(TagMatcher::equal(STORAGE_NAME_LABEL, "shard-a")),
            hint_query(TagMatcher::not_equal(STORAGE_NAME_LABEL, "shard-a")),
            hint_query(TagMatcher::regexp(STORAGE_NAME_LABEL, "shard-a|shard-a-.*")),
            hint_query(TagMatcher::not_regexp(STORAGE_NAME_LABEL, "shard-a|shard-a-.*")),
            hint_query(TagMatcher::not_regexp(STORAGE_NAME_LABEL, "shard-(a)")),
        ];
        let filter = ReadOptimizedFilter::new();
        for q in &queries {
            for b in &backends {
                assert_eq!(filter.allows_with_trace(q, b).allowed(), filter.allows(q, b));
            }
        }
    }

    #[test]
    fn trace_branches() {
        let filter = ReadOptimizedFilter::new();
        assert_eq!(
            filter.allows_with_trace(&FetchQuery::new(), &BackendDescriptor::local("l")),
            FilterTrace::LocalBypass
        );
        assert_eq!(
            filter.allows_with_trace(&FetchQuery::new(), &remote("r")),
            FilterTrace::NoRoutingHint {
                label: STORAGE_NAME_LABEL.to_string()
            }
        );

        let query = hint_query(TagMatcher::not_regexp(STORAGE_NAME_LABEL, "shard-a|x.*"));
        let trace = filter.allows_with_trace(&query, &remote("prod-aws-shard-a"));
        let FilterTrace::RoutingHint { allowed, hints } = trace else {
            panic!("expected routing-hint trace");
        };
        assert!(!allowed);
        assert_eq!(hints.len(), 1);
        assert!(hints[0].matched);
        assert!(!hints[0].allowed);
        assert_eq!(
            hints[0].rules.as_deref(),
            Some(r#"Exact("shard-a") | PrefixWildcard("x")"#)
        );
    }

    #[test]
    fn idempotent_across_threads() {
        let filter = Arc::new(ReadOptimizedFilter::new().with_cache(4));
        let query = Arc::new(hint_query(TagMatcher::regexp(
            STORAGE_NAME_LABEL,
            "shard-a|shard-a-.*",
        )));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let filter = Arc::clone(&filter);
                let query = Arc::clone(&query);
                std::thread::spawn(move || {
                    let a = remote("prod-aws-shard-a-aa");
                    let b = remote("prod-aws-shard-aa");
                    (0..200).all(|_| filter.allows(&query, &a) && !filter.allows(&query, &b))
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
