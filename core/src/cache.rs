//! Memoization of parsed routing patterns.
//!
//! Dashboards and alerts re-issue the same routing pattern over and over.
//! [`LiteralSet::parse`] is a pure function of the pattern bytes, so results
//! can be cached forever without invalidation.

use crate::{LiteralSet, MAX_PATTERN_LENGTH};
use dashmap::DashMap;
use std::sync::Arc;

/// A bounded, concurrent cache from pattern bytes to parsed [`LiteralSet`]s.
///
/// Reads are lock-free per shard. Once the cache holds `capacity` entries,
/// new patterns are still parsed and returned but not stored. The bound is
/// checked before insertion, so writers racing on distinct new patterns may
/// overshoot it by at most their own number. Patterns longer than
/// [`MAX_PATTERN_LENGTH`] are never stored.
#[derive(Debug)]
pub struct PatternCache {
    entries: DashMap<Vec<u8>, Arc<LiteralSet>>,
    capacity: usize,
}

impl PatternCache {
    /// Create a cache retaining at most `capacity` parsed patterns.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity.min(crate::DEFAULT_CACHE_CAPACITY)),
            capacity,
        }
    }

    /// Return the parsed form of `pattern`, parsing and storing it on a miss.
    pub fn get_or_parse(&self, pattern: &[u8]) -> Arc<LiteralSet> {
        if let Some(hit) = self.entries.get(pattern) {
            return Arc::clone(hit.value());
        }

        let parsed = Arc::new(LiteralSet::parse(pattern));
        if pattern.len() > MAX_PATTERN_LENGTH {
            tracing::debug!(len = pattern.len(), "routing pattern too long to cache");
        } else if self.entries.len() < self.capacity {
            self.entries
                .entry(pattern.to_vec())
                .or_insert_with(|| Arc::clone(&parsed));
            tracing::trace!(
                pattern = %String::from_utf8_lossy(pattern),
                "cached routing pattern"
            );
        } else {
            tracing::debug!(
                capacity = self.capacity,
                "pattern cache full, parsing routing pattern uncached"
            );
        }
        parsed
    }

    /// Number of cached patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no pattern is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of patterns retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every cached pattern.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::with_capacity(crate::DEFAULT_CACHE_CAPACITY)
    }
}
