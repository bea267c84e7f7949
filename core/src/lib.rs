//! routefilter - backend-selection filters for federated query fan-out
//!
//! A logical query may be served by one local cluster and any number of remote
//! clusters. Before the fan-out engine dispatches a query it asks a
//! [`StorageFilter`] whether each backend could possibly hold matching data.
//! Backends ruled out are skipped, saving cross-datacenter round trips.
//!
//! # Architecture
//!
//! - [`FetchQuery`] / [`TagMatcher`] - the query's tag matchers (read-only input)
//! - [`Backend`] - name + [`Locality`] of a candidate backend (read-only input)
//! - [`StorageFilter`] - pure predicate `(query, backend) -> bool`
//! - [`AllowAll`], [`AllowNone`], [`LocalOnly`] - trivial filters
//! - [`ReadOptimizedFilter`] - prunes remote backends using routing hints carried
//!   on the [`STORAGE_NAME_LABEL`] label
//! - [`LiteralSet`] - the small pattern parser behind `=~` / `!~` routing hints
//!
//! # Key Invariant: conservative pruning
//!
//! A filter may only skip a backend when it is certain the backend cannot match.
//! Pattern shapes the [`LiteralSet`] parser does not recognize degrade to
//! [`LiteralRule::MatchAny`] instead of failing the call.
//!
//! # Example
//!
//! ```
//! use routefilter::prelude::*;
//!
//! let filter = ReadOptimizedFilter::new();
//! let query = FetchQuery::new()
//!     .with(TagMatcher::regexp(STORAGE_NAME_LABEL, "shard-a|shard-a-.*"))
//!     .with(TagMatcher::equal("service", "api"));
//!
//! assert!(filter.allows(&query, &BackendDescriptor::remote("prod-aws-shard-a")));
//! assert!(filter.allows(&query, &BackendDescriptor::remote("prod-aws-shard-a-7")));
//! assert!(!filter.allows(&query, &BackendDescriptor::remote("prod-aws-shard-aa")));
//!
//! // Local data is always considered.
//! assert!(filter.allows(&query, &BackendDescriptor::local("local")));
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod backend;
mod cache;
mod filter;
mod literal_set;
mod query;
mod read_optimized;
mod trace;

#[cfg(feature = "config")]
mod config;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

pub use backend::{Backend, BackendDescriptor, Locality};
pub use cache::PatternCache;
pub use filter::{AllowAll, AllowNone, LocalOnly, StorageFilter};
pub use literal_set::{LiteralRule, LiteralSet};
pub use query::{FetchQuery, MatchType, TagMatcher};
pub use read_optimized::ReadOptimizedFilter;
pub use trace::{FilterTrace, HintTrace};

#[cfg(feature = "config")]
pub use config::{ConfigError, FilterConfig};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use routefilter::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Filters
        AllowAll,
        AllowNone,
        // Backends
        Backend,
        BackendDescriptor,
        // Query model
        FetchQuery,
        // Trace types
        FilterTrace,
        HintTrace,
        LiteralRule,
        LiteralSet,
        LocalOnly,
        Locality,
        MatchType,
        // Errors
        ParseError,
        PatternCache,
        ReadOptimizedFilter,
        StorageFilter,
        TagMatcher,
        // Constants
        STORAGE_NAME_LABEL,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Reserved label key carrying backend-routing hints.
///
/// Matchers on this label never describe real metric data. The component that
/// assigns routing hints into queries and the [`ReadOptimizedFilter`] must agree
/// on this key.
pub const STORAGE_NAME_LABEL: &str = "__storage_name__";

/// Maximum length of a routing pattern the [`LiteralSet`] parser will inspect.
///
/// Longer patterns are not parsed; they take the conservative
/// [`LiteralRule::MatchAny`] fallback.
pub const MAX_PATTERN_LENGTH: usize = 8192;

/// Default number of parsed patterns a [`PatternCache`] retains.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from parsing textual matchers, localities and backend descriptors.
///
/// Filters themselves never fail; these errors only surface at the edges where
/// text becomes a [`TagMatcher`] or a [`BackendDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The selector has no `=`, `!=`, `=~` or `!~` operator.
    #[error("missing matcher operator in \"{input}\" (expected =, !=, =~ or !~)")]
    MissingOperator {
        /// The offending selector.
        input: String,
    },
    /// The label name is empty or contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid label name \"{name}\"")]
    InvalidLabelName {
        /// The offending label name.
        name: String,
    },
    /// A quoted value has no closing quote.
    #[error("unterminated quoted value in \"{input}\"")]
    UnterminatedQuote {
        /// The offending selector.
        input: String,
    },
    /// The locality is not one of `local`, `remote`, `multi`.
    #[error("unknown locality \"{value}\" (expected local, remote or multi)")]
    UnknownLocality {
        /// The unrecognized locality.
        value: String,
    },
    /// A backend descriptor is not of the form `<locality>:<name>`.
    #[error("invalid backend \"{input}\" (expected <locality>:<name>)")]
    InvalidBackend {
        /// The offending descriptor.
        input: String,
    },
}
