//! `StorageFilter`: the per-backend fan-out predicate.
//!
//! The fan-out engine calls [`StorageFilter::allows`] once per candidate
//! backend before dispatching a query. `true` means "include in fan-out",
//! `false` means "skip".
//!
//! # Available Filters
//!
//! - [`AllowAll`] - every backend
//! - [`AllowNone`] - no backend
//! - [`LocalOnly`] - only [`Locality::Local`] backends
//! - [`ReadOptimizedFilter`](crate::ReadOptimizedFilter) - prune remote backends by routing hints

use crate::{Backend, FetchQuery, FilterTrace, Locality};
use std::fmt::Debug;

/// Decides whether a backend should receive a query.
///
/// # Purity
///
/// Implementations must be referentially transparent: identical inputs always
/// produce the same answer, with no observable side effects. Both inputs are
/// read-only.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the fan-out engine may evaluate
/// one filter for many backends concurrently.
///
/// # Example
///
/// ```
/// use routefilter::prelude::*;
///
/// #[derive(Debug)]
/// struct NamePrefix(&'static str);
///
/// impl StorageFilter for NamePrefix {
///     fn allows(&self, _query: &FetchQuery, backend: &dyn Backend) -> bool {
///         backend.name().starts_with(self.0)
///     }
/// }
///
/// let filter = NamePrefix("prod-");
/// assert!(filter.allows(&FetchQuery::new(), &BackendDescriptor::remote("prod-aws-a")));
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `StorageFilter`",
    label = "this type cannot decide backend fan-out",
    note = "use a built-in filter (AllowAll, AllowNone, LocalOnly, ReadOptimizedFilter) or implement `allows(&self, &FetchQuery, &dyn Backend) -> bool`"
)]
pub trait StorageFilter: Send + Sync + Debug {
    /// Should `backend` receive `query`?
    fn allows(&self, query: &FetchQuery, backend: &dyn Backend) -> bool;

    /// Like [`allows()`](Self::allows), but explains the decision.
    ///
    /// The default returns [`FilterTrace::Opaque`].
    fn allows_with_trace(&self, query: &FetchQuery, backend: &dyn Backend) -> FilterTrace {
        FilterTrace::Opaque {
            allowed: self.allows(query, backend),
        }
    }
}

#[diagnostic::do_not_recommend]
impl StorageFilter for Box<dyn StorageFilter> {
    fn allows(&self, query: &FetchQuery, backend: &dyn Backend) -> bool {
        (**self).allows(query, backend)
    }

    fn allows_with_trace(&self, query: &FetchQuery, backend: &dyn Backend) -> FilterTrace {
        (**self).allows_with_trace(query, backend)
    }
}

/// Includes every backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowAll;

impl StorageFilter for AllowAll {
    fn allows(&self, _query: &FetchQuery, _backend: &dyn Backend) -> bool {
        true
    }

    fn allows_with_trace(&self, _query: &FetchQuery, _backend: &dyn Backend) -> FilterTrace {
        FilterTrace::Constant { allowed: true }
    }
}

/// Includes no backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowNone;

impl StorageFilter for AllowNone {
    fn allows(&self, _query: &FetchQuery, _backend: &dyn Backend) -> bool {
        false
    }

    fn allows_with_trace(&self, _query: &FetchQuery, _backend: &dyn Backend) -> FilterTrace {
        FilterTrace::Constant { allowed: false }
    }
}

/// Includes only [`Locality::Local`] backends; remote and multi-DC backends are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalOnly;

impl StorageFilter for LocalOnly {
    fn allows(&self, _query: &FetchQuery, backend: &dyn Backend) -> bool {
        backend.locality() == Locality::Local
    }

    fn allows_with_trace(&self, query: &FetchQuery, backend: &dyn Backend) -> FilterTrace {
        FilterTrace::Locality {
            allowed: self.allows(query, backend),
            locality: backend.locality(),
        }
    }
}
