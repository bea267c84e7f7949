//! Decision traces for debugging filter behavior.
//!
//! [`StorageFilter::allows_with_trace`](crate::StorageFilter::allows_with_trace)
//! returns a [`FilterTrace`] that records which branch produced the answer.
//!
//! # INV: `allowed()` == `allows()` result
//!
//! The trace's [`allowed()`](FilterTrace::allowed) always equals what
//! [`allows()`](crate::StorageFilter::allows) returns for the same inputs.
//!
//! # Example
//!
//! ```
//! use routefilter::prelude::*;
//!
//! let query = FetchQuery::new().with(TagMatcher::equal(STORAGE_NAME_LABEL, "oregon-dev"));
//! let backend = BackendDescriptor::remote("dev-aws-us-east-1");
//!
//! let trace = ReadOptimizedFilter::new().allows_with_trace(&query, &backend);
//! assert!(!trace.allowed());
//! println!("{trace}");
//! ```

use crate::Locality;
use std::fmt;

/// Trace of one filter decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTrace {
    /// A constant filter (`AllowAll` / `AllowNone`).
    Constant {
        /// The constant answer.
        allowed: bool,
    },
    /// Decided purely on locality (`LocalOnly`).
    Locality {
        /// Whether the backend was included.
        allowed: bool,
        /// The backend's locality.
        locality: Locality,
    },
    /// Local backends bypass routing hints.
    LocalBypass,
    /// The query carries no matcher on the routing label.
    NoRoutingHint {
        /// The routing label that was searched for.
        label: String,
    },
    /// Routing-hint matchers were evaluated against the backend name.
    RoutingHint {
        /// Whether every hint allowed the backend.
        allowed: bool,
        /// One entry per routing-hint matcher, in query order.
        hints: Vec<HintTrace>,
    },
    /// A filter that does not explain itself.
    Opaque {
        /// Whether the backend was included.
        allowed: bool,
    },
}

impl FilterTrace {
    /// The overall decision.
    #[must_use]
    pub fn allowed(&self) -> bool {
        match self {
            Self::Constant { allowed }
            | Self::Locality { allowed, .. }
            | Self::RoutingHint { allowed, .. }
            | Self::Opaque { allowed } => *allowed,
            Self::LocalBypass | Self::NoRoutingHint { .. } => true,
        }
    }
}

/// Evaluation of one routing-hint matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintTrace {
    /// The matcher in selector syntax.
    pub matcher: String,
    /// Parsed rules for `=~` / `!~` hints; `None` for `=` / `!=`.
    pub rules: Option<String>,
    /// Whether the positive test (suffix or rule set) matched the backend name.
    pub matched: bool,
    /// Whether this hint allows the backend, after negation and fallback.
    pub allowed: bool,
}

impl fmt::Display for FilterTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allowed() { "include" } else { "skip" };
        match self {
            Self::Constant { .. } => write!(f, "{verdict}: constant filter"),
            Self::Locality { locality, .. } => {
                write!(f, "{verdict}: backend locality is {locality}")
            }
            Self::LocalBypass => write!(f, "{verdict}: local backend bypasses routing hints"),
            Self::NoRoutingHint { label } => {
                write!(f, "{verdict}: no matcher on routing label {label}")
            }
            Self::RoutingHint { hints, .. } => {
                write!(f, "{verdict}: routing hints")?;
                for hint in hints {
                    write!(f, "\n  {}", hint.matcher)?;
                    if let Some(rules) = &hint.rules {
                        write!(f, " [{rules}]")?;
                    }
                    write!(f, " matched={} allowed={}", hint.matched, hint.allowed)?;
                }
                Ok(())
            }
            Self::Opaque { .. } => write!(f, "{verdict}"),
        }
    }
}
