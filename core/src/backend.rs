//! `Backend`: what a filter knows about a candidate storage backend.
//!
//! The backend registry owns the real backends; filters only read a name and a
//! [`Locality`]. Names are opaque: any prefixing scheme belongs to the registry
//! and filters never strip or parse it.

use crate::ParseError;
use std::fmt::{self, Debug};
use std::str::FromStr;

/// Where a backend's data lives relative to the querying engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Locality {
    /// The local cluster.
    Local,
    /// A single remote datacenter reached through federation.
    Remote,
    /// A backend spanning several datacenters.
    Multi,
}

impl Locality {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Multi => "multi",
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locality {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "multi" => Ok(Self::Multi),
            _ => Err(ParseError::UnknownLocality {
                value: s.to_string(),
            }),
        }
    }
}

/// A storage backend as seen by a [`StorageFilter`](crate::StorageFilter).
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the fan-out engine may evaluate
/// filters for several backends concurrently.
///
/// # Example
///
/// ```
/// use routefilter::{Backend, Locality};
///
/// #[derive(Debug)]
/// struct RemoteCluster { name: String }
///
/// impl Backend for RemoteCluster {
///     fn name(&self) -> &str { &self.name }
///     fn locality(&self) -> Locality { Locality::Remote }
/// }
/// ```
pub trait Backend: Send + Sync + Debug {
    /// Opaque, registry-defined backend name.
    fn name(&self) -> &str;

    /// Where this backend's data lives.
    fn locality(&self) -> Locality;
}

#[diagnostic::do_not_recommend]
impl Backend for Box<dyn Backend> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn locality(&self) -> Locality {
        (**self).locality()
    }
}

/// A plain owned [`Backend`]: a name and a locality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackendDescriptor {
    name: String,
    locality: Locality,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, locality: Locality) -> Self {
        Self {
            name: name.into(),
            locality,
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, Locality::Local)
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self::new(name, Locality::Remote)
    }

    pub fn multi(name: impl Into<String>) -> Self {
        Self::new(name, Locality::Multi)
    }
}

impl Backend for BackendDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn locality(&self) -> Locality {
        self.locality
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.locality, self.name)
    }
}

/// Parses `<locality>:<name>`, e.g. `remote:prod-aws-shard-a`.
impl FromStr for BackendDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (locality, name) = s
            .split_once(':')
            .filter(|(_, name)| !name.is_empty())
            .ok_or_else(|| ParseError::InvalidBackend {
                input: s.to_string(),
            })?;
        Ok(Self::new(name, locality.parse()?))
    }
}
