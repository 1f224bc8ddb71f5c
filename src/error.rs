//! Error taxonomy for the planner.
//!
//! Every variant carries the key that was being resolved and the scope that
//! was searched, so callers can match on the kind instead of the message.

use crate::backend::LookupError;
use crate::topology::Scope;

/// Kind of failure, independent of its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourceNotFound,
    RemoteLookup,
    DuplicateAssociation,
}

/// Errors raised while resolving identifiers or emitting records.
///
/// None of these are retried inside a run; they abort the deployment unit.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The topology references a name that does not exist, or uses it in a
    /// way that cannot be planned
    #[error("configuration error for {key} (referenced from {scope}): {reason}")]
    Configuration {
        key: String,
        scope: Scope,
        reason: String,
    },

    /// The reference is valid but nothing has been published for it yet
    #[error("resource {key} not found in {scope}")]
    ResourceNotFound { key: String, scope: Scope },

    /// The backing lookup failed after the provider's own retries
    #[error("remote lookup of {key} in {scope} failed: {source}")]
    RemoteLookup {
        key: String,
        scope: Scope,
        #[source]
        source: LookupError,
    },

    /// The same edge was requested twice in one run
    #[error("duplicate association {key} requested in {scope}")]
    DuplicateAssociation { key: String, scope: Scope },
}

impl NetworkError {
    pub fn configuration(key: impl Into<String>, scope: &Scope, reason: impl Into<String>) -> Self {
        NetworkError::Configuration {
            key: key.into(),
            scope: scope.clone(),
            reason: reason.into(),
        }
    }

    pub fn not_found(key: impl Into<String>, scope: &Scope) -> Self {
        NetworkError::ResourceNotFound {
            key: key.into(),
            scope: scope.clone(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::Configuration { .. } => ErrorKind::Configuration,
            NetworkError::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            NetworkError::RemoteLookup { .. } => ErrorKind::RemoteLookup,
            NetworkError::DuplicateAssociation { .. } => ErrorKind::DuplicateAssociation,
        }
    }

    /// The key that failed to resolve
    pub fn key(&self) -> &str {
        match self {
            NetworkError::Configuration { key, .. }
            | NetworkError::ResourceNotFound { key, .. }
            | NetworkError::RemoteLookup { key, .. }
            | NetworkError::DuplicateAssociation { key, .. } => key,
        }
    }

    /// The scope that was searched
    pub fn scope(&self) -> &Scope {
        match self {
            NetworkError::Configuration { scope, .. }
            | NetworkError::ResourceNotFound { scope, .. }
            | NetworkError::RemoteLookup { scope, .. }
            | NetworkError::DuplicateAssociation { scope, .. } => scope,
        }
    }
}

pub type Result<T> = std::result::Result<T, NetworkError>;
