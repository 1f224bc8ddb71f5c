//! External collaborators.
//!
//! The planner never talks to a provisioning API directly. It reads and
//! publishes values through the traits below, which a deployment driver
//! implements on top of its cloud SDK. `MemoryBackend` implements all of
//! them for tests and for offline planning from a JSON snapshot.

pub mod memory;

use crate::topology::{ResourceKind, Scope};

pub use memory::{MemoryBackend, Snapshot};

/// Identity used for a non-local read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteIdentity {
    /// Account name
    pub account: String,
    pub account_id: String,
    pub region: String,
    /// Role assumed in the target account; `None` reads with the caller's
    /// own credentials
    pub role_name: Option<String>,
}

impl RemoteIdentity {
    pub fn scope(&self) -> Scope {
        Scope::new(self.account.clone(), self.region.clone())
    }
}

/// Failure of an underlying lookup, after the provider's own retries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("access denied assuming role {role} in account {account_id}")]
    AccessDenied { account_id: String, role: String },
    #[error("request throttled after {attempts} attempts")]
    Throttled { attempts: u32 },
    #[error("service error: {0}")]
    Service(String),
}

/// Published values of the scope the unit executes in
pub trait LocalStore {
    fn get_parameter(&self, scope: &Scope, path: &str) -> Result<Option<String>, LookupError>;
}

/// Published values of another account or region
pub trait RemoteReader {
    fn read_parameter(&self, identity: &RemoteIdentity, path: &str) -> Result<Option<String>, LookupError>;
}

/// Resources shared into the caller's account by their owner
pub trait ShareLookup {
    fn find_shared_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        owner_account_id: &str,
        region: &str,
    ) -> Result<Option<String>, LookupError>;
}

/// Direct queries against the provisioning API
pub trait ProviderLookup {
    /// Find an attachment by name on a gateway, in the identity's account
    fn find_attachment(
        &self,
        identity: &RemoteIdentity,
        gateway_id: &str,
        attachment_name: &str,
    ) -> Result<Option<String>, LookupError>;
}

/// Sink for values other units will read
pub trait ValuePublisher {
    fn publish(&mut self, scope: &Scope, path: &str, value: &str) -> Result<(), LookupError>;
}

/// Everything the resolver needs to read
pub trait Backend: LocalStore + RemoteReader + ShareLookup + ProviderLookup {}

impl<T: LocalStore + RemoteReader + ShareLookup + ProviderLookup> Backend for T {}
