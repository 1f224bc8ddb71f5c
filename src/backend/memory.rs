//! In-memory backend.
//!
//! Holds published values, resource shares and attachments keyed by scope,
//! counts every call it serves, and can be told to deny access to specific
//! accounts. Snapshots are plain JSON so the CLI can plan offline.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use color_eyre::eyre::WrapErr;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{LocalStore, LookupError, ProviderLookup, RemoteIdentity, RemoteReader, ShareLookup, ValuePublisher};
use crate::topology::{ResourceKind, Scope};

/// A resource shared by its owner account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub owner_account_id: String,
    pub region: String,
    pub id: String,
}

/// A gateway attachment known to the provisioning API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub account: String,
    pub region: String,
    pub gateway_id: String,
    pub name: String,
    pub id: String,
}

/// Serializable state of a `MemoryBackend`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// `account/region` -> path -> value
    #[serde(default)]
    pub values: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub shares: Vec<SharedResource>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
}

/// Call counters, readable after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub local_reads: usize,
    pub remote_reads: usize,
    pub share_lookups: usize,
    pub provider_lookups: usize,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Snapshot,
    local_reads: Cell<usize>,
    remote_reads: Cell<usize>,
    share_lookups: Cell<usize>,
    provider_lookups: Cell<usize>,
    assumed_roles: RefCell<Vec<String>>,
    denied_accounts: BTreeSet<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// Load a snapshot from a JSON file
    pub fn from_json_file(path: &Path) -> color_eyre::Result<Self> {
        let file = File::open(path).wrap_err_with(|| format!("Failed to open values snapshot {:?}", path))?;
        let snapshot: Snapshot =
            serde_json::from_reader(file).wrap_err_with(|| format!("Failed to parse values snapshot {:?}", path))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn with_value(mut self, scope: &Scope, path: &str, value: &str) -> Self {
        self.insert_value(scope, path, value);
        self
    }

    pub fn with_share(mut self, kind: ResourceKind, name: &str, owner_account_id: &str, region: &str, id: &str) -> Self {
        self.snapshot.shares.push(SharedResource {
            kind,
            name: name.to_string(),
            owner_account_id: owner_account_id.to_string(),
            region: region.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn with_attachment(mut self, scope: &Scope, gateway_id: &str, name: &str, id: &str) -> Self {
        self.snapshot.attachments.push(AttachmentRecord {
            account: scope.account.clone(),
            region: scope.region.clone(),
            gateway_id: gateway_id.to_string(),
            name: name.to_string(),
            id: id.to_string(),
        });
        self
    }

    /// Make every non-local call into `account` fail with access denied
    pub fn deny_account(mut self, account: &str) -> Self {
        self.denied_accounts.insert(account.to_string());
        self
    }

    pub fn value(&self, scope: &Scope, path: &str) -> Option<&str> {
        self.snapshot
            .values
            .get(&scope.to_string())
            .and_then(|values| values.get(path))
            .map(String::as_str)
    }

    pub fn counts(&self) -> CallCounts {
        CallCounts {
            local_reads: self.local_reads.get(),
            remote_reads: self.remote_reads.get(),
            share_lookups: self.share_lookups.get(),
            provider_lookups: self.provider_lookups.get(),
        }
    }

    /// Roles assumed so far, in call order
    pub fn assumed_roles(&self) -> Vec<String> {
        self.assumed_roles.borrow().clone()
    }

    fn insert_value(&mut self, scope: &Scope, path: &str, value: &str) {
        self.snapshot
            .values
            .entry(scope.to_string())
            .or_default()
            .insert(path.to_string(), value.to_string());
    }

    fn check_access(&self, identity: &RemoteIdentity) -> Result<(), LookupError> {
        if let Some(role) = &identity.role_name {
            self.assumed_roles.borrow_mut().push(role.clone());
            if self.denied_accounts.contains(&identity.account) {
                return Err(LookupError::AccessDenied {
                    account_id: identity.account_id.clone(),
                    role: role.clone(),
                });
            }
        }
        Ok(())
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

impl LocalStore for MemoryBackend {
    fn get_parameter(&self, scope: &Scope, path: &str) -> Result<Option<String>, LookupError> {
        bump(&self.local_reads);
        Ok(self.value(scope, path).map(str::to_string))
    }
}

impl RemoteReader for MemoryBackend {
    fn read_parameter(&self, identity: &RemoteIdentity, path: &str) -> Result<Option<String>, LookupError> {
        bump(&self.remote_reads);
        self.check_access(identity)?;
        debug!("Remote read of {} in {}", path, identity.scope());
        Ok(self.value(&identity.scope(), path).map(str::to_string))
    }
}

impl ShareLookup for MemoryBackend {
    fn find_shared_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        owner_account_id: &str,
        region: &str,
    ) -> Result<Option<String>, LookupError> {
        bump(&self.share_lookups);
        Ok(self
            .snapshot
            .shares
            .iter()
            .find(|s| s.kind == kind && s.name == name && s.owner_account_id == owner_account_id && s.region == region)
            .map(|s| s.id.clone()))
    }
}

impl ProviderLookup for MemoryBackend {
    fn find_attachment(
        &self,
        identity: &RemoteIdentity,
        gateway_id: &str,
        attachment_name: &str,
    ) -> Result<Option<String>, LookupError> {
        bump(&self.provider_lookups);
        self.check_access(identity)?;
        Ok(self
            .snapshot
            .attachments
            .iter()
            .find(|a| {
                a.account == identity.account
                    && a.region == identity.region
                    && a.gateway_id == gateway_id
                    && a.name == attachment_name
            })
            .map(|a| a.id.clone()))
    }
}

impl ValuePublisher for MemoryBackend {
    fn publish(&mut self, scope: &Scope, path: &str, value: &str) -> Result<(), LookupError> {
        self.insert_value(scope, path, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_are_scope_partitioned() {
        let east = Scope::new("Network", "us-east-1");
        let west = Scope::new("Network", "us-west-2");
        let backend = MemoryBackend::new().with_value(&east, "/p", "east-value");

        assert_eq!(backend.get_parameter(&east, "/p").unwrap(), Some("east-value".to_string()));
        assert_eq!(backend.get_parameter(&west, "/p").unwrap(), None);
        assert_eq!(backend.counts().local_reads, 2);
    }

    #[test]
    fn test_denied_account() {
        let backend = MemoryBackend::new().deny_account("Dev");
        let identity = RemoteIdentity {
            account: "Dev".into(),
            account_id: "222222222222".into(),
            region: "us-east-1".into(),
            role_name: Some("accel-CrossAccountParameterShare-us-east-1".into()),
        };
        let err = backend.read_parameter(&identity, "/p").unwrap_err();
        assert!(matches!(err, LookupError::AccessDenied { .. }));
        assert_eq!(backend.assumed_roles(), vec!["accel-CrossAccountParameterShare-us-east-1"]);
    }

    #[test]
    fn test_publish_then_read() {
        let scope = Scope::new("Dev", "us-east-1");
        let mut backend = MemoryBackend::new();
        backend.publish(&scope, "/accel/network/vpcPeering/P/id", "pcx-1").unwrap();
        assert_eq!(backend.value(&scope, "/accel/network/vpcPeering/P/id"), Some("pcx-1"));
    }

    #[test]
    fn test_load_snapshot() {
        let json = r#"{
  "values": { "Network/us-east-1": { "/accel/network/transitGateways/Core/id": "tgw-1" } },
  "shares": [
    { "kind": "transit_gateway", "name": "Core", "owner_account_id": "111111111111", "region": "us-east-1", "id": "tgw-1" }
  ]
}"#;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();

        let backend = MemoryBackend::from_json_file(file.path()).unwrap();
        assert_eq!(
            backend.value(&Scope::new("Network", "us-east-1"), "/accel/network/transitGateways/Core/id"),
            Some("tgw-1")
        );
        let shared = backend
            .find_shared_resource(ResourceKind::TransitGateway, "Core", "111111111111", "us-east-1")
            .unwrap();
        assert_eq!(shared, Some("tgw-1".to_string()));
        assert!(backend.snapshot().attachments.is_empty());
    }
}
