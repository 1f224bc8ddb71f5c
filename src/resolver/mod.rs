//! Cross-boundary resource resolution.
//!
//! Given a named resource and the scope that owns it, the resolver decides
//! how the current deployment unit can learn the resource's identifier:
//!
//! - **Local**: the owner is the caller; read the local published-value store
//! - **ResourceShare**: another account in the same region shares the
//!   resource with us; find it through the share, no identity needed
//! - **SameAccountRemote**: our own account in another region; published
//!   values are region-scoped, so this is a remote read
//! - **AssumedIdentity**: another account; assume the conventional role in
//!   the owner account and read through it
//!
//! Every result is memoized per `(path, owner)`. A missing value is fatal for
//! the unit: it means a dependency has not published yet or the topology is
//! wrong, and re-running this unit would not change that.

pub mod cache;

use log::{debug, info};
use serde::Serialize;

use crate::accounts::AccountRegistry;
use crate::backend::{Backend, LookupError, RemoteIdentity};
use crate::config::GlobalConfig;
use crate::error::{NetworkError, Result};
use crate::keys::{self, ResourceRef, RolePurpose};
use crate::topology::{AttachmentKind, ResourceKind, Scope};

pub use cache::{CacheKey, HelperKey, LookupHelpers, ResolvedValueCache};

/// How a value owned by some scope is read from the caller's scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionStrategy {
    Local,
    ResourceShare,
    SameAccountRemote { role_name: Option<String> },
    AssumedIdentity { role_name: String },
}

/// Counters describing the lookups a run performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub local_reads: usize,
    pub share_lookups: usize,
    pub remote_reads: usize,
    pub provider_lookups: usize,
    pub cache_hits: usize,
    pub helpers: usize,
}

pub struct CrossBoundaryResolver<'a> {
    backend: &'a dyn Backend,
    accounts: &'a AccountRegistry,
    caller: Scope,
    home_region: String,
    prefix: String,
    cache: ResolvedValueCache,
    helpers: LookupHelpers,
    stats: ResolverStats,
}

impl<'a> CrossBoundaryResolver<'a> {
    pub fn new(backend: &'a dyn Backend, accounts: &'a AccountRegistry, caller: Scope, global: &GlobalConfig) -> Self {
        Self {
            backend,
            accounts,
            caller,
            home_region: global.home_region.clone(),
            prefix: global.prefix.clone(),
            cache: ResolvedValueCache::default(),
            helpers: LookupHelpers::default(),
            stats: ResolverStats::default(),
        }
    }

    /// Scope the deployment unit executes in
    pub fn caller(&self) -> &Scope {
        &self.caller
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn accounts(&self) -> &AccountRegistry {
        self.accounts
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            cache_hits: self.cache.hits(),
            helpers: self.helpers.len(),
            ..self.stats
        }
    }

    /// Pick the cheapest way to read a value of `kind` owned by `owner`
    pub fn strategy_for(&self, kind: ResourceKind, owner: &Scope) -> ResolutionStrategy {
        if *owner == self.caller {
            return ResolutionStrategy::Local;
        }
        if owner.same_account(&self.caller) {
            // Reads into the home region use the caller's own credentials
            let role_name = if owner.region == self.home_region {
                None
            } else {
                Some(keys::role_name(&self.prefix, RolePurpose::ParameterShare, &owner.region))
            };
            return ResolutionStrategy::SameAccountRemote { role_name };
        }
        if owner.same_region(&self.caller) && kind.is_shareable() {
            return ResolutionStrategy::ResourceShare;
        }
        ResolutionStrategy::AssumedIdentity {
            role_name: keys::role_name(&self.prefix, RolePurpose::ParameterShare, &owner.region),
        }
    }

    /// Resolve the identifier of `resource`, published by `owner`
    pub fn resolve(&mut self, resource: &ResourceRef, owner: &Scope) -> Result<String> {
        let key = CacheKey::new(&resource.path, owner);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let strategy = self.strategy_for(resource.kind, owner);
        debug!("Resolving {} owned by {} from {} via {:?}", resource, owner, self.caller, strategy);

        let value = match strategy {
            ResolutionStrategy::Local => {
                self.stats.local_reads += 1;
                self.backend
                    .get_parameter(owner, &resource.path)
                    .map_err(|e| remote_error(&resource.path, owner, e))?
            }
            ResolutionStrategy::ResourceShare => {
                let owner_id = self.accounts.require_id(&owner.account, &self.caller)?.to_string();
                self.stats.share_lookups += 1;
                let shared = self
                    .backend
                    .find_shared_resource(resource.kind, &resource.name, &owner_id, &owner.region)
                    .map_err(|e| remote_error(&resource.path, owner, e))?;
                match shared {
                    Some(id) => Some(id),
                    None => {
                        debug!("{} is not shared with {}, reading from {}", resource, self.caller.account, owner);
                        let role_name = keys::role_name(&self.prefix, RolePurpose::ParameterShare, &owner.region);
                        self.read_remote(RolePurpose::ParameterShare, Some(role_name), resource, owner)?
                    }
                }
            }
            ResolutionStrategy::SameAccountRemote { role_name } => {
                self.read_remote(RolePurpose::ParameterShare, role_name, resource, owner)?
            }
            ResolutionStrategy::AssumedIdentity { role_name } => {
                self.read_remote(RolePurpose::ParameterShare, Some(role_name), resource, owner)?
            }
        };

        let value = value.ok_or_else(|| NetworkError::not_found(&resource.path, owner))?;
        Ok(self.cache.insert(key, value))
    }

    /// Resolve a gateway attachment id.
    ///
    /// Attachment ids are assigned when the owning unit creates the
    /// attachment and may not be mirrored anywhere else, so a foreign
    /// attachment is looked up through the provisioning API rather than the
    /// published-value store.
    pub fn resolve_attachment(
        &mut self,
        kind: AttachmentKind,
        child: &str,
        attachment_name: &str,
        gateway_id: &str,
        owner: &Scope,
    ) -> Result<String> {
        let resource = keys::attachment_ref(&self.prefix, kind, child, attachment_name);
        if *owner == self.caller {
            return self.resolve(&resource, owner);
        }

        let key = CacheKey::new(&format!("{}@{}", resource.path, gateway_id), owner);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let role_name = keys::role_name(&self.prefix, RolePurpose::DescribeAttachments, &owner.region);
        let identity = self.identity_for(RolePurpose::DescribeAttachments, owner, Some(role_name))?;
        info!(
            "Looking up {} attachment '{}' on {} in account {}",
            kind, attachment_name, gateway_id, identity.account_id
        );
        self.stats.provider_lookups += 1;
        let value = self
            .backend
            .find_attachment(&identity, gateway_id, attachment_name)
            .map_err(|e| remote_error(&resource.path, owner, e))?
            .ok_or_else(|| NetworkError::not_found(&resource.path, owner))?;

        Ok(self.cache.insert(key, value))
    }

    /// Identity for remote calls into `owner`, created once per
    /// `(purpose, account, region)`
    pub fn identity_for(&mut self, purpose: RolePurpose, owner: &Scope, role_name: Option<String>) -> Result<RemoteIdentity> {
        let account_id = self.accounts.require_id(&owner.account, &self.caller)?.to_string();
        let key = HelperKey {
            purpose,
            account: owner.account.clone(),
            region: owner.region.clone(),
        };
        Ok(self.helpers.get_or_create(key, || {
            debug!("Creating {} lookup helper for {}", purpose, owner);
            RemoteIdentity {
                account: owner.account.clone(),
                account_id,
                region: owner.region.clone(),
                role_name,
            }
        }))
    }

    fn read_remote(
        &mut self,
        purpose: RolePurpose,
        role_name: Option<String>,
        resource: &ResourceRef,
        owner: &Scope,
    ) -> Result<Option<String>> {
        let identity = self.identity_for(purpose, owner, role_name)?;
        info!("Reading {} from {} for {}", resource.path, owner, self.caller);
        self.stats.remote_reads += 1;
        self.backend
            .read_parameter(&identity, &resource.path)
            .map_err(|e| remote_error(&resource.path, owner, e))
    }
}

fn remote_error(path: &str, owner: &Scope, source: LookupError) -> NetworkError {
    NetworkError::RemoteLookup {
        key: path.to_string(),
        scope: owner.clone(),
        source,
    }
}
