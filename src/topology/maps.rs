//! Per-unit topology maps.
//!
//! A deployment unit only materializes what is relevant to its own scope:
//! the gateways it owns (with their route tables), every attachment to those
//! gateways, and the attachments it owns itself together with the remote
//! gateways and route tables they connect to. Remote identifiers are pulled through
//! the resolver only when an attachment actually needs them.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::accounts::AccountRegistry;
use crate::config::Config;
use crate::error::{NetworkError, Result};
use crate::keys;
use crate::resolver::CrossBoundaryResolver;
use crate::topology::types::{AttachmentKind, Scope};

/// An attachment as described by the topology, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    pub kind: AttachmentKind,
    /// VPC, VPN connection, DX gateway or peering name
    pub child: String,
    pub attachment_name: String,
    pub gateway: String,
    pub gateway_account: String,
    pub region: String,
    /// Scope owning the child, and therefore the attachment
    pub owner: Scope,
    /// True when the child is deployable to several accounts
    pub templated: bool,
    pub associations: Vec<String>,
    pub propagations: Vec<String>,
}

impl AttachmentDescriptor {
    pub fn key(&self) -> String {
        keys::attachment_key(&self.gateway, &self.owner.account, &self.child)
    }

    pub fn gateway_scope(&self) -> Scope {
        Scope::new(self.gateway_account.clone(), self.region.clone())
    }
}

/// A resolved attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentEntry {
    pub id: String,
    /// Id of the gateway the attachment is bound to
    pub gateway_id: String,
    pub descriptor: AttachmentDescriptor,
}

/// Everything one unit resolved, keyed per `keys`
#[derive(Debug, Clone)]
pub struct TopologyBuildContext {
    pub scope: Scope,
    /// `gateway_key` -> gateway id
    pub gateways: BTreeMap<String, String>,
    /// region -> `route_table_key` -> route table id
    pub route_tables: BTreeMap<String, BTreeMap<String, String>>,
    /// `attachment_key` -> attachment
    pub attachments: BTreeMap<String, AttachmentEntry>,
    /// prefix list name -> id, for lists deployed to this scope
    pub prefix_lists: BTreeMap<String, String>,
    /// Route table keys that needed a non-local lookup
    pub remote_route_tables: BTreeSet<String>,
}

impl TopologyBuildContext {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            gateways: BTreeMap::new(),
            route_tables: BTreeMap::new(),
            attachments: BTreeMap::new(),
            prefix_lists: BTreeMap::new(),
            remote_route_tables: BTreeSet::new(),
        }
    }

    pub fn gateway_id(&self, gateway: &str, account: &str) -> Option<&str> {
        self.gateways.get(&keys::gateway_key(gateway, account)).map(String::as_str)
    }

    pub fn route_table_id(&self, region: &str, gateway: &str, route_table: &str) -> Option<&str> {
        self.route_tables
            .get(region)
            .and_then(|tables| tables.get(&keys::route_table_key(gateway, route_table)))
            .map(String::as_str)
    }

    pub fn has_route_table(&self, region: &str, gateway: &str, route_table: &str) -> bool {
        self.route_table_id(region, gateway, route_table).is_some()
    }

    pub fn attachment(&self, key: &str) -> Option<&AttachmentEntry> {
        self.attachments.get(key)
    }

    /// Attachments whose child is owned by this unit's scope
    pub fn owned_attachments(&self) -> impl Iterator<Item = (&String, &AttachmentEntry)> {
        self.attachments
            .iter()
            .filter(move |(_, entry)| entry.descriptor.owner == self.scope)
    }

    fn insert_route_table(&mut self, region: &str, gateway: &str, route_table: &str, id: String) {
        self.route_tables
            .entry(region.to_string())
            .or_default()
            .insert(keys::route_table_key(gateway, route_table), id);
    }
}

/// Collect every attachment described by the topology.
///
/// Templated VPCs yield one attachment per resolved deployment account;
/// excluded accounts never appear.
pub fn collect_attachments(
    config: &Config,
    accounts: &AccountRegistry,
    referenced_from: &Scope,
) -> Result<Vec<AttachmentDescriptor>> {
    let mut descriptors = Vec::new();

    let unknown_gateway = |name: &str, account: &str| {
        NetworkError::configuration(
            keys::gateway_key(name, account),
            referenced_from,
            "transit gateway is not defined",
        )
    };

    for vpc in &config.network.vpcs {
        let templated = vpc.placement.is_templated();
        for account in accounts.vpc_accounts(vpc) {
            for attachment in &vpc.transit_gateway_attachments {
                let tgw_ref = &attachment.transit_gateway;
                let tgw = config
                    .find_transit_gateway(&tgw_ref.name, &tgw_ref.account)
                    .ok_or_else(|| unknown_gateway(&tgw_ref.name, &tgw_ref.account))?;
                if tgw.region != vpc.region {
                    return Err(NetworkError::configuration(
                        keys::gateway_key(&tgw.name, &tgw.account),
                        referenced_from,
                        format!("VPC '{}' in {} cannot attach to a gateway in {}", vpc.name, vpc.region, tgw.region),
                    ));
                }
                descriptors.push(AttachmentDescriptor {
                    kind: AttachmentKind::Vpc,
                    child: vpc.name.clone(),
                    attachment_name: attachment.name.clone(),
                    gateway: tgw.name.clone(),
                    gateway_account: tgw.account.clone(),
                    region: tgw.region.clone(),
                    owner: Scope::new(account.clone(), vpc.region.clone()),
                    templated,
                    associations: attachment.route_table_associations.clone(),
                    propagations: attachment.route_table_propagations.clone(),
                });
            }
        }
    }

    for cgw in &config.network.customer_gateways {
        for vpn in &cgw.vpn_connections {
            let tgw = config
                .find_transit_gateway(&vpn.transit_gateway, &cgw.account)
                .ok_or_else(|| unknown_gateway(&vpn.transit_gateway, &cgw.account))?;
            descriptors.push(AttachmentDescriptor {
                kind: AttachmentKind::Vpn,
                child: vpn.name.clone(),
                attachment_name: vpn.name.clone(),
                gateway: tgw.name.clone(),
                gateway_account: tgw.account.clone(),
                region: tgw.region.clone(),
                owner: Scope::new(cgw.account.clone(), cgw.region.clone()),
                templated: false,
                associations: vpn.route_table_associations.clone(),
                propagations: vpn.route_table_propagations.clone(),
            });
        }
    }

    // DX gateways are global; the association lives with the gateway owner
    for dx in &config.network.direct_connect_gateways {
        for association in &dx.transit_gateway_associations {
            let tgw = config
                .find_transit_gateway(&association.name, &association.account)
                .ok_or_else(|| unknown_gateway(&association.name, &association.account))?;
            descriptors.push(AttachmentDescriptor {
                kind: AttachmentKind::DirectConnect,
                child: dx.name.clone(),
                attachment_name: dx.name.clone(),
                gateway: tgw.name.clone(),
                gateway_account: tgw.account.clone(),
                region: tgw.region.clone(),
                owner: Scope::new(tgw.account.clone(), tgw.region.clone()),
                templated: false,
                associations: association.route_table_associations.clone(),
                propagations: association.route_table_propagations.clone(),
            });
        }
    }

    for peering in &config.network.transit_gateway_peering {
        for side in [&peering.requester, &peering.accepter] {
            let tgw = config
                .find_transit_gateway(&side.transit_gateway_name, &side.account)
                .ok_or_else(|| unknown_gateway(&side.transit_gateway_name, &side.account))?;
            descriptors.push(AttachmentDescriptor {
                kind: AttachmentKind::Peering,
                child: peering.name.clone(),
                attachment_name: peering.name.clone(),
                gateway: tgw.name.clone(),
                gateway_account: tgw.account.clone(),
                region: tgw.region.clone(),
                owner: Scope::new(side.account.clone(), side.region.clone()),
                templated: false,
                associations: side.route_table_associations.clone(),
                propagations: Vec::new(),
            });
        }
    }

    Ok(descriptors)
}

/// Builds the `TopologyBuildContext` of one deployment unit
pub struct TopologyMapBuilder<'c> {
    config: &'c Config,
    accounts: &'c AccountRegistry,
}

impl<'c> TopologyMapBuilder<'c> {
    pub fn new(config: &'c Config, accounts: &'c AccountRegistry) -> Self {
        Self { config, accounts }
    }

    pub fn build(&self, resolver: &mut CrossBoundaryResolver) -> Result<TopologyBuildContext> {
        let scope = resolver.caller().clone();
        let prefix = resolver.prefix().to_string();
        let mut ctx = TopologyBuildContext::new(scope.clone());

        self.add_owned_gateways(&mut ctx, resolver, &prefix)?;

        for descriptor in collect_attachments(self.config, self.accounts, &scope)? {
            if descriptor.region != scope.region {
                continue;
            }
            let gateway_local = descriptor.gateway_account == scope.account;
            let owned = descriptor.owner == scope;
            if !gateway_local && !owned {
                continue;
            }

            let key = descriptor.key();
            if ctx.attachments.contains_key(&key) {
                return Err(NetworkError::configuration(
                    key,
                    &scope,
                    "two attachments share the same gateway, account and child",
                ));
            }

            if owned && !gateway_local {
                self.add_remote_route_tables(&mut ctx, resolver, &prefix, &descriptor)?;
            }

            // Owned attachments are read locally and do not need the gateway
            // id; foreign ones are looked up by it
            let known_gateway = ctx
                .gateway_id(&descriptor.gateway, &descriptor.gateway_account)
                .map(str::to_string);
            if known_gateway.is_none() && !owned {
                return Err(NetworkError::not_found(
                    keys::gateway_key(&descriptor.gateway, &descriptor.gateway_account),
                    &scope,
                ));
            }
            let id = resolver.resolve_attachment(
                descriptor.kind,
                &descriptor.child,
                &descriptor.attachment_name,
                known_gateway.as_deref().unwrap_or_default(),
                &descriptor.owner,
            )?;

            let gateway_id = match known_gateway {
                Some(id) => id,
                None => self.add_remote_gateway(&mut ctx, resolver, &prefix, &descriptor)?,
            };

            debug!("Recorded attachment {} -> {}", key, id);
            ctx.attachments.insert(
                key,
                AttachmentEntry {
                    id,
                    gateway_id,
                    descriptor,
                },
            );
        }

        for prefix_list in &self.config.network.prefix_lists {
            if prefix_list.is_deployed_to(&scope.account, &scope.region) {
                let id = resolver.resolve(&keys::prefix_list_ref(&prefix, &prefix_list.name), &scope)?;
                ctx.prefix_lists.insert(prefix_list.name.clone(), id);
            }
        }

        info!(
            "Built maps for {}: {} gateways, {} route tables, {} attachments, {} prefix lists",
            scope,
            ctx.gateways.len(),
            ctx.route_tables.values().map(BTreeMap::len).sum::<usize>(),
            ctx.attachments.len(),
            ctx.prefix_lists.len()
        );

        Ok(ctx)
    }

    fn add_owned_gateways(
        &self,
        ctx: &mut TopologyBuildContext,
        resolver: &mut CrossBoundaryResolver,
        prefix: &str,
    ) -> Result<()> {
        let scope = ctx.scope.clone();
        for tgw in &self.config.network.transit_gateways {
            if tgw.account != scope.account || tgw.region != scope.region {
                continue;
            }
            let id = resolver.resolve(&keys::transit_gateway_ref(prefix, &tgw.name), &scope)?;
            ctx.gateways.insert(keys::gateway_key(&tgw.name, &tgw.account), id);

            for rt in &tgw.route_tables {
                let id = resolver.resolve(&keys::transit_gateway_route_table_ref(prefix, &tgw.name, &rt.name), &scope)?;
                ctx.insert_route_table(&tgw.region, &tgw.name, &rt.name, id);
            }
        }
        Ok(())
    }

    /// Resolve a gateway owned elsewhere that a local attachment is bound to.
    /// Gateways shared into this account are found through the share.
    fn add_remote_gateway(
        &self,
        ctx: &mut TopologyBuildContext,
        resolver: &mut CrossBoundaryResolver,
        prefix: &str,
        descriptor: &AttachmentDescriptor,
    ) -> Result<String> {
        let id = resolver.resolve(
            &keys::transit_gateway_ref(prefix, &descriptor.gateway),
            &descriptor.gateway_scope(),
        )?;
        debug!("Resolved remote gateway {} -> {}", descriptor.gateway, id);
        ctx.gateways.insert(
            keys::gateway_key(&descriptor.gateway, &descriptor.gateway_account),
            id.clone(),
        );
        Ok(id)
    }

    /// Resolve the route tables an owned attachment associates with or
    /// propagates to, on a gateway owned elsewhere. Names the gateway does
    /// not define are left out; the association step reports them.
    fn add_remote_route_tables(
        &self,
        ctx: &mut TopologyBuildContext,
        resolver: &mut CrossBoundaryResolver,
        prefix: &str,
        descriptor: &AttachmentDescriptor,
    ) -> Result<()> {
        let Some(tgw) = self
            .config
            .find_transit_gateway(&descriptor.gateway, &descriptor.gateway_account)
        else {
            return Ok(());
        };
        let gateway_scope = descriptor.gateway_scope();

        for rt in descriptor.associations.iter().chain(descriptor.propagations.iter()) {
            if !tgw.has_route_table(rt) || ctx.has_route_table(&descriptor.region, &tgw.name, rt) {
                continue;
            }
            let id = resolver.resolve(
                &keys::transit_gateway_route_table_ref(prefix, &tgw.name, rt),
                &gateway_scope,
            )?;
            ctx.insert_route_table(&descriptor.region, &tgw.name, rt, id);
            ctx.remote_route_tables.insert(keys::route_table_key(&tgw.name, rt));
        }
        Ok(())
    }
}
