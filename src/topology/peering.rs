//! VPC peering connections and their routes.
//!
//! `vpcs[0]` of a peering definition requests the connection and `vpcs[1]`
//! accepts it. A definition is expanded into one connection per pair of
//! deployment accounts, and only the unit running in the requester's scope
//! plans it. Routes are emitted in two independent passes over the same
//! connection value:
//!
//! - requester routes go straight into the requester's route tables
//! - accepter routes are direct when the accepter shares the unit's scope,
//!   otherwise they become `CrossAccountRoute` operations carried out
//!   through the accepter's peering role
//!
//! A `CrossAccountRouteHandler` is planned only when at least one such
//! operation exists.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::Serialize;

use crate::accounts::AccountRegistry;
use crate::config::{Config, DestinationSpec, VpcConfig, VpcPlacement, VpcRouteConfig};
use crate::error::{NetworkError, Result};
use crate::keys::{self, RolePurpose};
use crate::resolver::CrossBoundaryResolver;
use crate::topology::types::{RouteDestination, Scope};

/// Lifecycle of a connection inside one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeeringState {
    #[default]
    Unresolved,
    CrossAccountClassified,
    RequesterRouted,
    AccepterRouted,
    Routed,
}

impl PeeringState {
    pub fn requester_done(&self) -> bool {
        matches!(self, PeeringState::RequesterRouted | PeeringState::Routed)
    }

    pub fn accepter_done(&self) -> bool {
        matches!(self, PeeringState::AccepterRouted | PeeringState::Routed)
    }

    fn after_requester(self) -> Self {
        match self {
            PeeringState::CrossAccountClassified => PeeringState::RequesterRouted,
            PeeringState::AccepterRouted => PeeringState::Routed,
            other => other,
        }
    }

    fn after_accepter(self) -> Self {
        match self {
            PeeringState::CrossAccountClassified => PeeringState::AccepterRouted,
            PeeringState::RequesterRouted => PeeringState::Routed,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeeringSide {
    Requester,
    Accepter,
}

/// One end of a connection, bound to a concrete account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerSide {
    pub vpc: String,
    pub scope: Scope,
    pub account_id: String,
    pub templated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeeringConnection {
    pub name: String,
    pub key: String,
    pub requester: PeerSide,
    pub accepter: PeerSide,
    /// Whether the definition spans accounts or regions
    pub cross_account: bool,
    /// Role assumed in the accepter account to accept the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_role_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepter_vpc_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip)]
    state: PeeringState,
}

impl PeeringConnection {
    pub fn state(&self) -> PeeringState {
        self.state
    }

    fn classify(&mut self, cross_account: bool, prefix: &str) {
        self.cross_account = cross_account;
        if self.requester.scope.account != self.accepter.scope.account {
            self.peer_role_name = Some(keys::role_name(prefix, RolePurpose::PeeringRoutes, &self.accepter.scope.region));
        }
        self.state = PeeringState::CrossAccountClassified;
    }
}

/// Classify a peering definition.
///
/// Different regions are always cross-account. Otherwise templated VPCs are
/// compared by their resolved deployment account sets and single-account
/// VPCs by their accounts.
pub fn classify_cross_account(requester: &VpcConfig, accepter: &VpcConfig, accounts: &AccountRegistry) -> bool {
    if requester.region != accepter.region {
        return true;
    }
    match (&requester.placement, &accepter.placement) {
        (VpcPlacement::Single { account: a }, VpcPlacement::Single { account: b }) => a != b,
        _ => {
            let requester_accounts: BTreeSet<String> = accounts.vpc_accounts(requester).into_iter().collect();
            let accepter_accounts: BTreeSet<String> = accounts.vpc_accounts(accepter).into_iter().collect();
            requester_accounts != accepter_accounts
        }
    }
}

/// A route written directly by this unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeeringRoute {
    pub key: String,
    pub peering_key: String,
    pub side: PeeringSide,
    pub vpc: String,
    pub route_table: String,
    pub route_table_id: String,
    pub destination: RouteDestination,
    pub scope: Scope,
}

/// A route written into another scope's route table through its peering role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossAccountRoute {
    pub key: String,
    pub peering_key: String,
    pub vpc: String,
    pub route_table: String,
    pub route_table_id: String,
    pub destination: RouteDestination,
    pub owner: Scope,
    pub owner_account_id: String,
    pub role_name: String,
}

/// Custom operation backing every `CrossAccountRoute` of a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossAccountRouteHandler {
    pub scope: Scope,
    pub role_names: Vec<String>,
}

/// A value the unit publishes once the resource exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publication {
    pub scope: Scope,
    pub path: String,
    pub resource_key: String,
}

/// Routes produced by one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteBatch {
    pub routes: Vec<PeeringRoute>,
    pub cross_account_routes: Vec<CrossAccountRoute>,
}

impl RouteBatch {
    pub fn len(&self) -> usize {
        self.routes.len() + self.cross_account_routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything peering contributes to a unit's plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeeringPlan {
    pub connections: Vec<PeeringConnection>,
    pub routes: Vec<PeeringRoute>,
    pub cross_account_routes: Vec<CrossAccountRoute>,
    pub handler: Option<CrossAccountRouteHandler>,
    pub publications: Vec<Publication>,
}

impl PeeringPlan {
    fn absorb(&mut self, batch: RouteBatch) {
        self.routes.extend(batch.routes);
        self.cross_account_routes.extend(batch.cross_account_routes);
    }
}

pub struct PeeringRouteResolver<'c> {
    config: &'c Config,
    accounts: &'c AccountRegistry,
    emitted: BTreeSet<String>,
}

impl<'c> PeeringRouteResolver<'c> {
    pub fn new(config: &'c Config, accounts: &'c AccountRegistry) -> Self {
        Self {
            config,
            accounts,
            emitted: BTreeSet::new(),
        }
    }

    /// Expand every peering definition into classified connections
    pub fn expand(&self, referenced_from: &Scope, prefix: &str) -> Result<Vec<PeeringConnection>> {
        let mut connections = Vec::new();

        for peering in &self.config.network.vpc_peering {
            let (requester_name, accepter_name) = match peering.vpcs.as_slice() {
                [requester, accepter] => (requester, accepter),
                _ => {
                    return Err(NetworkError::configuration(
                        format!("vpcPeering:{}", peering.name),
                        referenced_from,
                        "a peering connects exactly two VPCs",
                    ))
                }
            };
            let requester_vpc = self.vpc(requester_name, referenced_from)?;
            let accepter_vpc = self.vpc(accepter_name, referenced_from)?;
            let cross_account = classify_cross_account(requester_vpc, accepter_vpc, self.accounts);

            for requester_account in self.accounts.vpc_accounts(requester_vpc) {
                let requester = self.side(requester_vpc, requester_account, referenced_from)?;
                for accepter_account in self.accounts.vpc_accounts(accepter_vpc) {
                    let accepter = self.side(accepter_vpc, accepter_account, referenced_from)?;
                    let key = keys::peering_key(
                        &peering.name,
                        requester.templated.then_some(requester.account_id.as_str()),
                        accepter.templated.then_some(accepter.account_id.as_str()),
                    );

                    let mut connection = PeeringConnection {
                        name: peering.name.clone(),
                        key,
                        requester: requester.clone(),
                        accepter,
                        cross_account: false,
                        peer_role_name: None,
                        requester_vpc_id: None,
                        accepter_vpc_id: None,
                        tags: peering.tags.clone(),
                        state: PeeringState::Unresolved,
                    };
                    connection.classify(cross_account, prefix);
                    connections.push(connection);
                }
            }
        }

        Ok(connections)
    }

    /// Connections the resolver's unit requests
    pub fn connections_for(&self, resolver: &CrossBoundaryResolver) -> Result<Vec<PeeringConnection>> {
        let caller = resolver.caller();
        Ok(self
            .expand(caller, resolver.prefix())?
            .into_iter()
            .filter(|connection| connection.requester.scope == *caller)
            .collect())
    }

    pub fn emit_requester_routes(
        &mut self,
        connection: &mut PeeringConnection,
        resolver: &mut CrossBoundaryResolver,
    ) -> Result<RouteBatch> {
        if connection.state.requester_done() {
            return Ok(RouteBatch::default());
        }
        let batch = self.side_routes(connection, PeeringSide::Requester, resolver)?;
        connection.state = connection.state.after_requester();
        Ok(batch)
    }

    pub fn emit_accepter_routes(
        &mut self,
        connection: &mut PeeringConnection,
        resolver: &mut CrossBoundaryResolver,
    ) -> Result<RouteBatch> {
        if connection.state.accepter_done() {
            return Ok(RouteBatch::default());
        }
        let batch = self.side_routes(connection, PeeringSide::Accepter, resolver)?;
        connection.state = connection.state.after_accepter();
        Ok(batch)
    }

    /// Plan every connection requested from the resolver's scope
    pub fn build(&mut self, resolver: &mut CrossBoundaryResolver) -> Result<PeeringPlan> {
        let caller = resolver.caller().clone();
        let prefix = resolver.prefix().to_string();
        let mut connections = self.connections_for(resolver)?;
        let mut plan = PeeringPlan::default();

        for connection in &mut connections {
            connection.requester_vpc_id =
                Some(resolver.resolve(&keys::vpc_ref(&prefix, &connection.requester.vpc), &connection.requester.scope)?);
            connection.accepter_vpc_id =
                Some(resolver.resolve(&keys::vpc_ref(&prefix, &connection.accepter.vpc), &connection.accepter.scope)?);
        }
        for connection in &mut connections {
            let batch = self.emit_requester_routes(connection, resolver)?;
            plan.absorb(batch);
        }
        for connection in &mut connections {
            let batch = self.emit_accepter_routes(connection, resolver)?;
            plan.absorb(batch);
        }

        for connection in &connections {
            let path = keys::vpc_peering_ref(&prefix, &connection.key).path;
            plan.publications.push(Publication {
                scope: connection.requester.scope.clone(),
                path: path.clone(),
                resource_key: connection.key.clone(),
            });
            if connection.accepter.scope != connection.requester.scope {
                plan.publications.push(Publication {
                    scope: connection.accepter.scope.clone(),
                    path,
                    resource_key: connection.key.clone(),
                });
            }
        }

        if !plan.cross_account_routes.is_empty() {
            let role_names: BTreeSet<String> = plan.cross_account_routes.iter().map(|r| r.role_name.clone()).collect();
            plan.handler = Some(CrossAccountRouteHandler {
                scope: caller.clone(),
                role_names: role_names.into_iter().collect(),
            });
        }

        info!(
            "Planned {} peering connections for {}: {} routes, {} cross-account routes",
            connections.len(),
            caller,
            plan.routes.len(),
            plan.cross_account_routes.len()
        );
        plan.connections = connections;
        Ok(plan)
    }

    fn vpc(&self, name: &str, referenced_from: &Scope) -> Result<&'c VpcConfig> {
        self.config
            .find_vpc(name)
            .ok_or_else(|| NetworkError::configuration(format!("vpc:{}", name), referenced_from, "VPC is not defined"))
    }

    fn side(&self, vpc: &VpcConfig, account: String, referenced_from: &Scope) -> Result<PeerSide> {
        let account_id = self.accounts.require_id(&account, referenced_from)?.to_string();
        Ok(PeerSide {
            vpc: vpc.name.clone(),
            scope: Scope::new(account, vpc.region.clone()),
            account_id,
            templated: vpc.placement.is_templated(),
        })
    }

    fn side_routes(
        &mut self,
        connection: &PeeringConnection,
        side: PeeringSide,
        resolver: &mut CrossBoundaryResolver,
    ) -> Result<RouteBatch> {
        let (own, peer) = match side {
            PeeringSide::Requester => (&connection.requester, &connection.accepter),
            PeeringSide::Accepter => (&connection.accepter, &connection.requester),
        };
        let caller = resolver.caller().clone();
        let prefix = resolver.prefix().to_string();
        let vpc = self.vpc(&own.vpc, &caller)?;
        let mut batch = RouteBatch::default();

        for route_table in &vpc.route_tables {
            for route in route_table.routes.iter().filter(|r| r.targets_peering(&connection.name)) {
                let key = keys::route_key(&connection.key, &own.vpc, &route_table.name, &route.name);
                if !self.emitted.insert(key.clone()) {
                    debug!("Route {} already planned", key);
                    continue;
                }

                let route_table_id =
                    resolver.resolve(&keys::vpc_route_table_ref(&prefix, &own.vpc, &route_table.name), &own.scope)?;
                let destination = self.destination(route, own, peer, resolver)?;

                if own.scope == caller {
                    batch.routes.push(PeeringRoute {
                        key,
                        peering_key: connection.key.clone(),
                        side,
                        vpc: own.vpc.clone(),
                        route_table: route_table.name.clone(),
                        route_table_id,
                        destination,
                        scope: caller.clone(),
                    });
                } else {
                    debug!("Route {} targets {}, planning a cross-account route", key, own.scope);
                    batch.cross_account_routes.push(CrossAccountRoute {
                        key,
                        peering_key: connection.key.clone(),
                        vpc: own.vpc.clone(),
                        route_table: route_table.name.clone(),
                        route_table_id,
                        destination,
                        owner: own.scope.clone(),
                        owner_account_id: own.account_id.clone(),
                        role_name: keys::role_name(&prefix, RolePurpose::PeeringRoutes, &own.scope.region),
                    });
                }
            }
        }

        Ok(batch)
    }

    /// Destination of a route on `own`'s side, pointing at `peer`
    fn destination(
        &self,
        route: &VpcRouteConfig,
        own: &PeerSide,
        peer: &PeerSide,
        resolver: &mut CrossBoundaryResolver,
    ) -> Result<RouteDestination> {
        let prefix = resolver.prefix().to_string();
        match route.destination_spec() {
            DestinationSpec::Cidr(cidr) => Ok(RouteDestination::Cidr(cidr)),
            DestinationSpec::Ipv6Cidr(cidr) => Ok(RouteDestination::Ipv6Cidr(cidr)),
            DestinationSpec::PrefixList(name) => {
                let deployed = self
                    .config
                    .find_prefix_list(&name)
                    .is_some_and(|pl| pl.is_deployed_to(&own.scope.account, &own.scope.region));
                if !deployed {
                    return Err(NetworkError::configuration(
                        format!("prefixList:{}", name),
                        &own.scope,
                        "prefix list is not deployed to the route table's account and region",
                    ));
                }
                let id = resolver.resolve(&keys::prefix_list_ref(&prefix, &name), &own.scope)?;
                Ok(RouteDestination::PrefixList { name, id })
            }
            DestinationSpec::PeerPrimaryCidr => {
                let peer_vpc = self.vpc(&peer.vpc, &own.scope)?;
                match peer_vpc.cidrs.first() {
                    Some(cidr) => Ok(RouteDestination::Cidr(cidr.clone())),
                    None => {
                        let cidr = resolver.resolve(&keys::vpc_primary_cidr_ref(&prefix, &peer.vpc), &peer.scope)?;
                        Ok(RouteDestination::Cidr(cidr))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::ErrorKind;

    const TOPOLOGY: &str = r#"
global:
  home_region: r1
accounts:
  - name: A
    id: "111111111111"
  - name: B
    id: "222222222222"
network:
  vpcs:
    - name: Hub
      account: A
      region: r1
      cidrs: ["10.0.0.0/16"]
      route_tables:
        - name: main
          routes:
            - name: to-spoke
              type: vpc_peering
              target: P
    - name: Spoke
      account: A
      region: r1
      cidrs: ["10.9.0.0/16"]
      route_tables:
        - name: main
          routes:
            - name: to-hub
              type: vpc_peering
              target: P
            - name: corp
              type: vpc_peering
              destination_prefix_list: corp
              target: P
  vpc_peering:
    - name: P
      vpcs: [Hub, Spoke]
  prefix_lists:
    - name: corp
      accounts: [A]
      regions: [r1]
"#;

    fn seeded(scope: &Scope) -> MemoryBackend {
        MemoryBackend::new()
            .with_value(scope, "/accel/network/vpc/Hub/id", "vpc-hub")
            .with_value(scope, "/accel/network/vpc/Spoke/id", "vpc-spoke")
            .with_value(scope, "/accel/network/vpc/Hub/routeTables/main/id", "rtb-hub")
            .with_value(scope, "/accel/network/vpc/Spoke/routeTables/main/id", "rtb-spoke")
            .with_value(scope, "/accel/network/prefixList/corp/id", "pl-corp")
    }

    fn vpc(name: &str, region: &str, placement: VpcPlacement) -> VpcConfig {
        VpcConfig {
            name: name.into(),
            region: region.into(),
            placement,
            cidrs: vec!["10.0.0.0/16".into()],
            ipam_pool: None,
            route_tables: Vec::new(),
            transit_gateway_attachments: Vec::new(),
            resolver_rules: Vec::new(),
        }
    }

    fn single(account: &str) -> VpcPlacement {
        VpcPlacement::Single { account: account.into() }
    }

    fn templated(accounts: &[&str]) -> VpcPlacement {
        VpcPlacement::Templated {
            deployment_targets: crate::config::DeploymentTargets {
                accounts: accounts.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_classification() {
        let config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let accounts = AccountRegistry::from_config(&config);

        assert!(!classify_cross_account(&vpc("X", "r1", single("A")), &vpc("Y", "r1", single("A")), &accounts));
        assert!(classify_cross_account(&vpc("X", "r1", single("A")), &vpc("Y", "r1", single("B")), &accounts));
        assert!(classify_cross_account(&vpc("X", "r1", single("A")), &vpc("Y", "r2", single("A")), &accounts));
        assert!(!classify_cross_account(
            &vpc("X", "r1", templated(&["A", "B"])),
            &vpc("Y", "r1", templated(&["B", "A"])),
            &accounts
        ));
        // Same size, different members
        assert!(classify_cross_account(
            &vpc("X", "r1", templated(&["A"])),
            &vpc("Y", "r1", templated(&["B"])),
            &accounts
        ));
    }

    #[test]
    fn test_same_scope_peering_is_all_direct() {
        let config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let accounts = AccountRegistry::from_config(&config);
        let scope = Scope::new("A", "r1");
        let backend = seeded(&scope);
        let mut resolver = CrossBoundaryResolver::new(&backend, &accounts, scope.clone(), &config.global);

        let plan = PeeringRouteResolver::new(&config, &accounts).build(&mut resolver).unwrap();

        assert_eq!(plan.connections.len(), 1);
        let connection = &plan.connections[0];
        assert_eq!(connection.key, "P");
        assert!(!connection.cross_account);
        assert_eq!(connection.peer_role_name, None);
        assert_eq!(connection.state(), PeeringState::Routed);
        assert_eq!(connection.accepter_vpc_id.as_deref(), Some("vpc-spoke"));

        let destinations: Vec<String> = plan.routes.iter().map(|r| r.destination.to_string()).collect();
        assert_eq!(destinations, vec!["10.9.0.0/16", "10.0.0.0/16", "pl-corp (corp)"]);
        assert_eq!(plan.routes[0].side, PeeringSide::Requester);
        assert_eq!(plan.routes[0].key, "P_Hub_main_to-spoke");
        assert!(plan.cross_account_routes.is_empty());
        assert!(plan.handler.is_none());
        assert_eq!(plan.publications.len(), 1);
        assert_eq!(plan.publications[0].path, "/accel/network/vpcPeering/P/id");
        assert_eq!(backend.counts().remote_reads, 0);
    }

    #[test]
    fn test_rerouting_is_idempotent() {
        let config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let accounts = AccountRegistry::from_config(&config);
        let scope = Scope::new("A", "r1");
        let backend = seeded(&scope);
        let mut resolver = CrossBoundaryResolver::new(&backend, &accounts, scope, &config.global);
        let mut peering = PeeringRouteResolver::new(&config, &accounts);

        let mut connection = peering.connections_for(&resolver).unwrap().remove(0);
        assert_eq!(connection.state(), PeeringState::CrossAccountClassified);

        let accepter = peering.emit_accepter_routes(&mut connection, &mut resolver).unwrap();
        assert_eq!(accepter.len(), 2);
        assert_eq!(connection.state(), PeeringState::AccepterRouted);
        let requester = peering.emit_requester_routes(&mut connection, &mut resolver).unwrap();
        assert_eq!(requester.len(), 1);
        assert_eq!(connection.state(), PeeringState::Routed);

        assert!(peering.emit_requester_routes(&mut connection, &mut resolver).unwrap().is_empty());
        assert!(peering.emit_accepter_routes(&mut connection, &mut resolver).unwrap().is_empty());

        // A fresh copy of the same connection must not duplicate routes either
        let mut again = peering.connections_for(&resolver).unwrap().remove(0);
        assert!(peering.emit_requester_routes(&mut again, &mut resolver).unwrap().is_empty());
    }

    #[test]
    fn test_accepter_scope_does_not_request() {
        let mut config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        config.network.vpc_peering[0].vpcs.reverse();
        let accounts = AccountRegistry::from_config(&config);
        let backend = MemoryBackend::new();
        let resolver = CrossBoundaryResolver::new(&backend, &accounts, Scope::new("B", "r1"), &config.global);

        let connections = PeeringRouteResolver::new(&config, &accounts).connections_for(&resolver).unwrap();
        assert!(connections.is_empty());
    }

    #[test]
    fn test_prefix_list_must_be_deployed_to_route_owner() {
        let mut config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        config.network.prefix_lists[0].accounts = vec!["B".into()];
        let accounts = AccountRegistry::from_config(&config);
        let scope = Scope::new("A", "r1");
        let backend = seeded(&scope);
        let mut resolver = CrossBoundaryResolver::new(&backend, &accounts, scope, &config.global);

        let err = PeeringRouteResolver::new(&config, &accounts).build(&mut resolver).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.key(), "prefixList:corp");
    }

    #[test]
    fn test_peering_needs_two_vpcs() {
        let mut config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        config.network.vpc_peering[0].vpcs.push("Third".into());
        let accounts = AccountRegistry::from_config(&config);
        let err = PeeringRouteResolver::new(&config, &accounts)
            .expand(&Scope::new("A", "r1"), "accel")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
