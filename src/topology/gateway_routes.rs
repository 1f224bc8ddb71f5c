//! Static routes on gateway route tables.
//!
//! Only the unit owning the gateway writes its route tables. A route either
//! drops traffic or forwards it to an attachment already present in the
//! unit's attachment map.

use log::info;
use serde::Serialize;

use crate::config::{Config, GatewayRouteConfig, TransitGatewayConfig};
use crate::error::{NetworkError, Result};
use crate::keys;
use crate::topology::maps::TopologyBuildContext;
use crate::topology::types::{RouteDestination, Scope};

/// What a gateway route does with matching traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayRouteAction {
    Blackhole,
    Forward { attachment_key: String, attachment_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayRouteRecord {
    pub key: String,
    pub gateway: String,
    pub route_table: String,
    pub route_table_id: String,
    pub destination: RouteDestination,
    pub action: GatewayRouteAction,
    pub scope: Scope,
}

/// Build the static routes of every gateway owned by the context's scope
pub fn build_gateway_routes(config: &Config, ctx: &TopologyBuildContext) -> Result<Vec<GatewayRouteRecord>> {
    let mut records = Vec::new();

    for tgw in &config.network.transit_gateways {
        if tgw.account != ctx.scope.account || tgw.region != ctx.scope.region {
            continue;
        }
        for route_table in &tgw.route_tables {
            let route_table_id = ctx
                .route_table_id(&tgw.region, &tgw.name, &route_table.name)
                .ok_or_else(|| {
                    NetworkError::not_found(keys::route_table_key(&tgw.name, &route_table.name), &ctx.scope)
                })?;

            for route in &route_table.routes {
                let destination = destination(route, ctx)?;
                let action = action(tgw, route, ctx)?;
                records.push(GatewayRouteRecord {
                    key: keys::gateway_route_key(&tgw.name, &route_table.name, destination.label()),
                    gateway: tgw.name.clone(),
                    route_table: route_table.name.clone(),
                    route_table_id: route_table_id.to_string(),
                    destination,
                    action,
                    scope: ctx.scope.clone(),
                });
            }
        }
    }

    if !records.is_empty() {
        info!("Planned {} gateway routes for {}", records.len(), ctx.scope);
    }
    Ok(records)
}

fn destination(route: &GatewayRouteConfig, ctx: &TopologyBuildContext) -> Result<RouteDestination> {
    if let Some(cidr) = &route.destination_cidr_block {
        return Ok(RouteDestination::Cidr(cidr.clone()));
    }
    let name = route.destination_prefix_list.as_deref().unwrap_or_default();
    let id = ctx.prefix_lists.get(name).ok_or_else(|| {
        NetworkError::configuration(
            format!("prefixList:{}", name),
            &ctx.scope,
            "prefix list is not deployed to the gateway's account and region",
        )
    })?;
    Ok(RouteDestination::PrefixList {
        name: name.to_string(),
        id: id.clone(),
    })
}

fn action(tgw: &TransitGatewayConfig, route: &GatewayRouteConfig, ctx: &TopologyBuildContext) -> Result<GatewayRouteAction> {
    let Some(target) = &route.attachment else {
        return Ok(GatewayRouteAction::Blackhole);
    };

    let mut matches = ctx.attachments.iter().filter(|(_, entry)| {
        let d = &entry.descriptor;
        d.gateway == tgw.name
            && d.gateway_account == tgw.account
            && d.kind == target.kind
            && d.child == target.name
            && target.account.as_ref().map_or(true, |account| *account == d.owner.account)
    });

    let missing = || {
        NetworkError::configuration(
            format!("{}:{}", target.kind, target.name),
            &ctx.scope,
            format!("no {} attachment '{}' on gateway '{}'", target.kind, target.name, tgw.name),
        )
    };
    let (key, entry) = matches.next().ok_or_else(missing)?;
    if matches.next().is_some() {
        return Err(NetworkError::configuration(
            format!("{}:{}", target.kind, target.name),
            &ctx.scope,
            "attachment exists in several accounts; name the account on the route",
        ));
    }

    Ok(GatewayRouteAction::Forward {
        attachment_key: key.clone(),
        attachment_id: entry.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountRegistry;
    use crate::backend::MemoryBackend;
    use crate::error::ErrorKind;
    use crate::resolver::CrossBoundaryResolver;
    use crate::topology::maps::TopologyMapBuilder;

    const TOPOLOGY: &str = r#"
global:
  home_region: r1
accounts:
  - name: A
    id: "111111111111"
  - name: B
    id: "222222222222"
network:
  transit_gateways:
    - name: Core
      account: A
      region: r1
      route_tables:
        - name: rt1
          routes:
            - destination_cidr_block: 10.1.0.0/16
              attachment: { type: vpc, name: App }
            - destination_prefix_list: corp
              blackhole: true
  vpcs:
    - name: App
      account: B
      region: r1
      cidrs: ["10.1.0.0/16"]
      transit_gateway_attachments:
        - name: App-Core
          transit_gateway: { name: Core, account: A }
  prefix_lists:
    - name: corp
      accounts: [A]
      regions: [r1]
      entries: ["10.0.0.0/8"]
"#;

    fn gateway_context(config: &Config) -> TopologyBuildContext {
        let accounts = AccountRegistry::from_config(config);
        let a = Scope::new("A", "r1");
        let backend = MemoryBackend::new()
            .with_value(&a, "/accel/network/transitGateways/Core/id", "tgw-1")
            .with_value(&a, "/accel/network/transitGateways/Core/routeTables/rt1/id", "tgw-rtb-1")
            .with_value(&a, "/accel/network/prefixList/corp/id", "pl-1")
            .with_attachment(&Scope::new("B", "r1"), "tgw-1", "App-Core", "tgw-attach-app");
        let mut resolver = CrossBoundaryResolver::new(&backend, &accounts, a, &config.global);
        TopologyMapBuilder::new(config, &accounts).build(&mut resolver).unwrap()
    }

    #[test]
    fn test_forward_and_blackhole_routes() {
        let config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let ctx = gateway_context(&config);
        let routes = build_gateway_routes(&config, &ctx).unwrap();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].key, "Core_rt1_10.1.0.0/16");
        assert_eq!(
            routes[0].action,
            GatewayRouteAction::Forward {
                attachment_key: "Core_B_App".into(),
                attachment_id: "tgw-attach-app".into()
            }
        );
        assert_eq!(routes[1].action, GatewayRouteAction::Blackhole);
        assert_eq!(
            routes[1].destination,
            RouteDestination::PrefixList {
                name: "corp".into(),
                id: "pl-1".into()
            }
        );
    }

    #[test]
    fn test_attachment_owner_emits_no_gateway_routes() {
        let config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let ctx = TopologyBuildContext::new(Scope::new("B", "r1"));
        assert!(build_gateway_routes(&config, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_target_attachment() {
        let mut config: Config = serde_yaml::from_str(TOPOLOGY).unwrap();
        let ctx = gateway_context(&config);
        if let Some(target) = config.network.transit_gateways[0].route_tables[0].routes[0].attachment.as_mut() {
            target.name = "Ghost".into();
        }
        let err = build_gateway_routes(&config, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.key(), "vpc:Ghost");
    }
}
