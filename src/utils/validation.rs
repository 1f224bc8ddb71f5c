//! Configuration validation utilities.
//!
//! This module provides the static cross-reference checks run when a
//! topology file is loaded. Everything here is pure: no lookups happen,
//! only names and formats are checked against each other.

use crate::config::{AccountConfig, Config, DeploymentTargets, TransitGatewayConfig, VpcPlacement, VpcRouteType};
use crate::utils::ip_utils::{is_valid_cidr, is_valid_ipv6_cidr};
use regex::Regex;
use std::collections::HashSet;

/// Validate the account list
///
/// Checks for:
/// - Empty or duplicate account names
/// - Account ids that are not exactly 12 digits
/// - Duplicate account ids
///
/// # Examples
/// ```
/// use netweave::config::AccountConfig;
/// use netweave::utils::validation::validate_accounts;
///
/// let accounts = vec![AccountConfig {
///     name: "Network".to_string(),
///     id: "111111111111".to_string(),
///     organizational_unit: None,
/// }];
/// assert!(validate_accounts(&accounts).is_ok());
/// ```
pub fn validate_accounts(accounts: &[AccountConfig]) -> Result<(), String> {
    let id_pattern = Regex::new(r"^\d{12}$").map_err(|e| e.to_string())?;
    let mut names = HashSet::new();
    let mut ids = HashSet::new();

    for account in accounts {
        if account.name.is_empty() {
            return Err("account name cannot be empty".to_string());
        }
        if !id_pattern.is_match(&account.id) {
            return Err(format!(
                "account '{}' has invalid id '{}' (expected 12 digits)",
                account.name, account.id
            ));
        }
        if !names.insert(account.name.as_str()) {
            return Err(format!("duplicate account name '{}'", account.name));
        }
        if !ids.insert(account.id.as_str()) {
            return Err(format!("duplicate account id '{}'", account.id));
        }
    }

    Ok(())
}

fn account_exists(config: &Config, name: &str) -> bool {
    config.accounts.iter().any(|a| a.name == name)
}

fn validate_targets(config: &Config, owner: &str, targets: &DeploymentTargets) -> Result<(), String> {
    if targets.accounts.is_empty() && targets.organizational_units.is_empty() {
        return Err(format!("'{}': deployment_targets must list accounts or organizational_units", owner));
    }
    for account in targets.accounts.iter().chain(targets.excluded_accounts.iter()) {
        if !account_exists(config, account) {
            return Err(format!("'{}': unknown account '{}' in deployment_targets", owner, account));
        }
    }
    Ok(())
}

fn check_route_tables(tgw: &TransitGatewayConfig, owner: &str, names: &[String]) -> Result<(), String> {
    match names.iter().find(|name| !tgw.has_route_table(name)) {
        Some(name) => Err(format!(
            "{}: transit gateway '{}' has no route table '{}'",
            owner, tgw.name, name
        )),
        None => Ok(()),
    }
}

/// Validate transit gateway definitions
///
/// Checks for:
/// - Unknown owning accounts
/// - More than one gateway with the same name in one account
/// - More than one gateway with the same name in one region (route table
///   keys are `{gateway}_{routeTable}` within a region)
/// - Static routes with zero or two destinations, or with no target
pub fn validate_gateways(config: &Config) -> Result<(), String> {
    let mut per_account = HashSet::new();
    let mut per_region = HashSet::new();

    for tgw in &config.network.transit_gateways {
        if !account_exists(config, &tgw.account) {
            return Err(format!("transit gateway '{}': unknown account '{}'", tgw.name, tgw.account));
        }
        if !per_account.insert((tgw.name.as_str(), tgw.account.as_str())) {
            return Err(format!(
                "transit gateway '{}' is defined twice in account '{}'",
                tgw.name, tgw.account
            ));
        }
        if !per_region.insert((tgw.name.as_str(), tgw.region.as_str())) {
            return Err(format!(
                "transit gateway name '{}' is used twice in region '{}'",
                tgw.name, tgw.region
            ));
        }

        let mut route_tables = HashSet::new();
        for rt in &tgw.route_tables {
            if !route_tables.insert(rt.name.as_str()) {
                return Err(format!("transit gateway '{}': duplicate route table '{}'", tgw.name, rt.name));
            }
            for route in &rt.routes {
                match (&route.destination_cidr_block, &route.destination_prefix_list) {
                    (Some(_), Some(_)) | (None, None) => {
                        return Err(format!(
                            "transit gateway '{}' route table '{}': exactly one of destination_cidr_block or destination_prefix_list is required",
                            tgw.name, rt.name
                        ));
                    }
                    (Some(cidr), None) if !is_valid_cidr(cidr) => {
                        return Err(format!("transit gateway '{}': invalid CIDR '{}'", tgw.name, cidr));
                    }
                    _ => {}
                }
                if route.blackhole == route.attachment.is_some() {
                    return Err(format!(
                        "transit gateway '{}' route table '{}': a route needs either blackhole or an attachment",
                        tgw.name, rt.name
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Validate VPC definitions
///
/// Checks for:
/// - Duplicate VPC names and unknown accounts
/// - Missing or malformed CIDRs (a VPC needs static CIDRs or an IPAM pool)
/// - Route entries with more than one destination
/// - Peering routes without a target
/// - Attachments to gateways or route tables that are not defined
pub fn validate_vpcs(config: &Config) -> Result<(), String> {
    let mut names = HashSet::new();

    for vpc in &config.network.vpcs {
        if !names.insert(vpc.name.as_str()) {
            return Err(format!("duplicate VPC name '{}'", vpc.name));
        }

        match &vpc.placement {
            VpcPlacement::Single { account } => {
                if !account_exists(config, account) {
                    return Err(format!("VPC '{}': unknown account '{}'", vpc.name, account));
                }
            }
            VpcPlacement::Templated { deployment_targets } => {
                validate_targets(config, &vpc.name, deployment_targets)?;
            }
        }

        if vpc.cidrs.is_empty() && vpc.ipam_pool.is_none() {
            return Err(format!("VPC '{}': either cidrs or ipam_pool is required", vpc.name));
        }
        if let Some(cidr) = vpc.cidrs.iter().find(|c| !is_valid_cidr(c)) {
            return Err(format!("VPC '{}': invalid CIDR '{}'", vpc.name, cidr));
        }

        for rt in &vpc.route_tables {
            for route in &rt.routes {
                let given = [
                    route.destination.is_some(),
                    route.destination_prefix_list.is_some(),
                    route.ipv6_destination.is_some(),
                ]
                .iter()
                .filter(|set| **set)
                .count();
                if given > 1 {
                    return Err(format!(
                        "VPC '{}' route '{}': destination, destination_prefix_list and ipv6_destination are mutually exclusive",
                        vpc.name, route.name
                    ));
                }
                if let Some(cidr) = &route.destination {
                    if !is_valid_cidr(cidr) {
                        return Err(format!("VPC '{}' route '{}': invalid CIDR '{}'", vpc.name, route.name, cidr));
                    }
                }
                if let Some(cidr) = &route.ipv6_destination {
                    if !is_valid_ipv6_cidr(cidr) {
                        return Err(format!(
                            "VPC '{}' route '{}': invalid IPv6 CIDR '{}'",
                            vpc.name, route.name, cidr
                        ));
                    }
                }
                if route.route_type == VpcRouteType::VpcPeering && route.target.is_none() {
                    return Err(format!("VPC '{}' route '{}': peering routes need a target", vpc.name, route.name));
                }
            }
        }

        for attachment in &vpc.transit_gateway_attachments {
            let tgw_ref = &attachment.transit_gateway;
            let Some(tgw) = config.find_transit_gateway(&tgw_ref.name, &tgw_ref.account) else {
                return Err(format!(
                    "VPC '{}' attachment '{}': unknown transit gateway '{}' in account '{}'",
                    vpc.name, attachment.name, tgw_ref.name, tgw_ref.account
                ));
            };
            let owner = format!("VPC '{}' attachment '{}'", vpc.name, attachment.name);
            check_route_tables(tgw, &owner, &attachment.route_table_associations)?;
            check_route_tables(tgw, &owner, &attachment.route_table_propagations)?;
        }
    }

    Ok(())
}

/// Validate VPC peering definitions
///
/// A peering names exactly two distinct, defined VPCs.
pub fn validate_peerings(config: &Config) -> Result<(), String> {
    let mut names = HashSet::new();

    for peering in &config.network.vpc_peering {
        if !names.insert(peering.name.as_str()) {
            return Err(format!("duplicate peering name '{}'", peering.name));
        }
        if peering.vpcs.len() != 2 {
            return Err(format!(
                "peering '{}' must name exactly two VPCs, found {}",
                peering.name,
                peering.vpcs.len()
            ));
        }
        if peering.vpcs[0] == peering.vpcs[1] {
            return Err(format!("peering '{}' cannot peer VPC '{}' with itself", peering.name, peering.vpcs[0]));
        }
        for vpc in &peering.vpcs {
            if config.find_vpc(vpc).is_none() {
                return Err(format!("peering '{}': unknown VPC '{}'", peering.name, vpc));
            }
        }
    }

    Ok(())
}

/// Validate VPN, Direct Connect and gateway peering attachments
///
/// Checks for:
/// - Unknown accounts
/// - Gateways that are not defined, or live in another region than the
///   VPN's customer gateway or the peering side
/// - Route tables the gateway does not define
/// - Duplicate VPN connection and gateway peering names
pub fn validate_attachments(config: &Config) -> Result<(), String> {
    let mut vpns = HashSet::new();
    for cgw in &config.network.customer_gateways {
        if !account_exists(config, &cgw.account) {
            return Err(format!("customer gateway '{}': unknown account '{}'", cgw.name, cgw.account));
        }
        for vpn in &cgw.vpn_connections {
            if !vpns.insert((vpn.name.as_str(), cgw.account.as_str())) {
                return Err(format!("duplicate VPN connection '{}' in account '{}'", vpn.name, cgw.account));
            }
            let owner = format!("VPN connection '{}'", vpn.name);
            let Some(tgw) = config.find_transit_gateway(&vpn.transit_gateway, &cgw.account) else {
                return Err(format!(
                    "{}: unknown transit gateway '{}' in account '{}'",
                    owner, vpn.transit_gateway, cgw.account
                ));
            };
            if tgw.region != cgw.region {
                return Err(format!(
                    "{}: transit gateway '{}' is in {} but customer gateway '{}' is in {}",
                    owner, tgw.name, tgw.region, cgw.name, cgw.region
                ));
            }
            check_route_tables(tgw, &owner, &vpn.route_table_associations)?;
            check_route_tables(tgw, &owner, &vpn.route_table_propagations)?;
        }
    }

    for dx in &config.network.direct_connect_gateways {
        if !account_exists(config, &dx.account) {
            return Err(format!("Direct Connect gateway '{}': unknown account '{}'", dx.name, dx.account));
        }
        for association in &dx.transit_gateway_associations {
            let owner = format!("Direct Connect gateway '{}'", dx.name);
            let Some(tgw) = config.find_transit_gateway(&association.name, &association.account) else {
                return Err(format!(
                    "{}: unknown transit gateway '{}' in account '{}'",
                    owner, association.name, association.account
                ));
            };
            check_route_tables(tgw, &owner, &association.route_table_associations)?;
            check_route_tables(tgw, &owner, &association.route_table_propagations)?;
        }
    }

    let mut peerings = HashSet::new();
    for peering in &config.network.transit_gateway_peering {
        if !peerings.insert(peering.name.as_str()) {
            return Err(format!("duplicate transit gateway peering '{}'", peering.name));
        }
        for side in [&peering.requester, &peering.accepter] {
            let owner = format!("transit gateway peering '{}'", peering.name);
            if !account_exists(config, &side.account) {
                return Err(format!("{}: unknown account '{}'", owner, side.account));
            }
            let Some(tgw) = config.find_transit_gateway(&side.transit_gateway_name, &side.account) else {
                return Err(format!(
                    "{}: unknown transit gateway '{}' in account '{}'",
                    owner, side.transit_gateway_name, side.account
                ));
            };
            if tgw.region != side.region {
                return Err(format!(
                    "{}: transit gateway '{}' is in {}, not {}",
                    owner, tgw.name, tgw.region, side.region
                ));
            }
            check_route_tables(tgw, &owner, &side.route_table_associations)?;
        }
        if peering.requester.transit_gateway_name == peering.accepter.transit_gateway_name
            && peering.requester.account == peering.accepter.account
        {
            return Err(format!("transit gateway peering '{}' peers a gateway with itself", peering.name));
        }
    }

    Ok(())
}

/// Validate resolver rules and the VPCs that use them
pub fn validate_resolver_rules(config: &Config) -> Result<(), String> {
    let mut names = HashSet::new();
    for rule in &config.network.resolver_rules {
        if !names.insert(rule.name.as_str()) {
            return Err(format!("duplicate resolver rule '{}'", rule.name));
        }
        if !account_exists(config, &rule.account) {
            return Err(format!("resolver rule '{}': unknown account '{}'", rule.name, rule.account));
        }
    }

    for vpc in &config.network.vpcs {
        for name in &vpc.resolver_rules {
            match config.find_resolver_rule(name) {
                None => return Err(format!("VPC '{}': unknown resolver rule '{}'", vpc.name, name)),
                Some(rule) if rule.region != vpc.region => {
                    return Err(format!(
                        "VPC '{}': resolver rule '{}' is in {}, not {}",
                        vpc.name, name, rule.region, vpc.region
                    ))
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;

    fn config(network: &str) -> Config {
        let yaml = format!(
            r#"
global:
  home_region: us-east-1
accounts:
  - name: Network
    id: "111111111111"
  - name: Dev
    id: "222222222222"
network:
{}
"#,
            network
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_duplicate_gateway_in_account() {
        let config = config(
            r#"
  transit_gateways:
    - name: Core
      account: Network
      region: us-east-1
    - name: Core
      account: Network
      region: us-west-2
"#,
        );
        let err = validate_gateways(&config).unwrap_err();
        assert!(err.contains("defined twice"));
    }

    #[test]
    fn test_gateway_route_requires_single_target() {
        let config = config(
            r#"
  transit_gateways:
    - name: Core
      account: Network
      region: us-east-1
      route_tables:
        - name: rt1
          routes:
            - destination_cidr_block: 10.0.0.0/8
"#,
        );
        assert!(validate_gateways(&config).is_err());
    }

    #[test]
    fn test_attachment_to_unknown_gateway() {
        let config = config(
            r#"
  vpcs:
    - name: App
      account: Dev
      region: us-east-1
      cidrs: ["10.1.0.0/16"]
      transit_gateway_attachments:
        - name: App-Core
          transit_gateway:
            name: Core
            account: Network
"#,
        );
        let err = validate_vpcs(&config).unwrap_err();
        assert!(err.contains("unknown transit gateway"));
    }

    #[test]
    fn test_vpc_requires_cidr_source() {
        let config = config(
            r#"
  vpcs:
    - name: App
      account: Dev
      region: us-east-1
"#,
        );
        assert!(validate_vpcs(&config).is_err());
    }

    #[test]
    fn test_peering_shape() {
        let config = config(
            r#"
  vpcs:
    - name: App
      account: Dev
      region: us-east-1
      cidrs: ["10.1.0.0/16"]
  vpc_peering:
    - name: P
      vpcs: [App]
"#,
        );
        assert!(validate_peerings(&config).is_err());
    }

    #[test]
    fn test_templated_targets_reference_known_accounts() {
        let config = config(
            r#"
  vpcs:
    - name: App
      region: us-east-1
      cidrs: ["10.1.0.0/16"]
      deployment_targets:
        accounts: [Dev, Missing]
"#,
        );
        let err = validate_vpcs(&config).unwrap_err();
        assert!(err.contains("Missing"));
    }

    const EDGE_GATEWAYS: &str = r#"
  transit_gateways:
    - name: Core
      account: Network
      region: us-east-1
      route_tables:
        - name: rt1
    - name: Far
      account: Dev
      region: us-west-2
      route_tables:
        - name: rt9
"#;

    #[test]
    fn test_edge_attachments_are_valid() {
        let config = config(&format!(
            "{}{}",
            EDGE_GATEWAYS,
            r#"
  customer_gateways:
    - name: dc1
      account: Network
      region: us-east-1
      vpn_connections:
        - name: vpn1
          transit_gateway: Core
          route_table_associations: [rt1]
          route_table_propagations: [rt1]
  direct_connect_gateways:
    - name: dx
      account: Dev
      transit_gateway_associations:
        - name: Core
          account: Network
          route_table_propagations: [rt1]
  transit_gateway_peering:
    - name: tp
      requester: { transit_gateway_name: Core, account: Network, region: us-east-1 }
      accepter: { transit_gateway_name: Far, account: Dev, region: us-west-2, route_table_associations: [rt9] }
"#
        ));
        assert!(validate_attachments(&config).is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_vpn_on_unknown_gateway_fails_validation() {
        let config = config(&format!(
            "{}{}",
            EDGE_GATEWAYS,
            r#"
  customer_gateways:
    - name: dc1
      account: Network
      region: us-east-1
      vpn_connections:
        - name: vpn1
          transit_gateway: Edge
"#
        ));
        let err = validate_attachments(&config).unwrap_err();
        assert!(err.contains("unknown transit gateway 'Edge'"), "{}", err);
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNetwork(_))));
    }

    #[test]
    fn test_direct_connect_checks_account_and_route_tables() {
        let unknown_account = config(&format!(
            "{}{}",
            EDGE_GATEWAYS,
            r#"
  direct_connect_gateways:
    - name: dx
      account: Ghost
"#
        ));
        assert!(validate_attachments(&unknown_account).unwrap_err().contains("unknown account 'Ghost'"));

        let unknown_table = config(&format!(
            "{}{}",
            EDGE_GATEWAYS,
            r#"
  direct_connect_gateways:
    - name: dx
      account: Dev
      transit_gateway_associations:
        - name: Core
          account: Network
          route_table_propagations: [rt7]
"#
        ));
        assert!(validate_attachments(&unknown_table).unwrap_err().contains("no route table 'rt7'"));
    }

    #[test]
    fn test_gateway_peering_side_region_must_match() {
        let config = config(&format!(
            "{}{}",
            EDGE_GATEWAYS,
            r#"
  transit_gateway_peering:
    - name: tp
      requester: { transit_gateway_name: Core, account: Network, region: us-east-1 }
      accepter: { transit_gateway_name: Far, account: Dev, region: us-east-1 }
"#
        ));
        let err = validate_attachments(&config).unwrap_err();
        assert!(err.contains("'Far' is in us-west-2"), "{}", err);
    }

    #[test]
    fn test_resolver_rules_reference_known_accounts_and_rules() {
        let unknown_account = config(
            r#"
  resolver_rules:
    - name: corp-forward
      account: Ghost
      region: us-east-1
"#,
        );
        assert!(validate_resolver_rules(&unknown_account).is_err());

        let unknown_rule = config(
            r#"
  vpcs:
    - name: App
      account: Dev
      region: us-east-1
      cidrs: ["10.1.0.0/16"]
      resolver_rules: [corp-forward]
"#,
        );
        let err = validate_resolver_rules(&unknown_rule).unwrap_err();
        assert!(err.contains("unknown resolver rule 'corp-forward'"));
    }

    #[test]
    fn test_vpc_attachment_route_tables_must_exist() {
        let config = config(&format!(
            "{}{}",
            EDGE_GATEWAYS,
            r#"
  vpcs:
    - name: App
      account: Dev
      region: us-east-1
      cidrs: ["10.1.0.0/16"]
      transit_gateway_attachments:
        - name: App-Core
          transit_gateway: { name: Core, account: Network }
          route_table_associations: [rt2]
"#
        ));
        assert!(validate_vpcs(&config).unwrap_err().contains("no route table 'rt2'"));
    }
}
