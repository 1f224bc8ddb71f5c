//! Deterministic key and path derivation.
//!
//! Every map in the planner, every emitted record and every published value
//! is addressed by a key built here. All functions are pure: any deployment
//! unit can compute the key another unit used without coordination.

use crate::topology::{AttachmentKind, ResourceKind};
use std::fmt;

/// Purpose of an assumed cross-account identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RolePurpose {
    /// Reading published values from another account or region
    ParameterShare,
    /// Writing peering routes into a foreign route table
    PeeringRoutes,
    /// Describing gateway attachments owned by another account
    DescribeAttachments,
}

impl RolePurpose {
    pub fn suffix(&self) -> &'static str {
        match self {
            RolePurpose::ParameterShare => "CrossAccountParameterShare",
            RolePurpose::PeeringRoutes => "VpcPeeringRole",
            RolePurpose::DescribeAttachments => "DescribeTgwAttachRole",
        }
    }
}

impl fmt::Display for RolePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Role name convention: `<prefix>-<PurposeSuffix>-<region>`
pub fn role_name(prefix: &str, purpose: RolePurpose, region: &str) -> String {
    format!("{}-{}-{}", prefix, purpose.suffix(), region)
}

/// `{gateway}_{account}`
pub fn gateway_key(gateway: &str, account: &str) -> String {
    format!("{}_{}", gateway, account)
}

/// `{gateway}_{routeTable}`
pub fn route_table_key(gateway: &str, route_table: &str) -> String {
    format!("{}_{}", gateway, route_table)
}

/// `{gateway}_{owningAccount}_{child}`
pub fn attachment_key(gateway: &str, account: &str, child: &str) -> String {
    format!("{}_{}_{}", gateway, account, child)
}

/// Identity of an attachment/route-table edge, e.g. `Core_B_App__rt1`.
///
/// Depends only on the named pair, never on where the route table appears
/// in a configured list.
pub fn edge_key(attachment_key: &str, route_table: &str) -> String {
    format!("{}__{}", attachment_key, route_table)
}

/// Logical id of an association or propagation inside one unit.
///
/// The account is appended only for children deployable to several accounts.
pub fn association_logical_id(
    attachment_name: &str,
    route_table: &str,
    account: Option<&str>,
    suffix: &str,
) -> String {
    match account {
        Some(account) => format!("{}-{}-{}-{}", attachment_name, route_table, account, suffix),
        None => format!("{}-{}-{}", attachment_name, route_table, suffix),
    }
}

/// Peering connection identity.
///
/// Each templated side contributes its concrete account id so that one
/// peering definition expanded over several accounts never collides.
pub fn peering_key(name: &str, requester_account_id: Option<&str>, accepter_account_id: Option<&str>) -> String {
    let mut key = name.to_string();
    for account_id in [requester_account_id, accepter_account_id].into_iter().flatten() {
        key.push('_');
        key.push_str(account_id);
    }
    key
}

/// Key of an emitted route, unique per connection, route table and entry
pub fn route_key(owner_key: &str, vpc: &str, route_table: &str, entry: &str) -> String {
    format!("{}_{}_{}_{}", owner_key, vpc, route_table, entry)
}

/// Key of a static route on a gateway route table
pub fn gateway_route_key(gateway: &str, route_table: &str, destination: &str) -> String {
    format!("{}_{}_{}", gateway, route_table, destination)
}

/// Key of a resolver rule association
pub fn resolver_rule_association_key(rule: &str, vpc: &str, account: &str) -> String {
    format!("{}_{}_{}", rule, vpc, account)
}

/// A named value addressable in the published-value store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub path: String,
}

impl ResourceRef {
    fn new(kind: ResourceKind, name: impl Into<String>, path: String) -> Self {
        Self {
            kind,
            name: name.into(),
            path,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.kind, self.name, self.path)
    }
}

fn network_path(prefix: &str, segments: &[&str]) -> String {
    let mut path = format!("/{}/network", prefix);
    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }
    path
}

pub fn transit_gateway_ref(prefix: &str, gateway: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::TransitGateway,
        gateway,
        network_path(prefix, &["transitGateways", gateway, "id"]),
    )
}

pub fn transit_gateway_route_table_ref(prefix: &str, gateway: &str, route_table: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::TransitGatewayRouteTable,
        route_table_key(gateway, route_table),
        network_path(prefix, &["transitGateways", gateway, "routeTables", route_table, "id"]),
    )
}

pub fn attachment_ref(prefix: &str, kind: AttachmentKind, child: &str, attachment_name: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::TransitGatewayAttachment,
        format!("{}/{}", child, attachment_name),
        network_path(
            prefix,
            &[kind.path_segment(), child, "transitGatewayAttachment", attachment_name, "id"],
        ),
    )
}

pub fn vpc_ref(prefix: &str, vpc: &str) -> ResourceRef {
    ResourceRef::new(ResourceKind::Vpc, vpc, network_path(prefix, &["vpc", vpc, "id"]))
}

pub fn vpc_route_table_ref(prefix: &str, vpc: &str, route_table: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::VpcRouteTable,
        format!("{}/{}", vpc, route_table),
        network_path(prefix, &["vpc", vpc, "routeTables", route_table, "id"]),
    )
}

pub fn vpc_primary_cidr_ref(prefix: &str, vpc: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::VpcCidr,
        vpc,
        network_path(prefix, &["vpc", vpc, "cidr", "primary"]),
    )
}

pub fn prefix_list_ref(prefix: &str, name: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::PrefixList,
        name,
        network_path(prefix, &["prefixList", name, "id"]),
    )
}

pub fn resolver_rule_ref(prefix: &str, name: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::ResolverRule,
        name,
        network_path(prefix, &["route53Resolver", "rule", name, "id"]),
    )
}

pub fn vpc_peering_ref(prefix: &str, peering_key: &str) -> ResourceRef {
    ResourceRef::new(
        ResourceKind::VpcPeering,
        peering_key,
        network_path(prefix, &["vpcPeering", peering_key, "id"]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_keys() {
        assert_eq!(gateway_key("Core", "Network"), "Core_Network");
        assert_eq!(route_table_key("Core", "rt1"), "Core_rt1");
        let attachment = attachment_key("Core", "B", "App");
        assert_eq!(attachment, "Core_B_App");
        assert_eq!(edge_key(&attachment, "rt1"), "Core_B_App__rt1");
    }

    #[test]
    fn test_edge_keys_stable_under_reordering() {
        let attachment = attachment_key("Core", "B", "App");
        let forward: Vec<String> = ["rt1", "rt2", "rt3"].iter().map(|rt| edge_key(&attachment, rt)).collect();
        let mut reversed: Vec<String> = ["rt3", "rt2", "rt1"].iter().map(|rt| edge_key(&attachment, rt)).collect();
        reversed.sort();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_logical_id_account_suffix_only_when_given() {
        assert_eq!(
            association_logical_id("App-Core", "rt1", None, "association"),
            "App-Core-rt1-association"
        );
        assert_eq!(
            association_logical_id("App-Core", "rt1", Some("Dev"), "association"),
            "App-Core-rt1-Dev-association"
        );
    }

    #[test]
    fn test_peering_key_suffixes() {
        assert_eq!(peering_key("P", None, None), "P");
        assert_eq!(peering_key("P", None, Some("111111111111")), "P_111111111111");
        assert_eq!(
            peering_key("P", Some("111111111111"), Some("222222222222")),
            "P_111111111111_222222222222"
        );
    }

    #[test]
    fn test_paths_and_roles() {
        assert_eq!(transit_gateway_ref("accel", "Core").path, "/accel/network/transitGateways/Core/id");
        assert_eq!(
            transit_gateway_route_table_ref("accel", "Core", "rt1").path,
            "/accel/network/transitGateways/Core/routeTables/rt1/id"
        );
        assert_eq!(
            attachment_ref("accel", AttachmentKind::Vpc, "App", "App-Core").path,
            "/accel/network/vpc/App/transitGatewayAttachment/App-Core/id"
        );
        assert_eq!(vpc_primary_cidr_ref("accel", "App").path, "/accel/network/vpc/App/cidr/primary");
        assert_eq!(
            role_name("accel", RolePurpose::PeeringRoutes, "eu-west-1"),
            "accel-VpcPeeringRole-eu-west-1"
        );
    }
}
