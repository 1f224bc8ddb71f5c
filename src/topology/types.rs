//! Topology type definitions.
//!
//! This file contains the small value types shared by every stage of the
//! planner: execution scopes, resource kinds and attachment kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An (account, region) pair identifying where a resource lives or where
/// the current deployment unit is executing.
///
/// Accounts are referenced by their configured *name*; the account registry
/// maps names to ids when an identity has to be assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub account: String,
    pub region: String,
}

impl Scope {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// Returns true if both scopes belong to the same account
    pub fn same_account(&self, other: &Scope) -> bool {
        self.account == other.account
    }

    /// Returns true if both scopes are in the same region
    pub fn same_region(&self, other: &Scope) -> bool {
        self.region == other.region
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}

/// Kind of resource whose identifier can be resolved or published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    TransitGateway,
    TransitGatewayRouteTable,
    TransitGatewayAttachment,
    Vpc,
    VpcRouteTable,
    VpcCidr,
    PrefixList,
    ResolverRule,
    VpcPeering,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::TransitGateway => "transit_gateway",
            ResourceKind::TransitGatewayRouteTable => "transit_gateway_route_table",
            ResourceKind::TransitGatewayAttachment => "transit_gateway_attachment",
            ResourceKind::Vpc => "vpc",
            ResourceKind::VpcRouteTable => "vpc_route_table",
            ResourceKind::VpcCidr => "vpc_cidr",
            ResourceKind::PrefixList => "prefix_list",
            ResourceKind::ResolverRule => "resolver_rule",
            ResourceKind::VpcPeering => "vpc_peering",
        }
    }

    /// Resources that an owning account shares into consumer accounts of the
    /// same region. Those are visible through a resource-share lookup without
    /// assuming any identity.
    pub fn is_shareable(&self) -> bool {
        matches!(self, ResourceKind::TransitGateway | ResourceKind::ResolverRule)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The child resource type an attachment connects to a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Vpc,
    Vpn,
    DirectConnect,
    Peering,
}

impl AttachmentKind {
    /// Segment used when deriving published-value paths
    pub fn path_segment(&self) -> &'static str {
        match self {
            AttachmentKind::Vpc => "vpc",
            AttachmentKind::Vpn => "vpnConnection",
            AttachmentKind::DirectConnect => "directConnectGateway",
            AttachmentKind::Peering => "transitGatewayPeering",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttachmentKind::Vpc => "vpc",
            AttachmentKind::Vpn => "vpn",
            AttachmentKind::DirectConnect => "direct_connect",
            AttachmentKind::Peering => "peering",
        };
        f.write_str(name)
    }
}

/// Resolved destination of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDestination {
    Cidr(String),
    Ipv6Cidr(String),
    PrefixList { name: String, id: String },
}

impl RouteDestination {
    /// Short label used in route keys
    pub fn label(&self) -> &str {
        match self {
            RouteDestination::Cidr(cidr) | RouteDestination::Ipv6Cidr(cidr) => cidr,
            RouteDestination::PrefixList { name, .. } => name,
        }
    }
}

impl fmt::Display for RouteDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDestination::Cidr(cidr) | RouteDestination::Ipv6Cidr(cidr) => f.write_str(cidr),
            RouteDestination::PrefixList { name, id } => write!(f, "{} ({})", id, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_display_and_comparisons() {
        let a = Scope::new("Network", "us-east-1");
        let b = Scope::new("Network", "eu-west-1");
        let c = Scope::new("Workload", "us-east-1");

        assert_eq!(a.to_string(), "Network/us-east-1");
        assert!(a.same_account(&b));
        assert!(!a.same_region(&b));
        assert!(a.same_region(&c));
        assert_ne!(a, c);
    }

    #[test]
    fn test_shareable_kinds() {
        assert!(ResourceKind::TransitGateway.is_shareable());
        assert!(ResourceKind::ResolverRule.is_shareable());
        assert!(!ResourceKind::PrefixList.is_shareable());
        assert!(!ResourceKind::VpcRouteTable.is_shareable());
    }
}
