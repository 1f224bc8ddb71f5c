use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::topology::AttachmentKind;
use crate::utils::validation;

fn default_prefix() -> String {
    "accel".to_string()
}

/// Top-level topology description that mirrors the YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub global: GlobalConfig,
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.global.home_region.is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "home_region cannot be empty".to_string(),
            ));
        }
        if self.global.prefix.is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "prefix cannot be empty".to_string(),
            ));
        }

        validation::validate_accounts(&self.accounts).map_err(ValidationError::InvalidAccount)?;
        validation::validate_gateways(self).map_err(ValidationError::InvalidNetwork)?;
        validation::validate_vpcs(self).map_err(ValidationError::InvalidNetwork)?;
        validation::validate_peerings(self).map_err(ValidationError::InvalidNetwork)?;
        validation::validate_attachments(self).map_err(ValidationError::InvalidNetwork)?;
        validation::validate_resolver_rules(self).map_err(ValidationError::InvalidNetwork)?;

        Ok(())
    }

    pub fn find_transit_gateway(&self, name: &str, account: &str) -> Option<&TransitGatewayConfig> {
        self.network
            .transit_gateways
            .iter()
            .find(|tgw| tgw.name == name && tgw.account == account)
    }

    pub fn find_vpc(&self, name: &str) -> Option<&VpcConfig> {
        self.network.vpcs.iter().find(|vpc| vpc.name == name)
    }

    pub fn find_prefix_list(&self, name: &str) -> Option<&PrefixListConfig> {
        self.network.prefix_lists.iter().find(|pl| pl.name == name)
    }

    pub fn find_resolver_rule(&self, name: &str) -> Option<&ResolverRuleConfig> {
        self.network.resolver_rules.iter().find(|rule| rule.name == name)
    }
}

/// Settings shared by every deployment unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Region the deployment pipeline runs from
    pub home_region: String,
    /// Prefix for published-value paths and role names
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

/// A member account of the organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    /// 12-digit account id
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
}

/// Network section of the topology
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub transit_gateways: Vec<TransitGatewayConfig>,
    #[serde(default)]
    pub vpcs: Vec<VpcConfig>,
    #[serde(default)]
    pub vpc_peering: Vec<VpcPeeringConfig>,
    #[serde(default)]
    pub prefix_lists: Vec<PrefixListConfig>,
    #[serde(default)]
    pub transit_gateway_peering: Vec<TransitGatewayPeeringConfig>,
    #[serde(default)]
    pub customer_gateways: Vec<CustomerGatewayConfig>,
    #[serde(default)]
    pub direct_connect_gateways: Vec<DirectConnectGatewayConfig>,
    #[serde(default)]
    pub resolver_rules: Vec<ResolverRuleConfig>,
    #[serde(default)]
    pub externally_managed: ExternallyManagedConfig,
}

/// Transit gateway definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitGatewayConfig {
    pub name: String,
    pub account: String,
    pub region: String,
    #[serde(default)]
    pub route_tables: Vec<GatewayRouteTableConfig>,
}

impl TransitGatewayConfig {
    pub fn has_route_table(&self, name: &str) -> bool {
        self.route_tables.iter().any(|rt| rt.name == name)
    }
}

/// Route table of a transit gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRouteTableConfig {
    pub name: String,
    #[serde(default)]
    pub routes: Vec<GatewayRouteConfig>,
}

/// Static route in a gateway route table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRouteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_cidr_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_prefix_list: Option<String>,
    #[serde(default)]
    pub blackhole: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<GatewayRouteTarget>,
}

/// Attachment a gateway route points at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRouteTarget {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Name of the child resource (VPC, VPN connection, DX gateway, peering)
    pub name: String,
    /// Owning account, required for children deployed to several accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// Where a VPC is deployed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, try_from = "PlacementFields")]
pub enum VpcPlacement {
    /// Deployed to one fixed account
    Single { account: String },
    /// Deployed to every account matched by the targets
    Templated { deployment_targets: DeploymentTargets },
}

/// Placement keys of a VPC as written in the file
#[derive(Debug, Deserialize)]
pub struct PlacementFields {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub deployment_targets: Option<DeploymentTargets>,
}

impl TryFrom<PlacementFields> for VpcPlacement {
    type Error = String;

    fn try_from(fields: PlacementFields) -> Result<Self, Self::Error> {
        match (fields.account, fields.deployment_targets) {
            (Some(account), None) => Ok(VpcPlacement::Single { account }),
            (None, Some(deployment_targets)) => Ok(VpcPlacement::Templated { deployment_targets }),
            (Some(account), Some(_)) => Err(format!(
                "account '{}' and deployment_targets are mutually exclusive",
                account
            )),
            (None, None) => Err("either account or deployment_targets is required".to_string()),
        }
    }
}

impl VpcPlacement {
    pub fn is_templated(&self) -> bool {
        matches!(self, VpcPlacement::Templated { .. })
    }
}

/// Account selection for a templated resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTargets {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub organizational_units: Vec<String>,
    #[serde(default)]
    pub excluded_accounts: Vec<String>,
}

/// VPC definition, single-account or templated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcConfig {
    pub name: String,
    pub region: String,
    #[serde(flatten)]
    pub placement: VpcPlacement,
    /// Static CIDRs; the first one is the primary CIDR
    #[serde(default)]
    pub cidrs: Vec<String>,
    /// IPAM pool the primary CIDR is allocated from when `cidrs` is empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam_pool: Option<String>,
    #[serde(default)]
    pub route_tables: Vec<VpcRouteTableConfig>,
    #[serde(default)]
    pub transit_gateway_attachments: Vec<TransitGatewayAttachmentConfig>,
    /// Resolver rules associated with this VPC
    #[serde(default)]
    pub resolver_rules: Vec<String>,
}

/// VPC route table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcRouteTableConfig {
    pub name: String,
    #[serde(default)]
    pub routes: Vec<VpcRouteConfig>,
}

/// Type of a VPC route entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpcRouteType {
    VpcPeering,
    TransitGateway,
    InternetGateway,
    NatGateway,
    Local,
}

/// Route entry in a VPC route table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcRouteConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub route_type: VpcRouteType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_prefix_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_destination: Option<String>,
    /// Name of the target (peering connection, gateway, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// How a route's destination must be obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationSpec {
    Cidr(String),
    Ipv6Cidr(String),
    PrefixList(String),
    /// Nothing given: use the peer VPC's primary CIDR
    PeerPrimaryCidr,
}

impl VpcRouteConfig {
    pub fn destination_spec(&self) -> DestinationSpec {
        if let Some(cidr) = &self.destination {
            DestinationSpec::Cidr(cidr.clone())
        } else if let Some(prefix_list) = &self.destination_prefix_list {
            DestinationSpec::PrefixList(prefix_list.clone())
        } else if let Some(cidr) = &self.ipv6_destination {
            DestinationSpec::Ipv6Cidr(cidr.clone())
        } else {
            DestinationSpec::PeerPrimaryCidr
        }
    }

    /// True for peering routes pointing at the given connection
    pub fn targets_peering(&self, peering_name: &str) -> bool {
        self.route_type == VpcRouteType::VpcPeering && self.target.as_deref() == Some(peering_name)
    }
}

/// Reference to a transit gateway owned by a given account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReference {
    pub name: String,
    pub account: String,
}

/// VPC attachment to a transit gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitGatewayAttachmentConfig {
    pub name: String,
    pub transit_gateway: GatewayReference,
    #[serde(default)]
    pub route_table_associations: Vec<String>,
    #[serde(default)]
    pub route_table_propagations: Vec<String>,
}

/// VPC peering definition: `vpcs[0]` requests, `vpcs[1]` accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpcPeeringConfig {
    pub name: String,
    pub vpcs: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Managed prefix list deployed to a set of accounts and regions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixListConfig {
    pub name: String,
    pub accounts: Vec<String>,
    pub regions: Vec<String>,
    #[serde(default)]
    pub entries: Vec<String>,
}

impl PrefixListConfig {
    pub fn is_deployed_to(&self, account: &str, region: &str) -> bool {
        self.accounts.iter().any(|a| a == account) && self.regions.iter().any(|r| r == region)
    }
}

/// Gateway-to-gateway peering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitGatewayPeeringConfig {
    pub name: String,
    pub requester: GatewayPeeringSide,
    pub accepter: GatewayPeeringSide,
}

/// One side of a gateway peering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPeeringSide {
    pub transit_gateway_name: String,
    pub account: String,
    pub region: String,
    #[serde(default)]
    pub route_table_associations: Vec<String>,
}

/// Customer gateway with its VPN connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerGatewayConfig {
    pub name: String,
    pub account: String,
    pub region: String,
    #[serde(default)]
    pub vpn_connections: Vec<VpnConnectionConfig>,
}

/// VPN connection terminating on a transit gateway in the same account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnConnectionConfig {
    pub name: String,
    pub transit_gateway: String,
    #[serde(default)]
    pub route_table_associations: Vec<String>,
    #[serde(default)]
    pub route_table_propagations: Vec<String>,
}

/// Direct Connect gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectConnectGatewayConfig {
    pub name: String,
    pub account: String,
    #[serde(default)]
    pub transit_gateway_associations: Vec<DirectConnectAssociationConfig>,
}

/// Association of a Direct Connect gateway with a transit gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectConnectAssociationConfig {
    /// Transit gateway name
    pub name: String,
    /// Transit gateway owning account
    pub account: String,
    #[serde(default)]
    pub route_table_associations: Vec<String>,
    #[serde(default)]
    pub route_table_propagations: Vec<String>,
}

/// DNS resolver rule shared from its owning account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverRuleConfig {
    pub name: String,
    pub account: String,
    pub region: String,
}

/// Edges whose lifecycle is owned by an out-of-band import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternallyManagedConfig {
    #[serde(default)]
    pub associations: Vec<String>,
    #[serde(default)]
    pub propagations: Vec<String>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid account configuration: {0}")]
    InvalidAccount(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
}
