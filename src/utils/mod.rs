//! Shared utilities: CIDR helpers and static topology validation.

pub mod ip_utils;
pub mod validation;

pub use ip_utils::{is_valid_cidr, is_valid_ipv4_cidr, is_valid_ipv6_cidr};
pub use validation::{validate_accounts, validate_gateways, validate_peerings, validate_vpcs};
