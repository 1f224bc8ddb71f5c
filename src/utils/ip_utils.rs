use std::net::IpAddr;

/// CIDR utility functions for validating route destinations

/// Split a CIDR block into its address and prefix length
fn split_cidr(cidr: &str) -> Option<(IpAddr, u8)> {
    let (addr, len) = cidr.split_once('/')?;
    let addr = addr.parse::<IpAddr>().ok()?;
    let len = len.parse::<u8>().ok()?;
    let max = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    if len > max {
        return None;
    }
    Some((addr, len))
}

/// Check if a string is a valid CIDR block (IPv4 or IPv6)
///
/// # Examples
/// ```
/// use netweave::utils::ip_utils::is_valid_cidr;
///
/// assert!(is_valid_cidr("10.0.0.0/16"));
/// assert!(is_valid_cidr("2001:db8::/56"));
/// assert!(!is_valid_cidr("10.0.0.0/33"));
/// assert!(!is_valid_cidr("10.0.0.0"));
/// ```
pub fn is_valid_cidr(cidr: &str) -> bool {
    split_cidr(cidr).is_some()
}

/// Check if a string is a valid IPv4 CIDR block
pub fn is_valid_ipv4_cidr(cidr: &str) -> bool {
    matches!(split_cidr(cidr), Some((IpAddr::V4(_), _)))
}

/// Check if a string is a valid IPv6 CIDR block
pub fn is_valid_ipv6_cidr(cidr: &str) -> bool {
    matches!(split_cidr(cidr), Some((IpAddr::V6(_), _)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_families() {
        assert!(is_valid_ipv4_cidr("192.168.0.0/24"));
        assert!(!is_valid_ipv4_cidr("fd00::/8"));
        assert!(is_valid_ipv6_cidr("fd00::/8"));
        assert!(!is_valid_ipv6_cidr("fd00::/129"));
        assert!(!is_valid_cidr("not-a-cidr/8"));
        assert!(!is_valid_cidr("10.0.0.0/x"));
    }
}
