//! Bridge name, subnet, and gateway allocation.

use std::net::{IpAddr, Ipv4Addr};

use ipnetwork::IpNetwork;
use netconf_types::constants::MAX_BRIDGE_ID;

use crate::conflict::{check_subnet_available, Availability};

const BRIDGE_NAME_PREFIX: &str = "isula-br";

#[derive(thiserror::Error, Debug)]
pub enum AllocError {
    #[error("exhausted {0} candidate bridge names")]
    Exhausted(u32),
    #[error("no free private subnet available")]
    NoSubnet,
    #[error("subnet {0} has no room for a gateway host address")]
    NoGateway(IpNetwork),
}

/// First `<n><prefix>` name (e.g. `"0isula-br"`) not already taken by an
/// existing network name, an existing bridge interface name, or a host
/// interface name. The number-then-prefix concatenation order matches the
/// source this allocator was ported from and is load-bearing: on-disk
/// filenames already exist in that form and must not be renamed by a
/// "cleaner" concatenation order.
pub fn allocate_bridge_name(taken: impl Fn(&str) -> bool) -> Result<String, AllocError> {
    for i in 0..MAX_BRIDGE_ID {
        let name = format!("{}{}", i, BRIDGE_NAME_PREFIX);
        if !taken(&name) {
            return Ok(name);
        }
    }
    Err(AllocError::Exhausted(MAX_BRIDGE_ID))
}

fn private_stripes() -> impl Iterator<Item = IpNetwork> {
    fn stripe(a: u8, b: u8, c: u8) -> IpNetwork {
        IpNetwork::new(IpAddr::V4(Ipv4Addr::new(a, b, c, 0)), 24).expect("valid /24")
    }
    let class_c = (0u16..=255).map(|c| stripe(192, 168, c as u8));
    let class_b = (16u16..=31).flat_map(|b| (0u16..=255).map(move |c| stripe(172, b as u8, c as u8)));
    let class_a = (0u16..=255).flat_map(|b| (0u16..=255).map(move |c| stripe(10, b as u8, c as u8)));
    class_c.chain(class_b).chain(class_a)
}

/// Walks the fixed RFC 1918 stripe sequence (`192.168.0.0/24 … 192.168.255.0/24`,
/// then `172.16.0.0/24 … 172.31.255.0/24`, then `10.0.0.0/24 … 10.255.255.0/24`)
/// and returns the first candidate the conflict engine accepts.
pub fn allocate_subnet(
    existing_cidrs: &[String],
    host_ips: &[IpAddr],
) -> Result<IpNetwork, AllocError> {
    for candidate in private_stripes() {
        let availability = check_subnet_available(
            &candidate,
            existing_cidrs.iter().map(String::as_str),
            host_ips.iter().copied(),
        );
        if availability == Availability::Available {
            return Ok(candidate);
        }
    }
    Err(AllocError::NoSubnet)
}

/// First host address of a subnet: the network address with its low byte
/// OR'd with `1`. Fails if the subnet has no host bits at all (a /32 or /128).
pub fn derive_gateway(subnet: &IpNetwork) -> Result<IpAddr, AllocError> {
    match subnet {
        IpNetwork::V4(v4) => {
            if v4.prefix() == 32 {
                return Err(AllocError::NoGateway(*subnet));
            }
            let mut octets = v4.network().octets();
            octets[3] |= 1;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        IpNetwork::V6(v6) => {
            if v6.prefix() == 128 {
                return Err(AllocError::NoGateway(*subnet));
            }
            let mut octets = v6.network().octets();
            octets[15] |= 1;
            Ok(IpAddr::V6(std::net::Ipv6Addr::from(octets)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_name_picks_first_free_slot() {
        let name = allocate_bridge_name(|n| n == "0isula-br" || n == "1isula-br").unwrap();
        assert_eq!(name, "2isula-br");
    }

    #[test]
    fn bridge_name_preserves_number_then_prefix_order() {
        let name = allocate_bridge_name(|_| false).unwrap();
        assert_eq!(name, "0isula-br");
    }

    #[test]
    fn bridge_name_exhausted_after_1024_misses() {
        let err = allocate_bridge_name(|_| true).unwrap_err();
        assert!(matches!(err, AllocError::Exhausted(1024)));
    }

    #[test]
    fn subnet_allocation_walks_stripes_in_order() {
        let existing = vec!["192.168.0.0/24".to_string()];
        let subnet = allocate_subnet(&existing, &[]).unwrap();
        assert_eq!(subnet.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn subnet_allocation_crosses_stripe_boundary() {
        let mut existing = vec![];
        for c in 0..=255u16 {
            existing.push(format!("192.168.{}.0/24", c));
        }
        let subnet = allocate_subnet(&existing, &[]).unwrap();
        assert_eq!(subnet.to_string(), "172.16.0.0/24");
    }

    #[test]
    fn gateway_is_first_host_address() {
        let subnet = netconf_ipnet::parse_cidr("10.5.6.0/24").unwrap();
        assert_eq!(derive_gateway(&subnet).unwrap().to_string(), "10.5.6.1");
    }

    #[test]
    fn gateway_fails_on_no_host_room() {
        let subnet = netconf_ipnet::parse_cidr("10.5.6.7/32").unwrap();
        assert!(derive_gateway(&subnet).is_err());
    }

    #[test]
    fn gateway_ors_into_nonzero_low_octet_and_stays_in_subnet() {
        let subnet = netconf_ipnet::reduce(&netconf_ipnet::parse_cidr("10.0.0.130/25").unwrap());
        assert_eq!(subnet.to_string(), "10.0.0.128/25");
        let gateway = derive_gateway(&subnet).unwrap();
        assert_eq!(gateway.to_string(), "10.0.0.129");
        assert!(netconf_ipnet::contains(&subnet, gateway, false));
    }
}
