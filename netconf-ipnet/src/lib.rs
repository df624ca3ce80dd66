//! Byte-wise IP network arithmetic: parse/format CIDRs, reduce a network to
//! its base address, and test containment/overlap without assuming IPv4 or
//! a particular prefix length.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

/// Parse a CIDR string into an `IpNetwork`. Fails on malformed input or on a
/// prefix length that does not fit the address family.
pub fn parse_cidr(s: &str) -> anyhow::Result<IpNetwork> {
    s.parse::<IpNetwork>()
        .map_err(|e| anyhow::anyhow!("invalid CIDR {:?}: {}", s, e))
}

/// Canonical CIDR string for a network.
pub fn format_cidr(net: &IpNetwork) -> String {
    net.to_string()
}

fn network_address(net: &IpNetwork) -> IpAddr {
    match net {
        IpNetwork::V4(v4) => IpAddr::V4(v4.network()),
        IpNetwork::V6(v6) => IpAddr::V6(v6.network()),
    }
}

fn broadcast_address(net: &IpNetwork) -> Option<IpAddr> {
    match net {
        IpNetwork::V4(v4) => Some(IpAddr::V4(v4.broadcast())),
        IpNetwork::V6(_) => None,
    }
}

/// Zero the host bits of a network, e.g. `192.168.2.5/16` -> `192.168.0.0/16`.
pub fn reduce(net: &IpNetwork) -> IpNetwork {
    IpNetwork::new(network_address(net), net.prefix())
        .expect("a network's own base address always fits its own prefix")
}

/// `ip & net.mask == net.ip & net.mask`, optionally excluding the network and
/// broadcast addresses.
pub fn contains(net: &IpNetwork, ip: IpAddr, inclusive_boundary: bool) -> bool {
    if !net.contains(ip) {
        return false;
    }
    if inclusive_boundary {
        return true;
    }
    if ip == network_address(net) {
        return false;
    }
    if let Some(broadcast) = broadcast_address(net) {
        if ip == broadcast {
            return false;
        }
    }
    true
}

/// True iff either network's base address lies inside the other (inclusive
/// boundaries). Always false across address families.
pub fn overlap(a: &IpNetwork, b: &IpNetwork) -> bool {
    if a.is_ipv4() != b.is_ipv4() {
        return false;
    }
    contains(a, network_address(b), true) || contains(b, network_address(a), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_zeroes_host_bits() {
        let net = parse_cidr("192.168.2.5/16").unwrap();
        assert_eq!(format_cidr(&reduce(&net)), "192.168.0.0/16");
    }

    #[test]
    fn reduce_is_idempotent() {
        let net = parse_cidr("10.5.6.7/24").unwrap();
        let once = reduce(&net);
        let twice = reduce(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn contains_excludes_network_and_broadcast_by_default() {
        let net = parse_cidr("192.168.0.0/24").unwrap();
        assert!(!contains(&net, "192.168.0.0".parse().unwrap(), false));
        assert!(!contains(&net, "192.168.0.255".parse().unwrap(), false));
        assert!(contains(&net, "192.168.0.1".parse().unwrap(), false));
        assert!(contains(&net, "192.168.0.0".parse().unwrap(), true));
        assert!(contains(&net, "192.168.0.255".parse().unwrap(), true));
    }

    #[test]
    fn contains_rejects_ip_outside_network() {
        let net = parse_cidr("192.168.0.0/24").unwrap();
        assert!(!contains(&net, "192.168.1.1".parse().unwrap(), true));
    }

    #[test]
    fn overlap_detects_containment_either_direction() {
        let wide = parse_cidr("10.0.0.0/8").unwrap();
        let narrow = parse_cidr("10.1.2.0/24").unwrap();
        assert!(overlap(&wide, &narrow));
        assert!(overlap(&narrow, &wide));
    }

    #[test]
    fn overlap_false_for_disjoint_networks() {
        let a = parse_cidr("10.0.0.0/24").unwrap();
        let b = parse_cidr("10.0.1.0/24").unwrap();
        assert!(!overlap(&a, &b));
    }

    #[test]
    fn overlap_false_across_address_families() {
        let v4 = parse_cidr("10.0.0.0/8").unwrap();
        let v6 = parse_cidr("fc00::/7").unwrap();
        assert!(!overlap(&v4, &v6));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(parse_cidr("not-a-cidr").is_err());
        assert!(parse_cidr("10.0.0.0/40").is_err());
    }
}
