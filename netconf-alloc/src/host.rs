//! Host interface/address enumeration, used by the allocators to avoid
//! handing out a bridge name or subnet that collides with something already
//! living on the machine.

use std::collections::HashSet;
use std::net::IpAddr;

use nix::ifaddrs::getifaddrs;

/// Every link-layer interface name present on the host (deduplicated: an
/// interface with several addresses appears once).
pub fn interface_names() -> anyhow::Result<HashSet<String>> {
    let mut names = HashSet::new();
    for ifaddr in getifaddrs()? {
        names.insert(ifaddr.interface_name);
    }
    Ok(names)
}

/// Every IPv4/IPv6 address bound to any interface on the host.
pub fn host_addresses() -> anyhow::Result<HashSet<IpAddr>> {
    let mut addrs = HashSet::new();
    for ifaddr in getifaddrs()? {
        let Some(address) = ifaddr.address else {
            continue;
        };
        if let Some(sock) = address.as_sockaddr_in() {
            addrs.insert(IpAddr::V4(std::net::Ipv4Addr::from(sock.ip())));
        } else if let Some(sock) = address.as_sockaddr_in6() {
            addrs.insert(IpAddr::V6(sock.ip()));
        }
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_names_includes_loopback() {
        let names = interface_names().unwrap();
        assert!(names.contains("lo"));
    }

    #[test]
    fn host_addresses_includes_loopback() {
        let addrs = host_addresses().unwrap();
        assert!(addrs.contains(&"127.0.0.1".parse::<IpAddr>().unwrap()));
    }
}
