//! Decide whether a candidate subnet is free to hand out, given the CIDRs
//! already on file and the addresses actually bound on the host.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Conflicts,
}

/// `existing_cidrs` entries that fail to parse are logged and skipped rather
/// than treated as a conflict: one malformed record should not block
/// allocation against the rest of the store.
pub fn check_subnet_available(
    candidate: &IpNetwork,
    existing_cidrs: impl IntoIterator<Item = impl AsRef<str>>,
    host_ips: impl IntoIterator<Item = IpAddr>,
) -> Availability {
    for raw in existing_cidrs {
        let raw = raw.as_ref();
        let parsed = match netconf_ipnet::parse_cidr(raw) {
            Ok(net) => net,
            Err(e) => {
                warn!("skipping malformed existing CIDR {:?}: {}", raw, e);
                continue;
            }
        };
        if netconf_ipnet::overlap(candidate, &parsed) {
            return Availability::Conflicts;
        }
    }

    for ip in host_ips {
        if netconf_ipnet::contains(candidate, ip, true) {
            return Availability::Conflicts;
        }
    }

    Availability::Available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_when_nothing_overlaps() {
        let candidate = netconf_ipnet::parse_cidr("10.0.5.0/24").unwrap();
        let existing = vec!["10.0.1.0/24", "10.0.2.0/24"];
        let hosts: Vec<IpAddr> = vec!["192.168.1.1".parse().unwrap()];
        assert_eq!(
            check_subnet_available(&candidate, existing, hosts),
            Availability::Available
        );
    }

    #[test]
    fn conflicts_on_overlapping_cidr() {
        let candidate = netconf_ipnet::parse_cidr("10.0.1.0/24").unwrap();
        let existing = vec!["10.0.0.0/16"];
        let hosts: Vec<IpAddr> = vec![];
        assert_eq!(
            check_subnet_available(&candidate, existing, hosts),
            Availability::Conflicts
        );
    }

    #[test]
    fn conflicts_on_host_ip_inside_candidate() {
        let candidate = netconf_ipnet::parse_cidr("10.0.1.0/24").unwrap();
        let existing: Vec<&str> = vec![];
        let hosts: Vec<IpAddr> = vec!["10.0.1.5".parse().unwrap()];
        assert_eq!(
            check_subnet_available(&candidate, existing, hosts),
            Availability::Conflicts
        );
    }

    #[test]
    fn malformed_existing_entry_is_skipped_not_fatal() {
        let candidate = netconf_ipnet::parse_cidr("10.0.1.0/24").unwrap();
        let existing = vec!["not-a-cidr", "10.0.2.0/24"];
        let hosts: Vec<IpAddr> = vec![];
        assert_eq!(
            check_subnet_available(&candidate, existing, hosts),
            Availability::Available
        );
    }
}
