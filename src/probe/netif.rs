//! Interface addresses, read with `getifaddrs(3)`.
//!
//! `/sys/class/net` carries link attributes but not addresses, so the
//! network probe merges this table into its per-interface lines.

use std::collections::BTreeMap;
use std::net::IpAddr;

/// Addresses per interface name, each as `ip/prefix`, in kernel order.
pub type InterfaceAddrs = BTreeMap<String, Vec<String>>;

/// Count the set bits of a netmask.
pub fn prefix_len(mask: IpAddr) -> u32 {
    match mask {
        IpAddr::V4(mask) => u32::from(mask).count_ones(),
        IpAddr::V6(mask) => u128::from(mask).count_ones(),
    }
}

/// Format one address the way `ip addr` does.
pub fn cidr(addr: IpAddr, mask: Option<IpAddr>) -> String {
    match mask {
        Some(mask) => format!("{addr}/{}", prefix_len(mask)),
        None => addr.to_string(),
    }
}

#[cfg(unix)]
pub fn interface_addrs() -> std::io::Result<InterfaceAddrs> {
    use nix::sys::socket::SockaddrStorage;
    use std::net::{SocketAddrV4, SocketAddrV6};

    fn ip(storage: &SockaddrStorage) -> Option<IpAddr> {
        if let Some(v4) = storage.as_sockaddr_in() {
            return Some(IpAddr::V4(*SocketAddrV4::from(*v4).ip()));
        }
        storage
            .as_sockaddr_in6()
            .map(|v6| IpAddr::V6(*SocketAddrV6::from(*v6).ip()))
    }

    let mut table = InterfaceAddrs::new();
    for entry in nix::ifaddrs::getifaddrs().map_err(std::io::Error::from)? {
        // Link-layer entries carry no IP address.
        let Some(addr) = entry.address.as_ref().and_then(ip) else {
            continue;
        };
        let mask = entry.netmask.as_ref().and_then(ip);
        table
            .entry(entry.interface_name)
            .or_default()
            .push(cidr(addr, mask));
    }
    Ok(table)
}

#[cfg(not(unix))]
pub fn interface_addrs() -> std::io::Result<InterfaceAddrs> {
    Ok(InterfaceAddrs::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_from_mask() {
        assert_eq!(prefix_len("255.255.255.0".parse().unwrap()), 24);
        assert_eq!(prefix_len("255.0.0.0".parse().unwrap()), 8);
        assert_eq!(prefix_len("ffff:ffff:ffff:ffff::".parse().unwrap()), 64);
    }

    #[test]
    fn cidr_formatting() {
        let addr = "10.0.0.7".parse().unwrap();
        assert_eq!(cidr(addr, Some("255.255.0.0".parse().unwrap())), "10.0.0.7/16");
        assert_eq!(cidr(addr, None), "10.0.0.7");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn loopback_has_an_address() {
        let table = interface_addrs().unwrap();
        if let Some(lo) = table.get("lo") {
            assert!(lo.iter().any(|a| a == "127.0.0.1/8" || a == "::1/128"), "{lo:?}");
        }
    }
}
