//! Live network interfaces and their bound addresses.

use crate::config::SystemPaths;
use crate::error::SampleError;
use crate::types::{InterfaceInfo, InterfaceListing};
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use sysinfo::Networks;

const IFF_LOOPBACK: u32 = 0x8;

/// Interface names under /sys/class/net in kernel index order. Entries without
/// a readable `ifindex` go last, by name.
pub fn interface_names(paths: &SystemPaths) -> Result<Vec<String>, SampleError> {
    let dir = paths.class_net();
    let entries = fs::read_dir(&dir).map_err(|source| SampleError::Enumerate {
        path: dir.clone(),
        source,
    })?;
    let mut names: Vec<(u32, String)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .map(|name| (ifindex(paths, &name).unwrap_or(u32::MAX), name))
        .collect();
    names.sort();
    Ok(names.into_iter().map(|(_, name)| name).collect())
}

pub fn ifindex(paths: &SystemPaths, iface: &str) -> Option<u32> {
    fs::read_to_string(paths.iface_attr(iface, "ifindex"))
        .ok()?
        .trim()
        .parse()
        .ok()
}

pub fn is_loopback(paths: &SystemPaths, iface: &str) -> bool {
    let flags = fs::read_to_string(paths.iface_attr(iface, "flags"))
        .ok()
        .and_then(|s| {
            let s = s.trim();
            u32::from_str_radix(s.trim_start_matches("0x"), 16).ok()
        });
    match flags {
        Some(f) => f & IFF_LOOPBACK != 0,
        None => iface == "lo",
    }
}

/// Addresses bound to each interface, as the OS reports them.
pub fn host_addresses() -> HashMap<String, Vec<IpAddr>> {
    let nets = Networks::new_with_refreshed_list();
    nets.iter()
        .map(|(name, data)| {
            let addrs = data.ip_networks().iter().map(|n| n.addr).collect();
            (name.to_string(), addrs)
        })
        .collect()
}

/// Every non-loopback interface with its addresses split by family.
/// Interfaces without known addresses are listed with empty lists.
pub fn list_interfaces(
    paths: &SystemPaths,
    addresses: &HashMap<String, Vec<IpAddr>>,
) -> Result<InterfaceListing, SampleError> {
    let mut listing = InterfaceListing::new();
    for name in interface_names(paths)? {
        if is_loopback(paths, &name) {
            continue;
        }
        let mac = fs::read_to_string(paths.iface_attr(&name, "address"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let mut info = InterfaceInfo {
            mac,
            ..Default::default()
        };
        for addr in addresses.get(&name).into_iter().flatten() {
            match addr.to_canonical() {
                IpAddr::V4(v4) => info.ipv4.push(v4.to_string()),
                IpAddr::V6(v6) => info.ipv6.push(v6.to_string()),
            }
        }
        listing.insert(name, info);
    }
    Ok(listing)
}
