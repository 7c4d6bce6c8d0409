//! Wireless scanning through `iwlist` and parsing of its cell listing.

use crate::config::SystemPaths;
use crate::exec::CommandGateway;
use crate::interfaces::{interface_names, is_loopback};
use crate::types::{Security, WifiNetwork};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const WEAKEST_SIGNAL: i32 = -100;
const SIGNAL_MARKER: &str = "Signal level=";
const SSID_PREFIX: &str = "ESSID:";

/// First non-loopback interface, in kernel index order, exposing a `wireless`
/// directory.
pub fn find_wireless_iface(paths: &SystemPaths) -> Option<String> {
    interface_names(paths)
        .ok()?
        .into_iter()
        .find(|name| !is_loopback(paths, name) && paths.iface_attr(name, "wireless").exists())
}

enum ScanState {
    NoRecord,
    Building(WifiNetwork),
}

impl ScanState {
    /// Emit the in-progress record if it acquired a name.
    fn flush(self, out: &mut Vec<WifiNetwork>) {
        if let ScanState::Building(net) = self {
            if !net.ssid.is_empty() {
                out.push(net);
            }
        }
    }
}

fn is_cell_start(line: &str) -> bool {
    line.contains("Cell ") && line.contains("Address:")
}

fn apply_line(net: &mut WifiNetwork, line: &str) {
    if let Some(ssid) = line.strip_prefix(SSID_PREFIX) {
        net.ssid = ssid.trim_matches('"').to_string();
    }
    if let Some(idx) = line.find(SIGNAL_MARKER) {
        let rest = &line[idx + SIGNAL_MARKER.len()..];
        if let Some(v) = rest.split_whitespace().next().and_then(|t| t.parse().ok()) {
            net.signal = v;
        }
    }
    // WPA2 always wins; WPA only upgrades from open
    if line.contains("WPA2") {
        net.security = Security::Wpa2;
    } else if line.contains("WPA Version") && net.security != Security::Wpa2 {
        net.security = Security::Wpa;
    }
}

/// Parse `iwlist <iface> scanning` output into one record per SSID (the
/// strongest), strongest first.
pub fn parse_scan_output(data: &str) -> Vec<WifiNetwork> {
    let mut found = Vec::new();
    let mut state = ScanState::NoRecord;

    for line in data.lines() {
        let line = line.trim();
        if is_cell_start(line) {
            state.flush(&mut found);
            state = ScanState::Building(WifiNetwork {
                ssid: String::new(),
                signal: WEAKEST_SIGNAL,
                security: Security::Open,
            });
            continue;
        }
        if let ScanState::Building(net) = &mut state {
            apply_line(net, line);
        }
    }
    state.flush(&mut found);

    let mut best: HashMap<String, WifiNetwork> = HashMap::new();
    for net in found {
        match best.get(&net.ssid) {
            Some(existing) if existing.signal >= net.signal => {}
            _ => {
                best.insert(net.ssid.clone(), net);
            }
        }
    }
    let mut result: Vec<WifiNetwork> = best.into_values().collect();
    // ties broken by name so the order is stable
    result.sort_by(|a, b| b.signal.cmp(&a.signal).then_with(|| a.ssid.cmp(&b.ssid)));
    result
}

pub struct WirelessScanner {
    paths: SystemPaths,
    gateway: CommandGateway,
    settle: Duration,
}

impl WirelessScanner {
    pub fn new(paths: SystemPaths, gateway: CommandGateway, settle: Duration) -> Self {
        Self {
            paths,
            gateway,
            settle,
        }
    }

    /// Blocks for the settle delay plus the scan itself. Never fails: no
    /// wireless interface or a failed scan both give an empty list.
    pub fn scan(&self) -> Vec<WifiNetwork> {
        let Some(iface) = find_wireless_iface(&self.paths) else {
            debug!("no wireless interface");
            return Vec::new();
        };
        self.scan_iface(&iface)
    }

    pub fn scan_iface(&self, iface: &str) -> Vec<WifiNetwork> {
        // best effort: the radio may already be powered
        let _ = self.gateway.run("iwconfig", &[iface, "power", "on"]);
        std::thread::sleep(self.settle);

        match self.gateway.run_capture("iwlist", &[iface, "scanning"]) {
            Ok(out) => parse_scan_output(&String::from_utf8_lossy(&out)),
            Err(_) => Vec::new(),
        }
    }
}
