//! Snapshot types returned to the dashboard as JSON.
//! Keep this module minimal and stable: it defines the wire format.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cpu: u32,
    pub ram: u32,
    pub uptime: String,
    // names of fields that fell back to a default value
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<&'static str>,
}

/// Throughput in MiB/s.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Default)]
pub struct NetRates {
    pub rx: f64,
    pub tx: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
pub struct InterfaceInfo {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub mac: String,
}

pub type InterfaceListing = BTreeMap<String, InterfaceInfo>;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    Open,
    Wpa,
    Wpa2,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub ssid: String,
    pub signal: i32,
    pub security: Security,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsbDevice {
    #[serde(rename = "busid")]
    pub bus_id: String,
    pub vendor_id: String,
    pub product_id: String,
    pub name: String,
    pub port: u32,
    pub occupied: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub message: String,
}
