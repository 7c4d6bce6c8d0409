//! USB devices from sysfs, with product names resolved through `usbip list -l`.

use crate::config::SystemPaths;
use crate::error::SampleError;
use crate::exec::CommandGateway;
use crate::types::UsbDevice;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const ROOT_HUB_PREFIX: &str = "usb";
const HUB_CLASS: &str = "09";
const EXPORTED_STATUS: &str = "2";

/// User-facing port for a bus id of the form `<bus>-<chain>`.
///
/// With two or more hops the port is the second hop: the first is the
/// internal root port and deeper hops are hub wiring behind the labeled
/// port. A single hop is a direct attachment and is the port itself.
/// Non-numeric hops give 0.
pub fn managed_port(bus_id: &str) -> u32 {
    let Some((_, chain)) = bus_id.split_once('-') else {
        return 0;
    };
    let hops: Vec<&str> = chain.split('.').collect();
    let hop = match hops.as_slice() {
        [_, second, ..] => second,
        [only] => only,
        [] => return 0,
    };
    hop.parse().unwrap_or(0)
}

fn read_attr(dir: &Path, attr: &str) -> Option<String> {
    fs::read_to_string(dir.join(attr))
        .ok()
        .map(|s| s.trim().to_string())
}

fn is_candidate(bus_id: &str) -> bool {
    !bus_id.starts_with(ROOT_HUB_PREFIX) && !bus_id.contains(':')
}

/// Attached non-hub devices, sorted by bus id. Names are left empty.
pub fn scan_devices(paths: &SystemPaths) -> Result<Vec<UsbDevice>, SampleError> {
    let root = paths.usb_devices();
    let entries = fs::read_dir(&root).map_err(|source| SampleError::Enumerate {
        path: root.clone(),
        source,
    })?;
    let mut bus_ids: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|id| is_candidate(id))
        .collect();
    bus_ids.sort();

    let mut devices = Vec::with_capacity(bus_ids.len());
    for bus_id in bus_ids {
        let dir = paths.usb_device(&bus_id);
        if read_attr(&dir, "bDeviceClass").as_deref() == Some(HUB_CLASS) {
            continue;
        }
        // vanished between listing and reading
        let Some(vendor_id) = read_attr(&dir, "idVendor") else {
            continue;
        };
        devices.push(UsbDevice {
            port: managed_port(&bus_id),
            vendor_id,
            product_id: read_attr(&dir, "idProduct").unwrap_or_default(),
            occupied: read_attr(&dir, "usbip_status").as_deref() == Some(EXPORTED_STATUS),
            name: String::new(),
            bus_id,
        });
    }
    Ok(devices)
}

/// One record of `usbip list -l` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedDevice {
    pub bus_id: String,
    pub vendor_id: String,
    pub product_id: String,
    pub name: String,
}

enum ListState {
    NoRecord,
    Building(ListedDevice),
}

impl ListState {
    fn flush(self, out: &mut Vec<ListedDevice>) {
        if let ListState::Building(dev) = self {
            out.push(dev);
        }
    }
}

// " - busid 1-1.4 (0bda:8153)"
fn parse_busid_line(line: &str) -> Option<ListedDevice> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }
    let ids = parts[3].trim_matches(|c| c == '(' || c == ')');
    let (vendor_id, product_id) = ids.split_once(':').unwrap_or(("", ""));
    Some(ListedDevice {
        bus_id: parts[2].to_string(),
        vendor_id: vendor_id.to_string(),
        product_id: product_id.to_string(),
        name: String::new(),
    })
}

/// Parse `usbip list -l`. The first non-empty line after a busid header is
/// the description, minus its trailing ` (vid:pid)`.
pub fn parse_usbip_list(data: &str) -> Vec<ListedDevice> {
    let mut devices = Vec::new();
    let mut state = ListState::NoRecord;

    for line in data.lines() {
        let line = line.trim();
        if line.starts_with("- busid ") {
            state.flush(&mut devices);
            state = match parse_busid_line(line) {
                Some(dev) => ListState::Building(dev),
                None => ListState::NoRecord,
            };
            continue;
        }
        if let ListState::Building(dev) = &mut state {
            if !line.is_empty() && dev.name.is_empty() {
                let name = match line.rfind(" (") {
                    Some(idx) => line[..idx].trim(),
                    None => line,
                };
                dev.name = name.to_string();
            }
        }
    }
    state.flush(&mut devices);
    devices
}

/// bus id -> product name. An empty name means "looked up, not found".
#[derive(Debug, Default)]
pub struct NameCache {
    names: Mutex<HashMap<String, String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.names.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains_all(&self, bus_ids: &[&str]) -> bool {
        let names = self.guard();
        bus_ids.iter().all(|id| names.contains_key(*id))
    }

    /// Merge lookup results, seed any still-missing `present` id with an
    /// empty name, then keep only `present`. Returns the resulting names.
    pub fn reconcile(
        &self,
        present: &[&str],
        looked_up: Option<Vec<ListedDevice>>,
    ) -> HashMap<String, String> {
        let mut names = self.guard();
        for dev in looked_up.into_iter().flatten() {
            names.insert(dev.bus_id, dev.name);
        }
        for id in present {
            names.entry((*id).to_string()).or_default();
        }
        let keep: HashSet<&str> = present.iter().copied().collect();
        names.retain(|id, _| keep.contains(id.as_str()));
        names.clone()
    }

    pub fn name_of(&self, bus_id: &str) -> String {
        self.guard().get(bus_id).cloned().unwrap_or_default()
    }

    pub fn bus_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.guard().keys().cloned().collect();
        ids.sort();
        ids
    }
}

pub struct UsbManager {
    paths: SystemPaths,
    gateway: CommandGateway,
    names: NameCache,
}

impl UsbManager {
    pub fn new(paths: SystemPaths, gateway: CommandGateway) -> Self {
        Self {
            paths,
            gateway,
            names: NameCache::new(),
        }
    }

    pub fn name_cache(&self) -> &NameCache {
        &self.names
    }

    /// Current devices with names filled in. A missing device tree gives an
    /// empty list.
    pub fn devices(&self) -> Vec<UsbDevice> {
        let mut devices = match scan_devices(&self.paths) {
            Ok(d) => d,
            Err(e) => {
                debug!("usb device tree unavailable: {e}");
                Vec::new()
            }
        };
        let present: Vec<&str> = devices.iter().map(|d| d.bus_id.as_str()).collect();

        // The cache lock is not held while the listing tool runs.
        let looked_up = if self.names.contains_all(&present) {
            None
        } else {
            self.gateway
                .run_capture("usbip", &["list", "-l"])
                .ok()
                .map(|out| parse_usbip_list(&String::from_utf8_lossy(&out)))
        };
        let mut names = self.names.reconcile(&present, looked_up);

        for dev in &mut devices {
            dev.name = names.remove(&dev.bus_id).unwrap_or_default();
        }
        devices
    }
}
