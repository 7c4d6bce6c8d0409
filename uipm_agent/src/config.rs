//! Agent configuration: environment variables first, command line overrides.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));
const DEFAULT_SETTLE_MS: u64 = 300;

/// Roots of the kernel pseudo-filesystems. Everything the samplers read is
/// resolved against these, so a fixture tree can stand in for the host.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
        }
    }
}

impl SystemPaths {
    pub fn new(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    pub fn proc_stat(&self) -> PathBuf {
        self.proc_root.join("stat")
    }

    pub fn meminfo(&self) -> PathBuf {
        self.proc_root.join("meminfo")
    }

    pub fn uptime(&self) -> PathBuf {
        self.proc_root.join("uptime")
    }

    pub fn net_dev(&self) -> PathBuf {
        self.proc_root.join("net").join("dev")
    }

    pub fn class_net(&self) -> PathBuf {
        self.sys_root.join("class").join("net")
    }

    pub fn usb_devices(&self) -> PathBuf {
        self.sys_root.join("bus").join("usb").join("devices")
    }

    pub fn usb_device(&self, bus_id: &str) -> PathBuf {
        self.usb_devices().join(bus_id)
    }

    pub fn iface_attr(&self, iface: &str, attr: &str) -> PathBuf {
        self.class_net().join(iface).join(attr)
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub addr: SocketAddr,
    pub paths: SystemPaths,
    pub wifi_settle: Duration,
}

impl AgentConfig {
    /// Build from `UIPM_*` environment variables, then apply `--addr`/`-a`.
    pub fn load<I: IntoIterator<Item = String>>(args: I) -> Self {
        Self::from_lookup(|k| std::env::var(k).ok(), args)
    }

    pub fn from_lookup<F, I>(lookup: F, args: I) -> Self
    where
        F: Fn(&str) -> Option<String>,
        I: IntoIterator<Item = String>,
    {
        let defaults = SystemPaths::default();
        let proc_root = lookup("UIPM_PROC_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.proc_root);
        let sys_root = lookup("UIPM_SYS_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.sys_root);
        let settle_ms = match lookup("UIPM_WIFI_SETTLE_MS") {
            Some(v) => v.parse().unwrap_or_else(|_| {
                warn!("ignoring UIPM_WIFI_SETTLE_MS={v:?}: not a number");
                DEFAULT_SETTLE_MS
            }),
            None => DEFAULT_SETTLE_MS,
        };
        let addr = parse_addr_arg(args)
            .or_else(|| lookup("UIPM_ADDR"))
            .map_or(DEFAULT_ADDR, |text| parse_socket_addr(&text));

        Self {
            addr,
            paths: SystemPaths::new(proc_root, sys_root),
            wifi_settle: Duration::from_millis(settle_ms),
        }
    }
}

fn parse_socket_addr(text: &str) -> SocketAddr {
    // ":8080" is accepted as shorthand for all interfaces
    let candidate = if text.starts_with(':') {
        format!("0.0.0.0{text}")
    } else {
        text.to_string()
    };
    candidate.parse().unwrap_or_else(|_| {
        warn!("ignoring listen address {text:?}: not a socket address");
        DEFAULT_ADDR
    })
}

/// Extract the listen address from `--addr X`, `-a X` or `--addr=X`.
pub fn parse_addr_arg<I: IntoIterator<Item = String>>(args: I) -> Option<String> {
    let mut it = args.into_iter();
    let _ = it.next(); // program name
    let mut long: Option<String> = None;
    let mut short: Option<String> = None;
    while let Some(a) = it.next() {
        match a.as_str() {
            "--addr" => long = it.next(),
            "-a" => short = it.next(),
            _ if a.starts_with("--addr=") => {
                if let Some((_, v)) = a.split_once('=') {
                    long = Some(v.to_string());
                }
            }
            _ => {}
        }
    }
    long.or(short).filter(|s| !s.is_empty())
}
