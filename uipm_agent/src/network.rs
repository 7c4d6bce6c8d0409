//! Aggregate network throughput from /proc/net/dev byte counters.

use crate::config::SystemPaths;
use crate::error::SampleError;
use crate::types::NetRates;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::warn;

const LOOPBACK: &str = "lo";
const MIB: f64 = 1024.0 * 1024.0;

/// Summed (rx, tx) bytes across every non-loopback interface.
pub fn parse_net_dev(text: &str) -> (u64, u64) {
    let mut rx = 0u64;
    let mut tx = 0u64;
    // two header lines
    for line in text.lines().skip(2) {
        let Some((iface, rest)) = line.split_once(':') else {
            continue;
        };
        if iface.trim() == LOOPBACK {
            continue;
        }
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        rx = rx.saturating_add(fields[0].parse().unwrap_or(0));
        tx = tx.saturating_add(fields[8].parse().unwrap_or(0));
    }
    (rx, tx)
}

pub fn read_net_bytes(path: &Path) -> Result<(u64, u64), SampleError> {
    let text = fs::read_to_string(path).map_err(|source| SampleError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_net_dev(&text))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetSample {
    pub rx: u64,
    pub tx: u64,
    // None until the first successful read
    pub at: Option<Instant>,
}

/// Rates in MiB/s between `prev` and a reading of (rx, tx) taken at `now`.
/// Zero on the first sample or when no time has elapsed.
pub fn compute_rates(prev: &NetSample, rx: u64, tx: u64, now: Instant) -> NetRates {
    let Some(then) = prev.at else {
        return NetRates::default();
    };
    let elapsed = now.saturating_duration_since(then).as_secs_f64();
    if elapsed <= 0.0 {
        return NetRates::default();
    }
    NetRates {
        rx: rx.saturating_sub(prev.rx) as f64 / elapsed / MIB,
        tx: tx.saturating_sub(prev.tx) as f64 / elapsed / MIB,
    }
}

pub struct NetSampler {
    paths: SystemPaths,
    prev: Mutex<NetSample>,
}

impl NetSampler {
    pub fn new(paths: SystemPaths) -> Self {
        Self {
            paths,
            prev: Mutex::new(NetSample::default()),
        }
    }

    /// Take the baseline reading. A failure leaves the sampler in its
    /// first-sample state.
    pub fn seed(&self) {
        if let Err(e) = self.sample() {
            warn!("network counters unavailable at startup: {e}");
        }
    }

    pub fn sample(&self) -> Result<NetRates, SampleError> {
        self.sample_at(Instant::now())
    }

    pub fn sample_at(&self, now: Instant) -> Result<NetRates, SampleError> {
        let mut prev = self.prev.lock().unwrap_or_else(|e| e.into_inner());
        let (rx, tx) = read_net_bytes(&self.paths.net_dev())?;
        let rates = compute_rates(&prev, rx, tx, now);
        *prev = NetSample {
            rx,
            tx,
            at: Some(now),
        };
        Ok(rates)
    }
}
