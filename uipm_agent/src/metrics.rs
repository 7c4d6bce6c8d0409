//! CPU, memory and uptime sampling from /proc.

use crate::config::SystemPaths;
use crate::error::{Reading, SampleError};
use crate::types::MetricsSnapshot;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Aggregate jiffy counters from the `cpu ` line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuSample {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuSample {
    fn idle_all(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }

    fn total(&self) -> u64 {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

/// Busy and iowait shares of the interval between two samples, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuUsage {
    pub busy_pct: u32,
    pub iowait_pct: u32,
}

/// Counter wraparound or a repeated sample yields a zero delta, reported as 0%.
pub fn calc_cpu_usage(prev: &CpuSample, curr: &CpuSample) -> CpuUsage {
    let total = curr.total().saturating_sub(prev.total());
    if total == 0 {
        return CpuUsage::default();
    }
    let idle = curr.idle_all().saturating_sub(prev.idle_all()).min(total);
    let iowait = curr.iowait.saturating_sub(prev.iowait).min(total);
    CpuUsage {
        busy_pct: percent_of(total - idle, total),
        iowait_pct: percent_of(iowait, total),
    }
}

// widened so garbage counters near u64::MAX cannot overflow; part <= whole
fn percent_of(part: u64, whole: u64) -> u32 {
    (u128::from(part) * 100 / u128::from(whole)) as u32
}

pub fn parse_cpu_line(text: &str) -> Option<CpuSample> {
    // "cpu  user nice system idle iowait irq softirq steal guest guest_nice"
    let line = text.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }
    let f = |i: usize| fields[i].parse::<u64>().unwrap_or(0);
    Some(CpuSample {
        user: f(1),
        nice: f(2),
        system: f(3),
        idle: f(4),
        iowait: f(5),
        irq: f(6),
        softirq: f(7),
        steal: f(8),
    })
}

pub fn read_cpu_sample(path: &Path) -> Result<CpuSample, SampleError> {
    let text = fs::read_to_string(path).map_err(|source| SampleError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_cpu_line(&text).ok_or_else(|| SampleError::Parse {
        path: path.to_path_buf(),
        what: "no aggregate cpu line",
    })
}

/// Percentage of MemTotal not reported as MemAvailable. `None` if MemTotal
/// is missing or zero.
pub fn parse_ram_percent(meminfo: &str) -> Option<u32> {
    let mut total = 0u64;
    let mut available = 0u64;
    for line in meminfo.lines() {
        let mut it = line.split_whitespace();
        let (Some(key), Some(val)) = (it.next(), it.next()) else {
            continue;
        };
        let val = val.parse::<u64>().unwrap_or(0);
        match key {
            "MemTotal:" => total = val,
            "MemAvailable:" => available = val,
            _ => {}
        }
    }
    if total == 0 {
        return None;
    }
    Some(percent_of(total.saturating_sub(available), total))
}

pub fn read_ram_percent(path: &Path) -> Reading<u32> {
    match fs::read_to_string(path) {
        Ok(text) => match parse_ram_percent(&text) {
            Some(pct) => Reading::Fresh(pct),
            None => Reading::degraded(0, "meminfo", "MemTotal missing or zero"),
        },
        Err(e) => Reading::degraded(0, "meminfo", e),
    }
}

pub fn format_uptime(secs: f64) -> String {
    let total = secs as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let mins = (total % 3_600) / 60;
    format!("{days}d {hours}h {mins}m")
}

pub fn parse_uptime(text: &str) -> Option<String> {
    let secs = text.split_whitespace().next()?.parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(format_uptime(secs))
}

pub fn read_uptime(path: &Path) -> Reading<String> {
    const UNKNOWN: &str = "unknown";
    match fs::read_to_string(path) {
        Ok(text) => match parse_uptime(&text) {
            Some(s) => Reading::Fresh(s),
            None => Reading::degraded(UNKNOWN.to_string(), "uptime", "unparseable uptime"),
        },
        Err(e) => Reading::degraded(UNKNOWN.to_string(), "uptime", e),
    }
}

/// Holds the previous CPU sample; each snapshot replaces it.
pub struct ResourceSampler {
    paths: SystemPaths,
    prev: Mutex<CpuSample>,
}

impl ResourceSampler {
    /// Seeds the previous sample. Fails if /proc/stat is unusable, since no
    /// delta could ever be computed.
    pub fn new(paths: SystemPaths) -> Result<Self, SampleError> {
        let first = read_cpu_sample(&paths.proc_stat())?;
        Ok(Self {
            paths,
            prev: Mutex::new(first),
        })
    }

    /// CPU usage since the previous call. Read, delta and replace happen
    /// under one lock.
    pub fn sample_cpu(&self) -> Result<CpuUsage, SampleError> {
        let mut prev = self.prev.lock().unwrap_or_else(|e| e.into_inner());
        let curr = read_cpu_sample(&self.paths.proc_stat())?;
        let usage = calc_cpu_usage(&prev, &curr);
        *prev = curr;
        Ok(usage)
    }

    /// Never fails: sources that cannot be read are reported as degraded.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let cpu = match self.sample_cpu() {
            Ok(usage) => Reading::Fresh(usage.busy_pct),
            Err(e) => Reading::degraded(0, "stat", e),
        };
        let ram = read_ram_percent(&self.paths.meminfo());
        let uptime = read_uptime(&self.paths.uptime());

        let mut degraded = Vec::new();
        for (field, bad) in [
            ("cpu", cpu.is_degraded()),
            ("ram", ram.is_degraded()),
            ("uptime", uptime.is_degraded()),
        ] {
            if bad {
                degraded.push(field);
            }
        }
        MetricsSnapshot {
            cpu: cpu.into_value(),
            ram: ram.into_value(),
            uptime: uptime.into_value(),
            degraded,
        }
    }
}
