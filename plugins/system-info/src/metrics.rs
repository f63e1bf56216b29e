//! Host information and resource sampling

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// Static host description (`GET /info`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfoReport {
    /// Host name
    pub hostname: String,
    /// Operating system and architecture
    pub platform: String,
    /// Host build version
    pub version: String,
    /// Seconds since the module started
    pub uptime: f64,
    /// Sample time
    pub timestamp: DateTime<Utc>,
}

/// Usage of a sized resource, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Capacity
    pub total: u64,
    /// Amount in use
    pub used: u64,
    /// `used / total` as a percentage
    pub percent: f64,
}

impl Usage {
    fn new(total: u64, used: u64) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };
        Self {
            total,
            used,
            percent,
        }
    }
}

/// Resource sample (`GET /metrics`, `system.metrics`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Global CPU usage since the previous sample
    pub cpu_percent: f32,
    /// Physical memory
    pub memory: Usage,
    /// Root file system, when it can be found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<Usage>,
    /// Sample time
    pub timestamp: DateTime<Utc>,
}

/// Keeps the `sysinfo` state between samples so CPU usage is a delta
#[derive(Debug)]
pub struct Sampler {
    system: Mutex<System>,
}

impl Sampler {
    /// Create a sampler and take the CPU baseline
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }

    /// Take a resource sample
    pub fn sample(&self) -> SystemMetrics {
        let (cpu_percent, memory) = {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.refresh_memory();
            (
                system.global_cpu_usage(),
                Usage::new(system.total_memory(), system.used_memory()),
            )
        };

        SystemMetrics {
            cpu_percent,
            memory,
            disk: root_disk(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Host name, or `unknown`
pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `os-arch` of the running binary
pub fn platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

fn root_disk() -> Option<Usage> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .min_by_key(|disk| disk.mount_point().components().count())?;

    let total = disk.total_space();
    Some(Usage::new(total, total.saturating_sub(disk.available_space())))
}
