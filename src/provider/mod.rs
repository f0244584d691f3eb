//! Platform metric providers.
//!
//! The adapters never talk to the OS directly. They go through
//! [`MetricsProvider`] for counters, [`AdapterRegistry`] for optional
//! network adapter identity and [`SchemeStore`] for the active power
//! scheme, so each source can fail (or be swapped for a double) on its own.

pub mod mock;
mod system;
#[cfg(windows)]
mod windows;

use crate::error::Result;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

pub use system::SystemProvider;

/// One blocking processor sample
#[derive(Debug, Clone, PartialEq)]
pub struct CpuReading {
    pub usage_percent: f64,
    pub current_mhz: Option<f64>,
    pub max_mhz: Option<f64>,
    pub logical_cores: usize,
    pub physical_cores: usize,
}

/// Physical memory in raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryReading {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
}

/// A mounted partition as listed by the OS
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

/// Space accounting for one mount point in raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// Cumulative interface counters since boot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IoCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

/// Link state of one interface
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStats {
    pub is_up: bool,
    /// Link speed in Mbps, `None` when the driver does not report it
    pub speed_mbps: Option<u64>,
    pub mtu: Option<u64>,
}

/// Remaining battery time as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecsLeft {
    Seconds(u64),
    /// On AC power, the battery is not draining
    Unlimited,
    /// The platform cannot estimate it yet
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatteryReading {
    pub percent: f64,
    pub secs_left: SecsLeft,
    pub power_plugged: bool,
}

/// One entry of the platform network adapter registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterRecord {
    pub name: Option<String>,
    pub mac_address: Option<String>,
    /// Interface name the adapter is bound to
    pub connection_id: Option<String>,
    pub connection_status: Option<u16>,
}

/// Source of host counters: CPU, memory, disks, network and battery.
pub trait MetricsProvider {
    /// Sample processor usage, blocking for `window`
    fn cpu_sample(&mut self, window: Duration) -> Result<CpuReading>;

    fn virtual_memory(&mut self) -> Result<MemoryReading>;

    /// List mounted partitions
    fn disk_partitions(&mut self) -> Result<Vec<Partition>>;

    /// Space usage for a single mount point
    fn disk_usage(&mut self, mount_point: &str) -> Result<DiskUsage>;

    /// Per-interface counters, in the order the OS lists interfaces
    fn net_io_counters(&mut self) -> Result<Vec<(String, IoCounters)>>;

    /// Addresses of every interface, all families, in OS order
    fn net_if_addrs(&mut self) -> Result<HashMap<String, Vec<IpAddr>>>;

    /// Link stats of one interface; `Ok(None)` when the platform has none
    fn net_if_stats(&mut self, interface: &str) -> Result<Option<LinkStats>>;

    /// Battery state, `Ok(None)` on hosts without a battery
    fn sensors_battery(&mut self) -> Result<Option<BatteryReading>>;
}

/// Platform registry of network adapters (WMI on Windows)
pub trait AdapterRegistry {
    fn network_adapters(&self) -> Result<Vec<AdapterRecord>>;
}

/// Platform store holding the active power scheme
pub trait SchemeStore {
    fn active_power_scheme(&self) -> Result<String>;
}

/// Connect to the platform adapter registry.
///
/// Fails on hosts without one; callers keep running without enrichment.
pub fn connect_registry() -> Result<Box<dyn AdapterRegistry>> {
    #[cfg(windows)]
    {
        Ok(Box::new(windows::WmiRegistry::connect()?))
    }

    #[cfg(not(windows))]
    {
        Err(crate::error::TelemetryError::unsupported(
            "network adapter registry requires Windows Management Instrumentation",
        ))
    }
}

/// The power scheme store of this platform
pub fn scheme_store() -> Box<dyn SchemeStore> {
    #[cfg(windows)]
    {
        Box::new(windows::PowerSchemeRegistry)
    }

    #[cfg(not(windows))]
    {
        Box::new(UnsupportedSchemes)
    }
}

#[cfg(not(windows))]
struct UnsupportedSchemes;

#[cfg(not(windows))]
impl SchemeStore for UnsupportedSchemes {
    fn active_power_scheme(&self) -> Result<String> {
        Err(crate::error::TelemetryError::unsupported(
            "power schemes are stored in the Windows registry",
        ))
    }
}
