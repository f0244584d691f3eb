//! Scripted providers for exercising the collector without a real host.
//!
//! [`ScriptedProvider::typical_host`] describes a small laptop; individual
//! operations can then be made to fail to simulate unavailable sources.

use super::{
    AdapterRecord, AdapterRegistry, BatteryReading, CpuReading, DiskUsage, IoCounters, LinkStats,
    MemoryReading, MetricsProvider, Partition, SchemeStore, SecsLeft,
};
use crate::error::{Result, TelemetryError};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

/// A scripted failure, turned into a [`TelemetryError`] when replayed
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    PermissionDenied(String),
    Unavailable(String),
    /// The platform has no such facility
    Unsupported(String),
}

impl From<&Failure> for TelemetryError {
    fn from(failure: &Failure) -> Self {
        match failure {
            Failure::PermissionDenied(msg) => TelemetryError::permission_denied(msg.clone()),
            Failure::Unavailable(msg) => TelemetryError::provider(msg.clone()),
            Failure::Unsupported(msg) => TelemetryError::unsupported(msg.clone()),
        }
    }
}

/// A scripted reading or the failure to replay instead
pub type Scripted<T> = std::result::Result<T, Failure>;

fn replay<T: Clone>(scripted: &Scripted<T>) -> Result<T> {
    scripted.clone().map_err(|failure| TelemetryError::from(&failure))
}

/// Provider that replays fixed readings
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    cpu: Scripted<CpuReading>,
    memory: Scripted<MemoryReading>,
    partitions: Scripted<Vec<Partition>>,
    usage: HashMap<String, Scripted<DiskUsage>>,
    counters: Scripted<Vec<(String, IoCounters)>>,
    addrs: Scripted<HashMap<String, Vec<IpAddr>>>,
    link_stats: HashMap<String, Scripted<Option<LinkStats>>>,
    battery: Scripted<Option<BatteryReading>>,
    calls: Vec<&'static str>,
    windows: Vec<Duration>,
}

impl ScriptedProvider {
    /// A host where every source answers
    pub fn typical_host() -> Self {
        let partitions = vec![
            Partition {
                device: "/dev/nvme0n1p2".to_string(),
                mount_point: "/".to_string(),
                fs_type: "ext4".to_string(),
            },
            Partition {
                device: "/dev/nvme0n1p1".to_string(),
                mount_point: "/boot/efi".to_string(),
                fs_type: "vfat".to_string(),
            },
        ];

        let mut usage = HashMap::new();
        usage.insert(
            "/".to_string(),
            Ok(DiskUsage {
                total: 512 * GIB,
                used: 128 * GIB,
                free: 384 * GIB,
                percent: 25.0,
            }),
        );
        usage.insert(
            "/boot/efi".to_string(),
            Ok(DiskUsage {
                total: GIB / 2,
                used: GIB / 8,
                free: GIB * 3 / 8,
                percent: 25.0,
            }),
        );

        let counters = vec![
            (
                "eth0".to_string(),
                IoCounters {
                    bytes_sent: 300 * MIB,
                    bytes_recv: 1200 * MIB,
                    packets_sent: 210_000,
                    packets_recv: 980_000,
                    errin: 1,
                    errout: 0,
                    dropin: 12,
                    dropout: 0,
                },
            ),
            (
                "lo".to_string(),
                IoCounters {
                    bytes_sent: 8 * MIB,
                    bytes_recv: 8 * MIB,
                    packets_sent: 4_000,
                    packets_recv: 4_000,
                    ..IoCounters::default()
                },
            ),
        ];

        let mut addrs = HashMap::new();
        addrs.insert(
            "eth0".to_string(),
            vec![
                ip("fe80::1c2b:3aff:fe4d:5e6f"),
                ip("192.168.1.20"),
                ip("2001:db8::20"),
                ip("10.8.0.2"),
            ],
        );
        addrs.insert("lo".to_string(), vec![ip("127.0.0.1"), ip("::1")]);

        let mut link_stats = HashMap::new();
        link_stats.insert(
            "eth0".to_string(),
            Ok(Some(LinkStats {
                is_up: true,
                speed_mbps: Some(1000),
                mtu: Some(1500),
            })),
        );
        link_stats.insert(
            "lo".to_string(),
            Ok(Some(LinkStats {
                is_up: true,
                speed_mbps: None,
                mtu: Some(65536),
            })),
        );

        Self {
            cpu: Ok(CpuReading {
                usage_percent: 42.5,
                current_mhz: Some(2400.0),
                max_mhz: Some(3600.0),
                logical_cores: 8,
                physical_cores: 4,
            }),
            memory: Ok(MemoryReading {
                total: 16 * GIB,
                used: 6 * GIB,
                available: 10 * GIB,
                percent: 37.5,
            }),
            partitions: Ok(partitions),
            usage,
            counters: Ok(counters),
            addrs: Ok(addrs),
            link_stats,
            battery: Ok(Some(BatteryReading {
                percent: 81.0,
                secs_left: SecsLeft::Seconds(5400),
                power_plugged: false,
            })),
            calls: Vec::new(),
            windows: Vec::new(),
        }
    }

    pub fn with_cpu(mut self, reading: CpuReading) -> Self {
        self.cpu = Ok(reading);
        self
    }

    pub fn fail_cpu(mut self, failure: Failure) -> Self {
        self.cpu = Err(failure);
        self
    }

    pub fn with_memory(mut self, reading: MemoryReading) -> Self {
        self.memory = Ok(reading);
        self
    }

    pub fn fail_memory(mut self, failure: Failure) -> Self {
        self.memory = Err(failure);
        self
    }

    pub fn fail_partitions(mut self, failure: Failure) -> Self {
        self.partitions = Err(failure);
        self
    }

    /// Replace the partition list; mount points without usage fail as unavailable
    pub fn with_partitions(mut self, partitions: Vec<(Partition, Scripted<DiskUsage>)>) -> Self {
        self.usage.clear();
        let mut listed = Vec::with_capacity(partitions.len());
        for (partition, usage) in partitions {
            self.usage.insert(partition.mount_point.clone(), usage);
            listed.push(partition);
        }
        self.partitions = Ok(listed);
        self
    }

    pub fn fail_usage(mut self, mount_point: &str, failure: Failure) -> Self {
        self.usage.insert(mount_point.to_string(), Err(failure));
        self
    }

    pub fn fail_counters(mut self, failure: Failure) -> Self {
        self.counters = Err(failure);
        self
    }

    pub fn fail_addrs(mut self, failure: Failure) -> Self {
        self.addrs = Err(failure);
        self
    }

    pub fn with_addrs(mut self, interface: &str, addrs: Vec<IpAddr>) -> Self {
        if let Ok(map) = self.addrs.as_mut() {
            map.insert(interface.to_string(), addrs);
        }
        self
    }

    pub fn with_link_stats(mut self, interface: &str, stats: Option<LinkStats>) -> Self {
        self.link_stats.insert(interface.to_string(), Ok(stats));
        self
    }

    pub fn fail_link_stats(mut self, interface: &str, failure: Failure) -> Self {
        self.link_stats.insert(interface.to_string(), Err(failure));
        self
    }

    pub fn with_battery(mut self, battery: Option<BatteryReading>) -> Self {
        self.battery = Ok(battery);
        self
    }

    pub fn fail_battery(mut self, failure: Failure) -> Self {
        self.battery = Err(failure);
        self
    }

    /// Provider operations in the order they were invoked
    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    /// Sampling windows passed to `cpu_sample`
    pub fn sample_windows(&self) -> &[Duration] {
        &self.windows
    }
}

impl MetricsProvider for ScriptedProvider {
    fn cpu_sample(&mut self, window: Duration) -> Result<CpuReading> {
        self.calls.push("cpu_sample");
        self.windows.push(window);
        replay(&self.cpu)
    }

    fn virtual_memory(&mut self) -> Result<MemoryReading> {
        self.calls.push("virtual_memory");
        replay(&self.memory)
    }

    fn disk_partitions(&mut self) -> Result<Vec<Partition>> {
        self.calls.push("disk_partitions");
        replay(&self.partitions)
    }

    fn disk_usage(&mut self, mount_point: &str) -> Result<DiskUsage> {
        self.calls.push("disk_usage");
        match self.usage.get(mount_point) {
            Some(scripted) => replay(scripted),
            None => Err(TelemetryError::provider(format!("no such mount point: {}", mount_point))),
        }
    }

    fn net_io_counters(&mut self) -> Result<Vec<(String, IoCounters)>> {
        self.calls.push("net_io_counters");
        replay(&self.counters)
    }

    fn net_if_addrs(&mut self) -> Result<HashMap<String, Vec<IpAddr>>> {
        self.calls.push("net_if_addrs");
        replay(&self.addrs)
    }

    fn net_if_stats(&mut self, interface: &str) -> Result<Option<LinkStats>> {
        self.calls.push("net_if_stats");
        match self.link_stats.get(interface) {
            Some(scripted) => replay(scripted),
            None => Ok(None),
        }
    }

    fn sensors_battery(&mut self) -> Result<Option<BatteryReading>> {
        self.calls.push("sensors_battery");
        replay(&self.battery)
    }
}

/// Adapter registry answering with a fixed list
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    adapters: Scripted<Vec<AdapterRecord>>,
}

impl StaticRegistry {
    pub fn new(adapters: Vec<AdapterRecord>) -> Self {
        Self { adapters: Ok(adapters) }
    }

    /// A registry whose queries always fail
    pub fn failing(failure: Failure) -> Self {
        Self { adapters: Err(failure) }
    }

    /// One wired adapter bound to `eth0`
    pub fn wired_eth0() -> Self {
        Self::new(vec![
            AdapterRecord {
                name: Some("Intel(R) Ethernet Connection I219-V".to_string()),
                mac_address: Some("3C:52:82:1A:2B:3C".to_string()),
                connection_id: Some("eth0".to_string()),
                connection_status: Some(2),
            },
            AdapterRecord {
                name: Some("WAN Miniport (IP)".to_string()),
                mac_address: None,
                connection_id: None,
                connection_status: None,
            },
        ])
    }
}

impl AdapterRegistry for StaticRegistry {
    fn network_adapters(&self) -> Result<Vec<AdapterRecord>> {
        replay(&self.adapters)
    }
}

/// Power scheme store answering with a fixed value
#[derive(Debug, Clone)]
pub struct StaticSchemes {
    scheme: Scripted<String>,
}

impl StaticSchemes {
    pub fn new(scheme: &str) -> Self {
        Self { scheme: Ok(scheme.to_string()) }
    }

    pub fn failing(failure: Failure) -> Self {
        Self { scheme: Err(failure) }
    }

    /// A host without power schemes
    pub fn unsupported() -> Self {
        Self::failing(Failure::Unsupported("no power schemes on this platform".to_string()))
    }
}

impl SchemeStore for StaticSchemes {
    fn active_power_scheme(&self) -> Result<String> {
        replay(&self.scheme)
    }
}

/// Balanced plan GUID shipped with Windows
pub const BALANCED_SCHEME: &str = "381b4222-f694-41f0-9685-ff5bb260df2e";

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

fn ip(text: &str) -> IpAddr {
    text.parse().unwrap_or(IpAddr::from([0, 0, 0, 0]))
}
