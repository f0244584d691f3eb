//! Host-backed provider: `sysinfo` for counters, `statvfs`, `getifaddrs` and
//! `/sys` for the details sysinfo does not expose, the `battery` crate for power.

use super::{
    BatteryReading, CpuReading, DiskUsage, IoCounters, LinkStats, MemoryReading, MetricsProvider,
    Partition, SecsLeft,
};
use crate::error::{Result, TelemetryError};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System};

#[cfg(not(target_os = "linux"))]
use sysinfo::Disks;

#[cfg(any(target_os = "linux", test))]
use std::fs;
#[cfg(any(target_os = "linux", test))]
use std::path::Path;

#[cfg(target_os = "linux")]
const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Metrics provider reading the local host
pub struct SystemProvider {
    system: System,
    #[cfg(not(target_os = "linux"))]
    disks: Disks,
    networks: Networks,
}

impl SystemProvider {
    pub fn new() -> Self {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        Self {
            system: System::new_with_specifics(refresh),
            #[cfg(not(target_os = "linux"))]
            disks: Disks::new(),
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SystemProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for SystemProvider {
    fn cpu_sample(&mut self, window: Duration) -> Result<CpuReading> {
        // Usage is a delta between two refreshes; shorter windows read as 0%
        let window = window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        self.system.refresh_cpu_usage();
        std::thread::sleep(window);
        self.system.refresh_cpu_all();

        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(TelemetryError::provider("no processors reported"));
        }

        let total_mhz: u64 = cpus.iter().map(|cpu| cpu.frequency()).sum();
        let current_mhz = if total_mhz > 0 {
            Some(total_mhz as f64 / cpus.len() as f64)
        } else {
            None
        };

        Ok(CpuReading {
            usage_percent: self.system.global_cpu_usage() as f64,
            current_mhz,
            max_mhz: read_max_frequency_mhz(),
            logical_cores: cpus.len(),
            physical_cores: System::physical_core_count().unwrap_or(0),
        })
    }

    fn virtual_memory(&mut self) -> Result<MemoryReading> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(TelemetryError::provider("memory totals unavailable"));
        }
        let available = self.system.available_memory();

        Ok(MemoryReading {
            total,
            used: self.system.used_memory(),
            available,
            percent: 100.0 * total.saturating_sub(available) as f64 / total as f64,
        })
    }

    fn disk_partitions(&mut self) -> Result<Vec<Partition>> {
        #[cfg(target_os = "linux")]
        {
            read_mounted_partitions()
        }

        // sysinfo names disks by volume label, which may be empty or shared,
        // so the mount point (drive root on Windows) identifies the device
        #[cfg(not(target_os = "linux"))]
        {
            self.disks = Disks::new_with_refreshed_list();
            Ok(self
                .disks
                .list()
                .iter()
                .map(|disk| {
                    let mount_point = disk.mount_point().to_string_lossy().to_string();
                    Partition {
                        device: mount_point.clone(),
                        mount_point,
                        fs_type: disk.file_system().to_string_lossy().to_string(),
                    }
                })
                .collect())
        }
    }

    fn disk_usage(&mut self, mount_point: &str) -> Result<DiskUsage> {
        #[cfg(unix)]
        {
            statvfs_usage(mount_point)
        }

        #[cfg(not(unix))]
        {
            if self.disks.list().is_empty() {
                self.disks = Disks::new_with_refreshed_list();
            }
            let disk = self
                .disks
                .list()
                .iter()
                .find(|d| d.mount_point().to_string_lossy() == mount_point)
                .ok_or_else(|| TelemetryError::provider(format!("unknown mount point {}", mount_point)))?;

            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            Ok(DiskUsage {
                total,
                used,
                free,
                percent: usage_percent(used, used + free),
            })
        }
    }

    fn net_io_counters(&mut self) -> Result<Vec<(String, IoCounters)>> {
        self.networks.refresh(true);

        let mut counters: Vec<(String, IoCounters)> = self
            .networks
            .iter()
            .map(|(name, data)| {
                let (dropin, dropout) = read_drop_counters(name);
                (
                    name.to_string(),
                    IoCounters {
                        bytes_sent: data.total_transmitted(),
                        bytes_recv: data.total_received(),
                        packets_sent: data.total_packets_transmitted(),
                        packets_recv: data.total_packets_received(),
                        errin: data.total_errors_on_received(),
                        errout: data.total_errors_on_transmitted(),
                        dropin,
                        dropout,
                    },
                )
            })
            .collect();

        if counters.is_empty() {
            return Err(TelemetryError::provider("no network interfaces reported"));
        }
        counters.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(counters)
    }

    // sysinfo keeps addresses in a hash set, so they are read from the OS
    // table directly to preserve the order it reports them in
    fn net_if_addrs(&mut self) -> Result<HashMap<String, Vec<IpAddr>>> {
        #[cfg(unix)]
        {
            read_interface_addrs()
        }

        #[cfg(windows)]
        {
            Ok(super::windows::interface_table()?
                .into_iter()
                .map(|entry| (entry.name, entry.addrs))
                .collect())
        }

        #[cfg(not(any(unix, windows)))]
        {
            Ok(self
                .networks
                .iter()
                .map(|(name, data)| {
                    let addrs = data.ip_networks().iter().map(|net| net.addr).collect();
                    (name.to_string(), addrs)
                })
                .collect())
        }
    }

    fn net_if_stats(&mut self, interface: &str) -> Result<Option<LinkStats>> {
        #[cfg(target_os = "linux")]
        {
            let mut link = read_link_stats(interface)?;
            if link.mtu.is_none() {
                link.mtu = self.interface_mtu(interface);
            }
            Ok(Some(link))
        }

        // No portable link speed source outside Linux and Windows
        #[cfg(all(unix, not(target_os = "linux")))]
        {
            let flags = read_ifaddrs()?
                .into_iter()
                .find(|entry| entry.name == interface)
                .map(|entry| entry.flags)
                .ok_or_else(|| TelemetryError::provider(format!("unknown interface {}", interface)))?;
            Ok(Some(LinkStats {
                is_up: (flags & libc::IFF_UP as u32) != 0,
                speed_mbps: None,
                mtu: self.interface_mtu(interface),
            }))
        }

        #[cfg(windows)]
        {
            super::windows::interface_table()?
                .into_iter()
                .find(|entry| entry.name == interface)
                .map(|entry| Some(entry.link))
                .ok_or_else(|| TelemetryError::provider(format!("unknown interface {}", interface)))
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = interface;
            Ok(None)
        }
    }

    fn sensors_battery(&mut self) -> Result<Option<BatteryReading>> {
        use battery::units::ratio::percent;
        use battery::units::time::second;

        let supplies = host_power_supplies();

        let battery = match first_battery() {
            Ok(Some(battery)) => battery,
            Ok(None) => return Ok(None),
            // The battery crate rejects states such as "Not charging"; the
            // power supply table may still have the charge level
            Err(e) => {
                return match supplies.battery_percent {
                    Some(level) => Ok(Some(battery_reading(level, false, None, supplies.ac_online))),
                    None => Err(e),
                };
            }
        };

        let charging_or_full = matches!(battery.state(), battery::State::Charging | battery::State::Full);
        let time_to_empty = battery.time_to_empty().map(|time| time.get::<second>() as u64);

        Ok(Some(battery_reading(
            battery.state_of_charge().get::<percent>() as f64,
            charging_or_full,
            time_to_empty,
            supplies.ac_online,
        )))
    }
}

impl SystemProvider {
    #[cfg(not(windows))]
    fn interface_mtu(&self, interface: &str) -> Option<u64> {
        self.networks
            .list()
            .get(interface)
            .map(|data| data.mtu())
            .filter(|mtu| *mtu > 0)
    }
}

fn first_battery() -> Result<Option<battery::Battery>> {
    let manager = battery::Manager::new()
        .map_err(|e| TelemetryError::provider(format!("battery manager unavailable: {}", e)))?;
    let mut batteries = manager
        .batteries()
        .map_err(|e| TelemetryError::provider(format!("failed to list batteries: {}", e)))?;

    match batteries.next() {
        Some(found) => found
            .map(Some)
            .map_err(|e| TelemetryError::provider(format!("failed to read battery: {}", e))),
        None => Ok(None),
    }
}

/// Plugged-in state follows the AC adapter when the host reports one, and
/// the charging state otherwise
fn battery_reading(
    percent: f64,
    charging_or_full: bool,
    time_to_empty: Option<u64>,
    ac_online: Option<bool>,
) -> BatteryReading {
    let power_plugged = ac_online.unwrap_or(charging_or_full);
    let secs_left = if power_plugged {
        SecsLeft::Unlimited
    } else {
        match time_to_empty {
            Some(secs) => SecsLeft::Seconds(secs),
            None => SecsLeft::Unknown,
        }
    };

    BatteryReading {
        percent,
        secs_left,
        power_plugged,
    }
}

/// AC adapter and battery state as listed by the power supply table
#[derive(Debug, Default, PartialEq)]
struct PowerSupplies {
    /// `None` when the host lists no AC adapter
    ac_online: Option<bool>,
    battery_percent: Option<f64>,
}

fn host_power_supplies() -> PowerSupplies {
    #[cfg(target_os = "linux")]
    {
        read_power_supplies(Path::new(POWER_SUPPLY_ROOT))
    }

    #[cfg(windows)]
    {
        PowerSupplies {
            ac_online: super::windows::ac_line_online(),
            battery_percent: None,
        }
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    {
        PowerSupplies::default()
    }
}

/// Scan a `/sys/class/power_supply` style directory
#[cfg(any(target_os = "linux", test))]
fn read_power_supplies(root: &Path) -> PowerSupplies {
    let mut supplies = PowerSupplies::default();
    let Ok(entries) = fs::read_dir(root) else {
        return supplies;
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        let read = |file: &str| {
            fs::read_to_string(dir.join(file))
                .ok()
                .map(|value| value.trim().to_string())
        };

        match read("type").as_deref() {
            Some("Mains") => {
                let online = read("online").as_deref() == Some("1");
                supplies.ac_online = Some(supplies.ac_online.unwrap_or(false) || online);
            }
            Some("Battery") if supplies.battery_percent.is_none() => {
                if read("present").as_deref() != Some("0") {
                    supplies.battery_percent = read("capacity").and_then(|value| value.parse().ok());
                }
            }
            _ => {}
        }
    }

    supplies
}

pub(crate) fn usage_percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        100.0 * used as f64 / total as f64
    } else {
        0.0
    }
}

#[cfg(unix)]
fn statvfs_usage(mount_point: &str) -> Result<DiskUsage> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;

    let c_path = CString::new(mount_point)
        .map_err(|_| TelemetryError::provider(format!("invalid mount point {:?}", mount_point)))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let stat = unsafe { stat.assume_init() };

    let block_size = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let free_for_root = stat.f_bfree as u64 * block_size;
    let free = stat.f_bavail as u64 * block_size;
    let used = total.saturating_sub(free_for_root);

    // Reserved blocks are neither used nor available to users
    Ok(DiskUsage {
        total,
        used,
        free,
        percent: usage_percent(used, used + free),
    })
}

/// One `getifaddrs` node
#[cfg(unix)]
struct InterfaceAddr {
    name: String,
    #[cfg(not(target_os = "linux"))]
    flags: u32,
    addr: Option<IpAddr>,
}

/// Walk the interface address list in the order the kernel returns it
#[cfg(unix)]
fn read_ifaddrs() -> Result<Vec<InterfaceAddr>> {
    use std::ffi::CStr;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let mut entries = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        let node = unsafe { &*cursor };
        if !node.ifa_name.is_null() {
            let name = unsafe { CStr::from_ptr(node.ifa_name) }.to_string_lossy().to_string();
            entries.push(InterfaceAddr {
                name,
                #[cfg(not(target_os = "linux"))]
                flags: node.ifa_flags as u32,
                addr: unsafe { sockaddr_ip(node.ifa_addr) },
            });
        }
        cursor = node.ifa_next;
    }

    unsafe { libc::freeifaddrs(head) };
    Ok(entries)
}

/// IPv4 and IPv6 addresses of every interface; link-layer nodes only
/// register the interface name
#[cfg(unix)]
fn read_interface_addrs() -> Result<HashMap<String, Vec<IpAddr>>> {
    let mut addrs: HashMap<String, Vec<IpAddr>> = HashMap::new();
    for entry in read_ifaddrs()? {
        let list = addrs.entry(entry.name).or_default();
        if let Some(addr) = entry.addr {
            list.push(addr);
        }
    }
    Ok(addrs)
}

/// # Safety
///
/// `addr` must be null or point to a socket address whose length matches
/// its `sa_family`.
#[cfg(unix)]
unsafe fn sockaddr_ip(addr: *const libc::sockaddr) -> Option<IpAddr> {
    use std::net::{Ipv4Addr, Ipv6Addr};

    if addr.is_null() {
        return None;
    }
    unsafe {
        match i32::from((*addr).sa_family) {
            libc::AF_INET => {
                let sin = &*(addr as *const libc::sockaddr_in);
                Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
            }
            libc::AF_INET6 => {
                let sin6 = &*(addr as *const libc::sockaddr_in6);
                Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
            }
            _ => None,
        }
    }
}

/// Physical filesystems from /proc/self/mounts, skipping `nodev` ones
#[cfg(target_os = "linux")]
fn read_mounted_partitions() -> Result<Vec<Partition>> {
    let mounts = fs::read_to_string("/proc/self/mounts")?;
    let physical: Vec<String> = fs::read_to_string("/proc/filesystems")
        .map(|content| parse_physical_filesystems(&content))
        .unwrap_or_default();

    Ok(parse_mounts(&mounts)
        .into_iter()
        .filter(|p| physical.is_empty() || physical.contains(&p.fs_type))
        .collect())
}

#[cfg(any(target_os = "linux", test))]
fn parse_physical_filesystems(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.starts_with("nodev"))
        .filter_map(|line| line.split_whitespace().next())
        .map(|fs| fs.to_string())
        .collect()
}

#[cfg(any(target_os = "linux", test))]
fn parse_mounts(content: &str) -> Vec<Partition> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mount_point = parts.next()?;
            let fs_type = parts.next()?;
            Some(Partition {
                device: unescape_mount_field(device),
                mount_point: unescape_mount_field(mount_point),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

// The kernel escapes space, tab, newline and backslash as octal (\040 etc.)
#[cfg(any(target_os = "linux", test))]
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let octal = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = octal {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).to_string()
}

#[cfg(target_os = "linux")]
fn read_link_stats(interface: &str) -> Result<LinkStats> {
    let base = format!("/sys/class/net/{}", interface);

    let flags = fs::read_to_string(format!("{}/flags", base))?;
    let flags = u32::from_str_radix(flags.trim().trim_start_matches("0x"), 16)
        .map_err(|e| TelemetryError::provider(format!("bad flags for {}: {}", interface, e)))?;

    // Reading speed fails with EINVAL on links that are down or virtual
    let speed_mbps = fs::read_to_string(format!("{}/speed", base))
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|speed| *speed > 0)
        .map(|speed| speed as u64);

    let mtu = fs::read_to_string(format!("{}/mtu", base))
        .ok()
        .and_then(|s| s.trim().parse().ok());

    Ok(LinkStats {
        is_up: (flags & libc::IFF_UP as u32) != 0,
        speed_mbps,
        mtu,
    })
}

fn read_drop_counters(interface: &str) -> (u64, u64) {
    #[cfg(target_os = "linux")]
    {
        let read = |counter: &str| {
            fs::read_to_string(format!("/sys/class/net/{}/statistics/{}", interface, counter))
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0)
        };
        (read("rx_dropped"), read("tx_dropped"))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = interface;
        (0, 0)
    }
}

/// cpuinfo_max_freq is in kHz
fn read_max_frequency_mhz() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|khz| khz / 1000.0)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
