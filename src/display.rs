//! Console report for one telemetry snapshot.

use crate::metrics::connection_status_label;
use crate::snapshot::{BatterySnapshot, InterfaceSnapshot, SecondsRemaining, TelemetrySnapshot};
use chrono::Local;
use num_format::{Locale, ToFormattedString};
use std::fmt::{Display, Write};

/// Marker printed for values a source did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Render a value or the N/A marker
pub fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Format a size already expressed in MB, switching to GB/TB when large
pub fn format_megabytes(mb: f64) -> String {
    const GB: f64 = 1024.0;
    const TB: f64 = GB * 1024.0;

    if mb >= TB {
        format!("{:.2} TB", mb / TB)
    } else if mb >= GB {
        format!("{:.2} GB", mb / GB)
    } else {
        format!("{:.2} MB", mb)
    }
}

/// Format a size already expressed in GB
pub fn format_gigabytes(gb: f64) -> String {
    format_megabytes(gb * 1024.0)
}

/// Counter with thousands separators
pub fn format_count(count: u64) -> String {
    count.to_formatted_string(&Locale::en)
}

/// Remaining battery time as `1h 05m`
pub fn format_time_left(remaining: SecondsRemaining) -> String {
    match remaining {
        SecondsRemaining::Unlimited => "unlimited".to_string(),
        SecondsRemaining::Seconds(secs) if secs < 0 => NOT_AVAILABLE.to_string(),
        SecondsRemaining::Seconds(secs) => {
            let hours = secs / 3600;
            let minutes = (secs % 3600) / 60;
            if hours > 0 {
                format!("{}h {:02}m", hours, minutes)
            } else {
                format!("{}m", minutes)
            }
        }
    }
}

/// Truncate a string to `max_len` characters, adding ".." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 2 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 2).collect();
        format!("{}..", head)
    }
}

/// Multi-line report for one collection cycle
pub fn render_report(cycle: u64, snapshot: &TelemetrySnapshot) -> String {
    let mut out = String::new();
    let taken = snapshot.collection_timestamp.with_timezone(&Local);

    let _ = writeln!(out, "\n--- Telemetry Data (cycle {}, {}) ---", cycle, taken.format("%H:%M:%S"));

    match &snapshot.processor {
        Some(cpu) => {
            let _ = writeln!(
                out,
                "CPU Usage: {:.1}% ({} / {} MHz, {} logical / {} physical cores)",
                cpu.usage_percent,
                or_na(cpu.current_frequency_mhz.map(|mhz| format!("{:.0}", mhz))),
                or_na(cpu.max_frequency_mhz.map(|mhz| format!("{:.0}", mhz))),
                cpu.logical_core_count,
                cpu.physical_core_count
            );
        }
        None => {
            let _ = writeln!(out, "CPU Usage: {}", NOT_AVAILABLE);
        }
    }

    match &snapshot.memory {
        Some(mem) => {
            let _ = writeln!(
                out,
                "Memory Usage: {:.1}% ({} used / {} total, {} available)",
                mem.usage_percent,
                format_megabytes(mem.used_mb),
                format_megabytes(mem.total_mb),
                format_megabytes(mem.available_mb)
            );
        }
        None => {
            let _ = writeln!(out, "Memory Usage: {}", NOT_AVAILABLE);
        }
    }

    if snapshot.storage.is_empty() {
        let _ = writeln!(out, "Disk: {}", NOT_AVAILABLE);
    }
    for (device, disk) in &snapshot.storage {
        let _ = writeln!(
            out,
            "Disk {} ({}): {:.1}% used, {} free of {}",
            device,
            disk.mount_point,
            disk.usage_percent,
            format_gigabytes(disk.free_gb),
            format_gigabytes(disk.total_gb)
        );
    }

    if snapshot.network.is_empty() {
        let _ = writeln!(out, "Network: {}", NOT_AVAILABLE);
    }
    for (name, iface) in &snapshot.network {
        let _ = writeln!(out, "{}", interface_line(name, iface));
    }

    if let Some(battery) = &snapshot.power.battery {
        let _ = writeln!(out, "{}", battery_line(battery));
    }
    if let Some(scheme) = &snapshot.power.active_power_scheme {
        let _ = writeln!(out, "Power Scheme: {}", scheme);
    }

    out
}

fn interface_line(name: &str, iface: &InterfaceSnapshot) -> String {
    let state = match iface.is_up {
        Some(true) => "up",
        Some(false) => "down",
        None => NOT_AVAILABLE,
    };
    let mut line = format!(
        "Network {} [{}]: Sent {}, Received {}, Packets {} / {}",
        name,
        state,
        format_megabytes(iface.bytes_sent_mb),
        format_megabytes(iface.bytes_received_mb),
        format_count(iface.packets_sent),
        format_count(iface.packets_received)
    );

    if !iface.ip_addresses.is_empty() {
        let _ = write!(line, ", IPv4 {}", iface.ip_addresses.join(" "));
    }
    if let Some(adapter) = &iface.adapter {
        let _ = write!(
            line,
            " ({}, {})",
            truncate_str(adapter.adapter_name.as_deref().unwrap_or(NOT_AVAILABLE), 32),
            adapter.connection_status.map_or(NOT_AVAILABLE, connection_status_label)
        );
    }
    line
}

fn battery_line(battery: &BatterySnapshot) -> String {
    if battery.power_plugged {
        format!("Battery: {:.1}% (plugged in)", battery.percent)
    } else {
        format!(
            "Battery: {:.1}% ({} remaining)",
            battery.percent,
            format_time_left(battery.seconds_remaining)
        )
    }
}
