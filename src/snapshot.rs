//! Typed telemetry snapshots produced by each collection cycle.
//!
//! Every record is a fresh value; nothing here survives between cycles.
//! Sizes are already normalized (MB, GB, MHz, percent) by the adapters.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Processor usage and topology
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorSnapshot {
    /// Usage over the sampling window (0-100)
    pub usage_percent: f64,
    /// Mean current frequency in MHz
    pub current_frequency_mhz: Option<f64>,
    /// Maximum rated frequency in MHz
    pub max_frequency_mhz: Option<f64>,
    /// Logical CPUs (hardware threads)
    pub logical_core_count: usize,
    /// Physical cores, 0 when unknown
    pub physical_core_count: usize,
    /// When the sample finished
    pub timestamp: DateTime<Utc>,
}

/// Physical memory accounting in MB
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    /// Installed memory in MB
    pub total_mb: f64,
    /// Memory in use in MB
    pub used_mb: f64,
    /// Memory available to new processes in MB
    pub available_mb: f64,
    /// Share of total memory not available (0-100)
    pub usage_percent: f64,
    pub timestamp: DateTime<Utc>,
}

/// Usage of one mounted partition in GB
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionSnapshot {
    /// Where the partition is mounted
    pub mount_point: String,
    /// Total size in GB
    pub total_gb: f64,
    /// Used space in GB
    pub used_gb: f64,
    /// Free space in GB
    pub free_gb: f64,
    /// Used share of the space available to users (0-100)
    pub usage_percent: f64,
    pub timestamp: DateTime<Utc>,
}

/// Device identifier -> partition usage. Inaccessible partitions are absent.
pub type StorageSnapshot = BTreeMap<String, PartitionSnapshot>;

/// Counters, link state and addresses of one network interface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceSnapshot {
    /// Sent since boot in MB
    pub bytes_sent_mb: f64,
    /// Received since boot in MB
    pub bytes_received_mb: f64,
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Receive errors
    pub errors_in: u64,
    /// Transmit errors
    pub errors_out: u64,
    /// Incoming packets dropped
    pub dropped_in: u64,
    /// Outgoing packets dropped
    pub dropped_out: u64,
    /// Whether the link is up
    pub is_up: Option<bool>,
    /// Link speed in Mbps
    pub speed_mbps: Option<u64>,
    /// MTU in bytes
    pub mtu: Option<u64>,
    /// IPv4 addresses in the order the OS reported them
    pub ip_addresses: Vec<String>,
    #[serde(flatten)]
    pub adapter: Option<AdapterDetails>,
    pub timestamp: DateTime<Utc>,
}

/// Fields merged in from the platform adapter registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterDetails {
    /// Adapter product name
    pub adapter_name: Option<String>,
    pub mac_address: Option<String>,
    /// Raw `NetConnectionStatus` code (2 = connected)
    pub connection_status: Option<u16>,
}

/// Interface name -> interface record
pub type NetworkSnapshot = BTreeMap<String, InterfaceSnapshot>;

/// Remaining battery time, or the "unlimited" sentinel while on AC power
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondsRemaining {
    Seconds(i64),
    Unlimited,
}

impl Serialize for SecondsRemaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SecondsRemaining::Seconds(secs) => serializer.serialize_i64(*secs),
            SecondsRemaining::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl std::fmt::Display for SecondsRemaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecondsRemaining::Seconds(secs) => write!(f, "{}s", secs),
            SecondsRemaining::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Charge level and remaining time of the first battery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatterySnapshot {
    /// Charge level (0-100)
    pub percent: f64,
    /// Seconds until empty, -1 when not yet estimated
    pub seconds_remaining: SecondsRemaining,
    /// Running on AC power
    pub power_plugged: bool,
    pub timestamp: DateTime<Utc>,
}

/// Battery state and active power scheme; both absent on desktops or when
/// the lookups fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatterySnapshot>,
    /// GUID of the active power plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_power_scheme: Option<String>,
}

impl PowerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.battery.is_none() && self.active_power_scheme.is_none()
    }
}

/// One full collection cycle.
///
/// A source that failed entirely is `None` (processor, memory) or empty
/// (storage, network, power); it never affects the other keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    #[serde(serialize_with = "empty_map_if_none")]
    pub processor: Option<ProcessorSnapshot>,
    #[serde(serialize_with = "empty_map_if_none")]
    pub memory: Option<MemorySnapshot>,
    pub storage: StorageSnapshot,
    pub network: NetworkSnapshot,
    pub power: PowerSnapshot,
    /// Taken after every adapter has returned
    pub collection_timestamp: DateTime<Utc>,
}

// A missing source keeps the same JSON shape as a present one: an object.
fn empty_map_if_none<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            processor: None,
            memory: None,
            storage: StorageSnapshot::new(),
            network: NetworkSnapshot::new(),
            power: PowerSnapshot::default(),
            collection_timestamp: Utc::now(),
        }
    }

    #[test]
    fn failed_sources_serialize_as_empty_objects() {
        let value = serde_json::to_value(sample_snapshot()).unwrap();
        assert_eq!(value["processor"], json!({}));
        assert_eq!(value["memory"], json!({}));
        assert_eq!(value["storage"], json!({}));
        assert_eq!(value["network"], json!({}));
        assert_eq!(value["power"], json!({}));
        assert!(value["collection_timestamp"].is_string());
    }

    #[test]
    fn top_level_key_order_is_stable() {
        let text = serde_json::to_string(&sample_snapshot()).unwrap();
        let positions: Vec<usize> = ["processor", "memory", "storage", "network", "power", "collection_timestamp"]
            .iter()
            .map(|key| text.find(&format!("\"{}\"", key)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn partition_fields_carry_gb_units() {
        let partition = PartitionSnapshot {
            mount_point: "/".to_string(),
            total_gb: 512.0,
            used_gb: 128.0,
            free_gb: 384.0,
            usage_percent: 25.0,
            timestamp: Utc::now(),
        };
        let text = serde_json::to_string(&partition).unwrap();
        let positions: Vec<usize> = ["mount_point", "total_gb", "used_gb", "free_gb", "usage_percent", "timestamp"]
            .iter()
            .map(|key| text.find(&format!("\"{}\"", key)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["free_gb"], json!(384.0));
    }

    #[test]
    fn unlimited_battery_time_serializes_as_literal_string() {
        assert_eq!(serde_json::to_value(SecondsRemaining::Unlimited).unwrap(), json!("unlimited"));
        assert_eq!(serde_json::to_value(SecondsRemaining::Seconds(5400)).unwrap(), json!(5400));
    }

    #[test]
    fn enrichment_fields_are_flattened_only_when_present() {
        let mut iface = InterfaceSnapshot {
            bytes_sent_mb: 1.0,
            bytes_received_mb: 2.0,
            packets_sent: 3,
            packets_received: 4,
            errors_in: 0,
            errors_out: 0,
            dropped_in: 0,
            dropped_out: 0,
            is_up: Some(true),
            speed_mbps: None,
            mtu: Some(1500),
            ip_addresses: vec!["10.0.0.2".to_string()],
            adapter: None,
            timestamp: Utc::now(),
        };

        let plain: Value = serde_json::to_value(&iface).unwrap();
        assert!(plain.get("adapter_name").is_none());
        assert!(plain.get("adapter").is_none());
        assert_eq!(plain["speed_mbps"], Value::Null);

        iface.adapter = Some(AdapterDetails {
            adapter_name: Some("Intel(R) Ethernet".to_string()),
            mac_address: Some("00:11:22:33:44:55".to_string()),
            connection_status: Some(2),
        });
        let enriched: Value = serde_json::to_value(&iface).unwrap();
        assert_eq!(enriched["adapter_name"], json!("Intel(R) Ethernet"));
        assert_eq!(enriched["mac_address"], json!("00:11:22:33:44:55"));
        assert_eq!(enriched["connection_status"], json!(2));
    }
}
