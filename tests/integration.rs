use hostpulse::error::TelemetryError;
use hostpulse::provider::mock::{Failure, ScriptedProvider, StaticRegistry, StaticSchemes, BALANCED_SCHEME};
use hostpulse::provider::{CpuReading, DiskUsage, Partition};
use hostpulse::snapshot::SecondsRemaining;
use hostpulse::{CollectorConfig, TelemetryCollector};
use serde_json::{json, Value};
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(1);

fn config() -> CollectorConfig {
    CollectorConfig { sample_window: WINDOW }
}

fn collector_with(provider: ScriptedProvider) -> TelemetryCollector<ScriptedProvider> {
    TelemetryCollector::with_sources(
        provider,
        Ok(Box::new(StaticRegistry::wired_eth0())),
        Box::new(StaticSchemes::new(BALANCED_SCHEME)),
        config(),
    )
}

#[test]
fn processor_snapshot_reflects_provider_reading() {
    let provider = ScriptedProvider::typical_host().with_cpu(CpuReading {
        usage_percent: 42.5,
        current_mhz: Some(2400.0),
        max_mhz: Some(3600.0),
        logical_cores: 8,
        physical_cores: 4,
    });
    let mut collector = collector_with(provider);
    let snapshot = collector.collect_all();

    let cpu = snapshot.processor.unwrap();
    assert_eq!(cpu.usage_percent, 42.5);
    assert_eq!(cpu.current_frequency_mhz, Some(2400.0));
    assert_eq!(cpu.max_frequency_mhz, Some(3600.0));
    assert_eq!(cpu.logical_core_count, 8);
    assert_eq!(cpu.physical_core_count, 4);
    assert!(cpu.timestamp <= snapshot.collection_timestamp);
}

#[test]
fn permission_error_on_second_partition_keeps_first() {
    let gib = 1024 * 1024 * 1024;
    let provider = ScriptedProvider::typical_host().with_partitions(vec![
        (
            Partition {
                device: "C:\\".to_string(),
                mount_point: "C:\\".to_string(),
                fs_type: "NTFS".to_string(),
            },
            Ok(DiskUsage {
                total: 256 * gib,
                used: 64 * gib,
                free: 192 * gib,
                percent: 25.0,
            }),
        ),
        (
            Partition {
                device: "D:\\".to_string(),
                mount_point: "D:\\".to_string(),
                fs_type: String::new(),
            },
            Err(Failure::PermissionDenied("The device is not ready".to_string())),
        ),
    ]);
    let mut collector = collector_with(provider);
    let snapshot = collector.collect_all();

    assert_eq!(snapshot.storage.len(), 1);
    let c = &snapshot.storage["C:\\"];
    assert_eq!(c.total_gb, 256.0);
    assert_eq!(c.used_gb, 64.0);
    assert_eq!(c.free_gb, 192.0);
}

#[test]
fn degraded_registry_still_collects_everything() {
    let mut collector = TelemetryCollector::with_sources(
        ScriptedProvider::typical_host(),
        Err(TelemetryError::unsupported("WMI is not available")),
        Box::new(StaticSchemes::new(BALANCED_SCHEME)),
        config(),
    );
    assert!(!collector.enrichment_available());

    let snapshot = collector.collect_all();
    assert!(snapshot.processor.is_some());
    assert!(snapshot.memory.is_some());
    assert!(!snapshot.storage.is_empty());
    assert!(snapshot.power.battery.is_some());
    assert!(!snapshot.network.is_empty());

    let value = serde_json::to_value(&snapshot).unwrap();
    for iface in value["network"].as_object().unwrap().values() {
        assert!(iface.get("adapter_name").is_none());
        assert!(iface.get("mac_address").is_none());
        assert!(iface.get("connection_status").is_none());
    }
}

#[test]
fn each_failing_source_is_isolated() {
    type Breaker = fn(ScriptedProvider) -> ScriptedProvider;
    let cases: Vec<(&str, Breaker)> = vec![
        ("processor", (|p: ScriptedProvider| p.fail_cpu(Failure::Unavailable("cpu".into()))) as Breaker),
        ("memory", (|p: ScriptedProvider| p.fail_memory(Failure::Unavailable("memory".into()))) as Breaker),
        ("storage", (|p: ScriptedProvider| p.fail_partitions(Failure::Unavailable("mounts".into()))) as Breaker),
        ("network", (|p: ScriptedProvider| p.fail_counters(Failure::Unavailable("net".into()))) as Breaker),
        ("power", (|p: ScriptedProvider| p.fail_battery(Failure::Unavailable("battery".into()))) as Breaker),
    ];
    let healthy = serde_json::to_value(collector_with(ScriptedProvider::typical_host()).collect_all()).unwrap();

    for (broken, breaker) in cases {
        let snapshot = collector_with(breaker(ScriptedProvider::typical_host())).collect_all();
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value[broken], json!({}), "{} should be empty", broken);
        for key in ["processor", "memory", "storage", "network", "power"] {
            if key == broken {
                continue;
            }
            assert_ne!(value[key], json!({}), "{} was emptied by a {} failure", key, broken);
            assert_eq!(
                without_timestamps(&value[key]),
                without_timestamps(&healthy[key]),
                "{} changed after a {} failure",
                key,
                broken
            );
        }
    }
}

#[test]
fn one_failing_interface_leaves_the_rest() {
    let provider = ScriptedProvider::typical_host()
        .fail_link_stats("lo", Failure::Unavailable("no such device".into()));
    let snapshot = collector_with(provider).collect_all();

    assert_eq!(snapshot.network.len(), 1);
    let eth0 = &snapshot.network["eth0"];
    assert_eq!(eth0.ip_addresses, vec!["192.168.1.20", "10.8.0.2"]);
    assert_eq!(eth0.bytes_received_mb, 1200.0);
    assert!(eth0.adapter.is_some());
}

#[test]
fn snapshot_json_shape() {
    let snapshot = collector_with(ScriptedProvider::typical_host()).collect_all();
    let text = serde_json::to_string(&snapshot).unwrap();

    let order: Vec<usize> = ["\"processor\"", "\"memory\"", "\"storage\"", "\"network\"", "\"power\"", "\"collection_timestamp\""]
        .iter()
        .map(|key| text.find(key).unwrap())
        .collect();
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]));

    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["memory"]["total_mb"], json!(16384.0));
    assert_eq!(value["storage"]["/dev/nvme0n1p2"]["mount_point"], json!("/"));
    assert_eq!(value["network"]["eth0"]["adapter_name"], json!("Intel(R) Ethernet Connection I219-V"));
    assert_eq!(value["power"]["battery"]["seconds_remaining"], json!(5400));
    assert_eq!(value["power"]["active_power_scheme"], json!(BALANCED_SCHEME));
    assert!(value["collection_timestamp"].as_str().is_some());
}

#[test]
fn plugged_in_battery_reports_unlimited() {
    use hostpulse::provider::{BatteryReading, SecsLeft};

    let provider = ScriptedProvider::typical_host().with_battery(Some(BatteryReading {
        percent: 100.0,
        secs_left: SecsLeft::Unlimited,
        power_plugged: true,
    }));
    let snapshot = collector_with(provider).collect_all();

    let battery = snapshot.power.battery.as_ref().unwrap();
    assert_eq!(battery.seconds_remaining, SecondsRemaining::Unlimited);
    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["power"]["battery"]["seconds_remaining"], json!("unlimited"));
}

#[test]
fn repeated_cycles_produce_fresh_snapshots() {
    let mut collector = collector_with(ScriptedProvider::typical_host());
    let first = collector.collect_all();
    let second = collector.collect_all();

    assert!(second.collection_timestamp >= first.collection_timestamp);
    assert_eq!(first.storage.keys().collect::<Vec<_>>(), second.storage.keys().collect::<Vec<_>>());
    assert_eq!(
        collector.provider().sample_windows(),
        &[WINDOW, WINDOW]
    );
}

fn without_timestamps(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "timestamp")
                .map(|(key, inner)| (key.clone(), without_timestamps(inner)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(without_timestamps).collect()),
        other => other.clone(),
    }
}
