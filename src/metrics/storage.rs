//! Per-partition disk space.

use super::bytes_to_gb;
use crate::error::Result;
use crate::provider::MetricsProvider;
use crate::snapshot::{PartitionSnapshot, StorageSnapshot};
use chrono::Utc;
use log::warn;

/// Usage of every accessible partition, keyed by device, or by mount point
/// when the device has no name.
///
/// Failing to list partitions fails the whole source. A partition whose
/// usage cannot be read is logged and left out.
pub fn collect(provider: &mut dyn MetricsProvider) -> Result<StorageSnapshot> {
    let partitions = provider.disk_partitions()?;
    let mut storage = StorageSnapshot::new();

    for partition in partitions {
        let key = if partition.device.is_empty() {
            partition.mount_point.clone()
        } else {
            partition.device
        };

        let usage = match provider.disk_usage(&partition.mount_point) {
            Ok(usage) => usage,
            Err(e) if e.is_permission_denied() => {
                warn!("Permission denied accessing {}", key);
                continue;
            }
            Err(e) => {
                warn!("Failed to read usage of {} ({}): {}", key, partition.mount_point, e);
                continue;
            }
        };

        // Bind mounts list the same device more than once; keep the first.
        if storage.contains_key(&key) {
            continue;
        }

        storage.insert(
            key,
            PartitionSnapshot {
                mount_point: partition.mount_point,
                total_gb: bytes_to_gb(usage.total),
                used_gb: bytes_to_gb(usage.used),
                free_gb: bytes_to_gb(usage.free),
                usage_percent: usage.percent,
                timestamp: Utc::now(),
            },
        );
    }

    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{Failure, ScriptedProvider};
    use crate::provider::{DiskUsage, Partition};

    fn partition(device: &str, mount_point: &str) -> Partition {
        Partition {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
            fs_type: "ext4".to_string(),
        }
    }

    const GIB: u64 = 1024 * 1024 * 1024;

    fn usage(total_gib: u64, used_gib: u64) -> DiskUsage {
        DiskUsage {
            total: total_gib * GIB,
            used: used_gib * GIB,
            free: (total_gib - used_gib) * GIB,
            percent: used_gib as f64 / total_gib as f64 * 100.0,
        }
    }

    #[test]
    fn sizes_are_reported_in_gb() {
        let mut provider = ScriptedProvider::typical_host()
            .with_partitions(vec![(partition("/dev/sda1", "/"), Ok(usage(200, 50)))]);
        let storage = collect(&mut provider).unwrap();

        let root = &storage["/dev/sda1"];
        assert_eq!(root.mount_point, "/");
        assert_eq!(root.total_gb, 200.0);
        assert_eq!(root.used_gb, 50.0);
        assert_eq!(root.free_gb, 150.0);
        assert_eq!(root.usage_percent, 25.0);
    }

    #[test]
    fn inaccessible_partition_is_skipped() {
        let mut provider = ScriptedProvider::typical_host().with_partitions(vec![
            (partition("/dev/sda1", "/"), Ok(usage(100, 10))),
            (
                partition("/dev/sdb1", "/mnt/secret"),
                Err(Failure::PermissionDenied("/mnt/secret".into())),
            ),
            (partition("/dev/sdc1", "/data"), Ok(usage(1000, 900))),
        ]);
        let storage = collect(&mut provider).unwrap();

        assert_eq!(storage.len(), 2);
        assert!(storage.contains_key("/dev/sda1"));
        assert!(!storage.contains_key("/dev/sdb1"));
        assert_eq!(storage["/dev/sdc1"].used_gb, 900.0);
    }

    #[test]
    fn other_item_errors_are_skipped_too() {
        let mut provider = ScriptedProvider::typical_host()
            .fail_usage("/boot/efi", Failure::Unavailable("stale handle".into()));
        let storage = collect(&mut provider).unwrap();

        assert_eq!(storage.len(), 1);
        assert!(storage.contains_key("/dev/nvme0n1p2"));
    }

    #[test]
    fn duplicate_device_keeps_first_mount() {
        let mut provider = ScriptedProvider::typical_host().with_partitions(vec![
            (partition("/dev/sda1", "/"), Ok(usage(100, 10))),
            (partition("/dev/sda1", "/var/lib/docker"), Ok(usage(100, 10))),
        ]);
        let storage = collect(&mut provider).unwrap();

        assert_eq!(storage.len(), 1);
        assert_eq!(storage["/dev/sda1"].mount_point, "/");
    }

    #[test]
    fn unnamed_devices_are_keyed_by_mount_point() {
        let mut provider = ScriptedProvider::typical_host().with_partitions(vec![
            (partition("", "D:\\"), Ok(usage(500, 100))),
            (partition("", "E:\\"), Ok(usage(64, 32))),
        ]);
        let storage = collect(&mut provider).unwrap();

        assert_eq!(storage.len(), 2);
        assert_eq!(storage["D:\\"].total_gb, 500.0);
        assert_eq!(storage["E:\\"].used_gb, 32.0);
        assert!(!storage.contains_key(""));
    }

    #[test]
    fn listing_failure_fails_the_source() {
        let mut provider = ScriptedProvider::typical_host()
            .fail_partitions(Failure::Unavailable("/proc/self/mounts".into()));
        assert!(collect(&mut provider).is_err());
        assert_eq!(provider.calls(), &["disk_partitions"]);
    }
}
