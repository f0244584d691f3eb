//! Per-interface network counters, link state and addresses.

use super::bytes_to_mb;
use crate::error::Result;
use crate::provider::{AdapterRecord, AdapterRegistry, MetricsProvider};
use crate::snapshot::{AdapterDetails, InterfaceSnapshot, NetworkSnapshot};
use chrono::Utc;
use log::{debug, warn};
use std::net::IpAddr;

/// Counters of every interface the OS lists, keyed by interface name.
///
/// Counters and addresses are read once for all interfaces; failing either
/// fails the whole source. Link stats are read per interface and a failure
/// there drops only that interface. With a `registry`, interfaces whose
/// name matches an adapter's connection id carry its identity as well.
pub fn collect(
    provider: &mut dyn MetricsProvider,
    registry: Option<&dyn AdapterRegistry>,
) -> Result<NetworkSnapshot> {
    let counters = provider.net_io_counters()?;
    let addrs = provider.net_if_addrs()?;

    let adapters = registry.and_then(|registry| match registry.network_adapters() {
        Ok(adapters) => Some(adapters),
        Err(e) => {
            debug!("Network adapter lookup failed, interfaces reported without adapter details: {}", e);
            None
        }
    });

    let mut network = NetworkSnapshot::new();

    for (name, io) in counters {
        let link = match provider.net_if_stats(&name) {
            Ok(link) => link,
            Err(e) => {
                warn!("Error collecting data for network interface {}: {}", name, e);
                continue;
            }
        };

        let ip_addresses = addrs
            .get(&name)
            .map(|list| ipv4_only(list))
            .unwrap_or_default();

        let adapter = adapters
            .as_deref()
            .and_then(|adapters| adapter_details(&name, adapters));

        network.insert(
            name,
            InterfaceSnapshot {
                bytes_sent_mb: bytes_to_mb(io.bytes_sent),
                bytes_received_mb: bytes_to_mb(io.bytes_recv),
                packets_sent: io.packets_sent,
                packets_received: io.packets_recv,
                errors_in: io.errin,
                errors_out: io.errout,
                dropped_in: io.dropin,
                dropped_out: io.dropout,
                is_up: link.as_ref().map(|l| l.is_up),
                speed_mbps: link.as_ref().and_then(|l| l.speed_mbps),
                mtu: link.as_ref().and_then(|l| l.mtu),
                ip_addresses,
                adapter,
                timestamp: Utc::now(),
            },
        );
    }

    Ok(network)
}

/// IPv4 addresses as text, in the order given
fn ipv4_only(addrs: &[IpAddr]) -> Vec<String> {
    addrs
        .iter()
        .filter(|addr| addr.is_ipv4())
        .map(|addr| addr.to_string())
        .collect()
}

/// Identity of the adapter bound to `interface`; the last match wins
fn adapter_details(interface: &str, adapters: &[AdapterRecord]) -> Option<AdapterDetails> {
    adapters
        .iter()
        .filter(|adapter| adapter.connection_id.as_deref() == Some(interface))
        .last()
        .map(|adapter| AdapterDetails {
            adapter_name: adapter.name.clone(),
            mac_address: adapter.mac_address.clone(),
            connection_status: adapter.connection_status,
        })
}
