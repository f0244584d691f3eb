//! Telemetry collector: runs every adapter and assembles one snapshot.

use crate::error::Result;
use crate::metrics::{memory, network, power, processor, storage};
use crate::provider::{self, AdapterRegistry, MetricsProvider, SchemeStore, SystemProvider};
use crate::snapshot::{
    MemorySnapshot, NetworkSnapshot, PowerSnapshot, ProcessorSnapshot, StorageSnapshot,
    TelemetrySnapshot,
};
use chrono::Utc;
use log::{error, info, log_enabled, warn, Level};
use serde::Serialize;
use std::time::Duration;

/// Collector settings
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// How long the processor sample blocks
    pub sample_window: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sample_window: Duration::from_secs(1),
        }
    }
}

impl CollectorConfig {
    /// Sampling window actually used, never shorter than the OS refresh granularity
    pub fn effective_sample_window(&self) -> Duration {
        self.sample_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)
    }
}

/// Collects processor, memory, storage, network and power telemetry.
///
/// Every `collect_*` call absorbs its own failures: the source comes back
/// empty and an error line is logged. The adapter registry is optional;
/// without it network interfaces carry no adapter details.
pub struct TelemetryCollector<P = SystemProvider> {
    provider: P,
    registry: Option<Box<dyn AdapterRegistry>>,
    schemes: Box<dyn SchemeStore>,
    config: CollectorConfig,
}

impl TelemetryCollector<SystemProvider> {
    /// Collector backed by the host's own providers
    pub fn new(config: CollectorConfig) -> Self {
        Self::with_sources(
            SystemProvider::new(),
            provider::connect_registry(),
            provider::scheme_store(),
            config,
        )
    }
}

impl<P: MetricsProvider> TelemetryCollector<P> {
    /// Collector over explicit sources.
    ///
    /// `registry` is the outcome of connecting to the adapter registry; an
    /// error puts the collector in degraded mode and is logged here, once.
    pub fn with_sources(
        provider: P,
        registry: Result<Box<dyn AdapterRegistry>>,
        schemes: Box<dyn SchemeStore>,
        config: CollectorConfig,
    ) -> Self {
        let registry = match registry {
            Ok(registry) => Some(registry),
            Err(e) => {
                warn!("Network adapter registry unavailable, continuing without adapter details: {}", e);
                None
            }
        };

        Self {
            provider,
            registry,
            schemes,
            config,
        }
    }

    /// False when running in degraded mode
    pub fn enrichment_available(&self) -> bool {
        self.registry.is_some()
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn collect_processor(&mut self) -> Option<ProcessorSnapshot> {
        let window = self.config.effective_sample_window();
        match processor::collect(&mut self.provider, window) {
            Ok(snapshot) => {
                log_collected("processor", &snapshot);
                Some(snapshot)
            }
            Err(e) => {
                error!("Error collecting processor telemetry: {}", e);
                None
            }
        }
    }

    pub fn collect_memory(&mut self) -> Option<MemorySnapshot> {
        match memory::collect(&mut self.provider) {
            Ok(snapshot) => {
                log_collected("memory", &snapshot);
                Some(snapshot)
            }
            Err(e) => {
                error!("Error collecting memory telemetry: {}", e);
                None
            }
        }
    }

    pub fn collect_storage(&mut self) -> StorageSnapshot {
        match storage::collect(&mut self.provider) {
            Ok(snapshot) => {
                log_collected("storage", &snapshot);
                snapshot
            }
            Err(e) => {
                error!("Error collecting storage telemetry: {}", e);
                StorageSnapshot::new()
            }
        }
    }

    pub fn collect_network(&mut self) -> NetworkSnapshot {
        match network::collect(&mut self.provider, self.registry.as_deref()) {
            Ok(snapshot) => {
                log_collected("network", &snapshot);
                snapshot
            }
            Err(e) => {
                error!("Error collecting network telemetry: {}", e);
                NetworkSnapshot::new()
            }
        }
    }

    pub fn collect_power(&mut self) -> PowerSnapshot {
        match power::collect(&mut self.provider, self.schemes.as_ref()) {
            Ok(snapshot) => {
                log_collected("power", &snapshot);
                snapshot
            }
            Err(e) => {
                error!("Error collecting power telemetry: {}", e);
                PowerSnapshot::default()
            }
        }
    }

    /// One full cycle: processor, memory, storage, network, power, in that order.
    ///
    /// `collection_timestamp` is taken after the last source returns.
    pub fn collect_all(&mut self) -> TelemetrySnapshot {
        let processor = self.collect_processor();
        let memory = self.collect_memory();
        let storage = self.collect_storage();
        let network = self.collect_network();
        let power = self.collect_power();

        let snapshot = TelemetrySnapshot {
            processor,
            memory,
            storage,
            network,
            power,
            collection_timestamp: Utc::now(),
        };
        log_collected("all", &snapshot);
        snapshot
    }
}

fn log_collected<T: Serialize>(source: &str, value: &T) {
    if !log_enabled!(Level::Info) {
        return;
    }
    match serde_json::to_string(value) {
        Ok(json) => info!("Collected {} telemetry: {}", source, json),
        Err(e) => warn!("Collected {} telemetry, but it could not be rendered: {}", source, e),
    }
}
