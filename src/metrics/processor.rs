//! Processor usage, clock and core topology.

use crate::error::Result;
use crate::provider::MetricsProvider;
use crate::snapshot::ProcessorSnapshot;
use chrono::Utc;
use std::time::Duration;

/// Sample the processor, blocking for `window`
pub fn collect(provider: &mut dyn MetricsProvider, window: Duration) -> Result<ProcessorSnapshot> {
    let reading = provider.cpu_sample(window)?;

    Ok(ProcessorSnapshot {
        usage_percent: reading.usage_percent,
        current_frequency_mhz: reading.current_mhz,
        max_frequency_mhz: reading.max_mhz,
        logical_core_count: reading.logical_cores,
        physical_core_count: reading.physical_cores,
        timestamp: Utc::now(),
    })
}
