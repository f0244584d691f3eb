//! Physical memory accounting.

use super::bytes_to_mb;
use crate::error::Result;
use crate::provider::MetricsProvider;
use crate::snapshot::MemorySnapshot;
use chrono::Utc;

pub fn collect(provider: &mut dyn MetricsProvider) -> Result<MemorySnapshot> {
    let memory = provider.virtual_memory()?;

    Ok(MemorySnapshot {
        total_mb: bytes_to_mb(memory.total),
        used_mb: bytes_to_mb(memory.used),
        available_mb: bytes_to_mb(memory.available),
        usage_percent: memory.percent,
        timestamp: Utc::now(),
    })
}
