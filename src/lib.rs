//! Host telemetry collection.
//!
//! [`TelemetryCollector`] samples processor, memory, storage, network and
//! power state into a [`TelemetrySnapshot`]. Sources that fail come back
//! empty and are reported through the `log` facade; nothing propagates out
//! of [`TelemetryCollector::collect_all`].

pub mod collector;
pub mod display;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod snapshot;

pub use collector::{CollectorConfig, TelemetryCollector};
pub use error::{Result, TelemetryError};
pub use snapshot::TelemetrySnapshot;
