//! Battery state and active power scheme.

use crate::error::{Result, TelemetryError};
use crate::provider::{MetricsProvider, SchemeStore, SecsLeft};
use crate::snapshot::{BatterySnapshot, PowerSnapshot, SecondsRemaining};
use chrono::Utc;
use log::{debug, warn};

/// Battery and power scheme.
///
/// A battery read failure fails the source. The power scheme lookup is
/// separate: when it fails the battery record is still returned.
pub fn collect(provider: &mut dyn MetricsProvider, schemes: &dyn SchemeStore) -> Result<PowerSnapshot> {
    let battery = provider.sensors_battery()?.map(|battery| BatterySnapshot {
        percent: battery.percent,
        seconds_remaining: seconds_remaining(battery.secs_left),
        power_plugged: battery.power_plugged,
        timestamp: Utc::now(),
    });

    let active_power_scheme = match schemes.active_power_scheme() {
        Ok(scheme) => Some(scheme),
        Err(e @ TelemetryError::Unsupported(_)) => {
            debug!("Power scheme not available: {}", e);
            None
        }
        Err(e) => {
            warn!("Error accessing power scheme: {}", e);
            None
        }
    };

    Ok(PowerSnapshot {
        battery,
        active_power_scheme,
    })
}

/// Unknown estimates are reported as -1 seconds
fn seconds_remaining(secs_left: SecsLeft) -> SecondsRemaining {
    match secs_left {
        SecsLeft::Seconds(secs) => SecondsRemaining::Seconds(i64::try_from(secs).unwrap_or(i64::MAX)),
        SecsLeft::Unlimited => SecondsRemaining::Unlimited,
        SecsLeft::Unknown => SecondsRemaining::Seconds(-1),
    }
}
