//! Metric source adapters.
//!
//! Each adapter turns raw provider readings into a typed snapshot with
//! normalized units. Whole-source failures are returned to the caller;
//! storage and network additionally skip individual items that fail.

pub mod memory;
pub mod network;
pub mod power;
pub mod processor;
pub mod storage;

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = MB * 1024.0;

/// Bytes to megabytes (B / 1024²)
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / MB
}

/// Bytes to gigabytes (B / 1024³)
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / GB
}

/// Human label for a Win32 `NetConnectionStatus` code
pub fn connection_status_label(code: u16) -> &'static str {
    match code {
        0 => "Disconnected",
        1 => "Connecting",
        2 => "Connected",
        3 => "Disconnecting",
        4 => "Hardware not present",
        5 => "Hardware disabled",
        6 => "Hardware malfunction",
        7 => "Media disconnected",
        8 => "Authenticating",
        9 => "Authentication succeeded",
        10 => "Authentication failed",
        11 => "Invalid address",
        12 => "Credentials required",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversion_uses_binary_divisors() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(1536 * 1024), 1.5);
        assert_eq!(bytes_to_gb(3 * 1024 * 1024 * 1024), 3.0);
        assert_eq!(bytes_to_gb(0), 0.0);

        let raw: u64 = 123_456_789_012;
        assert!((bytes_to_gb(raw) * 1024.0 * 1024.0 * 1024.0 - raw as f64).abs() < 1e-3);
        assert!((bytes_to_mb(raw) * 1024.0 * 1024.0 - raw as f64).abs() < 1e-3);
    }

    #[test]
    fn connection_status_labels() {
        assert_eq!(connection_status_label(2), "Connected");
        assert_eq!(connection_status_label(7), "Media disconnected");
        assert_eq!(connection_status_label(99), "Unknown");
    }
}
