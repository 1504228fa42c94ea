//! Session configuration

use std::time::Duration;

use crate::transport::{DeviceAddress, PeripheralIdentity};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for one client session. Fixed at start; nothing here is
/// renegotiated at runtime.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// The peripheral this session targets
    pub target: PeripheralIdentity,
    /// Maximum time to scan for the device per addressing-mode attempt
    pub scan_timeout: Duration,
    /// Blocking event-wait timeout per loop iteration
    pub wait_timeout: Duration,
    /// Keep-alive read fires every this many housekeeping iterations
    pub keep_alive_period: u64,
    /// Actuation fires when the wall-clock second is divisible by this
    pub actuation_period_secs: u64,
    /// Pause after an actuation write so one wall-clock second cannot
    /// re-trigger the modulo window
    pub actuation_throttle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: PeripheralIdentity {
                address: DeviceAddress([0xC9, 0xA3, 0xD9, 0xCB, 0x02, 0xB3]),
                display_name: "A_Minh".to_string(),
            },
            scan_timeout: Duration::from_secs(10),
            wait_timeout: Duration::from_secs(1),
            keep_alive_period: 10,
            actuation_period_secs: 3,
            actuation_throttle: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target peripheral
    pub fn with_target(mut self, target: PeripheralIdentity) -> Self {
        self.target = target;
        self
    }

    /// Set the scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the event-wait timeout
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the keep-alive period in iterations
    pub fn with_keep_alive_period(mut self, period: u64) -> Self {
        self.keep_alive_period = period;
        self
    }

    /// Set the actuation period in wall-clock seconds
    pub fn with_actuation_period(mut self, secs: u64) -> Self {
        self.actuation_period_secs = secs;
        self
    }
}
