//! Addressing types, clock seam, and the transport adapter trait

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delegate::EventDelegate;
use crate::error::TransportError;
use crate::gatt::ServiceRef;

// ----------------------------------------------------------------------------
// Addressing
// ----------------------------------------------------------------------------

/// 48-bit BLE device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress(pub [u8; 6]);

#[derive(Error, Debug, Clone)]
#[error("invalid device address: {0}")]
pub struct AddressParseError(String);

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| AddressParseError(s.to_string()))?;
            *byte =
                u8::from_str_radix(part, 16).map_err(|_| AddressParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(AddressParseError(s.to_string()));
        }
        Ok(DeviceAddress(bytes))
    }
}

/// BLE addressing mode of the target peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressMode {
    Random,
    Public,
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressMode::Random => f.write_str("random"),
            AddressMode::Public => f.write_str("public"),
        }
    }
}

/// Trial order for addressing-mode fallback during establishment. Random
/// first: the common case for these peripherals.
pub const ADDRESS_MODE_TRIAL_ORDER: [AddressMode; 2] = [AddressMode::Random, AddressMode::Public];

/// The fixed peripheral this client session targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralIdentity {
    pub address: DeviceAddress,
    /// Name used in logs; the device's true addressing mode is unknown
    /// ahead of time, so it is not part of the identity.
    pub display_name: String,
}

// ----------------------------------------------------------------------------
// Transport Adapter Trait
// ----------------------------------------------------------------------------

/// Primitives of the underlying BLE stack.
///
/// The session treats the radio stack as a black box behind this seam.
/// Delegate callbacks fire only from inside [`wait_for_event`], giving the
/// session a single-threaded cooperative model where that call is the only
/// suspension point yielding control to the delegate.
///
/// [`wait_for_event`]: Transport::wait_for_event
#[async_trait]
pub trait Transport: Send + Sync {
    /// Live link handle, owned by the session once established.
    type Connection: Send + Sync;

    /// Connect to `address` using the given addressing mode.
    async fn connect(
        &self,
        address: DeviceAddress,
        mode: AddressMode,
    ) -> Result<Self::Connection, TransportError>;

    /// Enumerate services and their characteristics in discovery order.
    async fn discover(&self, conn: &Self::Connection) -> Result<Vec<ServiceRef>, TransportError>;

    /// Synchronous read of a characteristic's value handle.
    async fn read(&self, conn: &Self::Connection, handle: u16) -> Result<Vec<u8>, TransportError>;

    /// Write to a handle. Writing an enable code to a CCCD handle
    /// (value handle + 1) arms notification/indication delivery.
    async fn write(
        &self,
        conn: &Self::Connection,
        handle: u16,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Block for up to `timeout` waiting for an asynchronous event.
    /// Returns `true` if an event was delivered to the registered delegate,
    /// `false` on timeout. A lost link surfaces as
    /// [`TransportError::Disconnected`].
    async fn wait_for_event(
        &self,
        conn: &Self::Connection,
        timeout: Duration,
    ) -> Result<bool, TransportError>;

    /// Tear the link down.
    async fn disconnect(&self, conn: &Self::Connection) -> Result<(), TransportError>;

    /// Install the delegate invoked for notification/indication frames.
    fn register_delegate(&self, conn: &Self::Connection, delegate: Arc<dyn EventDelegate>);
}

// ----------------------------------------------------------------------------
// Clock Seam
// ----------------------------------------------------------------------------

/// Time source for the session's wall-clock-modulo actuation timing and
/// the post-actuation throttle.
#[async_trait]
pub trait Clock: Send + Sync {
    fn epoch_secs(&self) -> u64;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time source used outside of tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display_roundtrip() {
        let address: DeviceAddress = "c9:a3:d9:cb:02:b3".parse().unwrap();
        assert_eq!(
            address,
            DeviceAddress([0xC9, 0xA3, 0xD9, 0xCB, 0x02, 0xB3])
        );
        assert_eq!(address.to_string(), "c9:a3:d9:cb:02:b3");
    }

    #[test]
    fn test_address_parse_rejects_bad_input() {
        assert!("c9:a3:d9:cb:02".parse::<DeviceAddress>().is_err());
        assert!("c9:a3:d9:cb:02:b3:ff".parse::<DeviceAddress>().is_err());
        assert!("zz:a3:d9:cb:02:b3".parse::<DeviceAddress>().is_err());
        assert!("".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn test_trial_order_is_random_then_public() {
        assert_eq!(
            ADDRESS_MODE_TRIAL_ORDER,
            [AddressMode::Random, AddressMode::Public]
        );
    }
}
