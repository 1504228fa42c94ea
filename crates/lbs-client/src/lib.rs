//! BLE central-role client session for LED-Button-Service style peripherals
//!
//! This crate connects to one fixed peripheral, discovers its services and
//! characteristics, classifies them into functional roles by property flags,
//! enables notifications/indications, and runs a steady-state loop that
//! interleaves blocking event waits with periodic keep-alive reads and
//! actuation writes.
//!
//! ## Architecture
//!
//! - [`config`] - Session configuration and fixed timing parameters
//! - [`error`] - Error types for the transport seam and session boundary
//! - [`protocol`] - GATT constants and payload decoding
//! - [`gatt`] - Discovered service/characteristic types and the classifier
//! - [`transport`] - Addressing types and the transport adapter trait
//! - [`delegate`] - Asynchronous event delegate
//! - [`connect`] - Connection establishment with addressing-mode fallback
//! - [`session`] - The session state machine
//! - [`btle`] - btleplug-backed production transport
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lbs_client::{BtleTransport, LogDelegate, Session, SessionConfig};
//!
//! # async fn example() -> Result<(), lbs_client::SessionError> {
//! let config = SessionConfig::default();
//! let transport = BtleTransport::new(config.scan_timeout);
//!
//! let mut session = Session::establish(transport, config, Arc::new(LogDelegate::new())).await?;
//! let end = session.run().await;
//! session.shutdown().await;
//! # let _ = end;
//! # Ok(())
//! # }
//! ```

mod btle;
mod config;
mod connect;
mod delegate;
mod error;
mod gatt;
mod protocol;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod testutil;

// Public API exports
pub use btle::BtleTransport;
pub use config::SessionConfig;
pub use connect::establish;
pub use delegate::{EventDelegate, LogDelegate};
pub use error::{SessionError, TransportError};
pub use gatt::{classify, CharProps, CharacteristicRef, ClassifiedCharacteristics, ServiceRef};
pub use protocol::{
    decode_le, CCCD_OFFSET, ENABLE_INDICATIONS, ENABLE_NOTIFICATIONS, LBS_SERVICE_UUID,
};
pub use session::{IterationOutcome, Session, SessionEnd};
pub use transport::{
    AddressMode, AddressParseError, Clock, DeviceAddress, PeripheralIdentity, SystemClock,
    Transport, ADDRESS_MODE_TRIAL_ORDER,
};
