//! Error types for the transport seam and the session boundary

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors surfaced by a transport implementation
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("BLE adapter not available: {0}")]
    AdapterUnavailable(String),

    #[error("device not found during scan")]
    DeviceNotFound,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("service discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("read failed on handle {handle:#06x}: {reason}")]
    ReadFailed { handle: u16, reason: String },

    #[error("write failed on handle {handle:#06x}: {reason}")]
    WriteFailed { handle: u16, reason: String },

    #[error("no characteristic at handle {0:#06x}")]
    UnknownHandle(u16),

    #[error("link disconnected")]
    Disconnected,

    #[error("BLE backend error: {0}")]
    Backend(String),
}

impl From<btleplug::Error> for TransportError {
    fn from(err: btleplug::Error) -> Self {
        TransportError::Backend(err.to_string())
    }
}

/// Errors surfaced at the session boundary
#[derive(Error, Debug)]
pub enum SessionError {
    /// Both addressing-mode connect attempts failed. Fatal at startup; the
    /// caller is expected to abort rather than retry.
    #[error("connection failed in both addressing modes: {cause}")]
    ConnectFailed { cause: TransportError },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
