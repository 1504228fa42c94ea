//! Asynchronous event delegate

use tracing::{debug, info};

use crate::protocol::decode_le;

// ----------------------------------------------------------------------------
// Delegate Capability
// ----------------------------------------------------------------------------

/// Capability object invoked when the subscribed link delivers a
/// notification or indication frame.
///
/// Implementations run on the transport's event-delivery path: they must
/// not block and must not panic. Reporting is fire-and-forget.
pub trait EventDelegate: Send + Sync {
    /// A notification frame arrived (generic sensor reading).
    fn on_notification(&self, handle: u16, payload: &[u8]);

    /// An indication frame arrived (press/release state).
    fn on_indication(&self, handle: u16, payload: &[u8]);
}

/// Delegate that reports decoded readings through the logging sink.
#[derive(Debug, Default)]
pub struct LogDelegate;

impl LogDelegate {
    pub fn new() -> Self {
        Self
    }
}

impl EventDelegate for LogDelegate {
    fn on_notification(&self, handle: u16, payload: &[u8]) {
        debug!(handle, payload = %hex::encode(payload), "notification frame");
        info!("sensor data: {}", decode_le(payload));
    }

    fn on_indication(&self, handle: u16, payload: &[u8]) {
        debug!(handle, payload = %hex::encode(payload), "indication frame");
        let pressed = decode_le(payload) != 0;
        info!("button: {}", if pressed { "PRESSED" } else { "RELEASED" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_le;

    #[test]
    fn test_indication_boolean_is_nonzero() {
        assert!(decode_le(&[0x01]) != 0); // PRESSED
        assert!(decode_le(&[0x00]) == 0); // RELEASED
        assert!(decode_le(&[0x02]) != 0); // PRESSED
        assert!(decode_le(&[0x00, 0x01]) != 0);
    }

    #[test]
    fn test_log_delegate_tolerates_any_payload() {
        let delegate = LogDelegate::new();
        delegate.on_notification(3, &[]);
        delegate.on_notification(3, &[0x05, 0x00]);
        delegate.on_indication(5, &[0x01]);
        delegate.on_indication(5, &[0u8; 16]);
    }
}
