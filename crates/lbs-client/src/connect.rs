//! Connection establishment with addressing-mode fallback

use tracing::{debug, info};

use crate::error::SessionError;
use crate::transport::{PeripheralIdentity, Transport, ADDRESS_MODE_TRIAL_ORDER};

// ----------------------------------------------------------------------------
// Connection Establisher
// ----------------------------------------------------------------------------

/// Obtain a live connection to the target peripheral.
///
/// The device's true addressing mode is unknown ahead of time, so connect
/// is attempted once per mode in [`ADDRESS_MODE_TRIAL_ORDER`]. The second
/// failure is wrapped and returned; there is no reconnect loop at this
/// layer. On success the caller owns the connection.
pub async fn establish<T: Transport>(
    transport: &T,
    identity: &PeripheralIdentity,
) -> Result<T::Connection, SessionError> {
    info!(
        "connecting directly to {} ({})",
        identity.display_name, identity.address
    );

    let [first, second] = ADDRESS_MODE_TRIAL_ORDER;
    match transport.connect(identity.address, first).await {
        Ok(conn) => {
            info!("connected ({} address)", first);
            Ok(conn)
        }
        Err(first_err) => {
            debug!("{} address connect failed: {}", first, first_err);
            match transport.connect(identity.address, second).await {
                Ok(conn) => {
                    info!("connected ({} address)", second);
                    Ok(conn)
                }
                Err(cause) => Err(SessionError::ConnectFailed { cause }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockTransport;
    use crate::transport::AddressMode;

    fn identity() -> PeripheralIdentity {
        crate::config::SessionConfig::default().target
    }

    #[tokio::test]
    async fn test_random_mode_succeeds_first() {
        let transport = MockTransport::new(Vec::new());
        let conn = establish(&transport, &identity()).await.unwrap();

        assert_eq!(conn.mode, AddressMode::Random);
        assert_eq!(transport.calls().connects, vec![AddressMode::Random]);
    }

    #[tokio::test]
    async fn test_fallback_to_public_mode() {
        let transport = MockTransport::new(Vec::new()).failing_modes(&[AddressMode::Random]);
        let conn = establish(&transport, &identity()).await.unwrap();

        assert_eq!(conn.mode, AddressMode::Public);
        assert_eq!(
            transport.calls().connects,
            vec![AddressMode::Random, AddressMode::Public]
        );
    }

    #[tokio::test]
    async fn test_both_modes_fail_with_no_further_attempts() {
        let transport = MockTransport::new(Vec::new())
            .failing_modes(&[AddressMode::Random, AddressMode::Public]);
        let err = establish(&transport, &identity()).await.unwrap_err();

        assert!(matches!(err, SessionError::ConnectFailed { .. }));
        assert_eq!(transport.calls().connects.len(), 2);
    }
}
