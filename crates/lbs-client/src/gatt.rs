//! Discovered GATT types and capability classification

use std::fmt;

use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{LBS_SERVICE_UUID, PROP_INDICATE, PROP_NOTIFY, PROP_READ, PROP_WRITE};

// ----------------------------------------------------------------------------
// Discovered GATT Types
// ----------------------------------------------------------------------------

/// Property bitfield of a discovered characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharProps(pub u8);

impl CharProps {
    pub fn can_read(&self) -> bool {
        self.0 & PROP_READ != 0
    }

    pub fn can_write(&self) -> bool {
        self.0 & PROP_WRITE != 0
    }

    pub fn can_notify(&self) -> bool {
        self.0 & PROP_NOTIFY != 0
    }

    pub fn can_indicate(&self) -> bool {
        self.0 & PROP_INDICATE != 0
    }

    /// Names of the set properties, in bit order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.can_read() {
            names.push("READ");
        }
        if self.can_write() {
            names.push("WRITE");
        }
        if self.can_notify() {
            names.push("NOTIFY");
        }
        if self.can_indicate() {
            names.push("INDICATE");
        }
        names
    }
}

impl fmt::Display for CharProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

/// A characteristic discovered on the connected peripheral.
///
/// Borrowed knowledge of the transport's service tree: read-only after
/// discovery, valid for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicRef {
    /// Value handle assigned by the transport
    pub handle: u16,
    /// Characteristic UUID
    pub uuid: Uuid,
    /// Property bitfield
    pub props: CharProps,
}

/// A service discovered on the connected peripheral, with its
/// characteristics in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicRef>,
}

// ----------------------------------------------------------------------------
// Capability Classification
// ----------------------------------------------------------------------------

/// Functional roles derived from the discovered characteristic set.
///
/// At most one characteristic fills each role; an absent role means the
/// corresponding feature is unavailable for this session.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedCharacteristics {
    /// Indication source (button-style press/release events)
    pub alert_source: Option<CharacteristicRef>,
    /// Writable output (LED-style on/off control)
    pub actuator: Option<CharacteristicRef>,
    /// Notification source (periodic sensor readings)
    pub sensor: Option<CharacteristicRef>,
}

/// Partition discovered characteristics into functional roles using
/// property flags alone, coping with devices whose characteristic set is
/// not known in advance.
///
/// Per characteristic the first matching rule wins: INDICATE beats WRITE
/// beats NOTIFY. The walk runs in discovery order, so a later match
/// replaces an earlier holder of the same role. Characteristics matching
/// no rule are ignored.
pub fn classify(services: &[ServiceRef]) -> ClassifiedCharacteristics {
    let mut roles = ClassifiedCharacteristics::default();

    for service in services {
        if service.uuid == LBS_SERVICE_UUID {
            info!("service {} (LED Button Service)", service.uuid);
        } else {
            info!("service {}", service.uuid);
        }

        for characteristic in &service.characteristics {
            info!(
                "  characteristic {} handle {:#06x} [{}]",
                characteristic.uuid, characteristic.handle, characteristic.props
            );

            if characteristic.props.can_indicate() {
                debug!("    assigned role: alert source");
                roles.alert_source = Some(characteristic.clone());
            } else if characteristic.props.can_write() {
                debug!("    assigned role: actuator");
                roles.actuator = Some(characteristic.clone());
            } else if characteristic.props.can_notify() {
                debug!("    assigned role: sensor");
                roles.sensor = Some(characteristic.clone());
            }
        }
    }

    roles
}
