//! GATT protocol constants and payload decoding

use uuid::Uuid;

// ----------------------------------------------------------------------------
// Characteristic property bits
// ----------------------------------------------------------------------------

pub const PROP_READ: u8 = 0x02;
pub const PROP_WRITE: u8 = 0x08;
pub const PROP_NOTIFY: u8 = 0x10;
pub const PROP_INDICATE: u8 = 0x20;

// ----------------------------------------------------------------------------
// Client characteristic configuration
// ----------------------------------------------------------------------------

/// Offset from a characteristic's value handle to its CCCD handle.
pub const CCCD_OFFSET: u16 = 1;

/// CCCD value enabling notifications (0x0001 little-endian).
pub const ENABLE_NOTIFICATIONS: [u8; 2] = [0x01, 0x00];

/// CCCD value enabling indications (0x0002 little-endian).
pub const ENABLE_INDICATIONS: [u8; 2] = [0x02, 0x00];

/// CCCD value disabling both delivery modes.
pub const DISABLE_EVENTS: [u8; 2] = [0x00, 0x00];

// ----------------------------------------------------------------------------
// Known services
// ----------------------------------------------------------------------------

/// Nordic LED Button Service UUID, the service family this client targets.
pub const LBS_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001523_1212_EFDE_1523_785FEABCD123);

// ----------------------------------------------------------------------------
// Payload decoding
// ----------------------------------------------------------------------------

/// Decode a payload as an unsigned little-endian integer of the payload's
/// own byte width. Payloads wider than 8 bytes truncate to the low 8.
pub fn decode_le(payload: &[u8]) -> u64 {
    payload
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
}
