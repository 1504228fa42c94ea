//! btleplug-backed transport implementation
//!
//! Bridges the handle-oriented [`Transport`] seam onto btleplug's
//! UUID-oriented API. Value handles are synthesized in discovery order
//! with a reserved CCCD slot at `value handle + 1`; CCCD enable writes
//! translate to `subscribe()`, and the enable code used records whether a
//! characteristic delivers notifications or indications so incoming
//! frames can be routed to the right delegate callback.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    AddressType, BDAddr, Central, CentralEvent, CharPropFlags, Characteristic, Manager as _,
    Peripheral as _, ScanFilter, ValueNotification, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::delegate::EventDelegate;
use crate::error::TransportError;
use crate::gatt::{CharProps, CharacteristicRef, ServiceRef};
use crate::protocol::{
    CCCD_OFFSET, DISABLE_EVENTS, ENABLE_INDICATIONS, ENABLE_NOTIFICATIONS, PROP_INDICATE,
    PROP_NOTIFY, PROP_READ, PROP_WRITE,
};
use crate::transport::{AddressMode, DeviceAddress, Transport};

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);
const FIRST_VALUE_HANDLE: u16 = 0x0010;
/// Spacing between synthesized value handles, leaving the CCCD slot free.
const HANDLE_STRIDE: u16 = 3;

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionKind {
    Notify,
    Indicate,
}

#[derive(Default)]
struct GattState {
    /// Synthesized value handle -> backing characteristic
    by_handle: HashMap<u16, Characteristic>,
    /// Synthesized CCCD handle -> backing characteristic
    cccd_parent: HashMap<u16, Characteristic>,
    /// Characteristic UUID -> (value handle, armed delivery mode)
    subscriptions: HashMap<Uuid, (u16, SubscriptionKind)>,
}

struct Streams {
    notifications: Option<Pin<Box<dyn Stream<Item = ValueNotification> + Send>>>,
    events: Pin<Box<dyn Stream<Item = CentralEvent> + Send>>,
}

/// Live link to the peripheral plus the handle maps built at discovery.
pub struct BtleConnection {
    peripheral: Peripheral,
    peripheral_id: PeripheralId,
    delegate: StdMutex<Option<Arc<dyn EventDelegate>>>,
    streams: Mutex<Streams>,
    gatt: Mutex<GattState>,
}

// ----------------------------------------------------------------------------
// Transport Implementation
// ----------------------------------------------------------------------------

/// Production transport over the system BLE stack.
pub struct BtleTransport {
    scan_timeout: Duration,
}

impl BtleTransport {
    pub fn new(scan_timeout: Duration) -> Self {
        Self { scan_timeout }
    }

    async fn find_peripheral(
        &self,
        adapter: &Adapter,
        target: BDAddr,
        wanted: AddressType,
    ) -> Result<Peripheral, TransportError> {
        let deadline = tokio::time::Instant::now() + self.scan_timeout;
        loop {
            for peripheral in adapter.peripherals().await? {
                if let Ok(Some(properties)) = peripheral.properties().await {
                    if properties.address != target {
                        continue;
                    }
                    // An unreported address type is accepted, so the first
                    // trial mode wins on backends that omit it.
                    match properties.address_type {
                        Some(reported) if reported != wanted => continue,
                        _ => return Ok(peripheral),
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TransportError::DeviceNotFound);
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}

/// A decoded CCCD write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CccdRequest {
    Enable(SubscriptionKind),
    Disable,
}

fn parse_cccd(value: &[u8]) -> Option<CccdRequest> {
    if value == ENABLE_NOTIFICATIONS.as_slice() {
        Some(CccdRequest::Enable(SubscriptionKind::Notify))
    } else if value == ENABLE_INDICATIONS.as_slice() {
        Some(CccdRequest::Enable(SubscriptionKind::Indicate))
    } else if value == DISABLE_EVENTS.as_slice() {
        Some(CccdRequest::Disable)
    } else {
        None
    }
}

fn char_props(flags: CharPropFlags) -> CharProps {
    let mut bits = 0u8;
    if flags.contains(CharPropFlags::READ) {
        bits |= PROP_READ;
    }
    if flags.contains(CharPropFlags::WRITE) {
        bits |= PROP_WRITE;
    }
    if flags.contains(CharPropFlags::NOTIFY) {
        bits |= PROP_NOTIFY;
    }
    if flags.contains(CharPropFlags::INDICATE) {
        bits |= PROP_INDICATE;
    }
    CharProps(bits)
}

#[async_trait]
impl Transport for BtleTransport {
    type Connection = BtleConnection;

    async fn connect(
        &self,
        address: DeviceAddress,
        mode: AddressMode,
    ) -> Result<BtleConnection, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::AdapterUnavailable("no BLE adapters".to_string()))?;

        let target = BDAddr::from(address.0);
        let wanted = match mode {
            AddressMode::Random => AddressType::Random,
            AddressMode::Public => AddressType::Public,
        };

        let events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;
        let found = self.find_peripheral(&adapter, target, wanted).await;
        let _ = adapter.stop_scan().await;
        let peripheral = found?;

        peripheral
            .connect()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        debug!("link up to {} ({} address)", address, mode);

        let notifications = peripheral.notifications().await?;
        let peripheral_id = peripheral.id();
        Ok(BtleConnection {
            peripheral,
            peripheral_id,
            delegate: StdMutex::new(None),
            streams: Mutex::new(Streams {
                notifications: Some(notifications),
                events,
            }),
            gatt: Mutex::new(GattState::default()),
        })
    }

    async fn discover(&self, conn: &BtleConnection) -> Result<Vec<ServiceRef>, TransportError> {
        conn.peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::DiscoveryFailed(e.to_string()))?;

        let mut gatt = conn.gatt.lock().await;
        gatt.by_handle.clear();
        gatt.cccd_parent.clear();
        gatt.subscriptions.clear();

        let mut services = Vec::new();
        let mut next_handle = FIRST_VALUE_HANDLE;
        for service in conn.peripheral.services() {
            let mut refs = Vec::new();
            for characteristic in &service.characteristics {
                let handle = next_handle;
                next_handle += HANDLE_STRIDE;
                gatt.by_handle.insert(handle, characteristic.clone());
                gatt.cccd_parent
                    .insert(handle + CCCD_OFFSET, characteristic.clone());
                refs.push(CharacteristicRef {
                    handle,
                    uuid: characteristic.uuid,
                    props: char_props(characteristic.properties),
                });
            }
            services.push(ServiceRef {
                uuid: service.uuid,
                characteristics: refs,
            });
        }

        info!("discovered {} services", services.len());
        Ok(services)
    }

    async fn read(&self, conn: &BtleConnection, handle: u16) -> Result<Vec<u8>, TransportError> {
        let characteristic = {
            let gatt = conn.gatt.lock().await;
            gatt.by_handle.get(&handle).cloned()
        }
        .ok_or(TransportError::UnknownHandle(handle))?;

        conn.peripheral
            .read(&characteristic)
            .await
            .map_err(|e| TransportError::ReadFailed {
                handle,
                reason: e.to_string(),
            })
    }

    async fn write(
        &self,
        conn: &BtleConnection,
        handle: u16,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let mut gatt = conn.gatt.lock().await;

        if let Some(characteristic) = gatt.cccd_parent.get(&handle).cloned() {
            let value_handle = handle - CCCD_OFFSET;
            let request = parse_cccd(value).ok_or_else(|| TransportError::WriteFailed {
                handle,
                reason: "unsupported descriptor value".to_string(),
            })?;

            // Routing entries track live subscriptions only, so the map is
            // updated after the backend call succeeds.
            match request {
                CccdRequest::Enable(kind) => {
                    conn.peripheral
                        .subscribe(&characteristic)
                        .await
                        .map_err(|e| TransportError::WriteFailed {
                            handle,
                            reason: e.to_string(),
                        })?;
                    gatt.subscriptions
                        .insert(characteristic.uuid, (value_handle, kind));
                    debug!("subscribed to {} ({:?})", characteristic.uuid, kind);
                }
                CccdRequest::Disable => {
                    conn.peripheral
                        .unsubscribe(&characteristic)
                        .await
                        .map_err(|e| TransportError::WriteFailed {
                            handle,
                            reason: e.to_string(),
                        })?;
                    gatt.subscriptions.remove(&characteristic.uuid);
                }
            }
            return Ok(());
        }

        if let Some(characteristic) = gatt.by_handle.get(&handle).cloned() {
            drop(gatt);
            let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
                WriteType::WithResponse
            } else {
                WriteType::WithoutResponse
            };
            return conn
                .peripheral
                .write(&characteristic, value, write_type)
                .await
                .map_err(|e| TransportError::WriteFailed {
                    handle,
                    reason: e.to_string(),
                });
        }

        Err(TransportError::UnknownHandle(handle))
    }

    async fn wait_for_event(
        &self,
        conn: &BtleConnection,
        wait: Duration,
    ) -> Result<bool, TransportError> {
        let mut streams = conn.streams.lock().await;

        let outcome = {
            let Streams {
                notifications,
                events,
            } = &mut *streams;
            let frames = match notifications.as_mut() {
                Some(stream) => stream,
                None => return Err(TransportError::Disconnected),
            };

            timeout(wait, async {
                loop {
                    tokio::select! {
                        frame = frames.next() => return frame,
                        event = events.next() => match event {
                            Some(CentralEvent::DeviceDisconnected(id))
                                if id == conn.peripheral_id => return None,
                            Some(_) => continue,
                            None => return None,
                        },
                    }
                }
            })
            .await
        };

        match outcome {
            // Timeout elapsed with no event.
            Err(_) => Ok(false),
            Ok(None) => {
                streams.notifications = None;
                Err(TransportError::Disconnected)
            }
            Ok(Some(frame)) => {
                drop(streams);
                let routed = {
                    let gatt = conn.gatt.lock().await;
                    gatt.subscriptions.get(&frame.uuid).copied()
                };
                let delegate = conn
                    .delegate
                    .lock()
                    .ok()
                    .and_then(|slot| slot.clone());

                match (routed, delegate) {
                    (Some((handle, SubscriptionKind::Indicate)), Some(delegate)) => {
                        delegate.on_indication(handle, &frame.value)
                    }
                    (Some((handle, SubscriptionKind::Notify)), Some(delegate)) => {
                        delegate.on_notification(handle, &frame.value)
                    }
                    _ => debug!("dropping frame from unsubscribed {}", frame.uuid),
                }
                Ok(true)
            }
        }
    }

    async fn disconnect(&self, conn: &BtleConnection) -> Result<(), TransportError> {
        conn.peripheral
            .disconnect()
            .await
            .map_err(|e| TransportError::Backend(e.to_string()))
    }

    fn register_delegate(&self, conn: &BtleConnection, delegate: Arc<dyn EventDelegate>) {
        if let Ok(mut slot) = conn.delegate.lock() {
            *slot = Some(delegate);
        }
    }
}
