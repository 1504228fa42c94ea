//! Hand-rolled test doubles shared across unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::delegate::EventDelegate;
use crate::error::TransportError;
use crate::gatt::{CharProps, CharacteristicRef, ServiceRef};
use crate::protocol::{LBS_SERVICE_UUID, PROP_INDICATE, PROP_NOTIFY, PROP_READ, PROP_WRITE};
use crate::transport::{AddressMode, Clock, DeviceAddress, Transport};

// ----------------------------------------------------------------------------
// Fixture Services
// ----------------------------------------------------------------------------

pub(crate) const ALERT_HANDLE: u16 = 0x0010;
pub(crate) const LED_HANDLE: u16 = 0x0013;
pub(crate) const SENSOR_HANDLE: u16 = 0x0016;

/// A service built from (value handle, property bits) pairs.
pub(crate) fn service_with(characteristics: &[(u16, u8)]) -> ServiceRef {
    ServiceRef {
        uuid: LBS_SERVICE_UUID,
        characteristics: characteristics
            .iter()
            .map(|&(handle, props)| CharacteristicRef {
                handle,
                uuid: Uuid::from_u128(0x1000 + u128::from(handle)),
                props: CharProps(props),
            })
            .collect(),
    }
}

/// The typical LED-Button-Service shape: button (indicate), LED (write),
/// sensor (notify + read).
pub(crate) fn lbs_services() -> Vec<ServiceRef> {
    vec![service_with(&[
        (ALERT_HANDLE, PROP_INDICATE | PROP_READ),
        (LED_HANDLE, PROP_WRITE | PROP_READ),
        (SENSOR_HANDLE, PROP_NOTIFY | PROP_READ),
    ])]
}

// ----------------------------------------------------------------------------
// Mock Transport
// ----------------------------------------------------------------------------

/// Call record of a [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub(crate) struct MockCalls {
    pub connects: Vec<AddressMode>,
    pub writes: Vec<(u16, Vec<u8>)>,
    pub reads: Vec<u16>,
    pub disconnects: u32,
    pub delegate_registered: bool,
}

/// Scripted transport: serves a fixed service tree and records calls.
#[derive(Debug)]
pub(crate) struct MockTransport {
    services: Vec<ServiceRef>,
    fail_modes: Vec<AddressMode>,
    fail_discovery: bool,
    fail_writes: bool,
    fail_reads: bool,
    default_read: Vec<u8>,
    wait_results: Mutex<VecDeque<Result<bool, TransportError>>>,
    calls: Arc<Mutex<MockCalls>>,
}

impl MockTransport {
    pub fn new(services: Vec<ServiceRef>) -> Self {
        Self {
            services,
            fail_modes: Vec::new(),
            fail_discovery: false,
            fail_writes: false,
            fail_reads: false,
            default_read: vec![0x2A, 0x00],
            wait_results: Mutex::new(VecDeque::new()),
            calls: Arc::new(Mutex::new(MockCalls::default())),
        }
    }

    pub fn failing_modes(mut self, modes: &[AddressMode]) -> Self {
        self.fail_modes = modes.to_vec();
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn with_read_failure(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Script the wait-for-event outcomes; afterwards every wait times out.
    pub fn with_wait_results(self, results: Vec<Result<bool, TransportError>>) -> Self {
        *self.wait_results.lock().unwrap() = results.into();
        self
    }

    pub fn calls(&self) -> MockCalls {
        self.calls.lock().unwrap().clone()
    }

    /// Handle on the call record that survives the transport's move into a
    /// session.
    pub fn call_log(&self) -> Arc<Mutex<MockCalls>> {
        Arc::clone(&self.calls)
    }
}

#[derive(Debug)]
pub(crate) struct MockConnection {
    pub mode: AddressMode,
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn connect(
        &self,
        _address: DeviceAddress,
        mode: AddressMode,
    ) -> Result<MockConnection, TransportError> {
        self.calls.lock().unwrap().connects.push(mode);
        if self.fail_modes.contains(&mode) {
            Err(TransportError::ConnectFailed(format!(
                "{mode} mode refused"
            )))
        } else {
            Ok(MockConnection { mode })
        }
    }

    async fn discover(&self, _conn: &MockConnection) -> Result<Vec<ServiceRef>, TransportError> {
        if self.fail_discovery {
            return Err(TransportError::DiscoveryFailed(
                "scripted failure".to_string(),
            ));
        }
        Ok(self.services.clone())
    }

    async fn read(&self, _conn: &MockConnection, handle: u16) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().reads.push(handle);
        if self.fail_reads {
            Err(TransportError::ReadFailed {
                handle,
                reason: "scripted failure".to_string(),
            })
        } else {
            Ok(self.default_read.clone())
        }
    }

    async fn write(
        &self,
        _conn: &MockConnection,
        handle: u16,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().writes.push((handle, value.to_vec()));
        if self.fail_writes {
            Err(TransportError::WriteFailed {
                handle,
                reason: "scripted failure".to_string(),
            })
        } else {
            Ok(())
        }
    }

    async fn wait_for_event(
        &self,
        _conn: &MockConnection,
        _timeout: Duration,
    ) -> Result<bool, TransportError> {
        self.wait_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(false))
    }

    async fn disconnect(&self, _conn: &MockConnection) -> Result<(), TransportError> {
        self.calls.lock().unwrap().disconnects += 1;
        Ok(())
    }

    fn register_delegate(&self, _conn: &MockConnection, _delegate: Arc<dyn EventDelegate>) {
        self.calls.lock().unwrap().delegate_registered = true;
    }
}

// ----------------------------------------------------------------------------
// Recording Delegate and Simulated Clock
// ----------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingDelegate {
    pub notifications: Mutex<Vec<(u16, Vec<u8>)>>,
    pub indications: Mutex<Vec<(u16, Vec<u8>)>>,
}

impl EventDelegate for RecordingDelegate {
    fn on_notification(&self, handle: u16, payload: &[u8]) {
        self.notifications
            .lock()
            .unwrap()
            .push((handle, payload.to_vec()));
    }

    fn on_indication(&self, handle: u16, payload: &[u8]) {
        self.indications
            .lock()
            .unwrap()
            .push((handle, payload.to_vec()));
    }
}

/// Clock serving a scripted epoch sequence; sleeps are counted, not slept.
#[derive(Debug)]
pub(crate) struct SimClock {
    epochs: Mutex<VecDeque<u64>>,
    last: AtomicU64,
    sleeps: AtomicU64,
}

impl SimClock {
    pub fn fixed(epoch: u64) -> Self {
        Self {
            epochs: Mutex::new(VecDeque::new()),
            last: AtomicU64::new(epoch),
            sleeps: AtomicU64::new(0),
        }
    }

    /// Serve `values` in order, then keep returning the final value.
    pub fn sequence(values: &[u64]) -> Self {
        Self {
            epochs: Mutex::new(values.to_vec().into()),
            last: AtomicU64::new(values.last().copied().unwrap_or_default()),
            sleeps: AtomicU64::new(0),
        }
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for SimClock {
    fn epoch_secs(&self) -> u64 {
        match self.epochs.lock().unwrap().pop_front() {
            Some(value) => {
                self.last.store(value, Ordering::SeqCst);
                value
            }
            None => self.last.load(Ordering::SeqCst),
        }
    }

    async fn sleep(&self, _duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}
