//! Session state machine: handshake, steady-state loop, finalization

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::connect::establish;
use crate::delegate::EventDelegate;
use crate::error::{SessionError, TransportError};
use crate::gatt::{classify, ClassifiedCharacteristics};
use crate::protocol::{decode_le, CCCD_OFFSET, ENABLE_INDICATIONS, ENABLE_NOTIFICATIONS};
use crate::transport::{Clock, SystemClock, Transport};

// ----------------------------------------------------------------------------
// Session Outcomes
// ----------------------------------------------------------------------------

/// How a steady-state session came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The transport signaled a link-level disconnect.
    LinkLost,
    /// The user interrupted the session.
    Interrupted,
}

/// What one steady-state iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// An asynchronous event arrived and was reported by the delegate;
    /// housekeeping was skipped this iteration.
    Event,
    /// The wait timed out and housekeeping ran.
    Housekeeping,
}

// ----------------------------------------------------------------------------
// Session State Machine
// ----------------------------------------------------------------------------

/// One client session against the target peripheral.
///
/// Owns the connection, the classified characteristics, and the loop
/// timers. Created in the handshake state by [`Session::establish`];
/// [`run`](Session::run) drives the steady state; [`shutdown`](Session::shutdown)
/// is the finalization path and must run on every exit.
pub struct Session<T: Transport, C: Clock = SystemClock> {
    transport: T,
    conn: Option<T::Connection>,
    chars: ClassifiedCharacteristics,
    config: SessionConfig,
    clock: C,
    keep_alive_counter: u64,
    actuator_on: bool,
}

impl<T, C> std::fmt::Debug for Session<T, C>
where
    T: Transport + std::fmt::Debug,
    T::Connection: std::fmt::Debug,
    C: Clock + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("conn", &self.conn)
            .field("chars", &self.chars)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("keep_alive_counter", &self.keep_alive_counter)
            .field("actuator_on", &self.actuator_on)
            .finish()
    }
}

impl<T: Transport> Session<T> {
    /// Connect (with addressing-mode fallback), register the delegate,
    /// classify the discovered characteristics, and enable subscriptions.
    ///
    /// On a post-connect failure the connection is released before the
    /// error is returned.
    pub async fn establish(
        transport: T,
        config: SessionConfig,
        delegate: Arc<dyn EventDelegate>,
    ) -> Result<Self, SessionError> {
        Self::establish_with_clock(transport, config, delegate, SystemClock).await
    }
}

impl<T: Transport, C: Clock> Session<T, C> {
    /// [`establish`](Session::establish) with an explicit time source.
    pub async fn establish_with_clock(
        transport: T,
        config: SessionConfig,
        delegate: Arc<dyn EventDelegate>,
        clock: C,
    ) -> Result<Self, SessionError> {
        let conn = establish(&transport, &config.target).await?;

        let mut session = Self {
            transport,
            conn: Some(conn),
            chars: ClassifiedCharacteristics::default(),
            config,
            clock,
            keep_alive_counter: 0,
            actuator_on: false,
        };

        if let Err(e) = session.handshake(delegate).await {
            session.shutdown().await;
            return Err(SessionError::Transport(e));
        }
        Ok(session)
    }

    /// The handshake state: delegate registration, discovery,
    /// classification, and subscription enables. Missing roles are
    /// skipped and enable-write failures degrade that feature silently;
    /// the transition to steady state is unconditional.
    async fn handshake(&mut self, delegate: Arc<dyn EventDelegate>) -> Result<(), TransportError> {
        let conn = self.conn.as_ref().ok_or(TransportError::Disconnected)?;
        self.transport.register_delegate(conn, delegate);

        info!("searching for services and characteristics");
        let services = self.transport.discover(conn).await?;
        self.chars = classify(&services);

        if let Some(sensor) = &self.chars.sensor {
            if sensor.props.can_notify() {
                info!("enabling notifications for sensor");
                if let Err(e) = self
                    .transport
                    .write(conn, sensor.handle + CCCD_OFFSET, &ENABLE_NOTIFICATIONS)
                    .await
                {
                    warn!("failed to enable notifications: {}", e);
                }
            }
        }

        if let Some(alert) = &self.chars.alert_source {
            if alert.props.can_indicate() {
                info!("enabling indications for alert source");
                if let Err(e) = self
                    .transport
                    .write(conn, alert.handle + CCCD_OFFSET, &ENABLE_INDICATIONS)
                    .await
                {
                    warn!("failed to enable indications: {}", e);
                }
            }
        }

        info!("setup complete, listening for device events");
        Ok(())
    }

    /// Drive the steady-state loop until the link drops or an
    /// unrecoverable transport failure surfaces from the wait call.
    pub async fn run(&mut self) -> Result<SessionEnd, SessionError> {
        loop {
            match self.run_once().await {
                Ok(_) => {}
                Err(TransportError::Disconnected) => {
                    info!("device disconnected");
                    return Ok(SessionEnd::LinkLost);
                }
                Err(e) => return Err(SessionError::Transport(e)),
            }
        }
    }

    /// One steady-state iteration: block on the event wait, then run
    /// housekeeping only if the wait timed out. Public so embedders and
    /// tests can step the loop.
    pub async fn run_once(&mut self) -> Result<IterationOutcome, TransportError> {
        let conn = self.conn.as_ref().ok_or(TransportError::Disconnected)?;

        // An arriving event preempts housekeeping for this iteration; the
        // delegate has already reported it.
        if self
            .transport
            .wait_for_event(conn, self.config.wait_timeout)
            .await?
        {
            return Ok(IterationOutcome::Event);
        }

        if self.keep_alive_counter % self.config.keep_alive_period == 0 {
            if let Some(sensor) = &self.chars.sensor {
                if sensor.props.can_read() {
                    match self.transport.read(conn, sensor.handle).await {
                        Ok(value) => info!("keep-alive read: {}", decode_le(&value)),
                        Err(e) => warn!("keep-alive read failed: {}", e),
                    }
                }
            }
        }

        if self.clock.epoch_secs() % self.config.actuation_period_secs == 0 {
            if let Some(actuator) = &self.chars.actuator {
                self.actuator_on = !self.actuator_on;
                let value = [u8::from(self.actuator_on)];
                match self.transport.write(conn, actuator.handle, &value).await {
                    Ok(()) => info!("actuator: {}", if self.actuator_on { "ON" } else { "OFF" }),
                    // The in-memory toggle is kept; the device may lag the
                    // logical state until the next successful write.
                    Err(e) => warn!("actuation write failed: {}", e),
                }
                // Throttle so the same wall-clock second cannot re-trigger
                // the modulo window across fast iterations.
                self.clock.sleep(self.config.actuation_throttle).await;
            }
        }

        self.keep_alive_counter += 1;
        Ok(IterationOutcome::Housekeeping)
    }

    /// Best-effort finalization: disconnect at most once, discarding any
    /// failure. Safe to call on every exit path, repeatedly.
    pub async fn shutdown(&mut self) {
        if let Some(conn) = self.conn.take() {
            match self.transport.disconnect(&conn).await {
                Ok(()) => info!("disconnected"),
                Err(e) => debug!("disconnect during shutdown failed: {}", e),
            }
        }
    }

    /// Roles assigned during the handshake.
    pub fn characteristics(&self) -> &ClassifiedCharacteristics {
        &self.chars
    }

    /// Current logical actuator state.
    pub fn actuator_on(&self) -> bool {
        self.actuator_on
    }
}
