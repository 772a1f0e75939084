//! Station connection state machine.
//!
//! ```text
//!  Idle --StaStarted--> Connecting --StaGotIp--> Connected
//!                        |    ^                    |
//!                        +----+ StaDisconnected    | StaDisconnected
//!                        ^-------------------------+
//! ```
//!
//! Every disconnect is treated as transient and answered with another
//! `connect()`, with no backoff and no attempt limit: the device has a single
//! known access point and nothing to fall back to. `Failed` and its signal
//! bit exist, but no event leads there.
//!
//! The event handler only computes the next state, performs the one driver
//! action the transition calls for, and signals the waiter.

use super::event::{EventSource, SystemEvent};
use super::signal::{EventGroup, CONNECTED_BIT, FAILED_BIT};
use super::NetworkError;
use crate::config::WifiConfig;
use log::{debug, info, warn};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Network-layer operations the orchestrator needs.
///
/// `connect` is called from the event context while the caller may be
/// blocked in [`Orchestrator::wait`], so implementations must be shareable.
pub trait StationDriver: Send + Sync {
    fn set_station_mode(&self) -> Result<(), NetworkError>;
    fn set_credentials(&self, config: &WifiConfig) -> Result<(), NetworkError>;
    fn start(&self) -> Result<(), NetworkError>;
    fn connect(&self) -> Result<(), NetworkError>;
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Failed,
}

/// What a transition asks the driver or the record to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Issue a connect attempt.
    Connect,
    /// Store the assigned address and signal the waiter.
    RecordAddress(Ipv4Addr),
}

/// Transition function. `None` means the event is ignored in this state.
pub fn next_state(
    state: ConnectionState,
    event: &SystemEvent,
) -> Option<(ConnectionState, Action)> {
    use ConnectionState::*;

    match (state, event) {
        (Idle, SystemEvent::StaStarted) => Some((Connecting, Action::Connect)),
        (Connecting | Connected, SystemEvent::StaDisconnected) => {
            Some((Connecting, Action::Connect))
        }
        (Connecting, SystemEvent::StaGotIp(addr)) => {
            Some((Connected, Action::RecordAddress(*addr)))
        }
        _ => None,
    }
}

/// Terminal outcome of [`Orchestrator::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Connected(Ipv4Addr),
    Failed,
}

#[derive(Debug)]
struct Record {
    state: ConnectionState,
    address: Option<Ipv4Addr>,
    connect_attempts: u32,
}

#[derive(Debug)]
struct Shared {
    record: Mutex<Record>,
    signals: EventGroup,
}

impl Shared {
    fn record(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives a [`StationDriver`] from system events until it has an address.
///
/// Cloning shares the same state; the clone captured by the event handler and
/// the one the caller waits on observe the same record.
#[derive(Debug)]
pub struct Orchestrator<D> {
    driver: Arc<D>,
    shared: Arc<Shared>,
}

impl<D> Clone for Orchestrator<D> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<D: StationDriver + 'static> Orchestrator<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            shared: Arc::new(Shared {
                record: Mutex::new(Record {
                    state: ConnectionState::Idle,
                    address: None,
                    connect_attempts: 0,
                }),
                signals: EventGroup::new(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.record().state
    }

    /// Address recorded at the last `Connecting -> Connected` transition.
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.shared.record().address
    }

    /// Connect attempts issued so far, initial one included.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.record().connect_attempts
    }

    /// Feed one event through the state machine.
    pub fn handle_event(&self, event: &SystemEvent) {
        let action = {
            let mut record = self.shared.record();
            let Some((next, action)) = next_state(record.state, event) else {
                debug!("Ignoring {:?} in state {:?}", event, record.state);
                return;
            };
            if record.state != next {
                info!("Station {:?} -> {:?}", record.state, next);
            }
            record.state = next;
            match action {
                Action::Connect => record.connect_attempts += 1,
                Action::RecordAddress(addr) => record.address = Some(addr),
            }
            action
        };

        // Record lock is released before touching the driver or waking the waiter
        match action {
            Action::Connect => {
                if matches!(event, SystemEvent::StaDisconnected) {
                    info!("retry to connect to the AP");
                }
                if let Err(e) = self.driver.connect() {
                    warn!("Connect attempt failed: {}", e);
                }
            }
            Action::RecordAddress(addr) => {
                info!("got ip: {}", addr);
                self.shared.signals.set(CONNECTED_BIT);
            }
        }
    }

    /// Subscribe to `events`, configure the station and start it.
    ///
    /// Returns as soon as the interface is started; use
    /// [`wait`](Self::wait) for the outcome. The subscription must be kept
    /// alive for retries to keep happening.
    pub fn start<S: EventSource>(
        &self,
        events: &S,
        wifi: &WifiConfig,
    ) -> Result<S::Subscription, NetworkError> {
        let handler = self.clone();
        let subscription = events.subscribe(move |event| handler.handle_event(event))?;

        info!("Trying to connect to AP SSID: {}", wifi.ssid);
        self.driver.set_station_mode()?;
        self.driver.set_credentials(wifi)?;
        self.driver.start()?;
        info!("Station started");

        Ok(subscription)
    }

    /// Block until connected or failed. There is no timeout.
    pub fn wait(&self) -> Connection {
        let bits = self.shared.signals.wait_any(CONNECTED_BIT | FAILED_BIT);
        self.outcome(bits)
    }

    /// [`wait`](Self::wait) with an upper bound, `None` if nothing happened.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Connection> {
        self.shared
            .signals
            .wait_any_timeout(CONNECTED_BIT | FAILED_BIT, timeout)
            .map(|bits| self.outcome(bits))
    }

    fn outcome(&self, bits: u32) -> Connection {
        // Connected wins when both bits are up
        if bits & CONNECTED_BIT != 0 {
            if let Some(addr) = self.address() {
                return Connection::Connected(addr);
            }
        }
        Connection::Failed
    }

    /// Start, then block until a terminal outcome.
    pub fn bring_up<S: EventSource>(
        self,
        events: &S,
        wifi: &WifiConfig,
    ) -> Result<(Connection, StationLink<D, S::Subscription>), NetworkError> {
        let subscription = self.start(events, wifi)?;
        let connection = self.wait();
        match connection {
            Connection::Connected(addr) => {
                info!("Connected to AP SSID: {}, ip {}", wifi.ssid, addr)
            }
            Connection::Failed => warn!("Failed to connect to SSID: {}", wifi.ssid),
        }
        Ok((
            connection,
            StationLink {
                orchestrator: self,
                _subscription: subscription,
            },
        ))
    }
}

/// A started station. Dropping it detaches the event handler, which stops
/// reconnects.
#[derive(Debug)]
pub struct StationLink<D, Sub> {
    orchestrator: Orchestrator<D>,
    _subscription: Sub,
}

impl<D: StationDriver + 'static, Sub> StationLink<D, Sub> {
    pub fn state(&self) -> ConnectionState {
        self.orchestrator.state()
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        self.orchestrator.address()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.orchestrator.connect_attempts()
    }

    /// Detached reader of state and attempt count, for status reporting.
    pub fn monitor(&self) -> impl Fn() -> (ConnectionState, u32) + Send + 'static {
        let orchestrator = self.orchestrator.clone();
        move || {
            let record = orchestrator.shared.record();
            (record.state, record.connect_attempts)
        }
    }
}
