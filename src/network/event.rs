//! System events and the host-side event bus.
//!
//! On the device, events come from the ESP-IDF system event loop (see
//! `network::esp`). On the host, [`EventBus`] plays the same role: a single
//! channel that several producers post to and several subscribers listen on,
//! each subscriber on its own dispatcher thread with its own unbounded queue.
//! A busy producer can delay a subscriber but never makes it miss an event.

use super::NetworkError;
use log::debug;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use tokio::sync::mpsc;

/// Notifications delivered on the system event channel.
///
/// Only `StaStarted`, `StaDisconnected` and `StaGotIp` drive the connection
/// state machine; the rest exist because the channel is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// Station interface started.
    StaStarted,
    /// Station stopped.
    StaStopped,
    /// Associated with the access point (no address yet).
    StaConnected,
    /// Lost association, or an attempt failed.
    StaDisconnected,
    /// DHCP assigned an address.
    StaGotIp(Ipv4Addr),
    /// DHCP lease lost.
    StaLostIp,
    /// A scan finished.
    ScanDone,
    /// Anything else, tagged with its source.
    Other(&'static str),
}

/// Something a handler can be attached to.
pub trait EventSource {
    /// Keeps the handler attached while alive.
    type Subscription;

    /// Attach `handler`; it is invoked on the source's own execution context.
    fn subscribe<F>(&self, handler: F) -> Result<Self::Subscription, NetworkError>
    where
        F: FnMut(&SystemEvent) + Send + 'static;
}

type Subscribers = Mutex<Vec<Subscriber>>;

#[derive(Debug)]
struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<SystemEvent>,
}

fn lock(subscribers: &Subscribers) -> MutexGuard<'_, Vec<Subscriber>> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out event channel with blocking dispatch.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Subscribers>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post an event to every current subscriber.
    ///
    /// Returns how many subscribers will see it.
    pub fn post(&self, event: SystemEvent) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| s.tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            debug!("No subscribers for {:?}", event);
        }
        subscribers.len()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.len()
    }
}

impl EventSource for EventBus {
    type Subscription = BusSubscription;

    fn subscribe<F>(&self, mut handler: F) -> Result<BusSubscription, NetworkError>
    where
        F: FnMut(&SystemEvent) + Send + 'static,
    {
        // Registered before subscribe() returns, so nothing posted after
        // that can be missed.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let thread_active = active.clone();

        thread::Builder::new()
            .name("event-dispatch".into())
            .spawn(move || {
                while let Some(event) = rx.blocking_recv() {
                    if !thread_active.load(Ordering::Acquire) {
                        break;
                    }
                    handler(&event);
                }
            })
            .map_err(|e| NetworkError::Subscribe(e.to_string()))?;

        lock(&self.subscribers).push(Subscriber { id, tx });

        Ok(BusSubscription {
            id,
            active,
            bus: Arc::downgrade(&self.subscribers),
        })
    }
}

/// Detaches its handler when dropped.
///
/// Events already queued for the handler are discarded and the dispatcher
/// thread exits.
#[derive(Debug)]
pub struct BusSubscription {
    id: u64,
    active: Arc<AtomicBool>,
    bus: Weak<Subscribers>,
}

impl BusSubscription {
    /// Stop delivering events to the handler.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(subscribers) = self.bus.upgrade() {
            lock(&subscribers).retain(|s| s.id != self.id);
        }
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_post_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.post(SystemEvent::StaStarted), 0);
    }

    #[test]
    fn test_events_delivered_in_order() {
        let bus = EventBus::default();
        let (tx, rx) = mpsc::channel();
        let _sub = bus
            .subscribe(move |event| {
                let _ = tx.send(event.clone());
            })
            .unwrap();

        let addr = Ipv4Addr::new(192, 168, 1, 50);
        bus.post(SystemEvent::StaStarted);
        bus.post(SystemEvent::StaDisconnected);
        bus.post(SystemEvent::StaGotIp(addr));

        assert_eq!(rx.recv_timeout(TIMEOUT), Ok(SystemEvent::StaStarted));
        assert_eq!(rx.recv_timeout(TIMEOUT), Ok(SystemEvent::StaDisconnected));
        assert_eq!(rx.recv_timeout(TIMEOUT), Ok(SystemEvent::StaGotIp(addr)));
    }

    #[test]
    fn test_fan_out_to_all_subscribers() {
        let bus = EventBus::default();
        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        let _a = bus.subscribe(move |_| {
            let _ = tx.send("a");
        });
        let _b = bus.subscribe(move |_| {
            let _ = tx2.send("b");
        });
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.post(SystemEvent::ScanDone), 2);

        let mut seen = vec![
            rx.recv_timeout(TIMEOUT).unwrap(),
            rx.recv_timeout(TIMEOUT).unwrap(),
        ];
        seen.sort_unstable();
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribed_handler_not_called() {
        let bus = EventBus::default();
        let (tx, rx) = mpsc::channel();
        let sub = bus
            .subscribe(move |_| {
                let _ = tx.send(());
            })
            .unwrap();
        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.post(SystemEvent::StaStarted), 0);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_slow_subscriber_misses_nothing() {
        let bus = EventBus::new();
        let (tx, rx) = mpsc::channel();
        let _sub = bus
            .subscribe(move |event| {
                thread::sleep(Duration::from_micros(50));
                let _ = tx.send(event.clone());
            })
            .unwrap();

        bus.post(SystemEvent::StaStarted);
        for _ in 0..500 {
            bus.post(SystemEvent::Other("ble"));
        }
        bus.post(SystemEvent::StaGotIp(Ipv4Addr::new(10, 0, 0, 1)));

        assert_eq!(rx.recv_timeout(TIMEOUT), Ok(SystemEvent::StaStarted));
        for _ in 0..500 {
            assert_eq!(rx.recv_timeout(TIMEOUT), Ok(SystemEvent::Other("ble")));
        }
        assert_eq!(
            rx.recv_timeout(TIMEOUT),
            Ok(SystemEvent::StaGotIp(Ipv4Addr::new(10, 0, 0, 1)))
        );
    }
}
