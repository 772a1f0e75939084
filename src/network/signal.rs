//! Event-group style signalling between an event callback and a waiter.
//!
//! The callback sets bits; the waiter blocks until any bit of a mask is set
//! and gets back every bit that was set at wake time, not just the one that
//! woke it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The station obtained an address.
pub const CONNECTED_BIT: u32 = 1 << 0;

/// The station gave up. Nothing sets this today.
pub const FAILED_BIT: u32 = 1 << 1;

/// A set of condition bits guarded by a condition variable.
#[derive(Debug, Default)]
pub struct EventGroup {
    bits: Mutex<u32>,
    changed: Condvar,
}

impl EventGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        // The guarded value is a plain integer, a panicking holder cannot leave it torn
        self.bits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set bits and wake all waiters. Returns the bits after setting.
    pub fn set(&self, bits: u32) -> u32 {
        let mut current = self.lock();
        *current |= bits;
        self.changed.notify_all();
        *current
    }

    /// Clear bits. Returns the bits after clearing.
    pub fn clear(&self, bits: u32) -> u32 {
        let mut current = self.lock();
        *current &= !bits;
        *current
    }

    /// Current bits without waiting.
    pub fn get(&self) -> u32 {
        *self.lock()
    }

    /// Block until any bit in `mask` is set. No timeout.
    pub fn wait_any(&self, mask: u32) -> u32 {
        let guard = self.lock();
        let guard = self
            .changed
            .wait_while(guard, |bits| *bits & mask == 0)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Like [`wait_any`](Self::wait_any) but gives up after `timeout`.
    ///
    /// Returns `None` on timeout.
    pub fn wait_any_timeout(&self, mask: u32, timeout: Duration) -> Option<u32> {
        let guard = self.lock();
        let (guard, result) = self
            .changed
            .wait_timeout_while(guard, timeout, |bits| *bits & mask == 0)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && *guard & mask == 0 {
            None
        } else {
            Some(*guard)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let group = EventGroup::new();
        assert_eq!(group.get(), 0);
        assert_eq!(group.set(CONNECTED_BIT), CONNECTED_BIT);
        assert_eq!(group.clear(CONNECTED_BIT), 0);
    }

    #[test]
    fn test_wait_returns_immediately_when_set() {
        let group = EventGroup::new();
        group.set(CONNECTED_BIT);
        assert_eq!(group.wait_any(CONNECTED_BIT | FAILED_BIT), CONNECTED_BIT);
    }

    #[test]
    fn test_wait_returns_all_bits() {
        let group = EventGroup::new();
        group.set(CONNECTED_BIT | FAILED_BIT | 1 << 5);
        assert_eq!(
            group.wait_any(FAILED_BIT),
            CONNECTED_BIT | FAILED_BIT | 1 << 5
        );
    }

    #[test]
    fn test_wait_wakes_on_set_from_other_thread() {
        let group = Arc::new(EventGroup::new());
        let setter = group.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(CONNECTED_BIT);
        });
        let bits = group.wait_any_timeout(CONNECTED_BIT | FAILED_BIT, Duration::from_secs(5));
        assert_eq!(bits, Some(CONNECTED_BIT));
        handle.join().unwrap();
    }

    #[test]
    fn test_unrelated_bits_do_not_wake() {
        let group = EventGroup::new();
        group.set(1 << 7);
        assert_eq!(
            group.wait_any_timeout(CONNECTED_BIT, Duration::from_millis(30)),
            None
        );
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use esp32_cam_node_macros::tap_test;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[tap_test]
    fn wait_wakes_on_bit_from_other_thread() {
        let group = Arc::new(EventGroup::new());
        let setter = group.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(CONNECTED_BIT);
        });
        let bits = group.wait_any_timeout(CONNECTED_BIT | FAILED_BIT, Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(bits.map(|b| b & CONNECTED_BIT), Some(CONNECTED_BIT));
    }
}
