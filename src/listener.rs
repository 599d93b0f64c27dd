//! Listener interface (spec §6 "Listener interface (exposed)") and a
//! snapshot-based listener set safe to read concurrently with the worker.

use std::sync::{Arc, RwLock};

use crate::entity::Entity;
use crate::Address;

/// Observer of disassembly lifecycle, errors, and per-address changes.
///
/// Spec §5: "The listener set is observed from other threads ... listener
/// registration/removal and listener notification dispatch must be safe
/// under concurrent reads ... Listener callbacks themselves are invoked on
/// the worker; listeners must not block it." Implementations should
/// therefore return quickly (e.g. push onto a channel) rather than do work
/// inline.
pub trait Listener: Send + Sync {
    fn on_analyze_start(&self) {}
    fn on_analyze_stop(&self) {}
    fn on_analyze_error(&self, _addr: Address) {}
    /// Primary decode stream, used by one-shot decoders without a data
    /// store (spec §6).
    fn on_decode(&self, _addr: Address, _length: usize, _entity: &Entity) {}
    /// Per-address change notification, delivered through the disassembly
    /// data store (spec §4.E `tell_listeners`).
    fn on_change(&self, _addr: Address) {}
}

/// A copy-on-write-ish set of listeners: writers (`add`/`remove`) take a
/// write lock; notifiers take a read lock just long enough to clone the
/// `Arc` list, then drop the lock before invoking callbacks, so a slow or
/// reentrant listener can't stall registration. Delivery order across
/// listeners is unspecified, matching spec §4.E: "delivery is unordered but
/// each listener sees each change at least once."
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        ListenerSet::default()
    }

    pub fn add(&self, listener: Arc<dyn Listener>) {
        self.listeners.write().unwrap().push(listener);
    }

    /// Removes a listener by pointer identity.
    pub fn remove(&self, listener: &Arc<dyn Listener>) {
        let target = Arc::as_ptr(listener);
        self.listeners
            .write()
            .unwrap()
            .retain(|l| !std::ptr::eq(Arc::as_ptr(l), target));
    }

    fn snapshot(&self) -> Vec<Arc<dyn Listener>> {
        self.listeners.read().unwrap().clone()
    }

    pub fn notify_start(&self) {
        for l in self.snapshot() {
            l.on_analyze_start();
        }
    }

    pub fn notify_stop(&self) {
        for l in self.snapshot() {
            l.on_analyze_stop();
        }
    }

    pub fn notify_error(&self, addr: Address) {
        for l in self.snapshot() {
            l.on_analyze_error(addr);
        }
    }

    pub fn notify_decode(&self, addr: Address, length: usize, entity: &Entity) {
        for l in self.snapshot() {
            l.on_decode(addr, length, entity);
        }
    }

    pub fn notify_change(&self, addr: Address) {
        for l in self.snapshot() {
            l.on_change(addr);
        }
    }
}
