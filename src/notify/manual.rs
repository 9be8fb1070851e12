//! Externally triggered watcher.

use super::ChangeNotification;
use super::watcher::{ArmedSlot, ChangeWatcher};
use std::sync::atomic::{AtomicBool, Ordering};

/// Watcher fired by calling [`trigger`](ManualWatcher::trigger).
///
/// Use it to drive reloads from a push channel (a database trigger relay, an
/// admin endpoint) instead of a timer. Once disposed, notifications returned
/// by [`watch`](ChangeWatcher::watch) never fire.
///
/// # Examples
///
/// ```rust
/// use reloadable_sql_config::notify::{ChangeWatcher, ManualWatcher};
///
/// let watcher = ManualWatcher::new();
/// assert!(!watcher.trigger()); // nothing armed yet
///
/// let notification = watcher.watch();
/// assert!(watcher.trigger());
/// assert!(notification.has_fired());
/// ```
#[derive(Default)]
pub struct ManualWatcher {
    slot: ArmedSlot,
    disposed: AtomicBool,
}

impl ManualWatcher {
    /// Create a watcher with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the current notification.
    ///
    /// Returns `false` if nothing was armed (the trigger is absorbed) or the
    /// watcher has been disposed.
    pub fn trigger(&self) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        self.slot.fire()
    }

    /// Whether a notification is armed and waiting for a trigger.
    pub fn is_armed(&self) -> bool {
        self.slot.is_armed()
    }
}

impl ChangeWatcher for ManualWatcher {
    fn watch(&self) -> ChangeNotification {
        if self.disposed.load(Ordering::Acquire) {
            return ChangeNotification::new();
        }
        self.slot.arm()
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.slot.clear();
        }
    }
}
