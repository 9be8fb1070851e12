//! Change watchers that hand out one-shot notifications.

use super::ChangeNotification;
use crate::error::{ConfigError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Something that can signal "the settings may have changed".
///
/// [`watch`](ChangeWatcher::watch) arms and returns a fresh
/// [`ChangeNotification`]. The watcher fires its *current* notification when
/// its trigger occurs; consumers must call `watch` again after every fire to
/// keep listening.
///
/// Calling `watch` while an earlier notification is still armed supersedes
/// it: the earlier one is not cancelled but will never be fired.
pub trait ChangeWatcher: Send + Sync {
    /// Arm a new notification and make it the current one.
    fn watch(&self) -> ChangeNotification;

    /// Stop the trigger and release the current notification.
    ///
    /// Must be safe to call more than once.
    fn dispose(&self);
}

impl<W: ChangeWatcher + ?Sized> ChangeWatcher for Arc<W> {
    fn watch(&self) -> ChangeNotification {
        (**self).watch()
    }

    fn dispose(&self) {
        (**self).dispose()
    }
}

/// The watcher-side slot holding the currently armed notification.
#[derive(Clone, Default)]
pub(crate) struct ArmedSlot {
    current: Arc<Mutex<Option<ChangeNotification>>>,
}

impl ArmedSlot {
    pub(crate) fn arm(&self) -> ChangeNotification {
        let notification = ChangeNotification::new();
        *self.current.lock() = Some(notification.clone());
        notification
    }

    /// Fire and clear the current notification. Returns `false` if none was armed.
    pub(crate) fn fire(&self) -> bool {
        match self.current.lock().take() {
            Some(notification) => notification.fire(),
            None => false,
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.current.lock().is_some()
    }

    pub(crate) fn clear(&self) {
        self.current.lock().take();
    }
}

/// Watcher that fires on a fixed wall-clock interval.
///
/// A background tokio task ticks immediately and then every `interval`. Each
/// tick fires the current notification if one is armed; ticks with nothing
/// armed are absorbed.
///
/// After [`dispose`](ChangeWatcher::dispose) no tick fires, and
/// [`watch`](ChangeWatcher::watch) returns a notification that never fires.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_sql_config::notify::{ChangeWatcher, PeriodicWatcher};
/// use std::time::Duration;
///
/// # async fn example() -> reloadable_sql_config::error::Result<()> {
/// let watcher = PeriodicWatcher::new(Duration::from_secs(30))?;
///
/// loop {
///     watcher.watch().fired().await;
///     println!("time to reload");
/// }
/// # }
/// ```
pub struct PeriodicWatcher {
    interval: Duration,
    slot: ArmedSlot,
    ticker: Mutex<Option<JoinHandle<()>>>,
    /// Shared with the ticker task, which may be between await points when aborted
    disposed: Arc<AtomicBool>,
}

impl PeriodicWatcher {
    /// Start a periodic watcher on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WatchError`] if `interval` is zero or if called
    /// outside a tokio runtime.
    pub fn new(interval: Duration) -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            ConfigError::WatchError(format!("PeriodicWatcher requires a tokio runtime: {}", e))
        })?;
        Self::with_handle(interval, &handle)
    }

    /// Start a periodic watcher on the given runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WatchError`] if `interval` is zero.
    pub fn with_handle(interval: Duration, handle: &tokio::runtime::Handle) -> Result<Self> {
        if interval.is_zero() {
            return Err(ConfigError::WatchError(
                "refresh interval must be positive".to_string(),
            ));
        }

        let slot = ArmedSlot::default();
        let tick_slot = slot.clone();
        let disposed = Arc::new(AtomicBool::new(false));
        let tick_disposed = Arc::clone(&disposed);

        let ticker = handle.spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                if tick_disposed.load(Ordering::Acquire) {
                    break;
                }
                if tick_slot.fire() {
                    trace!("Periodic watcher fired");
                }
            }
        });

        debug!(?interval, "Started periodic watcher");

        Ok(Self {
            interval,
            slot,
            ticker: Mutex::new(Some(ticker)),
            disposed,
        })
    }

    /// Get the refresh interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a notification is armed and waiting for the next tick.
    pub fn is_armed(&self) -> bool {
        self.slot.is_armed()
    }

    /// Whether [`dispose`](ChangeWatcher::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl ChangeWatcher for PeriodicWatcher {
    fn watch(&self) -> ChangeNotification {
        if self.is_disposed() {
            return ChangeNotification::new();
        }
        self.slot.arm()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
        }
        self.slot.clear();
        debug!(interval = ?self.interval, "Disposed periodic watcher");
    }
}

impl Drop for PeriodicWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}
