//! One-shot change notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

struct NotificationState {
    fired: AtomicBool,
    notify: Notify,
}

/// A single-use signal that something may have changed.
///
/// A notification starts *armed* and moves to *fired* at most once. It is
/// never reset: to keep watching, ask the watcher for a fresh one. Clones
/// share the same state, so a watcher can keep one copy to fire while the
/// consumer waits on another.
///
/// # Examples
///
/// ```rust
/// use reloadable_sql_config::notify::ChangeNotification;
///
/// # async fn example() {
/// let notification = ChangeNotification::new();
/// let waiter = notification.clone();
///
/// assert!(notification.fire());
/// assert!(!notification.fire()); // already consumed
///
/// waiter.fired().await;
/// assert!(waiter.has_fired());
/// # }
/// ```
#[derive(Clone)]
pub struct ChangeNotification {
    state: Arc<NotificationState>,
}

impl ChangeNotification {
    /// Create an armed notification.
    pub fn new() -> Self {
        Self {
            state: Arc::new(NotificationState {
                fired: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Whether this notification has fired.
    pub fn has_fired(&self) -> bool {
        self.state.fired.load(Ordering::Acquire)
    }

    /// Fire the notification, waking every waiter.
    ///
    /// Returns `true` if this call performed the armed → fired transition and
    /// `false` if it had already fired.
    pub fn fire(&self) -> bool {
        if self.state.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.state.notify.notify_waiters();
        true
    }

    /// Wait until the notification fires. Returns immediately if it already has.
    pub async fn fired(&self) {
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent fire is not missed
        notified.as_mut().enable();

        if self.has_fired() {
            return;
        }
        notified.await;
    }

    /// Whether two handles refer to the same notification.
    pub fn same_as(&self, other: &ChangeNotification) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for ChangeNotification {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotification")
            .field("fired", &self.has_fired())
            .finish()
    }
}
