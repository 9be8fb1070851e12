//! Change notification system.
//!
//! Watchers hand out one-shot [`ChangeNotification`]s that trigger reloads;
//! subscribers hear about every snapshot a provider publishes.

mod manual;
mod notification;
pub mod subscriber;
pub mod watcher;

pub use manual::ManualWatcher;
pub use notification::ChangeNotification;
pub use subscriber::{SubscriberRegistry, SubscriptionHandle};
pub use watcher::{ChangeWatcher, PeriodicWatcher};
