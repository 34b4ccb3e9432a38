//! Listener registration
//!
//! A session has at most one listener. Registration hands out a token; a
//! stale token cannot unregister a listener installed after it.

use super::Notification;
use log::trace;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives session notifications
///
/// Called without any session lock held, possibly from the engine's thread.
pub trait PlayerListener: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> PlayerListener for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Identifies one listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

#[derive(Default)]
pub(crate) struct ListenerSlot {
    current: RwLock<Option<(u64, Arc<dyn PlayerListener>)>>,
    next_id: AtomicU64,
}

impl ListenerSlot {
    /// Install a listener, replacing any previous one
    pub(crate) fn set(&self, listener: Arc<dyn PlayerListener>) -> ListenerToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        *self.current.write() = Some((id, listener));
        ListenerToken(id)
    }

    /// Remove the listener if `token` still names it
    pub(crate) fn unregister(&self, token: ListenerToken) -> bool {
        let mut current = self.current.write();
        match current.as_ref() {
            Some((id, _)) if *id == token.0 => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear(&self) {
        *self.current.write() = None;
    }

    pub(crate) fn is_set(&self) -> bool {
        self.current.read().is_some()
    }

    /// Deliver a notification to the current listener, if any
    pub(crate) fn deliver(&self, notification: Notification) {
        let listener = self.current.read().as_ref().map(|(_, l)| Arc::clone(l));
        match listener {
            Some(listener) => listener.notify(notification),
            None => trace!("Dropping {} notification: no listener", notification.name()),
        }
    }
}
