//! Binary semaphore
//!
//! A signal raised while nobody waits is kept for exactly one later wait.
//! Repeated signals do not accumulate.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct BinarySemaphore {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl BinarySemaphore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        let mut raised = self.raised.lock();
        *raised = true;
        self.cond.notify_one();
    }

    /// Block until signalled, consuming the signal
    pub fn wait(&self) {
        let mut raised = self.raised.lock();
        while !*raised {
            self.cond.wait(&mut raised);
        }
        *raised = false;
    }

    /// Like [`wait`](Self::wait) with a deadline; false on timeout
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut raised = self.raised.lock();
        if !*raised {
            self.cond
                .wait_while_for(&mut raised, |raised| !*raised, timeout);
        }
        std::mem::replace(&mut *raised, false)
    }

    pub fn try_wait(&self) -> bool {
        std::mem::replace(&mut *self.raised.lock(), false)
    }

    /// Drop a pending signal
    pub fn reset(&self) {
        *self.raised.lock() = false;
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.lock()
    }
}
