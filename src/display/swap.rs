//! Frame swap coordinator
//!
//! Mirrors the master display onto the secondary one. Each swap copies the
//! master's back buffer into one of N destination buffers and pans the
//! secondary display to it. The ring keeps buffers in most-recently-shown
//! order so the write target is never the buffer on screen.

use super::{BinarySemaphore, DisplayDevice, ModeLock};
use crate::utils::error::{IntoPlayerError, PlayerError, Result};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Destination buffers, most recently shown first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRing {
    frames: Vec<i32>,
    shown: Option<i32>,
}

impl SlotRing {
    pub fn new(slots: usize) -> Result<Self> {
        if slots < super::DEFAULT_SWAP_SLOTS {
            return Err(PlayerError::InvalidArgument(format!(
                "swap ring needs at least {} slots, got {}",
                super::DEFAULT_SWAP_SLOTS,
                slots
            )));
        }
        Ok(Self {
            frames: (0..slots as i32).collect(),
            shown: None,
        })
    }

    pub fn frames(&self) -> &[i32] {
        &self.frames
    }

    /// Buffer on screen, once a swap has completed
    pub fn shown(&self) -> Option<i32> {
        self.shown
    }

    /// Ring position and buffer to write next
    ///
    /// The older of the last two entries, unless that one is on screen.
    pub fn write_target(&self) -> (usize, i32) {
        let last = self.frames.len() - 1;
        if Some(self.frames[last]) == self.shown {
            (last - 1, self.frames[last - 1])
        } else {
            (last, self.frames[last])
        }
    }

    /// Move the entry at `index` to the front and mark it shown
    pub fn promote(&mut self, index: usize) -> i32 {
        self.frames[..=index].rotate_right(1);
        let front = self.frames[0];
        self.shown = Some(front);
        front
    }
}

/// Framebuffer the next swap copies from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapSource {
    pub display: i32,
    /// Buffer the master currently shows; its other buffer is copied
    pub buffer: i32,
}

/// One swap cycle against a display device
pub struct SwapCoordinator {
    device: Arc<dyn DisplayDevice>,
    ring: SlotRing,
}

impl SwapCoordinator {
    pub fn new(device: Arc<dyn DisplayDevice>, slots: usize) -> Result<Self> {
        Ok(Self {
            device,
            ring: SlotRing::new(slots)?,
        })
    }

    pub fn ring(&self) -> &SlotRing {
        &self.ring
    }

    /// Copy, promote and pan under the mode lock
    ///
    /// # Returns
    ///
    /// The buffer now shown on the secondary display. A failed copy leaves
    /// the ring untouched.
    pub fn swap_once(&mut self, source: SwapSource) -> Result<i32> {
        let _lock = ModeLock::acquire(self.device.as_ref())?;

        let target_display = 1 - source.display;
        let (index, buffer) = self.ring.write_target();
        trace!("Swap writes buffer {} (slot {})", buffer, index);

        self.device.copy_framebuffer(
            source.display,
            1 - source.buffer,
            target_display,
            buffer,
        )?;

        let shown = self.ring.promote(index);
        self.device.pan_display(target_display, shown)?;
        Ok(shown)
    }
}

struct SwapShared {
    signal: BinarySemaphore,
    source: Mutex<Option<SwapSource>>,
    coordinator: Mutex<SwapCoordinator>,
    shutdown: AtomicBool,
    swaps: AtomicU64,
}

/// Worker thread running one swap per signal
pub struct SwapThread {
    shared: Arc<SwapShared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SwapThread {
    pub fn spawn(device: Arc<dyn DisplayDevice>, slots: usize) -> Result<Self> {
        let shared = Arc::new(SwapShared {
            signal: BinarySemaphore::new(),
            source: Mutex::new(None),
            coordinator: Mutex::new(SwapCoordinator::new(device, slots)?),
            shutdown: AtomicBool::new(false),
            swaps: AtomicU64::new(0),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("display-swap".to_string())
            .spawn(move || swap_loop(worker))
            .resource_err("Failed to start display swap thread")?;

        info!("Display swap thread started with {} slots", slots);
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn set_source(&self, source: SwapSource) {
        *self.shared.source.lock() = Some(source);
    }

    /// Request one swap
    pub fn signal(&self) {
        self.shared.signal.signal();
    }

    /// Drop a pending request without stopping the thread
    pub fn reset(&self) {
        self.shared.signal.reset();
    }

    /// Completed swaps
    pub fn swap_count(&self) -> u64 {
        self.shared.swaps.load(Ordering::Acquire)
    }

    pub fn ring(&self) -> SlotRing {
        self.shared.coordinator.lock().ring().clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop and join the worker
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.shutdown.store(true, Ordering::Release);
            self.shared.signal.signal();
            if handle.join().is_err() {
                warn!("Display swap thread panicked");
            }
            info!("Display swap thread stopped");
        }
    }
}

impl Drop for SwapThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn swap_loop(shared: Arc<SwapShared>) {
    loop {
        shared.signal.wait();
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let Some(source) = *shared.source.lock() else {
            debug!("Swap requested without a source buffer");
            continue;
        };
        match shared.coordinator.lock().swap_once(source) {
            Ok(shown) => {
                shared.swaps.fetch_add(1, Ordering::AcqRel);
                trace!("Secondary display shows buffer {}", shown);
            }
            Err(e) => warn!("Display swap failed: {}", e),
        }
    }
}
