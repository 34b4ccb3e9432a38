//! Display module for cedarplayer
//!
//! This module mirrors the primary display onto the secondary output in
//! dual-same mode:
//! - A binary semaphore hands swap requests to the worker thread
//! - The swap coordinator copies frames into a ring of destination buffers
//! - The dispatcher routes display property commands to the device

mod dispatcher;
mod semaphore;
mod swap;

pub use dispatcher::{DisplayCommand, DisplayDispatcher};
pub use semaphore::BinarySemaphore;
pub use swap::{SlotRing, SwapCoordinator, SwapSource, SwapThread};

use crate::utils::error::Result;

/// Minimum number of destination buffers in the swap ring
pub const DEFAULT_SWAP_SLOTS: usize = 3;

/// Physical output attached to a display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    None = 0,
    Lcd = 1,
    Tv = 2,
    Hdmi = 3,
    Vga = 4,
}

impl OutputType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(OutputType::None),
            1 => Some(OutputType::Lcd),
            2 => Some(OutputType::Tv),
            3 => Some(OutputType::Hdmi),
            4 => Some(OutputType::Vga),
            _ => None,
        }
    }
}

/// How the two displays are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualMode {
    Single = 0,
    DualLcd = 1,
    DualDiff = 2,
    /// Secondary output mirrors the master
    DualSame = 3,
}

impl DualMode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(DualMode::Single),
            1 => Some(DualMode::DualLcd),
            2 => Some(DualMode::DualDiff),
            3 => Some(DualMode::DualSame),
            _ => None,
        }
    }
}

/// Per-display settings handed to [`DisplayDevice::set_display_mode`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayModeParams {
    pub types: [i32; 2],
    pub formats: [i32; 2],
    pub pixel_formats: [i32; 2],
    pub master: i32,
}

/// Display hardware
///
/// Queries return the device's raw answer. The mode lock is shared with
/// other processes and must bracket every copy and pan.
pub trait DisplayDevice: Send + Sync {
    fn request_mode_lock(&self) -> Result<()>;
    fn release_mode_lock(&self);

    /// Blit one framebuffer into another
    fn copy_framebuffer(
        &self,
        src_display: i32,
        src_buffer: i32,
        dst_display: i32,
        dst_buffer: i32,
    ) -> Result<()>;

    /// Show `buffer` on `display`
    fn pan_display(&self, display: i32, buffer: i32) -> Result<()>;

    fn display_mode(&self) -> Result<i32>;
    fn master_display(&self) -> Result<i32>;
    fn output_type(&self, display: i32) -> Result<OutputType>;
    /// 1 when an HDMI sink is plugged in
    fn hdmi_status(&self) -> Result<i32>;
    /// 1 when a TV DAC output is connected
    fn tv_dac_status(&self) -> Result<i32>;
    /// Framebuffer currently shown on `display`
    fn buffer_id(&self, display: i32) -> Result<i32>;

    fn open_display(&self, display: i32) -> Result<i32>;
    fn close_display(&self, display: i32) -> Result<i32>;
    fn change_mode(&self, display: i32, value0: i32, value1: i32) -> Result<i32>;
    fn set_display_mode(&self, mode: i32, params: &DisplayModeParams) -> Result<i32>;
    fn set_master_display(&self, display: i32) -> Result<i32>;
    fn display_parameter(&self, display: i32, param: i32) -> Result<i32>;
    fn display_count(&self) -> Result<i32>;
    fn max_width_display(&self) -> Result<i32>;
    fn max_hdmi_mode(&self) -> Result<i32>;
}

/// Held hardware mode lock, released on drop
pub struct ModeLock<'a> {
    device: &'a dyn DisplayDevice,
}

impl<'a> ModeLock<'a> {
    pub fn acquire(device: &'a dyn DisplayDevice) -> Result<Self> {
        device.request_mode_lock()?;
        Ok(Self { device })
    }
}

impl Drop for ModeLock<'_> {
    fn drop(&mut self) {
        self.device.release_mode_lock();
    }
}
