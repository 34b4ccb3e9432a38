//! Renderer module for cedarplayer
//!
//! This module defines the video renderer seam used by the session. The
//! overlay itself lives outside the crate; the session only creates a
//! renderer when the engine reports the decoded picture format, hands it
//! frame plane addresses, and reconfigures it for stereoscopic sources.

use crate::player::Screen;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod stereo;

pub use stereo::{classify, DisplayMode, OutputMode, Source3dMode, StereoConfig, StereoLayout};

/// Renderer trait defining the interface for video output
///
/// Implementations are internally synchronized; the session calls them
/// without holding its own lock.
pub trait VideoRenderer: Send + Sync {
    /// Queue a decoded frame for display
    ///
    /// # Arguments
    ///
    /// * `frame` - Plane addresses selected for the current display mode
    fn render(&self, frame: &OverlayFrame) -> Result<()>;

    /// Apply a stereoscopic layout
    fn configure_stereo(&self, config: &StereoConfig) -> Result<()>;

    /// Move output to another screen
    fn set_screen(&self, screen: Screen) -> Result<()>;

    /// Id of the frame currently on screen, or -1 if none
    fn frame_id(&self) -> i32;
}

/// Creates renderers once the decoded picture format is known
pub trait RendererFactory: Send + Sync {
    /// Create a renderer
    ///
    /// # Arguments
    ///
    /// * `params` - Picture geometry, pixel format and target screen
    ///
    /// # Returns
    ///
    /// Returns the renderer or a resource error
    fn create(&self, params: &RendererParams) -> Result<Arc<dyn VideoRenderer>>;
}

/// Pixel layout of decoded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Macroblock-tiled YUV 4:2:0 as produced by the hardware decoder
    #[default]
    Yuv420Tiled,
    Yuv420Planar,
    Yuv422Planar,
}

/// Physical addresses of the planes of one decoded frame
///
/// The second set carries the other eye for stereoscopic sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramePlanes {
    pub y: u64,
    pub u: u64,
    pub v: u64,
    pub y2: u64,
    pub u2: u64,
    pub v2: u64,
}

/// Decoded frame description reported by the engine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub display_width: u32,
    pub display_height: u32,
    pub format: PixelFormat,
    pub source_3d_mode: Source3dMode,
    pub display_mode: DisplayMode,
    /// Set by the engine on the first frame after a display mode switch
    pub display_mode_changed: bool,
    pub planes: FramePlanes,
    pub frame_id: u32,
}

impl FrameInfo {
    /// Visible size, falling back to the coded size
    pub fn visible_size(&self) -> (u32, u32) {
        if self.display_width > 0 && self.display_height > 0 {
            (self.display_width, self.display_height)
        } else {
            (self.width, self.height)
        }
    }
}

/// Parameters for [`RendererFactory::create`]
#[derive(Debug, Clone, PartialEq)]
pub struct RendererParams {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub screen: Screen,
}

/// Frame handed to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayFrame {
    pub frame_id: u32,
    pub top_y: u64,
    pub top_c: u64,
    pub bottom_y: u64,
    pub bottom_c: u64,
}

impl OverlayFrame {
    /// Select planes for the frame's display mode
    ///
    /// Field-sequential 3D output shows both eyes; anaglyph output reads the
    /// composite the decoder wrote into the second plane set; everything else
    /// shows the first eye only.
    pub fn from_frame(frame: &FrameInfo) -> Self {
        let p = &frame.planes;
        let (top_y, top_c, bottom_y, bottom_c) = match frame.display_mode {
            DisplayMode::ThreeD if frame.source_3d_mode == Source3dMode::FieldSequential => {
                (p.y, p.u, p.y2, p.u2)
            }
            DisplayMode::Anaglyph => (p.y2, p.u2, 0, 0),
            _ => (p.y, p.u, 0, 0),
        };

        Self {
            frame_id: frame.frame_id,
            top_y,
            top_c,
            bottom_y,
            bottom_c,
        }
    }
}
