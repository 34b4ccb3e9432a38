//! Stereoscopic layout classification
//!
//! A closed mapping from the source's 3D packing and the requested display
//! mode to the overlay's layout and output codes.

use super::{FrameInfo, PixelFormat};
use serde::{Deserialize, Serialize};

/// How a source packs its two views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Source3dMode {
    #[default]
    TwoD,
    FieldSequential,
    TopBottomHalf,
    TopBottomFull,
    BottomTopHalf,
    BottomTopFull,
    LeftRightHalf,
    LeftRightFull,
    RightLeftHalf,
    RightLeftFull,
    LineInterleaved,
    Other(i32),
}

impl Source3dMode {
    /// Mode from the input dimension code used on the wire
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Source3dMode::TwoD,
            1 => Source3dMode::FieldSequential,
            2 => Source3dMode::TopBottomHalf,
            3 => Source3dMode::TopBottomFull,
            4 => Source3dMode::BottomTopHalf,
            5 => Source3dMode::BottomTopFull,
            6 => Source3dMode::LeftRightHalf,
            7 => Source3dMode::LeftRightFull,
            8 => Source3dMode::RightLeftHalf,
            9 => Source3dMode::RightLeftFull,
            10 => Source3dMode::LineInterleaved,
            other => Source3dMode::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Source3dMode::TwoD => 0,
            Source3dMode::FieldSequential => 1,
            Source3dMode::TopBottomHalf => 2,
            Source3dMode::TopBottomFull => 3,
            Source3dMode::BottomTopHalf => 4,
            Source3dMode::BottomTopFull => 5,
            Source3dMode::LeftRightHalf => 6,
            Source3dMode::LeftRightFull => 7,
            Source3dMode::RightLeftHalf => 8,
            Source3dMode::RightLeftFull => 9,
            Source3dMode::LineInterleaved => 10,
            Source3dMode::Other(code) => code,
        }
    }
}

/// Presentation selected for the picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    #[default]
    Original,
    ThreeD,
    Anaglyph,
    Other(i32),
}

/// Overlay source layout code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StereoLayout {
    TopBottom = 0,
    FieldSequential = 1,
    SideBySideFull = 2,
    SideBySideHalf = 3,
    LineInterleaved = 4,
    Unsupported = 0xFF,
}

impl From<Source3dMode> for StereoLayout {
    fn from(mode: Source3dMode) -> Self {
        match mode {
            Source3dMode::FieldSequential => StereoLayout::FieldSequential,
            Source3dMode::LeftRightFull | Source3dMode::RightLeftFull => {
                StereoLayout::SideBySideFull
            }
            Source3dMode::LeftRightHalf | Source3dMode::RightLeftHalf => {
                StereoLayout::SideBySideHalf
            }
            Source3dMode::TopBottomHalf
            | Source3dMode::BottomTopHalf
            | Source3dMode::TopBottomFull
            | Source3dMode::BottomTopFull => StereoLayout::TopBottom,
            Source3dMode::LineInterleaved => StereoLayout::LineInterleaved,
            Source3dMode::TwoD | Source3dMode::Other(_) => StereoLayout::Unsupported,
        }
    }
}

/// Overlay output mode code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputMode {
    Default = 0,
    ThreeD = 1,
    Anaglyph = 2,
    Original = 3,
}

impl From<DisplayMode> for OutputMode {
    fn from(mode: DisplayMode) -> Self {
        match mode {
            DisplayMode::Anaglyph => OutputMode::Anaglyph,
            DisplayMode::ThreeD => OutputMode::ThreeD,
            DisplayMode::Original => OutputMode::Original,
            DisplayMode::Other(_) => OutputMode::Default,
        }
    }
}

/// Stereoscopic configuration handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoConfig {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub layout: StereoLayout,
    pub output: OutputMode,
    pub mode_changed: bool,
}

/// Classify a frame for the overlay
///
/// Anaglyph output is composited into a planar buffer holding a single view,
/// so half-width or half-height packings shrink accordingly.
pub fn classify(frame: &FrameInfo, mode_changed: bool) -> StereoConfig {
    let (mut width, mut height) = frame.visible_size();
    let mut format = frame.format;
    let layout = StereoLayout::from(frame.source_3d_mode);
    let output = OutputMode::from(frame.display_mode);

    if output == OutputMode::Anaglyph {
        format = PixelFormat::Yuv420Planar;
        match frame.source_3d_mode {
            Source3dMode::LeftRightHalf | Source3dMode::RightLeftHalf => width /= 2,
            Source3dMode::TopBottomHalf | Source3dMode::BottomTopHalf => height /= 2,
            _ => {}
        }
    }

    StereoConfig {
        width,
        height,
        format,
        layout,
        output,
        mode_changed,
    }
}
