//! Display property dispatcher
//!
//! Routes numbered display commands to the device and decides, per frame,
//! whether the secondary output needs a swap.

use super::{
    DisplayDevice, DisplayModeParams, DualMode, OutputType, SwapSource, SwapThread,
};
use crate::utils::error::Result;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Commands accepted by [`DisplayDispatcher::set_disp_prop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    SetParameter = 0,
    ChangeMode = 1,
    Open = 2,
    Close = 3,
    HdmiStatus = 4,
    TvStatus = 5,
    GetParameter = 6,
    SetMaster = 7,
    GetMaster = 8,
    MaxWidthDisplay = 9,
    MaxHdmiMode = 10,
    DisplayMode = 11,
    DisplayCount = 12,
    SetDisplayMode = 13,
}

impl DisplayCommand {
    pub fn from_i32(cmd: i32) -> Option<Self> {
        use DisplayCommand::*;
        let command = match cmd {
            0 => SetParameter,
            1 => ChangeMode,
            2 => Open,
            3 => Close,
            4 => HdmiStatus,
            5 => TvStatus,
            6 => GetParameter,
            7 => SetMaster,
            8 => GetMaster,
            9 => MaxWidthDisplay,
            10 => MaxHdmiMode,
            11 => DisplayMode,
            12 => DisplayCount,
            13 => SetDisplayMode,
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Default)]
struct DisplaySettings {
    open: [bool; 2],
    params: DisplayModeParams,
}

pub struct DisplayDispatcher {
    device: Arc<dyn DisplayDevice>,
    swap: SwapThread,
    settings: Mutex<DisplaySettings>,
}

impl DisplayDispatcher {
    /// Wrap a device and start its swap thread
    pub fn new(device: Arc<dyn DisplayDevice>, slots: usize) -> Result<Self> {
        let swap = SwapThread::spawn(Arc::clone(&device), slots)?;
        Ok(Self {
            device,
            swap,
            settings: Mutex::new(DisplaySettings::default()),
        })
    }

    pub fn swap_thread(&self) -> &SwapThread {
        &self.swap
    }

    /// Whether `display` was opened through this dispatcher
    pub fn is_open(&self, display: i32) -> bool {
        self.settings.lock().open[slot(display)]
    }

    /// Settings passed with the next set-display-mode
    pub fn mode_params(&self) -> DisplayModeParams {
        self.settings.lock().params
    }

    /// Called once a new frame is on the master display
    ///
    /// An unplugged secondary output drops any pending swap. In dual-same
    /// mode the master's current buffer becomes the swap source.
    pub fn start_swap_buffer(&self) -> Result<()> {
        let mode = self.device.display_mode()?;
        let master = self.device.master_display()?;

        let plugged = match self.device.output_type(1 - master)? {
            OutputType::Hdmi => self.device.hdmi_status()? != 0,
            OutputType::Tv => self.device.tv_dac_status()? != 0,
            _ => true,
        };
        if !plugged {
            debug!("Secondary output unplugged, dropping swap request");
            self.swap.reset();
            return Ok(());
        }

        if DualMode::from_i32(mode) == Some(DualMode::DualSame) {
            let buffer = self.device.buffer_id(master)?;
            self.swap.set_source(SwapSource {
                display: master,
                buffer,
            });
            self.swap.signal();
        }
        Ok(())
    }

    /// Run a numbered display command
    ///
    /// # Returns
    ///
    /// The device's answer, or -1 for unknown commands and device errors.
    pub fn set_disp_prop(&self, cmd: i32, param0: i32, param1: i32, param2: i32) -> i32 {
        let Some(command) = DisplayCommand::from_i32(cmd) else {
            error!("Display command {} not supported", cmd);
            return -1;
        };

        let result = match command {
            DisplayCommand::SetParameter => {
                self.set_display_parameter(param0, param1, param2);
                Ok(0)
            }
            DisplayCommand::ChangeMode => self.device.change_mode(param0, param1, param2),
            DisplayCommand::Open => {
                self.settings.lock().open[slot(param0)] = true;
                self.device.open_display(param0)
            }
            DisplayCommand::Close => {
                self.settings.lock().open[slot(param0)] = false;
                self.device.close_display(param0)
            }
            DisplayCommand::HdmiStatus => self.device.hdmi_status(),
            DisplayCommand::TvStatus => self.device.tv_dac_status(),
            DisplayCommand::GetParameter => self.device.display_parameter(param0, param1),
            DisplayCommand::SetMaster => {
                let result = self.device.set_master_display(param0);
                if result.is_ok() {
                    self.settings.lock().params.master = param0;
                }
                result
            }
            DisplayCommand::GetMaster => self.device.master_display(),
            DisplayCommand::MaxWidthDisplay => self.device.max_width_display(),
            DisplayCommand::MaxHdmiMode => self.device.max_hdmi_mode(),
            DisplayCommand::DisplayMode => self.device.display_mode(),
            DisplayCommand::DisplayCount => self.device.display_count(),
            DisplayCommand::SetDisplayMode => {
                let params = self.mode_params();
                info!("Setting display mode {} ({:?})", param0, params);
                self.device.set_display_mode(param0, &params)
            }
        };

        result.unwrap_or_else(|e| {
            warn!("Display command {:?} failed: {}", command, e);
            -1
        })
    }

    /// Cache output type, format or pixel format for a display
    ///
    /// A known output type records the type and takes `value1` as its
    /// format. Anything else stores `value1` as the pixel format.
    fn set_display_parameter(&self, display: i32, value0: i32, value1: i32) {
        let index = slot(display);
        let mut settings = self.settings.lock();
        match OutputType::from_i32(value0) {
            Some(OutputType::Lcd) => settings.params.types[index] = value0,
            Some(OutputType::Tv | OutputType::Hdmi | OutputType::Vga) => {
                settings.params.types[index] = value0;
                settings.params.formats[index] = value1;
            }
            _ => settings.params.pixel_formats[index] = value1,
        }
    }

    /// Stop the swap thread
    pub fn shutdown(&mut self) {
        self.swap.shutdown();
    }
}

/// Display 0 is the first slot; every other number maps to the second
fn slot(display: i32) -> usize {
    usize::from(display != 0)
}
