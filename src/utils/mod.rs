//! Utility module for cedarplayer
//!
//! This module provides common utilities used throughout the crate:
//! - Error handling with custom error types
//! - Configuration management
//! - Unit conversion between the engine/API edge (milliseconds) and the
//!   session's internal clock (microseconds)

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{Config, DisplayConfig, GeneralConfig, SelectionConfig, SubtitleConfig};
pub use error::{IntoPlayerError, PlayerError, Result};

/// Initialize the crate configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
///
/// # Returns
///
/// Returns the loaded configuration or an error if loading fails
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Convert milliseconds to microseconds
pub fn ms_to_us(ms: i64) -> i64 {
    ms.saturating_mul(1000)
}

/// Convert microseconds to milliseconds, truncating
pub fn us_to_ms(us: i64) -> i64 {
    us / 1000
}

/// Convert microseconds to milliseconds rounding to the nearest value
///
/// This is the conversion used when a position leaves the crate through the
/// client API.
pub fn us_to_ms_rounded(us: i64) -> i64 {
    (us + 500) / 1000
}

/// Format a microsecond position for display
///
/// # Arguments
///
/// * `us` - Position in microseconds
///
/// # Returns
///
/// Formatted string in the format "HH:MM:SS.mmm" or "MM:SS.mmm" for
/// positions under an hour
pub fn format_position(us: i64) -> String {
    let total_ms = us.max(0) / 1000;
    let millis = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
    }
}
