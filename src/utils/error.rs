//! Error types for cedarplayer
//!
//! This module defines the error taxonomy shared by the session, the client
//! proxy and the display dispatcher. We use thiserror for the library error
//! type; anyhow is only used by the binary and the tests.

use crate::player::State;
use thiserror::Error;

/// Status codes carried by the request/response protocol.
pub mod status {
    pub const OK: i32 = 0;
    pub const NO_INIT: i32 = -19;
    pub const BAD_VALUE: i32 = -22;
    pub const INVALID_OPERATION: i32 = -38;
    pub const UNKNOWN_ERROR: i32 = i32::MIN;
}

/// Main error type for cedarplayer
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Command issued in a state that does not accept it
    #[error("{operation} is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: State,
    },

    /// The same asynchronous operation is already in flight
    #[error("{0} already pending")]
    OperationPending(&'static str),

    /// Argument rejected before any command was issued
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No player has been attached to the client yet
    #[error("No player attached")]
    NoPlayer,

    /// The command channel itself failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The engine answered with a failure status
    #[error("Engine rejected {command} with status {code}")]
    Engine { command: &'static str, code: i32 },

    /// Preparation was aborted by the engine
    #[error("Prepare failed with status {code}")]
    PrepareFailed { code: i32 },

    /// Audio player or renderer construction failed
    #[error("Resource error: {0}")]
    Resource(String),

    /// Display device errors
    #[error("Display error: {0}")]
    Display(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),
}

impl PlayerError {
    /// Create a transport error from anything printable
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        PlayerError::Transport(msg.into())
    }

    /// Whether this error was detected locally before any command was issued
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            PlayerError::InvalidState { .. }
                | PlayerError::OperationPending(_)
                | PlayerError::InvalidArgument(_)
                | PlayerError::NoPlayer
        )
    }

    /// Numeric status reported over the request/response protocol
    pub fn status(&self) -> i32 {
        match self {
            PlayerError::InvalidState { .. } | PlayerError::OperationPending(_) => {
                status::INVALID_OPERATION
            }
            PlayerError::InvalidArgument(_) => status::BAD_VALUE,
            PlayerError::NoPlayer => status::NO_INIT,
            PlayerError::Engine { code, .. } | PlayerError::PrepareFailed { code } => *code,
            _ => status::UNKNOWN_ERROR,
        }
    }
}

/// Convenience type alias for Results in cedarplayer
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Extension trait for converting other errors to PlayerError
pub trait IntoPlayerError<T> {
    /// Convert this error into a PlayerError with the given context
    fn transport_err(self, context: &str) -> Result<T>;
    fn resource_err(self, context: &str) -> Result<T>;
    fn display_err(self, context: &str) -> Result<T>;
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoPlayerError<T> for std::result::Result<T, E> {
    fn transport_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Transport(format!("{}: {}", context, e)))
    }

    fn resource_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Resource(format!("{}: {}", context, e)))
    }

    fn display_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Display(format!("{}: {}", context, e)))
    }

    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Config(format!("{}: {}", context, e)))
    }
}
