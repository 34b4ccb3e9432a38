//! Request/response protocol carried between remote callers and a client
//!
//! Requests are JSON objects tagged by `method`; responses carry the numeric
//! status and an optional value. Times are in milliseconds.

use crate::engine::DataSource;
use crate::utils::error::{status, PlayerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A call on the client command surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    SetDataSource { source: DataSource },
    SetVideoSurface { attached: bool },
    Prepare,
    PrepareAsync,
    Start,
    Pause,
    Stop,
    Reset,
    SeekTo { msec: i64 },
    GetCurrentPosition,
    GetDuration,
    IsPlaying,
    SetLooping { looping: bool },
    IsLooping,
    Suspend,
    Resume,
    SetScreen { screen: i32 },
    GetScreen,

    SetSubGate { enabled: bool },
    GetSubGate,
    SetSubColor { color: u32 },
    GetSubColor,
    SetSubFrameColor { color: u32 },
    GetSubFrameColor,
    SetSubFontSize { size: i32 },
    GetSubFontSize,
    SetSubPosition { percent: i32 },
    GetSubPosition,
    SetSubDelay { msec: i32 },
    GetSubDelay,
    SetSubCharset { charset: String },
    GetSubCharset,
    GetSubCount,
    GetSubList,
    GetCurSub,
    SwitchSub { index: i32 },

    GetTrackCount,
    GetTrackList,
    GetCurTrack,
    SwitchTrack { index: i32 },

    SetInputDimensionType { code: i32 },
    SetOutputDimensionType { code: i32 },
    SetAnaglyphType { code: i32 },

    SetVppGate { enabled: bool },
    SetLumaSharp { value: i32 },
    SetChromaSharp { value: i32 },
    SetWhiteExtend { value: i32 },
    SetBlackExtend { value: i32 },
    SetScaleMode { enabled: bool, width: i32, height: i32 },

    Disconnect,
}

/// Reply to a [`Request`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: i32,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: status::OK,
            value: Value::Null,
        }
    }

    /// Successful response carrying a value
    pub fn value<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self {
                status: status::OK,
                value,
            },
            Err(e) => Self::error(&PlayerError::InvalidArgument(e.to_string())),
        }
    }

    pub fn error(err: &PlayerError) -> Self {
        Self {
            status: err.status(),
            value: Value::Null,
        }
    }

    /// Status-only response for an operation result
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::error(&e),
        }
    }

    /// Response carrying the value of a successful query
    pub fn from_value<T: Serialize>(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::value(value),
            Err(e) => Self::error(&e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }
}
