use std::fmt;

use crate::error::{FrameError, Result};

/// Frame mode, carried as a `u16` ordinal in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Mode {
    Request = 0,
    ResponseSucceeded = 1,
    ResponseFailed = 2,
    Notify = 3,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::Request,
        Mode::ResponseSucceeded,
        Mode::ResponseFailed,
        Mode::Notify,
    ];

    /// Parse a wire ordinal. Unknown ordinals are a protocol violation.
    pub fn from_wire(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Mode::Request),
            1 => Ok(Mode::ResponseSucceeded),
            2 => Ok(Mode::ResponseFailed),
            3 => Ok(Mode::Notify),
            other => Err(FrameError::InvalidMode(other)),
        }
    }

    pub fn as_wire(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Request => "REQUEST",
            Mode::ResponseSucceeded => "RESPONSE_SUCCEEDED",
            Mode::ResponseFailed => "RESPONSE_FAILED",
            Mode::Notify => "NOTIFY",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
