use std::fmt;
use std::io;

use packetwire_frame::FrameError;
use packetwire_packet::{PacketError, RequestError};
use packetwire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotFound
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidMode(_) | FrameError::BodyTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn packet_error(context: &str, err: PacketError) -> CliError {
    match err {
        PacketError::Frame(err) => frame_error(context, err),
        PacketError::Codec(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

/// Exit code for a request that did not produce a response.
pub fn request_code(err: &RequestError) -> i32 {
    match err {
        RequestError::Rejected(_) | RequestError::Closed { .. } => FAILURE,
        RequestError::UnexpectedKind { .. } => DATA_INVALID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_by_kind() {
        let err = io_error("connect failed", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.code, PERMISSION_DENIED);
        assert!(err.message.starts_with("connect failed: "));

        let err = io_error("connect failed", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn packet_errors_unwrap_frame_errors() {
        let err = packet_error("queue failed", PacketError::Frame(FrameError::Closed));
        assert_eq!(err.code, FAILURE);

        let err = packet_error(
            "read failed",
            PacketError::Frame(FrameError::BodyTooLarge {
                size: 70_000,
                max: 65_535,
            }),
        );
        assert_eq!(err.code, DATA_INVALID);

        let err = packet_error("setup failed", PacketError::DuplicateType(1));
        assert_eq!(err.code, INTERNAL);
    }

    #[test]
    fn transport_path_errors_are_transport_failures() {
        let err = transport_error(
            "bind failed",
            TransportError::PathTooLong {
                path: "/x".into(),
                len: 200,
                max: 107,
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn request_errors_pick_codes() {
        assert_eq!(request_code(&RequestError::Rejected("no".into())), FAILURE);
        assert_eq!(
            request_code(&RequestError::UnexpectedKind {
                expected: "Pong",
                actual: "Ping"
            }),
            DATA_INVALID
        );
    }
}
