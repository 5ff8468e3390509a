use std::{fmt, io};

/// Protocol-level errors (body parsing/format issues, etc.).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    UnknownKind(u8),
    BadVersion(u8),
    Truncated,
    InvalidUtf8,
    TooLarge { max: usize, actual: usize },
    InvalidFormat(&'static str),
    StringTooLong { max: usize, actual: usize },
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(k) => write!(f, "unknown frame kind 0x{k:02x}"),
            Self::BadVersion(v) => write!(f, "unsupported protocol version {v}"),
            Self::Truncated => write!(f, "frame body truncated"),
            Self::InvalidUtf8 => write!(f, "invalid UTF-8 in frame body"),
            Self::TooLarge { max, actual } => {
                write!(f, "frame body of {actual} bytes exceeds limit of {max}")
            }
            Self::InvalidFormat(why) => write!(f, "invalid frame format: {why}"),
            Self::StringTooLong { max, actual } => {
                write!(f, "string of {actual} bytes exceeds limit of {max}")
            }
        }
    }
}

impl std::error::Error for ProtoError {}

/// Frame-level error: transport faults vs malformed frames.
#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    Proto(ProtoError),
    /// The peer closed the stream cleanly on a frame boundary.
    Closed,
    /// The stream ended (or stalled past its deadline) part-way through a
    /// frame; the byte stream can no longer be trusted.
    TruncatedFrame { expected: usize, got: usize },
    /// No frame started arriving before the read deadline.
    Timeout,
}

impl FrameError {
    /// True when the connection can keep being used after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Proto(e) => write!(f, "protocol error: {e}"),
            Self::Closed => write!(f, "connection closed by peer"),
            Self::TruncatedFrame { expected, got } => {
                write!(f, "truncated frame: expected {expected} bytes, got {got}")
            }
            Self::Timeout => write!(f, "timed out waiting for a frame"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Proto(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ProtoError> for FrameError {
    fn from(e: ProtoError) -> Self {
        Self::Proto(e)
    }
}
