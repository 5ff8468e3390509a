use std::{fmt, io};

use crate::protocol::FrameError;

#[derive(Debug)]
pub enum ChatError {
    /// The connection is not a member of the room.
    NotJoined,
    Frame(FrameError),
    Io(io::Error),
    /// The server refused to admit us.
    Rejected(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::NotJoined => write!(f, "not a chat participant"),
            ChatError::Frame(e) => write!(f, "{e}"),
            ChatError::Io(e) => write!(f, "I/O error: {e}"),
            ChatError::Rejected(why) => write!(f, "chat join rejected: {why}"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::Frame(e) => Some(e),
            ChatError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FrameError> for ChatError {
    fn from(e: FrameError) -> Self {
        ChatError::Frame(e)
    }
}

impl From<io::Error> for ChatError {
    fn from(e: io::Error) -> Self {
        ChatError::Io(e)
    }
}
