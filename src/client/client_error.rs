use std::{fmt, io};

use crate::chat::ChatError;
use crate::protocol::FrameError;
use crate::transfer::TransferError;

#[derive(Debug)]
pub enum ClientError {
    Connect(io::Error),
    Transfer(TransferError),
    Chat(ChatError),
    Frame(FrameError),
    /// An earlier transport failure left the connection unusable.
    Disconnected,
}

impl ClientError {
    /// The driver must reconnect before issuing another command.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Connect(_) | ClientError::Frame(_) | ClientError::Disconnected => true,
            ClientError::Transfer(e) => e.is_transport(),
            ClientError::Chat(_) => true,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Connect(e) => write!(f, "cannot connect: {e}"),
            ClientError::Transfer(e) => write!(f, "{e}"),
            ClientError::Chat(e) => write!(f, "{e}"),
            ClientError::Frame(e) => write!(f, "{e}"),
            ClientError::Disconnected => write!(f, "connection to server lost"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Connect(e) => Some(e),
            ClientError::Transfer(e) => Some(e),
            ClientError::Chat(e) => Some(e),
            ClientError::Frame(e) => Some(e),
            ClientError::Disconnected => None,
        }
    }
}

impl From<TransferError> for ClientError {
    fn from(e: TransferError) -> Self {
        ClientError::Transfer(e)
    }
}

impl From<ChatError> for ClientError {
    fn from(e: ChatError) -> Self {
        ClientError::Chat(e)
    }
}

impl From<FrameError> for ClientError {
    fn from(e: FrameError) -> Self {
        ClientError::Frame(e)
    }
}
