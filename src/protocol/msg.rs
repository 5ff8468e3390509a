// ---- Public message enum --------------------------------------------------

use bytes::Bytes;

use crate::integrity::Digest;
use crate::protocol::{
    FrameKind, STATUS_ACCEPTED, STATUS_BAD_REQUEST, STATUS_NOT_FOUND, STATUS_OK,
    STATUS_SERVER_ERROR,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    // Commands (client → server)
    File {
        name: String,
    },
    Chat,
    Exit,

    // Status (server → client)
    NotFound {
        name: String,
    },
    Metadata {
        name: String,
        size: u64,
        digest: Digest,
    },
    Chunk {
        data: Bytes,
    },
    ServerError {
        reason: String,
    },
    BadRequest {
        reason: String,
    },
    Joined {
        text: String,
    },

    // Flow control (both directions)
    Eof,
    Ack,
    Nack,

    // Chat room
    ChatMessage {
        text: String,
    },
    ChatBroadcast {
        from: String,
        text: String,
    },
    JoinAnnouncement {
        peer: String,
    },
    LeaveAnnouncement {
        peer: String,
    },
    Leave,
    Left,
}

impl Msg {
    pub fn kind(&self) -> FrameKind {
        match self {
            Msg::File { .. } => FrameKind::File,
            Msg::Chat => FrameKind::Chat,
            Msg::Exit => FrameKind::Exit,
            Msg::NotFound { .. } => FrameKind::NotFound,
            Msg::Metadata { .. } => FrameKind::Metadata,
            Msg::Chunk { .. } => FrameKind::Chunk,
            Msg::ServerError { .. } => FrameKind::ServerError,
            Msg::BadRequest { .. } => FrameKind::BadRequest,
            Msg::Joined { .. } => FrameKind::Joined,
            Msg::Eof => FrameKind::Eof,
            Msg::Ack => FrameKind::Ack,
            Msg::Nack => FrameKind::Nack,
            Msg::ChatMessage { .. } => FrameKind::ChatMessage,
            Msg::ChatBroadcast { .. } => FrameKind::ChatBroadcast,
            Msg::JoinAnnouncement { .. } => FrameKind::JoinAnnouncement,
            Msg::LeaveAnnouncement { .. } => FrameKind::LeaveAnnouncement,
            Msg::Leave => FrameKind::Leave,
            Msg::Left => FrameKind::Left,
        }
    }

    /// HTTP-like status code of a status/chunk frame.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Msg::NotFound { .. } => Some(STATUS_NOT_FOUND),
            Msg::Metadata { .. } => Some(STATUS_ACCEPTED),
            Msg::Chunk { .. } | Msg::Joined { .. } => Some(STATUS_OK),
            Msg::ServerError { .. } => Some(STATUS_SERVER_ERROR),
            Msg::BadRequest { .. } => Some(STATUS_BAD_REQUEST),
            _ => None,
        }
    }

    /// Short variant name for logging; never includes payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Msg::File { .. } => "FILE",
            Msg::Chat => "CHAT",
            Msg::Exit => "EXIT",
            Msg::NotFound { .. } => "NotFound",
            Msg::Metadata { .. } => "Metadata",
            Msg::Chunk { .. } => "Chunk",
            Msg::ServerError { .. } => "ServerError",
            Msg::BadRequest { .. } => "BadRequest",
            Msg::Joined { .. } => "Joined",
            Msg::Eof => "Eof",
            Msg::Ack => "Ack",
            Msg::Nack => "Nack",
            Msg::ChatMessage { .. } => "ChatMessage",
            Msg::ChatBroadcast { .. } => "ChatBroadcast",
            Msg::JoinAnnouncement { .. } => "JoinAnnouncement",
            Msg::LeaveAnnouncement { .. } => "LeaveAnnouncement",
            Msg::Leave => "Leave",
            Msg::Left => "Left",
        }
    }
}
