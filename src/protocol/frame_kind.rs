// ---- Frame kind byte ------------------------------------------------------

use crate::protocol::ProtoError;

/// Broad semantic class of a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameCategory {
    Command,
    Status,
    Chunk,
    Control,
    Chat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum FrameKind {
    File = 0x01,
    Chat = 0x02,
    Exit = 0x03,

    NotFound = 0x10,
    Metadata = 0x11,
    Chunk = 0x12,
    ServerError = 0x13,
    BadRequest = 0x14,
    Joined = 0x15,

    Eof = 0x20,
    Ack = 0x21,
    Nack = 0x22,

    ChatMessage = 0x30,
    ChatBroadcast = 0x31,
    JoinAnnouncement = 0x32,
    LeaveAnnouncement = 0x33,
    Leave = 0x34,
    Left = 0x35,
}

impl FrameKind {
    pub fn from_u8(v: u8) -> Result<FrameKind, ProtoError> {
        use FrameKind::*;
        match v {
            0x01 => Ok(File),
            0x02 => Ok(Chat),
            0x03 => Ok(Exit),
            0x10 => Ok(NotFound),
            0x11 => Ok(Metadata),
            0x12 => Ok(Chunk),
            0x13 => Ok(ServerError),
            0x14 => Ok(BadRequest),
            0x15 => Ok(Joined),
            0x20 => Ok(Eof),
            0x21 => Ok(Ack),
            0x22 => Ok(Nack),
            0x30 => Ok(ChatMessage),
            0x31 => Ok(ChatBroadcast),
            0x32 => Ok(JoinAnnouncement),
            0x33 => Ok(LeaveAnnouncement),
            0x34 => Ok(Leave),
            0x35 => Ok(Left),
            other => Err(ProtoError::UnknownKind(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn category(self) -> FrameCategory {
        use FrameKind::*;
        match self {
            File | Chat | Exit => FrameCategory::Command,
            NotFound | Metadata | ServerError | BadRequest | Joined => FrameCategory::Status,
            Chunk => FrameCategory::Chunk,
            Eof | Ack | Nack => FrameCategory::Control,
            ChatMessage | ChatBroadcast | JoinAnnouncement | LeaveAnnouncement | Leave | Left => {
                FrameCategory::Chat
            }
        }
    }
}
