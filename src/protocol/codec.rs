use super::{FrameKind, Msg, ProtoError};
use crate::integrity::Digest;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use std::str;

// ---- Encode to body bytes -------------------------------------------------

pub fn encode_msg(msg: &Msg) -> Result<(FrameKind, Vec<u8>), ProtoError> {
    use Msg::*;
    let mut body = Vec::new();

    match msg {
        File { name } | NotFound { name } => put_str16(&mut body, name)?,
        Metadata { name, size, digest } => {
            put_str16(&mut body, name)?;
            put_u64(&mut body, *size);
            put_str16(&mut body, &digest.to_hex())?;
        }
        Chunk { data } => body.extend_from_slice(data),
        ServerError { reason } | BadRequest { reason } => put_str16(&mut body, reason)?,
        Joined { text } | ChatMessage { text } => put_str16(&mut body, text)?,
        ChatBroadcast { from, text } => {
            put_str16(&mut body, from)?;
            put_str16(&mut body, text)?;
        }
        JoinAnnouncement { peer } | LeaveAnnouncement { peer } => put_str16(&mut body, peer)?,
        Chat | Exit | Eof | Ack | Nack | Leave | Left => {}
    }

    Ok((msg.kind(), body))
}

// ---- Decode from body bytes ----------------------------------------------

/// Decodes a frame body. Takes ownership so chunk payloads are not copied.
pub fn decode_msg(kind: FrameKind, body: Vec<u8>) -> Result<Msg, ProtoError> {
    use Msg::*;

    if kind == FrameKind::Chunk {
        return Ok(Chunk {
            data: Bytes::from(body),
        });
    }

    let mut cursor = Cursor::new(&body);

    let msg = match kind {
        FrameKind::File => File {
            name: cursor.get_str16()?.to_owned(),
        },
        FrameKind::Chat => Chat,
        FrameKind::Exit => Exit,
        FrameKind::NotFound => NotFound {
            name: cursor.get_str16()?.to_owned(),
        },
        FrameKind::Metadata => {
            let name = cursor.get_str16()?.to_owned();
            let size = cursor.get_u64()?;
            let digest = Digest::from_hex(cursor.get_str16()?)
                .ok_or(ProtoError::InvalidFormat("digest is not 64 hex characters"))?;
            Metadata { name, size, digest }
        }
        FrameKind::Chunk => unreachable!("handled above"),
        FrameKind::ServerError => ServerError {
            reason: cursor.get_str16()?.to_owned(),
        },
        FrameKind::BadRequest => BadRequest {
            reason: cursor.get_str16()?.to_owned(),
        },
        FrameKind::Joined => Joined {
            text: cursor.get_str16()?.to_owned(),
        },
        FrameKind::Eof => Eof,
        FrameKind::Ack => Ack,
        FrameKind::Nack => Nack,
        FrameKind::ChatMessage => ChatMessage {
            text: cursor.get_str16()?.to_owned(),
        },
        FrameKind::ChatBroadcast => {
            let from = cursor.get_str16()?.to_owned();
            let text = cursor.get_str16()?.to_owned();
            ChatBroadcast { from, text }
        }
        FrameKind::JoinAnnouncement => JoinAnnouncement {
            peer: cursor.get_str16()?.to_owned(),
        },
        FrameKind::LeaveAnnouncement => LeaveAnnouncement {
            peer: cursor.get_str16()?.to_owned(),
        },
        FrameKind::Leave => Leave,
        FrameKind::Left => Left,
    };

    cursor.finish()?;
    Ok(msg)
}

// ---- Primitive write helpers ---------------------------------------------

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// str16 = u16 length + UTF-8 bytes
fn put_str16(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtoError> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    if len > u16::MAX as usize {
        return Err(ProtoError::StringTooLong {
            max: u16::MAX as usize,
            actual: len,
        });
    }

    put_u16(buf, len as u16);
    buf.extend_from_slice(bytes);
    Ok(())
}

// ---- Cursor for decoding --------------------------------------------------

#[derive(Debug)]
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtoError> {
        if self.buf.len() < len {
            return Err(ProtoError::Truncated);
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }

    fn get_u16(&mut self) -> Result<u16, ProtoError> {
        self.get_bytes(2).map(BigEndian::read_u16)
    }

    fn get_u64(&mut self) -> Result<u64, ProtoError> {
        self.get_bytes(8).map(BigEndian::read_u64)
    }

    /// Read str16 = u16 length + UTF-8 bytes
    fn get_str16(&mut self) -> Result<&'a str, ProtoError> {
        let len = self.get_u16()? as usize;
        let bytes = self.get_bytes(len)?;
        str::from_utf8(bytes).map_err(|_| ProtoError::InvalidUtf8)
    }

    /// Enforce that we've consumed the whole body.
    fn finish(self) -> Result<(), ProtoError> {
        if !self.buf.is_empty() {
            Err(ProtoError::InvalidFormat("trailing bytes in message body"))
        } else {
            Ok(())
        }
    }
}
