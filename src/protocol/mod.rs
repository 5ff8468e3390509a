pub mod codec;
pub mod constants;
pub mod errors;
pub mod frame_kind;
pub mod framing;
pub mod msg;

pub use codec::{decode_msg, encode_msg};
pub use constants::*;
pub use errors::{FrameError, ProtoError};
pub use frame_kind::{FrameCategory, FrameKind};
pub use framing::{read_frame, write_frame};
pub use msg::Msg;

use std::io::{Read, Write};

/// Encode `msg` and write it as one frame.
pub fn write_msg<W: Write>(w: &mut W, msg: &Msg) -> Result<(), FrameError> {
    let (kind, body) = encode_msg(msg)?;
    write_frame(w, kind, &body)?;
    Ok(())
}

/// Read one frame and decode it into a `Msg`.
pub fn read_msg<R: Read>(r: &mut R) -> Result<Msg, FrameError> {
    let (kind, body) = read_frame(r, MAX_BODY_LEN)?;
    Ok(decode_msg(kind, body)?)
}
