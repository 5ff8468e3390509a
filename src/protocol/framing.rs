use super::{FrameError, FrameKind, HEADER_LEN, MAX_BODY_LEN, PROTO_VERSION, ProtoError};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{self, Read, Write};

/// Write a single frame: [ver][kind][reserved u16=0][len u32][body...]
///
/// Header and body go out in one `write_all`, so a frame is never interleaved
/// with bytes from another frame written on the same stream.
pub fn write_frame<W: Write>(w: &mut W, kind: FrameKind, body: &[u8]) -> io::Result<()> {
    if body.len() > MAX_BODY_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "body too large",
        ));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.write_u8(PROTO_VERSION)?;
    frame.write_u8(kind.as_u8())?;
    frame.write_u16::<BigEndian>(0)?;
    frame.write_u32::<BigEndian>(body.len() as u32)?;
    frame.extend_from_slice(body);

    w.write_all(&frame)?;
    w.flush()?;
    Ok(())
}

/// Read a single frame, enforcing a max body length.
///
/// Reads exactly the 8 header bytes and then exactly `body_len` bytes, however
/// the transport splits or merges them. The body is consumed before the kind
/// byte is interpreted so an unknown kind leaves the stream on a frame
/// boundary.
pub fn read_frame<R: Read>(r: &mut R, max_body: usize) -> Result<(FrameKind, Vec<u8>), FrameError> {
    let mut header = [0u8; HEADER_LEN];

    match fill(r, &mut header)? {
        Fill::Done => {}
        Fill::Eof(0) => return Err(FrameError::Closed),
        Fill::TimedOut(0) => return Err(FrameError::Timeout),
        Fill::Eof(got) | Fill::TimedOut(got) => {
            return Err(FrameError::TruncatedFrame {
                expected: HEADER_LEN,
                got,
            });
        }
    }

    let ver = header[0];
    if ver != PROTO_VERSION {
        return Err(ProtoError::BadVersion(ver).into());
    }

    // flags (header[2..4]) are reserved
    let len = BigEndian::read_u32(&header[4..8]) as usize;
    if len > max_body {
        return Err(ProtoError::TooLarge {
            max: max_body,
            actual: len,
        }
        .into());
    }

    let mut body = vec![0u8; len];
    match fill(r, &mut body)? {
        Fill::Done => {}
        Fill::Eof(got) | Fill::TimedOut(got) => {
            return Err(FrameError::TruncatedFrame {
                expected: HEADER_LEN + len,
                got: HEADER_LEN + got,
            });
        }
    }

    let kind = FrameKind::from_u8(header[1])?;
    Ok((kind, body))
}

/// Outcome of trying to fill a buffer completely.
enum Fill {
    Done,
    /// End of stream after this many bytes.
    Eof(usize),
    /// Read deadline hit after this many bytes.
    TimedOut(usize),
}

fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<Fill> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Ok(Fill::Eof(filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Socket read timeouts surface as WouldBlock on Unix, TimedOut on Windows.
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(Fill::TimedOut(filled));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Fill::Done)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per `read`, like a congested socket.
    struct Dribble {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Dribble {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    /// Yields its bytes, then reports a read timeout forever.
    struct Stalls(Cursor<Vec<u8>>);

    impl Read for Stalls {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::WouldBlock, "deadline")),
                n => Ok(n),
            }
        }
    }

    fn frame_bytes(kind: FrameKind, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_frame(&mut out, kind, body).unwrap();
        out
    }

    #[test]
    fn header_layout_is_fixed() {
        let bytes = frame_bytes(FrameKind::Chunk, b"abc");
        assert_eq!(&bytes[..8], &[1, 0x12, 0, 0, 0, 0, 0, 3]);
        assert_eq!(&bytes[8..], b"abc");
    }

    #[test]
    fn one_byte_reads_still_yield_whole_frames() {
        let mut data = frame_bytes(FrameKind::Chunk, &[7u8; 300]);
        data.extend(frame_bytes(FrameKind::Ack, &[]));
        let mut r = Dribble { data, pos: 0, step: 1 };

        let (k1, b1) = read_frame(&mut r, MAX_BODY_LEN).unwrap();
        assert_eq!(k1, FrameKind::Chunk);
        assert_eq!(b1, vec![7u8; 300]);

        let (k2, b2) = read_frame(&mut r, MAX_BODY_LEN).unwrap();
        assert_eq!(k2, FrameKind::Ack);
        assert!(b2.is_empty());

        assert!(matches!(read_frame(&mut r, MAX_BODY_LEN), Err(FrameError::Closed)));
    }

    #[test]
    fn concatenated_frames_are_not_merged() {
        let mut data = frame_bytes(FrameKind::ChatMessage, b"one");
        data.extend(frame_bytes(FrameKind::ChatMessage, b"two"));
        let mut r = Dribble { data, pos: 0, step: 4096 };

        assert_eq!(read_frame(&mut r, MAX_BODY_LEN).unwrap().1, b"one");
        assert_eq!(read_frame(&mut r, MAX_BODY_LEN).unwrap().1, b"two");
    }

    #[test]
    fn eof_inside_header_is_truncation() {
        let data = frame_bytes(FrameKind::Eof, &[]);
        let mut r = Cursor::new(data[..5].to_vec());
        match read_frame(&mut r, MAX_BODY_LEN) {
            Err(FrameError::TruncatedFrame { expected, got }) => {
                assert_eq!((expected, got), (8, 5));
            }
            other => panic!("expected TruncatedFrame, got {other:?}"),
        }
    }

    #[test]
    fn eof_inside_body_is_truncation() {
        let data = frame_bytes(FrameKind::Chunk, &[1u8; 100]);
        let mut r = Cursor::new(data[..50].to_vec());
        match read_frame(&mut r, MAX_BODY_LEN) {
            Err(FrameError::TruncatedFrame { expected, got }) => {
                assert_eq!((expected, got), (108, 50));
            }
            other => panic!("expected TruncatedFrame, got {other:?}"),
        }
    }

    #[test]
    fn deadline_before_first_byte_is_timeout() {
        let mut r = Stalls(Cursor::new(Vec::new()));
        assert!(matches!(read_frame(&mut r, MAX_BODY_LEN), Err(FrameError::Timeout)));
    }

    #[test]
    fn deadline_mid_frame_is_truncation() {
        let data = frame_bytes(FrameKind::Chunk, &[1u8; 10]);
        let mut r = Stalls(Cursor::new(data[..12].to_vec()));
        assert!(matches!(
            read_frame(&mut r, MAX_BODY_LEN),
            Err(FrameError::TruncatedFrame { expected: 18, got: 12 })
        ));
    }

    #[test]
    fn oversized_body_is_rejected_before_allocation() {
        let mut data = frame_bytes(FrameKind::Chunk, &[]);
        data[4..8].copy_from_slice(&(u32::MAX).to_be_bytes());
        let mut r = Cursor::new(data);
        assert!(matches!(
            read_frame(&mut r, MAX_BODY_LEN),
            Err(FrameError::Proto(ProtoError::TooLarge { .. }))
        ));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut data = frame_bytes(FrameKind::Ack, &[]);
        data[0] = 9;
        let mut r = Cursor::new(data);
        assert!(matches!(
            read_frame(&mut r, MAX_BODY_LEN),
            Err(FrameError::Proto(ProtoError::BadVersion(9)))
        ));
    }

    #[test]
    fn unknown_kind_leaves_stream_aligned() {
        let mut data = frame_bytes(FrameKind::Chunk, b"xyz");
        data[1] = 0x7e;
        data.extend(frame_bytes(FrameKind::Ack, &[]));
        let mut r = Cursor::new(data);

        assert!(matches!(
            read_frame(&mut r, MAX_BODY_LEN),
            Err(FrameError::Proto(ProtoError::UnknownKind(0x7e)))
        ));
        assert_eq!(read_frame(&mut r, MAX_BODY_LEN).unwrap().0, FrameKind::Ack);
    }
}
