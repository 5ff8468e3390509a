/// Protocol constants and header layout.
///
/// Header:
///   [ver: u8][kind: u8][flags: u16][body_len: u32]
/// Body:
///   [payload bytes...], up to `MAX_BODY_LEN`.
pub const PROTO_VERSION: u8 = 1;

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Maximum allowed body size for a frame (to avoid OOM).
pub const MAX_BODY_LEN: usize = 1_048_576; // 1 MiB

/// Default upper bound on the payload of one `Chunk` frame.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Typed by the chat user to leave the room.
pub const EXIT_COMMAND: &str = "/exit";

// Status codes carried alongside the status frames, mirroring HTTP semantics.
pub const STATUS_OK: u16 = 200;
pub const STATUS_ACCEPTED: u16 = 202;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_SERVER_ERROR: u16 = 500;
