//! Content digests and sizes of files on disk.
//!
//! Both peers run the same functions: the server to announce a file in
//! `Metadata`, the client to verify what it wrote.

use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Files are hashed in blocks of this size; never loaded whole.
pub const HASH_BLOCK_SIZE: usize = 8 * 1024;

pub const DIGEST_LEN: usize = 32;

/// SHA-256 of a file's full content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Parse 64 hex characters (either case). `None` on anything else.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut out = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut out).ok()?;
        Some(Self(out))
    }

    /// Lowercase hex rendering, as carried on the wire.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Digest of the empty byte sequence.
    pub fn empty() -> Self {
        digest_of(&[])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug)]
pub enum IntegrityError {
    NotFound(String),
    Io(io::Error),
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::NotFound(p) => write!(f, "file not found: {p}"),
            IntegrityError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for IntegrityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntegrityError::Io(e) => Some(e),
            IntegrityError::NotFound(_) => None,
        }
    }
}

fn map_open_err(path: &Path, e: io::Error) -> IntegrityError {
    if e.kind() == io::ErrorKind::NotFound {
        IntegrityError::NotFound(path.display().to_string())
    } else {
        IntegrityError::Io(e)
    }
}

pub fn digest_of(bytes: &[u8]) -> Digest {
    Digest(Sha256::digest(bytes).into())
}

/// Stream `path` through SHA-256.
pub fn checksum(path: &Path) -> Result<Digest, IntegrityError> {
    let mut file = File::open(path).map_err(|e| map_open_err(path, e))?;
    digest_reader(&mut file).map_err(IntegrityError::Io)
}

/// Hash everything `r` yields until end of stream.
pub fn digest_reader<R: Read>(r: &mut R) -> io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        match r.read(&mut block) {
            Ok(0) => break,
            Ok(n) => hasher.update(&block[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Digest(hasher.finalize().into()))
}

/// Byte length of the file at `path`.
pub fn size(path: &Path) -> Result<u64, IntegrityError> {
    let meta = std::fs::metadata(path).map_err(|e| map_open_err(path, e))?;
    if !meta.is_file() {
        return Err(IntegrityError::NotFound(path.display().to_string()));
    }
    Ok(meta.len())
}
