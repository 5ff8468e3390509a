use sha2::{Digest as _, Sha256};

use crate::integrity::Digest;
use crate::transfer::TransferError;

/// Receiver-side bookkeeping for one transfer in progress.
///
/// Lives from the matching `Metadata` until `Eof` or abort.
#[derive(Debug, Clone)]
pub struct FileTransferSession {
    file_name: String,
    expected_size: u64,
    expected_digest: Digest,
    bytes_received: u64,
    chunks_received: u32,
    hasher: Sha256,
}

impl FileTransferSession {
    pub fn new(file_name: impl Into<String>, expected_size: u64, expected_digest: Digest) -> Self {
        Self {
            file_name: file_name.into(),
            expected_size,
            expected_digest,
            bytes_received: 0,
            chunks_received: 0,
            hasher: Sha256::new(),
        }
    }

    /// Account for one chunk. Refuses data past the announced size.
    pub fn absorb(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        let total = self.bytes_received + chunk.len() as u64;
        if total > self.expected_size {
            return Err(TransferError::TransferAborted(format!(
                "received {total} bytes for {} but only {} were announced",
                self.file_name, self.expected_size
            )));
        }
        self.hasher.update(chunk);
        self.bytes_received = total;
        self.chunks_received += 1;
        Ok(())
    }

    /// Digest of everything absorbed so far.
    pub fn streamed_digest(&self) -> Digest {
        Digest::from_bytes(self.hasher.clone().finalize().into())
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn chunks_received(&self) -> u32 {
        self.chunks_received
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_received == self.expected_size
    }

    /// Compare what is on disk against the announced metadata.
    pub fn verify(&self, actual_size: u64, actual_digest: Digest) -> Result<(), TransferError> {
        if actual_size == self.expected_size && actual_digest == self.expected_digest {
            Ok(())
        } else {
            Err(TransferError::VerificationFailed {
                expected_size: self.expected_size,
                actual_size,
                expected_digest: self.expected_digest,
                actual_digest,
            })
        }
    }
}
