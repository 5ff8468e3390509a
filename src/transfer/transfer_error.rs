use std::fmt;

use crate::integrity::Digest;
use crate::protocol::{FrameError, Msg};
use crate::store::StoreError;

#[derive(Debug)]
pub enum TransferError {
    /// The server has no such file (or the name was not servable).
    NotFound(String),
    /// Rejected locally before anything was sent.
    InvalidName(String),
    /// `Metadata` echoed a different name than the one requested.
    NameMismatch { requested: String, echoed: String },
    /// Nack, ack timeout or a peer that stopped cooperating mid-transfer.
    TransferAborted(String),
    /// The local copy does not match the announced size or digest.
    VerificationFailed {
        expected_size: u64,
        actual_size: u64,
        expected_digest: Digest,
        actual_digest: Digest,
    },
    ServerError(String),
    BadRequest(String),
    /// A well-formed frame that has no place at this point of the exchange.
    UnexpectedMsg(Msg),
    Frame(FrameError),
    Store(StoreError),
}

impl TransferError {
    /// The connection itself failed; the byte stream cannot be reused.
    pub fn is_transport(&self) -> bool {
        matches!(self, TransferError::Frame(_))
    }

    /// Re-running the whole request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::VerificationFailed { .. })
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::NotFound(name) => write!(f, "file not found on server: {name}"),
            TransferError::InvalidName(why) => write!(f, "invalid file name: {why}"),
            TransferError::NameMismatch { requested, echoed } => write!(
                f,
                "server announced {echoed:?} but {requested:?} was requested"
            ),
            TransferError::TransferAborted(why) => write!(f, "transfer aborted: {why}"),
            TransferError::VerificationFailed {
                expected_size,
                actual_size,
                expected_digest,
                actual_digest,
            } => write!(
                f,
                "verification failed: expected {expected_size} bytes / {expected_digest}, \
                 got {actual_size} bytes / {actual_digest}"
            ),
            TransferError::ServerError(reason) => write!(f, "server error: {reason}"),
            TransferError::BadRequest(reason) => write!(f, "bad request: {reason}"),
            TransferError::UnexpectedMsg(msg) => write!(f, "unexpected {} frame", msg.name()),
            TransferError::Frame(e) => write!(f, "{e}"),
            TransferError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Frame(e) => Some(e),
            TransferError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FrameError> for TransferError {
    fn from(e: FrameError) -> Self {
        TransferError::Frame(e)
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        TransferError::Store(e)
    }
}
