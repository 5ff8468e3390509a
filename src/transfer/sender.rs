use std::fmt;
use std::io::{self, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::log::LogSink;
use crate::protocol::{FrameError, Msg};
use crate::store::{FileName, FileStore, StoreError};
use crate::transfer::TransferError;
use crate::transport::FramedChannel;
use crate::{sink_debug, sink_info, sink_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTransferState {
    AwaitingRequest,
    MetadataSent,
    Transferring,
    Completed,
}

impl fmt::Display for ServerTransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the server sent for one completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeReport {
    pub name: String,
    pub size: u64,
    pub chunks: u32,
}

/// Server half of the file transfer protocol.
pub struct FileSender {
    store: FileStore,
    chunk_size: usize,
    ack_timeout: Option<Duration>,
    log: Arc<dyn LogSink>,
}

impl FileSender {
    pub fn new(
        store: FileStore,
        chunk_size: usize,
        ack_timeout: Option<Duration>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            ack_timeout,
            log,
        }
    }

    /// Answer one `File { name }` request.
    ///
    /// Every error except `Frame` leaves the stream on a frame boundary, so
    /// the caller can go back to reading commands.
    pub fn serve(
        &self,
        chan: &mut FramedChannel<TcpStream>,
        peer: &str,
        requested: &str,
    ) -> Result<ServeReport, TransferError> {
        let mut state = ServerTransferState::AwaitingRequest;

        if let Err(e) = FileName::parse(requested) {
            sink_warn!(self.log, "[transfer] {peer}: refusing {requested:?}: {e}");
            chan.send(&Msg::NotFound {
                name: requested.to_owned(),
            })?;
            return Err(TransferError::NotFound(requested.to_owned()));
        }

        let (mut file, size, digest) = match self.open_with_metadata(requested) {
            Ok(found) => found,
            Err(StoreError::NotFound(_)) | Err(StoreError::InvalidName(_)) => {
                sink_info!(self.log, "[transfer] {peer}: {requested:?} not found");
                chan.send(&Msg::NotFound {
                    name: requested.to_owned(),
                })?;
                return Err(TransferError::NotFound(requested.to_owned()));
            }
            Err(e) => return self.fail(chan, peer, format!("cannot read {requested}: {e}")),
        };

        chan.send(&Msg::Metadata {
            name: requested.to_owned(),
            size,
            digest,
        })?;
        self.advance(&mut state, ServerTransferState::MetadataSent, peer);
        self.await_ack(chan, "metadata")?;
        self.advance(&mut state, ServerTransferState::Transferring, peer);

        // Never send more than announced, even if the file grows meanwhile.
        let mut reader = (&mut file).take(size);
        let mut buf = vec![0u8; self.chunk_size];
        let mut chunks = 0u32;
        loop {
            let n = match read_full(&mut reader, &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    return self.fail(chan, peer, format!("read error on {requested}: {e}"));
                }
            };
            if n == 0 {
                break;
            }
            chan.send(&Msg::Chunk {
                data: Bytes::copy_from_slice(&buf[..n]),
            })?;
            chunks += 1;
            self.await_ack(chan, "chunk")?;
            if n < buf.len() {
                break;
            }
        }

        chan.send(&Msg::Eof)?;
        self.await_ack(chan, "eof")?;
        self.advance(&mut state, ServerTransferState::Completed, peer);

        sink_info!(
            self.log,
            "[transfer] {peer}: sent {requested:?} ({size} bytes in {chunks} chunks)"
        );
        Ok(ServeReport {
            name: requested.to_owned(),
            size,
            chunks,
        })
    }

    fn open_with_metadata(
        &self,
        name: &str,
    ) -> Result<(std::fs::File, u64, crate::integrity::Digest), StoreError> {
        let file = self.store.open_read(name)?;
        let size = self.store.size(name)?;
        let digest = self.store.checksum(name)?;
        Ok((file, size, digest))
    }

    fn fail<T>(
        &self,
        chan: &mut FramedChannel<TcpStream>,
        peer: &str,
        reason: String,
    ) -> Result<T, TransferError> {
        sink_warn!(self.log, "[transfer] {peer}: {reason}");
        chan.send(&Msg::ServerError {
            reason: reason.clone(),
        })?;
        Err(TransferError::ServerError(reason))
    }

    /// Block (bounded by `ack_timeout`) for the receiver's verdict.
    fn await_ack(
        &self,
        chan: &mut FramedChannel<TcpStream>,
        what: &str,
    ) -> Result<(), TransferError> {
        match chan.recv_timeout(self.ack_timeout) {
            Ok(Msg::Ack) => Ok(()),
            Ok(Msg::Nack) => Err(TransferError::TransferAborted(format!(
                "receiver rejected {what}"
            ))),
            Ok(Msg::Exit) => Err(TransferError::UnexpectedMsg(Msg::Exit)),
            Ok(other) => {
                // the peer is waiting on an answer to this frame
                chan.send(&Msg::BadRequest {
                    reason: format!("{} while a transfer awaits acknowledgement", other.name()),
                })?;
                Err(TransferError::UnexpectedMsg(other))
            }
            Err(FrameError::Timeout) => Err(TransferError::TransferAborted(format!(
                "no acknowledgement for {what} before timeout"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn advance(&self, state: &mut ServerTransferState, next: ServerTransferState, peer: &str) {
        sink_debug!(self.log, "[transfer] {peer}: {state} -> {next}");
        *state = next;
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
