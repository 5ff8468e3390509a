use std::fmt;
use std::fs::File;
use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::integrity::Digest;
use crate::log::LogSink;
use crate::protocol::Msg;
use crate::store::{FileName, FileStore};
use crate::transfer::{FileTransferSession, TransferError};
use crate::transport::FramedChannel;
use crate::{sink_debug, sink_info, sink_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTransferState {
    Idle,
    AwaitingMetadata,
    Receiving,
    Verifying,
    Done,
    Failed,
}

impl fmt::Display for ClientTransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A verified local copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub name: String,
    pub size: u64,
    pub digest: Digest,
    pub chunks: u32,
}

/// Client half of the file transfer protocol.
pub struct FileReceiver {
    store: FileStore,
    response_timeout: Option<Duration>,
    log: Arc<dyn LogSink>,
}

impl FileReceiver {
    pub fn new(store: FileStore, response_timeout: Option<Duration>, log: Arc<dyn LogSink>) -> Self {
        Self {
            store,
            response_timeout,
            log,
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Run one full request/transfer/verify round for `name`.
    ///
    /// On `VerificationFailed` the partial local file is left in place.
    pub fn fetch(
        &self,
        chan: &mut FramedChannel<TcpStream>,
        name: &str,
    ) -> Result<FetchReport, TransferError> {
        let mut state = ClientTransferState::Idle;
        let res = self.run(chan, name, &mut state);
        if res.is_err() {
            self.advance(&mut state, ClientTransferState::Failed);
        }
        res
    }

    fn run(
        &self,
        chan: &mut FramedChannel<TcpStream>,
        name: &str,
        state: &mut ClientTransferState,
    ) -> Result<FetchReport, TransferError> {
        FileName::parse(name).map_err(|e| TransferError::InvalidName(e.to_string()))?;

        chan.send(&Msg::File {
            name: name.to_owned(),
        })?;
        self.advance(state, ClientTransferState::AwaitingMetadata);

        let (mut session, mut file) = match chan.recv_timeout(self.response_timeout)? {
            Msg::Metadata {
                name: echoed,
                size,
                digest,
            } => {
                if echoed != name {
                    sink_warn!(
                        self.log,
                        "[fetch] metadata for {echoed:?} while waiting for {name:?}; rejecting"
                    );
                    chan.send(&Msg::Nack)?;
                    return Err(TransferError::NameMismatch {
                        requested: name.to_owned(),
                        echoed,
                    });
                }
                let file = match self.store.create(name) {
                    Ok(f) => f,
                    Err(e) => {
                        chan.send(&Msg::Nack)?;
                        return Err(e.into());
                    }
                };
                sink_info!(self.log, "[fetch] {name}: {size} bytes, digest {digest}");
                (FileTransferSession::new(name, size, digest), file)
            }
            Msg::NotFound { name } => return Err(TransferError::NotFound(name)),
            Msg::ServerError { reason } => return Err(TransferError::ServerError(reason)),
            Msg::BadRequest { reason } => return Err(TransferError::BadRequest(reason)),
            other => return Err(TransferError::UnexpectedMsg(other)),
        };

        chan.send(&Msg::Ack)?;
        self.advance(state, ClientTransferState::Receiving);

        loop {
            match chan.recv_timeout(self.response_timeout)? {
                Msg::Chunk { data } => {
                    if let Err(e) = self.absorb(&mut session, &mut file, &data) {
                        chan.send(&Msg::Nack)?;
                        return Err(e);
                    }
                    chan.send(&Msg::Ack)?;
                }
                Msg::Eof => {
                    chan.send(&Msg::Ack)?;
                    break;
                }
                Msg::ServerError { reason } => return Err(TransferError::ServerError(reason)),
                other => return Err(TransferError::UnexpectedMsg(other)),
            }
        }

        file.flush().map_err(|e| TransferError::Store(e.into()))?;
        drop(file);
        self.advance(state, ClientTransferState::Verifying);
        sink_debug!(self.log, "[fetch] {name}: streamed digest {}", session.streamed_digest());

        let actual_size = self.store.size(name)?;
        let actual_digest = self.store.checksum(name)?;
        session.verify(actual_size, actual_digest)?;
        self.advance(state, ClientTransferState::Done);

        sink_info!(
            self.log,
            "[fetch] {name}: verified {actual_size} bytes in {} chunks",
            session.chunks_received()
        );
        Ok(FetchReport {
            name: name.to_owned(),
            size: actual_size,
            digest: actual_digest,
            chunks: session.chunks_received(),
        })
    }

    fn absorb(
        &self,
        session: &mut FileTransferSession,
        file: &mut File,
        data: &[u8],
    ) -> Result<(), TransferError> {
        session.absorb(data)?;
        file.write_all(data)
            .map_err(|e| TransferError::Store(e.into()))?;
        sink_debug!(
            self.log,
            "[fetch] {}: {}/{} bytes",
            session.file_name(),
            session.bytes_received(),
            session.expected_size()
        );
        Ok(())
    }

    fn advance(&self, state: &mut ClientTransferState, next: ClientTransferState) {
        sink_debug!(self.log, "[fetch] {state} -> {next}");
        *state = next;
    }
}
