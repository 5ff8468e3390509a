use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use crate::client::chat_client::{ChatNotice, ChatSummary, LineSource, run_chat};
use crate::client::ClientError;
use crate::config::ClientSettings;
use crate::log::LogSink;
use crate::protocol::Msg;
use crate::store::FileStore;
use crate::transfer::{FetchReport, FileReceiver, TransferError};
use crate::transport::FramedChannel;
use crate::{sink_info, sink_warn};

/// One connection to a courier server, driven one command at a time.
pub struct ClientDriver {
    chan: FramedChannel<TcpStream>,
    receiver: FileReceiver,
    settings: ClientSettings,
    log: Arc<dyn LogSink>,
    broken: bool,
}

impl ClientDriver {
    pub fn connect(settings: &ClientSettings, log: Arc<dyn LogSink>) -> Result<Self, ClientError> {
        let chan = FramedChannel::connect(&settings.server_addr).map_err(ClientError::Connect)?;
        let store = FileStore::new(&settings.root_dir);
        store
            .ensure_root()
            .map_err(|e| ClientError::Transfer(TransferError::Store(e)))?;
        sink_info!(log, "[client] connected to {}", settings.server_addr);
        Ok(Self {
            chan,
            receiver: FileReceiver::new(store, settings.response_timeout, log.clone()),
            settings: settings.clone(),
            log,
            broken: false,
        })
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.chan.peer_addr().ok()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.chan.local_addr().ok()
    }

    pub fn store(&self) -> &FileStore {
        self.receiver.store()
    }

    pub fn is_connected(&self) -> bool {
        !self.broken
    }

    fn usable(&self) -> Result<(), ClientError> {
        if self.broken {
            Err(ClientError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn note<T>(&mut self, res: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &res {
            if e.is_fatal() {
                self.broken = true;
                self.chan.shutdown();
            }
        }
        res
    }

    /// One request/transfer/verify round.
    pub fn fetch(&mut self, name: &str) -> Result<FetchReport, ClientError> {
        self.usable()?;
        let res = self.receiver.fetch(&mut self.chan, name).map_err(ClientError::from);
        self.note(res)
    }

    /// Re-run the whole round while verification fails, up to
    /// `max_attempts` and for as long as `should_retry` agrees.
    pub fn fetch_with_retry<F>(&mut self, name: &str, mut should_retry: F) -> Result<FetchReport, ClientError>
    where
        F: FnMut(&TransferError, u32) -> bool,
    {
        let max = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch(name) {
                Err(ClientError::Transfer(e))
                    if e.is_retryable() && attempt < max && should_retry(&e, attempt) =>
                {
                    sink_warn!(self.log, "[client] attempt {attempt} for {name} failed: {e}");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Join the chat room and stay until the user types `/exit`.
    pub fn chat<L, V>(&mut self, input: L, view: V) -> Result<ChatSummary, ClientError>
    where
        L: LineSource + 'static,
        V: FnMut(ChatNotice),
    {
        self.usable()?;
        let res = run_chat(
            &mut self.chan,
            input,
            self.settings.inbox_capacity,
            self.settings.response_timeout,
            &self.log,
            view,
        )
        .map_err(ClientError::from);
        self.note(res)
    }

    /// Say goodbye and close the connection.
    pub fn exit(mut self) -> Result<(), ClientError> {
        if self.broken {
            return Ok(());
        }
        let res = self.chan.send(&Msg::Exit);
        self.chan.shutdown();
        sink_info!(self.log, "[client] disconnected");
        res.map_err(ClientError::from)
    }
}
