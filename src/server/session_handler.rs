use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use crate::chat::{ChatExit, ConnectionRegistry, serve_chat};
use crate::log::LogSink;
use crate::protocol::{FrameError, Msg};
use crate::transfer::{FileSender, TransferError};
use crate::transport::{ClientId, FramedChannel};
use crate::{sink_debug, sink_info, sink_warn};

/// State every session thread shares.
pub struct SessionShared {
    pub registry: Arc<ConnectionRegistry>,
    pub sender: FileSender,
    pub welcome_text: String,
    /// Bound on waiting for the next command; `None` waits forever.
    pub idle_timeout: Option<Duration>,
    pub chat_queue_capacity: usize,
    pub log: Arc<dyn LogSink>,
}

/// Keeps the registry honest however the session ends, unwinding included.
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    client_id: ClientId,
}

impl ConnectionGuard {
    fn register(registry: Arc<ConnectionRegistry>, client_id: ClientId, peer: SocketAddr) -> Self {
        registry.register_connection(client_id, peer);
        Self {
            registry,
            client_id,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.unregister_connection(self.client_id);
    }
}

/// What the command loop does after one command.
enum Next {
    Continue,
    Close,
}

/// Drives one accepted connection from its first command to its close.
pub struct SessionHandler {
    client_id: ClientId,
    peer: SocketAddr,
    peer_label: String,
    chan: FramedChannel<TcpStream>,
    shared: Arc<SessionShared>,
}

impl SessionHandler {
    pub fn new(
        client_id: ClientId,
        peer: SocketAddr,
        stream: TcpStream,
        shared: Arc<SessionShared>,
    ) -> Self {
        Self {
            client_id,
            peer,
            peer_label: peer.to_string(),
            chan: FramedChannel::new(stream),
            shared,
        }
    }

    pub fn run(mut self) {
        let _guard = ConnectionGuard::register(self.shared.registry.clone(), self.client_id, self.peer);
        let log = self.shared.log.clone();

        if let Err(e) = self.chan.set_read_timeout(self.shared.idle_timeout) {
            sink_warn!(log, "[session] {}: cannot set idle timeout: {e}", self.peer);
        }

        loop {
            let next = match self.chan.recv() {
                Ok(msg) => self.dispatch(msg),
                Err(e) => {
                    self.on_read_error(e);
                    Next::Close
                }
            };
            if let Next::Close = next {
                break;
            }
        }

        self.chan.shutdown();
        sink_info!(log, "[session] {} closed", self.peer);
    }

    fn dispatch(&mut self, msg: Msg) -> Next {
        let log = self.shared.log.clone();
        sink_debug!(log, "[session] {}: {} command", self.peer, msg.name());
        match msg {
            Msg::File { name } => self.on_file(&name),
            Msg::Chat => self.on_chat(),
            Msg::Exit => {
                sink_info!(log, "[session] {} sent EXIT", self.peer);
                Next::Close
            }
            Msg::Ack | Msg::Nack => {
                // late acknowledgement for a transfer that was already aborted
                sink_warn!(log, "[session] {}: stray {} ignored", self.peer, msg.name());
                Next::Continue
            }
            other => {
                self.reject(format!("unexpected {} frame; expected FILE, CHAT or EXIT", other.name()));
                Next::Close
            }
        }
    }

    fn on_file(&mut self, name: &str) -> Next {
        let log = &self.shared.log;
        match self.shared.sender.serve(&mut self.chan, &self.peer_label, name) {
            Ok(_) => Next::Continue,
            Err(TransferError::UnexpectedMsg(Msg::Exit)) => {
                sink_info!(log, "[session] {} sent EXIT during transfer of {name:?}", self.peer);
                Next::Close
            }
            Err(e) if e.is_transport() => {
                sink_warn!(log, "[session] {}: transfer of {name:?} failed: {e}", self.peer);
                Next::Close
            }
            Err(TransferError::NotFound(_)) => Next::Continue,
            Err(e) => {
                sink_warn!(log, "[session] {}: transfer of {name:?} ended: {e}", self.peer);
                Next::Continue
            }
        }
    }

    fn on_chat(&mut self) -> Next {
        let shared = &self.shared;
        match serve_chat(
            &mut self.chan,
            self.client_id,
            self.peer,
            &shared.registry,
            &shared.welcome_text,
            shared.chat_queue_capacity,
            &shared.log,
        ) {
            Ok(ChatExit::Left) => Next::Continue,
            Ok(ChatExit::Closed) => Next::Close,
            Err(e) => {
                sink_warn!(shared.log, "[session] {}: chat failed: {e}", self.peer);
                Next::Close
            }
        }
    }

    fn on_read_error(&mut self, e: FrameError) {
        let log = self.shared.log.clone();
        match e {
            FrameError::Closed => {
                sink_info!(log, "[session] {} disconnected", self.peer);
            }
            FrameError::Timeout => {
                sink_info!(log, "[session] {} idle for too long", self.peer);
            }
            FrameError::Proto(p) => {
                sink_warn!(log, "[session] {}: {p}", self.peer);
                self.reject(p.to_string());
            }
            other => {
                sink_warn!(log, "[session] {}: {other}", self.peer);
            }
        }
    }

    fn reject(&mut self, reason: String) {
        sink_warn!(self.shared.log, "[session] {}: bad request: {reason}", self.peer);
        if let Err(e) = self.chan.send(&Msg::BadRequest { reason }) {
            sink_debug!(self.shared.log, "[session] {}: could not send BadRequest: {e}", self.peer);
        }
    }
}
