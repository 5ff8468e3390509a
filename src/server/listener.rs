use std::any::Any;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::chat::ConnectionRegistry;
use crate::config::ServerSettings;
use crate::log::{LogSink, NoopLogSink};
use crate::server::session_handler::{SessionHandler, SessionShared};
use crate::store::FileStore;
use crate::transfer::FileSender;
use crate::transport::ClientId;
use crate::{sink_error, sink_info, sink_warn};

/// Bind `ip:port`, moving on to the next port while the address is taken.
///
/// Port 0 asks the OS for any free port and is tried once.
pub fn bind_with_retry(
    ip: &str,
    port: u16,
    attempts: u16,
    log: &Arc<dyn LogSink>,
) -> io::Result<TcpListener> {
    let attempts = if port == 0 { 1 } else { attempts.max(1) };
    let mut last_err = None;
    for offset in 0..attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((ip, candidate)) {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                sink_warn!(log, "[server] port {candidate} is already in use; trying the next one");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrInUse, "no free port in range")
    }))
}

/// Top-level runtime object for the courier protocol service.
///
/// Owns the settings, the log sink and the process-wide connection registry,
/// and spawns one session thread per accepted connection.
pub struct CourierServer {
    settings: ServerSettings,
    log: Arc<dyn LogSink>,
    registry: Arc<ConnectionRegistry>,
}

impl CourierServer {
    pub fn new(settings: ServerSettings, log: Arc<dyn LogSink>) -> Self {
        Self {
            settings,
            log,
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Convenience for tests.
    pub fn without_log(settings: ServerSettings) -> Self {
        Self::new(settings, Arc::new(NoopLogSink))
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn bind(&self) -> io::Result<TcpListener> {
        let listener = bind_with_retry(
            &self.settings.bind_ip,
            self.settings.port,
            self.settings.port_attempts,
            &self.log,
        )?;
        sink_info!(self.log, "[server] listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Blocking: bind, then serve forever.
    pub fn run(self) -> io::Result<()> {
        let listener = self.bind()?;
        self.serve(listener)
    }

    /// Accept connections on `listener` until accepting itself fails hard.
    pub fn serve(self, listener: TcpListener) -> io::Result<()> {
        let store = FileStore::new(&self.settings.root_dir);
        if let Err(e) = store.ensure_root() {
            sink_warn!(self.log, "[server] cannot create {:?}: {e}", store.root());
        }
        sink_info!(self.log, "[server] serving files from {:?}", store.root());

        let shared = Arc::new(SessionShared {
            registry: self.registry.clone(),
            sender: FileSender::new(
                store,
                self.settings.chunk_size,
                self.settings.ack_timeout,
                self.log.clone(),
            ),
            welcome_text: self.settings.welcome_text.clone(),
            idle_timeout: self.settings.idle_timeout,
            chat_queue_capacity: self.settings.chat_queue_capacity,
            log: self.log.clone(),
        });

        let mut next_client_id: ClientId = 1;
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(self.log, "[server] accept failed: {e} (continuing to accept)");
                    continue;
                }
            };

            let client_id = next_client_id;
            next_client_id += 1;

            if let Err(e) = spawn_session(client_id, stream, shared.clone()) {
                sink_warn!(
                    self.log,
                    "[server] failed to spawn session for client {client_id}: {e}"
                );
            }
        }
        Ok(())
    }
}

fn spawn_session(client_id: ClientId, stream: TcpStream, shared: Arc<SessionShared>) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    let log = shared.log.clone();
    sink_info!(log, "[server] accepted {peer} as client {client_id}");

    thread::Builder::new()
        .name(format!("courier-conn-{client_id}"))
        .spawn(move || {
            let handler = SessionHandler::new(client_id, peer, stream, shared);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.run()));
            if let Err(payload) = outcome {
                sink_error!(
                    log,
                    "[server] session for {peer} panicked: {}; connection closed",
                    panic_message(&*payload)
                );
            }
        })?;
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
