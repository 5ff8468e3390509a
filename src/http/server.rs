use std::io::{self, BufReader, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::config::HttpSettings;
use crate::http::request::{RequestError, read_request};
use crate::http::responder::StaticResponder;
use crate::log::LogSink;
use crate::server::bind_with_retry;
use crate::{sink_debug, sink_info, sink_warn};

/// Thread-per-connection static file server.
pub struct HttpServer {
    settings: HttpSettings,
    log: Arc<dyn LogSink>,
}

impl HttpServer {
    pub fn new(settings: HttpSettings, log: Arc<dyn LogSink>) -> Self {
        Self { settings, log }
    }

    pub fn bind(&self) -> io::Result<TcpListener> {
        let listener = bind_with_retry(
            &self.settings.bind_ip,
            self.settings.port,
            self.settings.port_attempts,
            &self.log,
        )?;
        sink_info!(self.log, "[http] listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    pub fn run(self) -> io::Result<()> {
        let listener = self.bind()?;
        self.serve(listener)
    }

    pub fn serve(self, listener: TcpListener) -> io::Result<()> {
        let responder = Arc::new(StaticResponder::new(&self.settings.root_dir));
        sink_info!(self.log, "[http] serving {:?}", responder.root());

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(self.log, "[http] accept failed: {e}");
                    continue;
                }
            };
            let peer = match stream.peer_addr() {
                Ok(p) => p,
                Err(e) => {
                    sink_warn!(self.log, "[http] dropped connection without peer address: {e}");
                    continue;
                }
            };
            sink_info!(self.log, "[http] connection from {peer}");

            let responder = responder.clone();
            let log = self.log.clone();
            let spawned = thread::Builder::new()
                .name(format!("http-{peer}"))
                .spawn(move || {
                    if let Err(e) = handle_connection(stream, peer, &responder, &log) {
                        sink_warn!(log, "[http] {peer}: {e}");
                    }
                });
            if let Err(e) = spawned {
                sink_warn!(self.log, "[http] cannot spawn handler for {peer}: {e}");
            }
        }
        Ok(())
    }
}

/// Serve requests on one connection until the peer closes or a response
/// asks to close.
fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    responder: &StaticResponder,
    log: &Arc<dyn LogSink>,
) -> io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    loop {
        let response = match read_request(&mut reader) {
            Ok(req) => {
                sink_info!(log, "[http] {peer} - {}", req.request_line());
                // GET bodies are ignored but must not be taken for the next request
                let body_len = req.content_length() as u64;
                io::copy(&mut (&mut reader).take(body_len), &mut io::sink())?;
                responder.respond(&req)
            }
            Err(RequestError::Closed) => break,
            Err(RequestError::BadRequest(why)) => {
                sink_debug!(log, "[http] {peer}: {why}");
                responder.bad_request()
            }
            Err(RequestError::Io(e)) => return Err(e),
        };

        if response.status.is_error() {
            sink_warn!(log, "[http] {peer} - {}", response.status_line());
        } else {
            sink_info!(log, "[http] {peer} - {}", response.status_line());
        }
        response.write_to(&mut writer)?;
        if !response.keep_alive {
            break;
        }
    }
    Ok(())
}
