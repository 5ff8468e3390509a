#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use courier::chat::ConnectionRegistry;
use courier::config::{ClientSettings, ServerSettings};
use courier::server::CourierServer;

pub const WAIT: Option<Duration> = Some(Duration::from_secs(5));

/// Start a server on an ephemeral loopback port serving `root`.
pub fn start_server(root: &Path) -> (SocketAddr, Arc<ConnectionRegistry>) {
    start_server_with(root, |_| {})
}

pub fn start_server_with(
    root: &Path,
    tweak: impl FnOnce(&mut ServerSettings),
) -> (SocketAddr, Arc<ConnectionRegistry>) {
    let mut settings = ServerSettings {
        port: 0,
        port_attempts: 1,
        root_dir: root.to_path_buf(),
        ack_timeout: Some(Duration::from_secs(5)),
        welcome_text: "welcome".into(),
        ..ServerSettings::default()
    };
    tweak(&mut settings);
    let server = CourierServer::without_log(settings);
    let registry = server.registry();
    let listener = server.bind().expect("bind loopback");
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || server.serve(listener));
    (addr, registry)
}

pub fn client_settings(addr: SocketAddr, root: &Path) -> ClientSettings {
    ClientSettings {
        server_addr: addr.to_string(),
        root_dir: root.to_path_buf(),
        response_timeout: WAIT,
        ..ClientSettings::default()
    }
}

/// Poll `cond` until it holds or five seconds pass.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}
