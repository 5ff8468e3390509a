//! Courier is a small file-transfer and chat-broadcast service over TCP.
//!
//! It provides three binaries:
//! - `courier-server`: the protocol server (file fetches and the chat room).
//! - `courier-client`: an interactive terminal client.
//! - `courier-http`: a static-file HTTP responder.
//!
//! The crate is split into the wire protocol, the per-feature state machines
//! built on top of it, and the runtime pieces (listener, client driver).

/// Chat room registry and the server side of the chat exchange.
pub mod chat;
/// Client driver, chat input loop and inbox.
pub mod client;
/// Handles configuration loading and management.
pub mod config;
/// Static-file HTTP/1.1 responder.
pub mod http;
/// File digests and sizes.
pub mod integrity;
/// Logging utilities for the application.
pub mod log;
/// Frame format, message kinds and codec.
pub mod protocol;
/// Accept loop and per-connection session handling.
pub mod server;
/// Sandboxed file access by name.
pub mod store;
/// Stop-and-wait file transfer, both ends.
pub mod transfer;
/// Message-level channel over a byte stream.
pub mod transport;
