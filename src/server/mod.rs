//! Protocol server: accept loop and per-connection command dispatch.

pub mod listener;
pub mod session_handler;

pub use listener::{CourierServer, bind_with_retry};
pub use session_handler::{SessionHandler, SessionShared};
