//! Shared chat room: participant registry and the server side of the
//! join/broadcast/leave exchange.

pub mod chat_error;
pub mod registry;
pub mod session;

pub use chat_error::ChatError;
pub use registry::{ChatParticipant, ConnectionRegistry, DEFAULT_OUTBOUND_CAPACITY, Outbound};
pub use session::{ChatExit, serve_chat};
