//! Client side: drives file fetches and chat sessions over one connection.

pub mod chat_client;
pub mod client_driver;
pub mod client_error;
pub mod inbox;

pub use chat_client::{BufLines, ChatNotice, ChatSummary, LineSource, StdinLines, format_notice};
pub use client_driver::ClientDriver;
pub use client_error::ClientError;
pub use inbox::{ChatEvent, ChatInbox};
