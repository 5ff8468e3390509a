//! Stop-and-wait transfer of one named file.
//!
//! The server side (`FileSender`) answers a `File` request with `Metadata`,
//! then sends `Chunk` frames one at a time, each acknowledged before the
//! next, and closes with `Eof`. The client side (`FileReceiver`) writes the
//! chunks into its store and verifies size and digest once `Eof` arrives.

pub mod receiver;
pub mod sender;
pub mod session;
pub mod transfer_error;

#[cfg(test)]
mod tests;

pub use receiver::{ClientTransferState, FetchReport, FileReceiver};
pub use sender::{FileSender, ServeReport, ServerTransferState};
pub use session::FileTransferSession;
pub use transfer_error::TransferError;
