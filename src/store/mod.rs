//! Sandboxed access to the files one peer serves or receives.

mod file_name;
mod file_store;
mod store_error;

pub use file_name::FileName;
pub use file_store::FileStore;
pub use store_error::StoreError;
