use std::{fmt, io};

use crate::integrity::IntegrityError;

#[derive(Debug)]
pub enum StoreError {
    /// The name would escape the store root or is otherwise unusable.
    InvalidName(String),
    NotFound(String),
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidName(why) => write!(f, "invalid file name: {why}"),
            StoreError::NotFound(name) => write!(f, "no such file: {name}"),
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<IntegrityError> for StoreError {
    fn from(e: IntegrityError) -> Self {
        match e {
            IntegrityError::NotFound(p) => StoreError::NotFound(p),
            IntegrityError::Io(e) => StoreError::Io(e),
        }
    }
}
