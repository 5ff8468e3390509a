use std::fmt;

use super::StoreError;

pub const MAX_FILE_NAME_LEN: usize = 255;

/// A single path component that is safe to join onto a store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let reject = |why: &str| Err(StoreError::InvalidName(format!("{why}: {raw:?}")));

        if raw.is_empty() {
            return reject("empty name");
        }
        if raw.len() > MAX_FILE_NAME_LEN {
            return reject("name longer than 255 bytes");
        }
        if raw == "." || raw == ".." {
            return reject("relative directory name");
        }
        if raw.contains(['/', '\\']) {
            return reject("path separators not allowed");
        }
        if raw.contains('\0') {
            return reject("NUL byte not allowed");
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
