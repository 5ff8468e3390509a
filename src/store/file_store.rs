use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::{FileName, StoreError};
use crate::integrity::{self, Digest};

/// Every path handed out lies directly inside `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it is missing.
    pub fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Path for `name` inside the root. An existing symlink is refused, for
    /// reading and writing alike, since it may lead outside the root.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        let name = FileName::parse(name)?;
        let path = self.root.join(name.as_str());
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                Err(StoreError::NotFound(name.as_str().to_owned()))
            }
            _ => Ok(path),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn open_read(&self, name: &str) -> Result<File, StoreError> {
        let path = self.resolve(name)?;
        if path.is_dir() {
            return Err(StoreError::NotFound(name.to_owned()));
        }
        File::open(&path).map_err(|e| not_found_or_io(name, e))
    }

    /// Create (or truncate) `name` for writing.
    pub fn create(&self, name: &str) -> Result<File, StoreError> {
        let path = self.resolve(name)?;
        self.ensure_root()?;
        Ok(File::create(path)?)
    }

    /// Open `name` for appending, creating it if needed.
    pub fn append(&self, name: &str) -> Result<File, StoreError> {
        let path = self.resolve(name)?;
        self.ensure_root()?;
        Ok(OpenOptions::new().create(true).append(true).open(path)?)
    }

    pub fn size(&self, name: &str) -> Result<u64, StoreError> {
        let path = self.resolve(name)?;
        Ok(integrity::size(&path)?)
    }

    pub fn checksum(&self, name: &str) -> Result<Digest, StoreError> {
        let path = self.resolve(name)?;
        if path.is_dir() {
            return Err(StoreError::NotFound(name.to_owned()));
        }
        Ok(integrity::checksum(&path)?)
    }
}

fn not_found_or_io(name: &str, e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(name.to_owned())
    } else {
        StoreError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::integrity::digest_of;
    use std::io::{Read, Write};

    #[test]
    fn create_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        store.create("a.txt").unwrap().write_all(b"hello ").unwrap();
        store.append("a.txt").unwrap().write_all(b"world").unwrap();

        let mut out = String::new();
        store.open_read("a.txt").unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
        assert_eq!(store.size("a.txt").unwrap(), 11);
        assert_eq!(store.checksum("a.txt").unwrap(), digest_of(b"hello world"));
        assert!(store.exists("a.txt"));
    }

    #[test]
    fn create_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.create("b").unwrap().write_all(b"long old content").unwrap();
        store.create("b").unwrap().write_all(b"new").unwrap();
        assert_eq!(store.size("b").unwrap(), 3);
    }

    #[test]
    fn traversal_never_touches_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("root"));
        assert!(matches!(store.create("../escape"), Err(StoreError::InvalidName(_))));
        assert!(!dir.path().join("escape").exists());
        assert!(!store.exists(".."));
    }

    #[test]
    fn missing_and_directory_entries_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        fs::create_dir(dir.path().join("sub")).unwrap();
        assert!(matches!(store.open_read("missing"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.open_read("sub"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.checksum("sub"), Err(StoreError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_the_root_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("secret"), b"outside").unwrap();
        std::os::unix::fs::symlink(dir.path().join("secret"), root.join("link")).unwrap();

        let store = FileStore::new(&root);
        assert!(!store.exists("link"));
        assert!(matches!(store.open_read("link"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.checksum("link"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.create("link"), Err(StoreError::NotFound(_))));
        assert_eq!(fs::read(dir.path().join("secret")).unwrap(), b"outside");
    }
}
