//! Destination files that disappear when filling them fails
//!
//! A download into a local file must not leave a truncated file behind.
//! `DeleteOnError` creates the file and removes it again unless the caller
//! commits it.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//! use pipebuf::files::DeleteOnError;
//!
//! let dir = std::env::temp_dir().join("pipebuf-doc-example");
//! std::fs::create_dir_all(&dir).unwrap();
//! let path = dir.join("segment");
//!
//! DeleteOnError::run(&path, |f| f.write_all(b"hello")).unwrap();
//! assert_eq!(std::fs::read(&path).unwrap(), b"hello");
//! # std::fs::remove_dir_all(&dir).unwrap();
//! ```

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// A freshly created file that is unlinked on drop unless committed
#[derive(Debug)]
pub struct DeleteOnError {
    path: PathBuf,
    file: Option<File>,
}

impl DeleteOnError {
    /// Create (or truncate) the file at `path` for writing
    ///
    /// # Errors
    /// Returns the error from creating the file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Run `f` on a new file at `path`; keep the file only if `f` succeeds
    ///
    /// # Errors
    /// Returns the creation error, or whatever `f` returned.
    pub fn run<T, E, F>(path: impl AsRef<Path>, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut File) -> Result<T, E>,
        E: From<io::Error>,
    {
        let mut guard = Self::create(path)?;
        let value = f(guard.file())?;
        guard.commit()?;
        Ok(value)
    }

    /// The file being written
    pub fn file(&mut self) -> &mut File {
        match self.file.as_mut() {
            Some(file) => file,
            None => unreachable!("DeleteOnError file is present until commit or drop"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file: flush it to disk and close it
    ///
    /// # Errors
    /// Returns the `fsync` error; the file is deleted in that case.
    pub fn commit(mut self) -> io::Result<PathBuf> {
        if let Some(file) = self.file.as_ref() {
            file.sync_all()?;
        }
        self.file = None;
        Ok(std::mem::take(&mut self.path))
    }
}

impl Drop for DeleteOnError {
    fn drop(&mut self) {
        // Committed guards give up their file
        if let Some(file) = self.file.take() {
            drop(file);
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("can't remove {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_no_error_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("somefile");

        DeleteOnError::run(&path, |f| f.write_all(b"hello")).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_error_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("somefile");

        let result: io::Result<()> = DeleteOnError::run(&path, |f| {
            f.write_all(b"hello")?;
            Err(io::Error::new(io::ErrorKind::Other, "Boom"))
        });

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Boom");
        let missing = std::fs::metadata(&path).unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_guard_dropped_without_commit_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial");

        {
            let mut guard = DeleteOnError::create(&path).unwrap();
            guard.file().write_all(b"half").unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_commit_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done");

        let mut guard = DeleteOnError::create(&path).unwrap();
        guard.file().write_all(b"whole").unwrap();
        assert_eq!(guard.path(), path.as_path());
        let kept = guard.commit().unwrap();

        assert_eq!(kept, path);
        assert_eq!(std::fs::read(&path).unwrap(), b"whole");
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeleteOnError::create(dir.path().join("no/such/dir")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
