//! Single-runner guard for `migrate` and `rollback`.
//!
//! A lock file in the migrations directory, created with exclusive-create
//! semantics and removed when the guard drops. It only protects runners that
//! share the directory; runners on other hosts must be kept apart by
//! deployment.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

pub const LOCK_FILE: &str = ".sqlmig.lock";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "another migration run holds {} ({holder}); remove the file if that run is gone",
        path.display()
    )]
    Held { path: PathBuf, holder: String },

    #[error("failed to create lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new().write(true).create_new(true).open(&path);

        let mut file = match file {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .map(|s| s.trim().replace('\n', ", "))
                    .unwrap_or_else(|_| "unknown holder".to_string());
                return Err(LockError::Held { path, holder });
            }
            Err(source) => return Err(LockError::Io { path, source }),
        };

        let holder = format!("pid={}\nstarted_at={}\n", std::process::id(), Utc::now().to_rfc3339());
        if let Err(source) = file.write_all(holder.as_bytes()) {
            let _ = fs::remove_file(&path);
            return Err(LockError::Io { path, source });
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_holder_is_refused() {
        let dir = tempdir().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = RunLock::acquire(dir.path()).unwrap_err();
        match err {
            LockError::Held { holder, .. } => assert!(holder.starts_with("pid=")),
            other => panic!("unexpected error: {other}"),
        }

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
        assert!(RunLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempdir().unwrap();
        let err = RunLock::acquire(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, LockError::Io { .. }));
    }
}
