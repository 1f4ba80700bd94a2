//! Single-instance lock file.
//!
//! The lock lives in `$XDG_RUNTIME_DIR` (or `/tmp`) and holds the owner's PID.
//! The file is opened without truncation and only rewritten once the
//! exclusive lock is held, so a second instance always reads a complete PID.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::LOCK_FILE_NAME;
use crate::logger::Log;

/// Default lock location for this user session.
pub fn default_lock_path() -> PathBuf {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    runtime_dir.join(LOCK_FILE_NAME)
}

/// PID recorded in a lock file, if it has a readable one.
pub fn read_lock_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.lines().next()?.trim().parse().ok()
}

/// Held exclusive lock. Call [`InstanceLock::release`] on shutdown.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            match read_lock_pid(path) {
                Some(pid) => anyhow::bail!("suntheme is already running (PID {})", pid),
                None => anyhow::bail!("suntheme is already running"),
            }
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Log::log_debug(&format!("Acquired lock {}", path.display()));
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and remove the lock file.
    pub fn release(self) {
        let Self { file, path } = self;
        let _ = FileExt::unlock(&file);
        drop(file);
        match fs::remove_file(&path) {
            Ok(()) => Log::log_decorated("Lock file removed successfully"),
            Err(e) => Log::log_decorated(&format!("Warning: Failed to remove lock file: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_writes_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("suntheme.lock");
        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_lock_pid(&path), Some(std::process::id()));
        assert_eq!(lock.path(), path);
        lock.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_fails_and_keeps_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("suntheme.lock");
        let first = InstanceLock::acquire(&path).unwrap();

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert!(err.to_string().contains(&std::process::id().to_string()));
        assert_eq!(read_lock_pid(&path), Some(std::process::id()));

        first.release();
        let again = InstanceLock::acquire(&path).unwrap();
        again.release();
    }

    #[test]
    fn test_leftover_file_is_reused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("suntheme.lock");
        fs::write(&path, "999999\nstale\n").unwrap();
        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{}\n", std::process::id())
        );
        lock.release();
    }

    #[test]
    #[serial]
    fn test_default_lock_path_uses_runtime_dir() {
        let original = std::env::var_os("XDG_RUNTIME_DIR");
        unsafe { std::env::set_var("XDG_RUNTIME_DIR", "/run/user/4242") };
        assert_eq!(default_lock_path(), PathBuf::from("/run/user/4242/suntheme.lock"));
        unsafe { std::env::remove_var("XDG_RUNTIME_DIR") };
        assert_eq!(default_lock_path(), PathBuf::from("/tmp/suntheme.lock"));
        if let Some(value) = original {
            unsafe { std::env::set_var("XDG_RUNTIME_DIR", value) };
        }
    }
}
