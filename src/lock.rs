//! Single-instance execution lock.
//!
//! The lock is a file under `<root>/locks/` holding the owner's process id.
//! A record whose owner is no longer running is stale and gets replaced. This
//! only excludes processes on the same host.

use crate::constants::PKG_NAME;
use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Held for the lifetime of one orchestration run. The record is removed on
/// drop, so early returns, errors and a cancelled run all release it.
#[derive(Debug)]
pub struct ExecutionLock {
    path: PathBuf,
    released: bool,
}

impl ExecutionLock {
    /// Acquires the lock in `lock_dir`.
    ///
    /// # Errors
    /// [`Error::Locked`] if a live process owns the record.
    pub fn acquire(lock_dir: &Path) -> Result<Self> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("{PKG_NAME}.lock"));

        if let Some(owner) = read_owner(&path)? {
            match owner {
                Some(pid) if is_process_alive(pid) => {
                    return Err(Error::Locked { pid, path });
                }
                Some(pid) => warn!("Removing stale lock {} left by pid {pid}", path.display()),
                None => warn!("Removing unreadable lock {}", path.display()),
            }
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            // Someone else won the race between the stale check and creation.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let pid = read_owner(&path)?.flatten().unwrap_or_default();
                return Err(Error::Locked { pid, path });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        debug!("Acquired lock {}", path.display());

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the lock record now instead of on drop.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_record(&self.path)?;
        Ok(())
    }
}

impl Drop for ExecutionLock {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = remove_record(&self.path) {
                warn!("Failed to remove lock {}: {e}", self.path.display());
            }
        }
    }
}

fn remove_record(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Released lock {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// `None` when there is no record, `Some(None)` when it cannot be parsed.
fn read_owner(path: &Path) -> Result<Option<Option<u32>>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().parse().ok())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Best-effort check whether `pid` refers to a running process.
fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    #[cfg(unix)]
    {
        // kill -0 only checks for existence, no signal is delivered
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
    #[cfg(windows)]
    {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Above the largest pid_max Linux allows.
    const DEAD_PID: u32 = 99_999_999;

    #[test]
    fn test_acquire_writes_pid_and_drop_releases() {
        let dir = tempdir().unwrap();
        let lock = ExecutionLock::acquire(dir.path()).unwrap();
        let path = lock.path().to_path_buf();
        assert_eq!(path, dir.path().join("snapsync.lock"));
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_while_held_fails() {
        let dir = tempdir().unwrap();
        let _held = ExecutionLock::acquire(dir.path()).unwrap();
        let err = ExecutionLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Locked { pid, .. } if pid == std::process::id()));
    }

    #[test]
    fn test_sequential_acquire_succeeds() {
        let dir = tempdir().unwrap();
        ExecutionLock::acquire(dir.path()).unwrap().release().unwrap();
        let lock = ExecutionLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn test_stale_lock_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapsync.lock");
        fs::write(&path, format!("{DEAD_PID}\n")).unwrap();

        let lock = ExecutionLock::acquire(dir.path()).unwrap();
        let content = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_garbage_lock_is_replaced() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("snapsync.lock"), "not a pid").unwrap();
        assert!(ExecutionLock::acquire(dir.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_held_by_other_live_process() {
        let dir = tempdir().unwrap();
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        fs::write(dir.path().join("snapsync.lock"), child.id().to_string()).unwrap();

        let result = ExecutionLock::acquire(dir.path());
        child.kill().unwrap();
        child.wait().unwrap();

        assert!(matches!(result, Err(Error::Locked { pid, .. }) if pid == child.id()));
        // The owner has exited; the record is now stale.
        assert!(ExecutionLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_is_process_alive() {
        assert!(is_process_alive(std::process::id()));
        assert!(!is_process_alive(DEAD_PID));
        assert!(!is_process_alive(0));
    }
}
