//! Per-installation advisory lock
//!
//! Serializing runs against one installation is a caller obligation; this
//! lock is a best-effort guard that makes a second concurrent run fail
//! fast instead of corrupting the tree. Stale locks (dead PID or old age)
//! are reclaimed.

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::errors::UpdateError;
use crate::layout::LOCK_FILE;

/// A lock older than this is considered abandoned.
const MAX_LOCK_AGE_SECS: u64 = 300;

/// Lock file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: u64,
    mode: String,
}

impl LockInfo {
    fn new(mode: &str) -> Self {
        Self {
            pid: process::id(),
            acquired_at: now_epoch(),
            mode: mode.to_string(),
        }
    }

    fn age_secs(&self) -> u64 {
        now_epoch().saturating_sub(self.acquired_at)
    }

    fn is_stale(&self) -> bool {
        self.age_secs() > MAX_LOCK_AGE_SECS || !self.process_exists()
    }

    fn process_exists(&self) -> bool {
        Path::new(&format!("/proc/{}", self.pid)).exists()
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Held for the duration of a mutating run; released on drop.
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    /// Acquire the lock for this installation root.
    pub fn acquire(root: &Path, mode: &str) -> Result<Self, UpdateError> {
        let path = root.join(LOCK_FILE);

        if let Ok(raw) = fs::read_to_string(&path) {
            match serde_json::from_str::<LockInfo>(&raw) {
                Ok(holder) if !holder.is_stale() => {
                    return Err(UpdateError::Locked(format!(
                        "held by PID {} for {}s (mode: {})",
                        holder.pid,
                        holder.age_secs(),
                        holder.mode
                    )));
                }
                Ok(holder) => {
                    warn!(pid = holder.pid, "reclaiming stale lock");
                    let _ = fs::remove_file(&path);
                }
                Err(_) => {
                    warn!(path = %path.display(), "reclaiming corrupt lock file");
                    let _ = fs::remove_file(&path);
                }
            }
        }

        let info = LockInfo::new(mode);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| UpdateError::Locked(format!("cannot create {}: {}", path.display(), e)))?;
        let body = serde_json::to_string(&info)
            .map_err(|e| UpdateError::Locked(format!("encoding lock info: {}", e)))?;
        file.write_all(body.as_bytes())
            .map_err(|e| UpdateError::Locked(format!("writing {}: {}", path.display(), e)))?;

        Ok(Self { path })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        {
            let _lock = InstallLock::acquire(dir.path(), "auto").unwrap();
            assert!(dir.path().join(LOCK_FILE).exists());
        }
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let _lock = InstallLock::acquire(dir.path(), "auto").unwrap();
        assert!(matches!(
            InstallLock::acquire(dir.path(), "rollback"),
            Err(UpdateError::Locked(_))
        ));
    }

    #[test]
    fn test_dead_pid_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let info = LockInfo {
            pid: u32::MAX - 1,
            acquired_at: now_epoch(),
            mode: "auto".into(),
        };
        fs::write(
            dir.path().join(LOCK_FILE),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();

        assert!(InstallLock::acquire(dir.path(), "auto").is_ok());
    }

    #[test]
    fn test_corrupt_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "not json").unwrap();
        assert!(InstallLock::acquire(dir.path(), "auto").is_ok());
    }
}
