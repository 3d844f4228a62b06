//! Backup manager - full-tree snapshots and rollback
//!
//! A snapshot is a complete copy of the installation taken before any
//! mutation, preserved files included, so a rollback reproduces exactly
//! what existed before the update ran. Creation stages into a `.partial`
//! directory and renames into place: a snapshot either exists whole or
//! not at all. Restored files are verified against SHA-256 checksums
//! recorded at creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::UpdateError;
use crate::layout::{LOCK_FILE, SNAPSHOT_METADATA_FILE, SNAPSHOT_PREFIX};
use crate::version::Version;

/// Which snapshot to restore.
#[derive(Debug, Clone)]
pub enum SnapshotSelector {
    Latest,
    Id(String),
}

impl std::fmt::Display for SnapshotSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotSelector::Latest => write!(f, "latest"),
            SnapshotSelector::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Checksum record for one file in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub sha256: String,
}

/// Snapshot metadata, written as `snapshot.json` inside the snapshot dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    /// Version the installation carried when the snapshot was taken.
    pub source_version: Option<Version>,
    pub created_at: DateTime<Utc>,
    pub files: Vec<FileRecord>,
    /// Directory holding the snapshot. Not serialized; filled on load.
    #[serde(skip)]
    pub path: PathBuf,
}

/// Creates, lists, restores and prunes snapshots of one installation.
pub struct BackupManager;

impl BackupManager {
    /// Snapshot the entire installation tree. Returns the new snapshot id.
    ///
    /// The copy is unconditional: preserved and managed files alike, so
    /// rollback never depends on classification being right.
    pub fn create(root: &Path, source_version: Option<&Version>) -> Result<Snapshot, UpdateError> {
        let parent = root.parent().ok_or_else(|| UpdateError::Backup {
            reason: format!("installation root {} has no parent", root.display()),
        })?;

        let id = Self::unique_id(parent)?;
        let final_dir = parent.join(format!("{}{}", SNAPSHOT_PREFIX, id));
        let staging = parent.join(format!("{}{}.partial", SNAPSHOT_PREFIX, id));

        let result = Self::populate(root, &staging, &id, source_version);
        match result {
            Ok(snapshot) => {
                fs::rename(&staging, &final_dir).map_err(|e| {
                    let _ = fs::remove_dir_all(&staging);
                    UpdateError::Backup {
                        reason: format!("finalizing {}: {}", final_dir.display(), e),
                    }
                })?;
                info!(id = %snapshot.id, files = snapshot.files.len(), "snapshot created");
                Ok(Snapshot {
                    path: final_dir,
                    ..snapshot
                })
            }
            Err(e) => {
                // Atomic-or-absent: never leave a partial snapshot behind.
                let _ = fs::remove_dir_all(&staging);
                Err(e)
            }
        }
    }

    fn populate(
        root: &Path,
        staging: &Path,
        id: &str,
        source_version: Option<&Version>,
    ) -> Result<Snapshot, UpdateError> {
        let backup_err = |reason: String| UpdateError::Backup { reason };

        fs::create_dir_all(staging)
            .map_err(|e| backup_err(format!("creating {}: {}", staging.display(), e)))?;

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| backup_err(format!("walking {}: {}", root.display(), e)))?;
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| backup_err(e.to_string()))?;
            if rel.as_os_str().is_empty() || rel == Path::new(LOCK_FILE) {
                continue;
            }

            let dest = staging.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)
                    .map_err(|e| backup_err(format!("creating {}: {}", dest.display(), e)))?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| backup_err(format!("creating {}: {}", parent.display(), e)))?;
                }
                fs::copy(entry.path(), &dest).map_err(|e| {
                    backup_err(format!("copying {}: {}", entry.path().display(), e))
                })?;
                files.push(FileRecord {
                    path: rel.to_path_buf(),
                    sha256: sha256_file(&dest).map_err(backup_err)?,
                });
            }
        }

        let snapshot = Snapshot {
            id: id.to_string(),
            source_version: source_version.cloned(),
            created_at: Utc::now(),
            files,
            path: staging.to_path_buf(),
        };
        let meta = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| backup_err(format!("encoding metadata: {}", e)))?;
        fs::write(staging.join(SNAPSHOT_METADATA_FILE), meta)
            .map_err(|e| backup_err(format!("writing metadata: {}", e)))?;
        Ok(snapshot)
    }

    /// Timestamp-derived, sortable, unique per installation. Collisions
    /// within one second get a zero-padded numeric suffix so lexical
    /// order stays recency order past nine same-second snapshots.
    fn unique_id(parent: &Path) -> Result<String, UpdateError> {
        let base = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let mut id = base.clone();
        let mut n = 0;
        while parent.join(format!("{}{}", SNAPSHOT_PREFIX, id)).exists() {
            n += 1;
            if n > 99 {
                return Err(UpdateError::Backup {
                    reason: format!("cannot find a free snapshot id after {}", base),
                });
            }
            id = format!("{}-{:02}", base, n);
        }
        Ok(id)
    }

    /// All snapshots of this installation, newest first.
    pub fn list(root: &Path) -> Result<Vec<Snapshot>, UpdateError> {
        let parent = match root.parent() {
            Some(p) => p,
            None => return Ok(Vec::new()),
        };
        let entries = match fs::read_dir(parent) {
            Ok(entries) => entries,
            Err(e) => {
                return Err(UpdateError::Backup {
                    reason: format!("reading {}: {}", parent.display(), e),
                });
            }
        };

        let mut snapshots = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(SNAPSHOT_PREFIX) || name.ends_with(".partial") {
                continue;
            }
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            match Self::load_metadata(&dir) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(dir = %dir.display(), "skipping unreadable snapshot: {}", e),
            }
        }

        // Ids are timestamp-derived, so lexical order is recency order.
        snapshots.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(snapshots)
    }

    fn load_metadata(dir: &Path) -> Result<Snapshot, String> {
        let raw = fs::read_to_string(dir.join(SNAPSHOT_METADATA_FILE)).map_err(|e| e.to_string())?;
        let mut snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
        snapshot.path = dir.to_path_buf();
        Ok(snapshot)
    }

    /// Find the snapshot a selector refers to.
    pub fn find(root: &Path, selector: &SnapshotSelector) -> Result<Snapshot, UpdateError> {
        let snapshots = Self::list(root)?;
        let found = match selector {
            SnapshotSelector::Latest => snapshots.into_iter().next(),
            SnapshotSelector::Id(id) => snapshots.into_iter().find(|s| &s.id == id),
        };
        found.ok_or_else(|| UpdateError::SnapshotNotFound {
            selector: selector.to_string(),
        })
    }

    /// Replace the live tree with a snapshot's files, byte for byte.
    ///
    /// Works on a partially-updated or corrupted live tree: the root is
    /// cleared (the advisory lock file excepted) and rebuilt from the
    /// snapshot, then every restored file is checksum-verified.
    pub fn restore(root: &Path, selector: &SnapshotSelector) -> Result<Snapshot, UpdateError> {
        let snapshot = Self::find(root, selector)?;
        let rollback_err = |reason: String| UpdateError::Rollback {
            snapshot_id: snapshot.id.clone(),
            reason,
        };

        fs::create_dir_all(root)
            .map_err(|e| rollback_err(format!("creating {}: {}", root.display(), e)))?;
        Self::clear_root(root).map_err(&rollback_err)?;

        for entry in walkdir::WalkDir::new(&snapshot.path).sort_by_file_name() {
            let entry = entry.map_err(|e| rollback_err(e.to_string()))?;
            let rel = entry
                .path()
                .strip_prefix(&snapshot.path)
                .map_err(|e| rollback_err(e.to_string()))?;
            if rel.as_os_str().is_empty() || rel == Path::new(SNAPSHOT_METADATA_FILE) {
                continue;
            }

            let dest = root.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)
                    .map_err(|e| rollback_err(format!("creating {}: {}", dest.display(), e)))?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| rollback_err(format!("creating {}: {}", parent.display(), e)))?;
                }
                fs::copy(entry.path(), &dest).map_err(|e| {
                    rollback_err(format!("restoring {}: {}", rel.display(), e))
                })?;
            }
        }

        // Verify restored content against the recorded checksums.
        for record in &snapshot.files {
            let restored = sha256_file(&root.join(&record.path)).map_err(&rollback_err)?;
            if restored != record.sha256 {
                return Err(rollback_err(format!(
                    "checksum mismatch for {} after restore",
                    record.path.display()
                )));
            }
        }

        info!(id = %snapshot.id, "snapshot restored");
        Ok(snapshot)
    }

    fn clear_root(root: &Path) -> Result<(), String> {
        let entries = fs::read_dir(root).map_err(|e| format!("reading {}: {}", root.display(), e))?;
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy() == LOCK_FILE {
                continue;
            }
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| format!("removing {}: {}", path.display(), e))?;
        }
        Ok(())
    }

    /// Keep the `keep` most recent snapshots, delete the rest. Returns
    /// how many were deleted.
    pub fn prune(root: &Path, keep: usize) -> Result<usize, UpdateError> {
        let snapshots = Self::list(root)?;
        let mut deleted = 0;
        for snapshot in snapshots.iter().skip(keep) {
            info!(id = %snapshot.id, "pruning old snapshot");
            fs::remove_dir_all(&snapshot.path).map_err(|e| UpdateError::Backup {
                reason: format!("pruning {}: {}", snapshot.path.display(), e),
            })?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

fn sha256_file(path: &Path) -> Result<String, String> {
    let data = fs::read(path).map_err(|e| format!("reading {}: {}", path.display(), e))?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}
