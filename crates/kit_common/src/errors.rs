//! Error taxonomy for the update engine
//!
//! Each variant carries enough context (path, operation, snapshot id) to
//! diagnose a failure without re-running. Nothing is silently swallowed;
//! advisory conditions (review-flagged files) travel in outcomes, not here.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading or writing the version marker.
#[derive(Debug, Error)]
pub enum VersionError {
    /// Marker file does not exist. Non-fatal: forces the first-install path.
    #[error("version marker not found at {path}")]
    NotFound { path: PathBuf },

    /// Marker exists but does not parse as a version string.
    #[error("version marker at {path} is invalid: {content:?}")]
    Invalid { path: PathBuf, content: String },

    #[error("failed to {op} version marker at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors from fetching a manifest or file content from a release source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("release version {0} not found at source")]
    VersionNotFound(String),

    #[error("manifest at {path} is malformed: {reason}")]
    ManifestInvalid { path: String, reason: String },

    #[error("transport error fetching {what}: {reason}")]
    Transport { what: String, reason: String },

    #[error("content for {path} missing from release")]
    ContentMissing { path: String },
}

/// Top-level error taxonomy of the orchestrator.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Fetch failed. Fatal to the current operation, nothing was mutated.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Snapshot could not be created or completed. Aborts before mutation.
    #[error("backup failed: {reason}")]
    Backup { reason: String },

    /// A single write/delete failed during plan application.
    /// Triggers automatic rollback.
    #[error("apply failed at {path}: {reason}")]
    Apply { path: PathBuf, reason: String },

    /// Restore failed. The one unrecoverable terminal condition; the
    /// snapshot id is surfaced for manual recovery.
    #[error("rollback from snapshot {snapshot_id} failed: {reason}")]
    Rollback { snapshot_id: String, reason: String },

    /// No snapshot exists to restore.
    #[error("no snapshot matching {selector} found")]
    SnapshotNotFound { selector: String },

    /// Another update run holds the installation lock.
    #[error("installation is locked: {0}")]
    Locked(String),

    /// Writing the version marker at commit time failed.
    #[error(transparent)]
    Version(#[from] VersionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_path() {
        let err = UpdateError::Apply {
            path: PathBuf::from("commands/review.md"),
            reason: "permission denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("commands/review.md"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn test_rollback_error_names_snapshot() {
        let err = UpdateError::Rollback {
            snapshot_id: "20260830-120000".into(),
            reason: "disk full".into(),
        };
        assert!(err.to_string().contains("20260830-120000"));
    }
}
