//! Update orchestrator - the top-level state machine
//!
//! Sequences version check, backup, planning, application and
//! rollback-on-failure. Runs synchronously to completion; callers that
//! need a deadline wrap the whole run and treat cancellation during
//! apply exactly like a failure (the rollback path already ran or will
//! run before the error surfaces). Concurrent runs against one root must
//! be serialized by the caller; the advisory lock only makes violations
//! fail fast.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::backup::{BackupManager, SnapshotSelector};
use crate::errors::{UpdateError, VersionError};
use crate::lock::InstallLock;
use crate::planner::{FileAction, UpdatePlan, UpdatePlanner};
use crate::policy::PreservationPolicy;
use crate::source::{ReleaseSource, VersionSpec};
use crate::version::{Version, VersionStore};

/// States of an orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    CheckingVersion,
    UpToDate,
    UpdateAvailable,
    BackingUp,
    Planning,
    Applying,
    Succeeded,
    Failed,
    RollingBack,
    RolledBack,
    RollbackFailed,
}

/// Result of a read-only check.
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// None when the installation is unversioned (missing/corrupt marker).
    pub current: Option<Version>,
    pub latest: Version,
    pub update_available: bool,
    /// Current version carries a pre-release suffix: locally modified.
    pub locally_modified: bool,
}

/// Result of an auto run.
#[derive(Debug, Clone)]
pub enum AutoOutcome {
    UpToDate {
        version: Option<Version>,
    },
    Updated {
        from: Option<Version>,
        to: Version,
        snapshot_id: String,
        wrote: usize,
        deleted: usize,
        preserved: Vec<PathBuf>,
        review: Vec<(PathBuf, String)>,
    },
    /// Apply failed and the pre-update snapshot was restored. The tree is
    /// exactly as before the run.
    RolledBack {
        snapshot_id: String,
        reason: String,
    },
}

/// Result of an explicit rollback run.
#[derive(Debug, Clone)]
pub struct RollbackReport {
    pub snapshot_id: String,
    pub restored_version: Option<Version>,
}

/// Drives one installation through check, auto-apply or rollback.
pub struct UpdateOrchestrator {
    root: PathBuf,
    source: Box<dyn ReleaseSource>,
    policy: PreservationPolicy,
    /// When set, prune to this many snapshots after a successful update.
    keep_snapshots: Option<usize>,
    state: OrchestratorState,
}

impl UpdateOrchestrator {
    pub fn new(root: PathBuf, source: Box<dyn ReleaseSource>) -> Self {
        Self {
            root,
            source,
            policy: PreservationPolicy::default(),
            keep_snapshots: None,
            state: OrchestratorState::Idle,
        }
    }

    pub fn keep_snapshots(mut self, keep: Option<usize>) -> Self {
        self.keep_snapshots = keep;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    fn transition(&mut self, to: OrchestratorState) {
        debug!(from = ?self.state, to = ?to, "state transition");
        self.state = to;
    }

    /// Missing or corrupt markers mean "unversioned": the first-install
    /// path, not an error. IO failures still propagate.
    fn current_version(&self) -> Result<Option<Version>, UpdateError> {
        match VersionStore::read(&self.root) {
            Ok(v) => Ok(Some(v)),
            Err(VersionError::NotFound { .. }) | Err(VersionError::Invalid { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-only version query. Mutates nothing, terminates at
    /// UpToDate/UpdateAvailable.
    pub fn check(&mut self) -> Result<CheckReport, UpdateError> {
        self.transition(OrchestratorState::CheckingVersion);

        let current = self.current_version()?;
        let manifest = self.source.fetch_manifest(&VersionSpec::Latest)?;

        let update_available = match &current {
            None => true,
            Some(cur) => manifest.version.is_newer_than(cur),
        };
        self.transition(if update_available {
            OrchestratorState::UpdateAvailable
        } else {
            OrchestratorState::UpToDate
        });

        Ok(CheckReport {
            locally_modified: current
                .as_ref()
                .map(|v| !v.is_clean_release())
                .unwrap_or(false),
            current,
            latest: manifest.version,
            update_available,
        })
    }

    /// Non-interactive apply. Either commits the new version with every
    /// file operation done, or restores the pre-run snapshot and reports
    /// the failure. The version marker write is the commit point.
    pub fn auto(&mut self) -> Result<AutoOutcome, UpdateError> {
        self.transition(OrchestratorState::CheckingVersion);

        let current = self.current_version()?;
        let manifest = self.source.fetch_manifest(&VersionSpec::Latest)?;

        let update_available = match &current {
            None => true,
            Some(cur) => manifest.version.is_newer_than(cur),
        };
        if !update_available {
            self.transition(OrchestratorState::UpToDate);
            info!(version = ?current, "already up to date");
            return Ok(AutoOutcome::UpToDate { version: current });
        }
        self.transition(OrchestratorState::UpdateAvailable);
        info!(
            current = %current.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "none".into()),
            latest = %manifest.version,
            "update available"
        );

        fs::create_dir_all(&self.root).map_err(|e| UpdateError::Backup {
            reason: format!("creating {}: {}", self.root.display(), e),
        })?;
        let _lock = InstallLock::acquire(&self.root, "auto")?;

        self.transition(OrchestratorState::BackingUp);
        let snapshot = BackupManager::create(&self.root, current.as_ref())?;

        self.transition(OrchestratorState::Planning);
        let plan = match UpdatePlanner::plan(&self.root, &manifest, &self.policy, self.source.as_ref())
        {
            Ok(plan) => plan,
            Err(e) => {
                // Nothing was mutated yet; discard the snapshot taken for
                // this run and leave the machine in a terminal state.
                self.transition(OrchestratorState::Failed);
                error!("planning failed: {}", e);
                if let Err(rm) = fs::remove_dir_all(&snapshot.path) {
                    warn!(snapshot = %snapshot.id, "could not remove unused snapshot: {}", rm);
                }
                return Err(e.into());
            }
        };

        self.transition(OrchestratorState::Applying);
        let commit = self
            .apply(&plan)
            .and_then(|_| VersionStore::write(&self.root, &manifest.version).map_err(Into::into));

        match commit {
            Ok(()) => {
                self.transition(OrchestratorState::Succeeded);
                info!(version = %manifest.version, "update committed");
                if let Some(keep) = self.keep_snapshots {
                    if let Err(e) = BackupManager::prune(&self.root, keep) {
                        warn!("snapshot pruning failed: {}", e);
                    }
                }
                Ok(AutoOutcome::Updated {
                    from: current,
                    to: manifest.version,
                    snapshot_id: snapshot.id,
                    wrote: plan.writes(),
                    deleted: plan.deletes(),
                    preserved: plan.preserved().iter().map(|p| p.to_path_buf()).collect(),
                    review: plan
                        .review_flags()
                        .iter()
                        .map(|(p, r)| (p.to_path_buf(), r.to_string()))
                        .collect(),
                })
            }
            Err(apply_err) => {
                self.transition(OrchestratorState::Failed);
                error!("apply failed, rolling back: {}", apply_err);

                self.transition(OrchestratorState::RollingBack);
                match BackupManager::restore(&self.root, &SnapshotSelector::Id(snapshot.id.clone()))
                {
                    Ok(_) => {
                        self.transition(OrchestratorState::RolledBack);
                        Ok(AutoOutcome::RolledBack {
                            snapshot_id: snapshot.id,
                            reason: apply_err.to_string(),
                        })
                    }
                    Err(restore_err) => {
                        self.transition(OrchestratorState::RollbackFailed);
                        error!(
                            snapshot = %snapshot.id,
                            "rollback failed, manual restore required: {}",
                            restore_err
                        );
                        Err(restore_err)
                    }
                }
            }
        }
    }

    fn apply(&self, plan: &UpdatePlan) -> Result<(), UpdateError> {
        for action in &plan.actions {
            match action {
                FileAction::Write { path, content } => {
                    let dest = self.root.join(path);
                    if let Some(parent) = dest.parent() {
                        fs::create_dir_all(parent).map_err(|e| UpdateError::Apply {
                            path: path.clone(),
                            reason: format!("creating parent: {}", e),
                        })?;
                    }
                    fs::write(&dest, content).map_err(|e| UpdateError::Apply {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                    debug!(path = %path.display(), "wrote");
                }
                FileAction::Delete { path } => {
                    fs::remove_file(self.root.join(path)).map_err(|e| UpdateError::Apply {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                    debug!(path = %path.display(), "deleted stale file");
                }
                FileAction::SkipPreserved { path } => {
                    debug!(path = %path.display(), "preserved");
                }
                FileAction::FlagReview { path, reason } => {
                    info!(path = %path.display(), reason, "flagged for review");
                }
            }
        }
        Ok(())
    }

    /// Restore a snapshot directly, bypassing fetch and planning, and put
    /// its recorded source version back in the marker.
    pub fn rollback(&mut self, selector: &SnapshotSelector) -> Result<RollbackReport, UpdateError> {
        self.transition(OrchestratorState::RollingBack);

        fs::create_dir_all(&self.root).map_err(|e| UpdateError::Backup {
            reason: format!("creating {}: {}", self.root.display(), e),
        })?;
        let _lock = InstallLock::acquire(&self.root, "rollback")?;

        let snapshot = match BackupManager::restore(&self.root, selector) {
            Ok(s) => s,
            Err(e) => {
                self.transition(OrchestratorState::RollbackFailed);
                return Err(e);
            }
        };

        if let Some(ref version) = snapshot.source_version {
            VersionStore::write(&self.root, version).map_err(|e| {
                self.state = OrchestratorState::RollbackFailed;
                UpdateError::Rollback {
                    snapshot_id: snapshot.id.clone(),
                    reason: format!("restoring version marker: {}", e),
                }
            })?;
        }

        self.transition(OrchestratorState::RolledBack);
        info!(snapshot = %snapshot.id, "rollback complete");
        Ok(RollbackReport {
            snapshot_id: snapshot.id,
            restored_version: snapshot.source_version,
        })
    }
}
