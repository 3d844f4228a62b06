//! kit_common - transactional update engine for a kit installation
//!
//! Evolves a local, file-based installation from one versioned release to
//! another while preserving user-authored content. The flow: read the
//! version marker, fetch the target manifest, snapshot the whole tree,
//! compute a deterministic plan, apply it, commit the new version as the
//! last step. Any apply failure restores the snapshot automatically.

pub mod backup;
pub mod errors;
pub mod layout;
pub mod lock;
pub mod manifest;
pub mod orchestrator;
pub mod planner;
pub mod policy;
pub mod source;
pub mod version;

pub use backup::{BackupManager, Snapshot, SnapshotSelector};
pub use errors::{FetchError, UpdateError, VersionError};
pub use manifest::{Manifest, ManifestEntry};
pub use orchestrator::{
    AutoOutcome, CheckReport, OrchestratorState, RollbackReport, UpdateOrchestrator,
};
pub use planner::{FileAction, UpdatePlan, UpdatePlanner};
pub use policy::{Classification, PreservationPolicy};
pub use source::{from_origin, LocalSource, ReleaseSource, RemoteSource, VersionSpec, DEFAULT_ORIGIN};
pub use version::{Version, VersionStore};
