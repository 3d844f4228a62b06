//! Installation layout - fixed relative paths of a kit installation
//!
//! Every component agrees on these paths. The version marker and the
//! managed commands directory are owned by releases; CLAUDE.md, memory/
//! and pain-points/ are user-owned and survive every update.

use std::path::{Path, PathBuf};

/// Version marker file: a single trimmed version string.
pub const VERSION_FILE: &str = "VERSION";

/// Managed command definitions live here.
pub const COMMANDS_DIR: &str = "commands";

/// User-owned active memory notes.
pub const MEMORY_DIR: &str = "memory";

/// User-owned pain-point logs.
pub const PAIN_POINTS_DIR: &str = "pain-points";

/// User-owned root configuration file.
pub const USER_CONFIG_FILE: &str = "CLAUDE.md";

/// Prefix of snapshot directories, siblings of the installation root.
pub const SNAPSHOT_PREFIX: &str = "kit-backup-";

/// Advisory lock file held for the duration of a mutating run.
pub const LOCK_FILE: &str = ".kit-update.lock";

/// Manifest file name at the root of a release checkout.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata file written inside each snapshot directory.
pub const SNAPSHOT_METADATA_FILE: &str = "snapshot.json";

/// Directory that holds snapshots for an installation root.
///
/// Snapshots are siblings of the root so that restoring can wipe and
/// rewrite the root without touching its own backups.
pub fn snapshot_parent(root: &Path) -> Option<&Path> {
    root.parent()
}

/// Full path of a snapshot directory for a given id.
pub fn snapshot_dir(root: &Path, id: &str) -> Option<PathBuf> {
    snapshot_parent(root).map(|p| p.join(format!("{}{}", SNAPSHOT_PREFIX, id)))
}
