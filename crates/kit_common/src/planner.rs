//! Update planner - the concrete file operations of an update
//!
//! A plan is computed once per apply and is deterministic: the same
//! (installation state, manifest, policy) triple always yields the same
//! ordered actions. Manifest entries keep manifest order; stale deletions
//! are sorted by path.

use std::path::{Path, PathBuf};

use crate::errors::FetchError;
use crate::layout::{LOCK_FILE, VERSION_FILE};
use crate::manifest::Manifest;
use crate::policy::{Classification, PreservationPolicy};
use crate::source::ReleaseSource;

/// One file operation of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    /// Install manifest content at this managed path.
    Write { path: PathBuf, content: Vec<u8> },
    /// Remove a stale managed file the release no longer ships.
    Delete { path: PathBuf },
    /// Leave a preserved path untouched.
    SkipPreserved { path: PathBuf },
    /// Surface a reviewable conflict for explicit decision.
    FlagReview { path: PathBuf, reason: String },
}

impl FileAction {
    pub fn path(&self) -> &Path {
        match self {
            FileAction::Write { path, .. }
            | FileAction::Delete { path }
            | FileAction::SkipPreserved { path }
            | FileAction::FlagReview { path, .. } => path,
        }
    }
}

/// Ordered set of file actions. Each path appears at most once.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    pub actions: Vec<FileAction>,
}

impl UpdatePlan {
    pub fn writes(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, FileAction::Write { .. }))
            .count()
    }

    pub fn deletes(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, FileAction::Delete { .. }))
            .count()
    }

    pub fn preserved(&self) -> Vec<&Path> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                FileAction::SkipPreserved { path } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    pub fn review_flags(&self) -> Vec<(&Path, &str)> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                FileAction::FlagReview { path, reason } => Some((path.as_path(), reason.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Computes plans from installation state, manifest and policy.
pub struct UpdatePlanner;

impl UpdatePlanner {
    /// Every file currently on disk under the root, relative and sorted.
    /// The version marker and lock file belong to the engine, not the
    /// release, and never appear in a plan.
    pub fn inventory(root: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(root) {
                Ok(r) => r.to_path_buf(),
                Err(_) => continue,
            };
            if rel == Path::new(VERSION_FILE) || rel == Path::new(LOCK_FILE) {
                continue;
            }
            paths.push(rel);
        }
        paths.sort();
        paths
    }

    /// Compute the plan: manifest entries first (manifest order), then
    /// deletions of stale managed files (path order). Content for writes
    /// is fetched up front so application itself touches only the
    /// filesystem.
    pub fn plan(
        root: &Path,
        manifest: &Manifest,
        policy: &PreservationPolicy,
        source: &dyn ReleaseSource,
    ) -> Result<UpdatePlan, FetchError> {
        let mut actions = Vec::new();

        for entry in &manifest.entries {
            if !entry.managed || entry.path == Path::new(VERSION_FILE) {
                // The marker is committed by the orchestrator after all
                // file operations succeed, never by the plan.
                continue;
            }
            match policy.classify(&entry.path) {
                Classification::Preserved => actions.push(FileAction::SkipPreserved {
                    path: entry.path.clone(),
                }),
                Classification::ReviewRequired { reason } => actions.push(FileAction::FlagReview {
                    path: entry.path.clone(),
                    reason,
                }),
                Classification::Managed => {
                    let content = source.fetch_content(&manifest.version, &entry.path)?;
                    actions.push(FileAction::Write {
                        path: entry.path.clone(),
                        content,
                    });
                }
            }
        }

        let in_manifest: std::collections::HashSet<&Path> =
            manifest.entries.iter().map(|e| e.path.as_path()).collect();

        for live in Self::inventory(root) {
            if in_manifest.contains(live.as_path()) {
                continue;
            }
            // Never delete content the policy does not own.
            if policy.classify(&live) == Classification::Managed {
                actions.push(FileAction::Delete { path: live });
            }
        }

        Ok(UpdatePlan { actions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MANIFEST_FILE;
    use crate::source::LocalSource;
    use std::fs;
    use tempfile::TempDir;

    fn release(dir: &Path, version: &str, files: &[(&str, &str)]) -> LocalSource {
        let entries: Vec<serde_json::Value> = files
            .iter()
            .map(|(p, _)| serde_json::json!({ "path": p }))
            .collect();
        fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::json!({ "version": version, "entries": entries }).to_string(),
        )
        .unwrap();
        for (p, content) in files {
            let full = dir.join(p);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        LocalSource::new(dir.to_path_buf())
    }

    fn install(dir: &Path, files: &[(&str, &str)]) {
        for (p, content) in files {
            let full = dir.join(p);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
    }

    fn fetch_manifest(source: &LocalSource) -> Manifest {
        use crate::source::{ReleaseSource as _, VersionSpec};
        source.fetch_manifest(&VersionSpec::Latest).unwrap()
    }

    #[test]
    fn test_plan_classifies_manifest_entries() {
        let live = TempDir::new().unwrap();
        let rel = TempDir::new().unwrap();
        install(live.path(), &[("CLAUDE.md", "mine"), ("memory/a.md", "note")]);
        let source = release(
            rel.path(),
            "1.0.0",
            &[
                ("commands/review.md", "new content"),
                ("CLAUDE.md", "template"),
                ("settings.json", "{}"),
            ],
        );
        let manifest = fetch_manifest(&source);

        let plan = UpdatePlanner::plan(
            live.path(),
            &manifest,
            &PreservationPolicy::default(),
            &source,
        )
        .unwrap();

        assert_eq!(plan.writes(), 1);
        assert_eq!(plan.preserved(), vec![Path::new("CLAUDE.md")]);
        assert_eq!(plan.review_flags().len(), 1);
        assert_eq!(plan.review_flags()[0].0, Path::new("settings.json"));
    }

    #[test]
    fn test_stale_managed_files_are_deleted_preserved_never() {
        let live = TempDir::new().unwrap();
        let rel = TempDir::new().unwrap();
        install(
            live.path(),
            &[
                ("commands/obsolete.md", "old"),
                ("memory/keep.md", "mine"),
                ("pain-points/keep.md", "mine"),
            ],
        );
        let source = release(rel.path(), "1.0.0", &[("commands/review.md", "new")]);
        let manifest = fetch_manifest(&source);

        let plan = UpdatePlanner::plan(
            live.path(),
            &manifest,
            &PreservationPolicy::default(),
            &source,
        )
        .unwrap();

        assert_eq!(plan.deletes(), 1);
        assert!(plan
            .actions
            .contains(&FileAction::Delete {
                path: PathBuf::from("commands/obsolete.md")
            }));
    }

    #[test]
    fn test_version_marker_never_in_plan() {
        let live = TempDir::new().unwrap();
        let rel = TempDir::new().unwrap();
        install(live.path(), &[("VERSION", "0.9.0\n")]);
        let source = release(rel.path(), "1.0.0", &[("VERSION", "1.0.0\n")]);
        let manifest = fetch_manifest(&source);

        let plan = UpdatePlanner::plan(
            live.path(),
            &manifest,
            &PreservationPolicy::default(),
            &source,
        )
        .unwrap();

        assert!(plan.actions.is_empty());
    }

    #[test]
    fn test_each_path_appears_at_most_once() {
        let live = TempDir::new().unwrap();
        let rel = TempDir::new().unwrap();
        install(live.path(), &[("commands/a.md", "old a")]);
        let source = release(
            rel.path(),
            "1.0.0",
            &[("commands/a.md", "new a"), ("commands/b.md", "new b")],
        );
        let manifest = fetch_manifest(&source);

        let plan = UpdatePlanner::plan(
            live.path(),
            &manifest,
            &PreservationPolicy::default(),
            &source,
        )
        .unwrap();

        let mut paths: Vec<_> = plan.actions.iter().map(|a| a.path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), plan.actions.len());
    }

    #[test]
    fn test_plan_is_deterministic() {
        let live = TempDir::new().unwrap();
        let rel = TempDir::new().unwrap();
        install(
            live.path(),
            &[("commands/z.md", "z"), ("commands/a.md", "a"), ("CLAUDE.md", "c")],
        );
        let source = release(
            rel.path(),
            "1.0.0",
            &[("commands/b.md", "b"), ("settings.json", "{}")],
        );
        let manifest = fetch_manifest(&source);
        let policy = PreservationPolicy::default();

        let first = UpdatePlanner::plan(live.path(), &manifest, &policy, &source).unwrap();
        let second = UpdatePlanner::plan(live.path(), &manifest, &policy, &source).unwrap();
        assert_eq!(first.actions, second.actions);
    }
}
