//! Release manifest - what a target release contains
//!
//! A manifest names the release version and its managed file set. Content
//! itself is fetched per path through the release source, so the manifest
//! stays small and enumerable.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::version::Version;

/// One file of a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative path under the installation root.
    pub path: PathBuf,
    /// Managed entries are owned by the release. Defaults to true.
    #[serde(default = "default_managed")]
    pub managed: bool,
}

fn default_managed() -> bool {
    true
}

/// Description of a target release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: Version,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Validate structural invariants: paths are unique, relative, and
    /// never escape the installation root.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(&entry.path) {
                return Err(format!("duplicate path {}", entry.path.display()));
            }
            validate_relative(&entry.path)?;
        }
        Ok(())
    }

    /// Managed paths in manifest order.
    pub fn managed_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|e| e.managed)
            .map(|e| e.path.as_path())
    }
}

fn validate_relative(path: &Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("empty path in manifest".into());
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => {
                return Err(format!(
                    "path {} escapes the installation root",
                    path.display()
                ));
            }
            _ => {
                return Err(format!("path {} is not relative", path.display()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(paths: &[&str]) -> Manifest {
        Manifest {
            version: "1.0.0".parse().unwrap(),
            entries: paths
                .iter()
                .map(|p| ManifestEntry {
                    path: PathBuf::from(p),
                    managed: true,
                })
                .collect(),
        }
    }

    #[test]
    fn test_valid_manifest() {
        assert!(manifest(&["VERSION", "commands/review.md"]).validate().is_ok());
    }

    #[test]
    fn test_duplicate_paths_rejected() {
        let err = manifest(&["a.md", "a.md"]).validate().unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(manifest(&["../escape.md"]).validate().is_err());
        assert!(manifest(&["commands/../../escape.md"]).validate().is_err());
    }

    #[test]
    fn test_absolute_paths_rejected() {
        assert!(manifest(&["/etc/passwd"]).validate().is_err());
    }

    #[test]
    fn test_manifest_json_round_trip() {
        let m = manifest(&["commands/review.md"]);
        let json = serde_json::to_string(&m).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, m.version);
        assert_eq!(back.entries.len(), 1);
        assert!(back.entries[0].managed);
    }

    #[test]
    fn test_managed_defaults_to_true() {
        let json = r#"{"version":"1.0.0","entries":[{"path":"a.md"}]}"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert!(m.entries[0].managed);
    }
}
