//! Version marker storage and comparison
//!
//! Versions are dotted-numeric with an optional pre-release suffix. The
//! base tuple is the primary comparison key; the suffix only flags a
//! locally modified installation ("not a clean release") and never orders
//! a version below its own base.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::errors::VersionError;
use crate::layout::VERSION_FILE;

/// A parsed version string, e.g. `1.0.0` or `1.0.0-modified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    /// Pre-release suffix, if any. Means "locally modified".
    suffix: Option<String>,
}

impl Version {
    pub fn base(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }

    /// A clean release carries no pre-release suffix.
    pub fn is_clean_release(&self) -> bool {
        self.suffix.is_none()
    }

    /// Compare base tuples, ignoring the suffix.
    pub fn cmp_base(&self, other: &Version) -> Ordering {
        self.base().cmp(&other.base())
    }

    /// True when `self` is a strictly newer release than `other`.
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.cmp_base(other) == Ordering::Greater
    }

    /// Same base tuple, regardless of suffix.
    pub fn same_base(&self, other: &Version) -> bool {
        self.cmp_base(other) == Ordering::Equal
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty version string".into());
        }

        let (base, suffix) = match s.split_once('-') {
            Some((b, suf)) if !suf.is_empty() => (b, Some(suf.to_string())),
            Some((_, _)) => return Err(format!("dangling suffix in {:?}", s)),
            None => (s, None),
        };

        let parts: Vec<&str> = base.split('.').collect();
        if parts.len() > 3 {
            return Err(format!("too many components in {:?}", s));
        }
        let num = |idx: usize, name: &str| -> Result<u32, String> {
            match parts.get(idx) {
                Some(p) => p
                    .parse::<u32>()
                    .map_err(|_| format!("non-numeric {} in {:?}", name, s)),
                None => Ok(0),
            }
        };
        let major = num(0, "major")?;
        let minor = num(1, "minor")?;
        let patch = num(2, "patch")?;

        Ok(Version {
            major,
            minor,
            patch,
            suffix,
        })
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref suf) = self.suffix {
            write!(f, "-{}", suf)?;
        }
        Ok(())
    }
}

/// Reads and writes the single version marker of an installation.
pub struct VersionStore;

impl VersionStore {
    /// Read the marker. Missing or unparsable content is reported as
    /// `NotFound`/`Invalid` so the orchestrator can take the
    /// first-install path instead of failing hard.
    pub fn read(root: &Path) -> Result<Version, VersionError> {
        let path = root.join(VERSION_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VersionError::NotFound { path });
            }
            Err(e) => {
                return Err(VersionError::Io {
                    op: "read",
                    path,
                    source: e,
                });
            }
        };

        raw.trim()
            .parse::<Version>()
            .map_err(|_| VersionError::Invalid {
                path,
                content: raw.trim().to_string(),
            })
    }

    /// Write the marker as a single trimmed line.
    pub fn write(root: &Path, version: &Version) -> Result<(), VersionError> {
        let path = root.join(VERSION_FILE);
        fs::write(&path, format!("{}\n", version)).map_err(|e| VersionError::Io {
            op: "write",
            path,
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_version_comparison() {
        assert!(v("1.0.0").is_newer_than(&v("0.9.0")));
        assert!(v("0.9.1").is_newer_than(&v("0.9.0")));
        assert!(v("1.0.0").is_newer_than(&v("0.99.99")));
        assert!(!v("0.9.0").is_newer_than(&v("0.9.0")));
        assert!(!v("0.9.0").is_newer_than(&v("1.0.0")));
    }

    #[test]
    fn test_suffix_is_a_flag_not_an_ordering() {
        let clean = v("1.0.0");
        let modified = v("1.0.0-modified");
        assert!(clean.is_clean_release());
        assert!(!modified.is_clean_release());
        assert!(clean.same_base(&modified));
        assert!(!modified.is_newer_than(&clean));
        assert!(!clean.is_newer_than(&modified));
        assert_ne!(clean, modified);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Version>().is_err());
        assert!("abc".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("1.0.0-".parse::<Version>().is_err());
    }

    #[test]
    fn test_short_versions_default_missing_components() {
        assert_eq!(v("1").base(), (1, 0, 0));
        assert_eq!(v("1.2").base(), (1, 2, 0));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let version = v("0.9.0");
        VersionStore::write(dir.path(), &version).unwrap();
        assert_eq!(VersionStore::read(dir.path()).unwrap(), version);
    }

    #[test]
    fn test_missing_marker_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            VersionStore::read(dir.path()),
            Err(VersionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_corrupt_marker_is_invalid() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "not a version").unwrap();
        assert!(matches!(
            VersionStore::read(dir.path()),
            Err(VersionError::Invalid { .. })
        ));
    }
}
