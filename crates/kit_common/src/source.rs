//! Release sources - where target releases come from
//!
//! One trait, two transports: an HTTP origin for normal operation and a
//! local release checkout for offline use and tests. The orchestrator
//! never knows which one it is talking to.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::errors::FetchError;
use crate::layout::MANIFEST_FILE;
use crate::manifest::Manifest;
use crate::version::Version;

/// Default release origin, overridable via `KIT_SOURCE` or `--source`.
pub const DEFAULT_ORIGIN: &str = "https://releases.kit-updater.dev";

/// Which release to fetch.
#[derive(Debug, Clone)]
pub enum VersionSpec {
    Latest,
    Exact(Version),
}

impl std::fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSpec::Latest => write!(f, "latest"),
            VersionSpec::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// Fetches manifests and file contents for a target release.
///
/// Absence of a requested version is a `FetchError`, never an empty
/// manifest; transport failures are reported, never treated as
/// "no update available".
pub trait ReleaseSource {
    fn fetch_manifest(&self, target: &VersionSpec) -> Result<Manifest, FetchError>;
    fn fetch_content(&self, version: &Version, path: &Path) -> Result<Vec<u8>, FetchError>;
}

/// Build a source from an origin string: HTTP(S) URLs get the remote
/// transport, anything else is treated as a local release checkout.
pub fn from_origin(origin: &str) -> Box<dyn ReleaseSource> {
    if origin.starts_with("http://") || origin.starts_with("https://") {
        Box::new(RemoteSource::new(origin))
    } else {
        Box::new(LocalSource::new(PathBuf::from(origin)))
    }
}

/// HTTP release origin. Layout: `{base}/releases/{latest|v<version>}/...`.
pub struct RemoteSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RemoteSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::builder()
                .user_agent(format!("kit-updater/{}", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
        }
    }

    fn release_url(&self, release: &str, rel: &str) -> String {
        format!("{}/releases/{}/{}", self.base_url, release, rel)
    }

    fn get(&self, url: &str, what: &str) -> Result<reqwest::blocking::Response, FetchError> {
        debug!(url, "fetching {}", what);
        self.client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport {
                what: what.to_string(),
                reason: e.to_string(),
            })
    }
}

fn ensure_success(
    resp: reqwest::blocking::Response,
    what: &str,
) -> Result<reqwest::blocking::Response, FetchError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(FetchError::Transport {
            what: what.to_string(),
            reason: format!("HTTP {}", resp.status()),
        })
    }
}

impl ReleaseSource for RemoteSource {
    fn fetch_manifest(&self, target: &VersionSpec) -> Result<Manifest, FetchError> {
        let release = match target {
            VersionSpec::Latest => "latest".to_string(),
            VersionSpec::Exact(v) => format!("v{}", v),
        };
        let url = self.release_url(&release, MANIFEST_FILE);

        let resp = self.get(&url, "manifest")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::VersionNotFound(target.to_string()));
        }
        let resp = ensure_success(resp, "manifest")?;

        let manifest: Manifest =
            resp.json().map_err(|e| FetchError::ManifestInvalid {
                path: url.clone(),
                reason: e.to_string(),
            })?;
        manifest
            .validate()
            .map_err(|reason| FetchError::ManifestInvalid { path: url, reason })?;

        if let VersionSpec::Exact(wanted) = target {
            if &manifest.version != wanted {
                return Err(FetchError::VersionNotFound(wanted.to_string()));
            }
        }
        Ok(manifest)
    }

    fn fetch_content(&self, version: &Version, path: &Path) -> Result<Vec<u8>, FetchError> {
        let rel = path.to_string_lossy().replace('\\', "/");
        let url = self.release_url(&format!("v{}", version), &rel);
        let what = format!("content {}", rel);
        let resp = ensure_success(self.get(&url, &what)?, &what)?;
        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Transport {
                what: format!("content {}", rel),
                reason: e.to_string(),
            })
    }
}

/// A release checkout on local disk: `manifest.json` plus the managed
/// files, all relative to one directory.
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ReleaseSource for LocalSource {
    fn fetch_manifest(&self, target: &VersionSpec) -> Result<Manifest, FetchError> {
        let path = self.root.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&path).map_err(|e| FetchError::Transport {
            what: "manifest".to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;

        let manifest: Manifest =
            serde_json::from_str(&raw).map_err(|e| FetchError::ManifestInvalid {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        manifest.validate().map_err(|reason| FetchError::ManifestInvalid {
            path: path.display().to_string(),
            reason,
        })?;

        if let VersionSpec::Exact(wanted) = target {
            if &manifest.version != wanted {
                return Err(FetchError::VersionNotFound(wanted.to_string()));
            }
        }
        Ok(manifest)
    }

    fn fetch_content(&self, _version: &Version, path: &Path) -> Result<Vec<u8>, FetchError> {
        let full = self.root.join(path);
        fs::read(&full).map_err(|_| FetchError::ContentMissing {
            path: path.to_string_lossy().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_release(dir: &Path, version: &str, files: &[(&str, &str)]) {
        let entries: Vec<serde_json::Value> = files
            .iter()
            .map(|(p, _)| serde_json::json!({ "path": p, "managed": true }))
            .collect();
        let manifest = serde_json::json!({ "version": version, "entries": entries });
        fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();
        for (p, content) in files {
            let full = dir.join(p);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, content).unwrap();
        }
    }

    #[test]
    fn test_local_source_fetches_manifest_and_content() {
        let dir = TempDir::new().unwrap();
        write_release(dir.path(), "1.0.0", &[("commands/review.md", "# Review")]);

        let source = LocalSource::new(dir.path().to_path_buf());
        let manifest = source.fetch_manifest(&VersionSpec::Latest).unwrap();
        assert_eq!(manifest.version, "1.0.0".parse().unwrap());

        let content = source
            .fetch_content(&manifest.version, Path::new("commands/review.md"))
            .unwrap();
        assert_eq!(content, b"# Review");
    }

    #[test]
    fn test_exact_version_mismatch_is_not_found() {
        let dir = TempDir::new().unwrap();
        write_release(dir.path(), "1.0.0", &[]);

        let source = LocalSource::new(dir.path().to_path_buf());
        let wanted = VersionSpec::Exact("2.0.0".parse().unwrap());
        assert!(matches!(
            source.fetch_manifest(&wanted),
            Err(FetchError::VersionNotFound(_))
        ));
    }

    #[test]
    fn test_missing_manifest_is_a_fetch_error() {
        let dir = TempDir::new().unwrap();
        let source = LocalSource::new(dir.path().to_path_buf());
        assert!(matches!(
            source.fetch_manifest(&VersionSpec::Latest),
            Err(FetchError::Transport { .. })
        ));
    }

    #[test]
    fn test_missing_content_is_reported() {
        let dir = TempDir::new().unwrap();
        write_release(dir.path(), "1.0.0", &[]);
        let source = LocalSource::new(dir.path().to_path_buf());
        assert!(matches!(
            source.fetch_content(&"1.0.0".parse().unwrap(), Path::new("ghost.md")),
            Err(FetchError::ContentMissing { .. })
        ));
    }

    #[test]
    fn test_origin_dispatch() {
        // URL origins get the remote transport; everything else local.
        // Only the local path is exercised here.
        let dir = TempDir::new().unwrap();
        write_release(dir.path(), "0.9.0", &[]);
        let source = from_origin(dir.path().to_str().unwrap());
        assert!(source.fetch_manifest(&VersionSpec::Latest).is_ok());
    }
}
