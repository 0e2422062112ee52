use std::path::{Path, PathBuf};

use lading_core::{Location, Resource};
use sha2::{Digest, Sha256};

/// Directory, relative to a cache root, holding the advisory lock files.
pub const LOCK_DIR: &str = ".locks";

/// Maps resources onto files below a cache root.
///
/// Layout is `root/<location-dir>/<path>`. Both tiers of a tiered cache use
/// the same mapping, so a relative cache path names the same entry on either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    root: PathBuf,
}

impl PathMapping {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    /// Filesystem-safe directory name for `location`.
    ///
    /// ```
    /// use lading_cache::PathMapping;
    /// use lading_core::Location;
    ///
    /// let dir = PathMapping::location_dir(&Location::new("http://foo.com").unwrap());
    /// assert!(dir.starts_with("http___foo.com_-"));
    /// assert_eq!(dir.len(), "http___foo.com_-".len() + 8);
    /// ```
    pub fn location_dir(location: &Location) -> String {
        let uri = location.uri().as_str();
        let sanitized: String = uri
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let digest = hex::encode(Sha256::digest(uri.as_bytes()));
        format!("{}-{}", sanitized, &digest[..8])
    }

    /// Root-relative cache path, `/` separated. Also the usage-cache key.
    pub fn relative(resource: &Resource) -> String {
        let dir = Self::location_dir(resource.location());
        if resource.is_root() {
            dir
        } else {
            format!("{}/{}", dir, resource.path())
        }
    }

    pub fn path_for(&self, resource: &Resource) -> PathBuf {
        let mut path = self.root.join(Self::location_dir(resource.location()));
        for segment in resource.path().split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    /// Lock file guarding `resource`; one per cache path.
    pub fn lock_path(&self, resource: &Resource) -> PathBuf {
        let key = hex::encode(Sha256::digest(Self::relative(resource).as_bytes()));
        self.root.join(LOCK_DIR).join(format!("{key}.lock"))
    }
}
