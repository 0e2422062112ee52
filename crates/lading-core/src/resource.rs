use std::hash::{Hash, Hasher};
use std::sync::Arc;

use url::Url;

use crate::error::{Result, TransferError};
use crate::location::Location;

/// Normalize a repository-relative path.
///
/// Backslashes count as separators, empty and `.` segments are dropped and `..`
/// pops a segment without ever escaping the root.
///
/// ```
/// use lading_core::normalize_path;
///
/// assert_eq!(normalize_path("/path/to//my/./file.txt"), "path/to/my/file.txt");
/// assert_eq!(normalize_path("../../etc/passwd"), "etc/passwd");
/// assert_eq!(normalize_path("/"), "");
/// ```
pub fn normalize_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// A location plus a normalized relative path.
///
/// Value type: equality is (location uri, path), which is the key used for
/// cache locks, pending operations and the not-found cache.
#[derive(Debug, Clone)]
pub struct Resource {
    location: Arc<Location>,
    path:     String,
}

impl Resource {
    pub fn new(location: impl Into<Arc<Location>>, path: &str) -> Self {
        Self {
            location: location.into(),
            path:     normalize_path(path),
        }
    }

    pub fn location(&self) -> &Arc<Location> { &self.location }

    pub fn path(&self) -> &str { &self.path }

    pub fn is_root(&self) -> bool { self.path.is_empty() }

    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.path.rsplit('/').next()
    }

    pub fn parent(&self) -> Option<Resource> {
        if self.is_root() {
            return None;
        }
        let parent = self.path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        Some(Self {
            location: Arc::clone(&self.location),
            path:     parent.to_string(),
        })
    }

    pub fn child(&self, name: &str) -> Resource {
        Resource::new(Arc::clone(&self.location), &format!("{}/{}", self.path, name))
    }

    /// Entry stored next to this one, e.g. `file.jar` + `.md5` → `file.jar.md5`.
    pub fn sibling(&self, suffix: &str) -> Resource {
        Self {
            location: Arc::clone(&self.location),
            path:     format!("{}{}", self.path, suffix),
        }
    }

    pub fn allows_publishing(&self) -> bool { self.location.allow_publishing() }

    pub fn allows_storing(&self) -> bool { self.location.allows_storing() }

    /// Absolute remote url of this resource.
    pub fn url(&self) -> Result<Url> {
        let mut base = self.location.uri().clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(&self.path).map_err(|e| {
            TransferError::configuration(self.to_string(), format!("cannot build url: {e}"))
        })
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.location == other.location
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
        self.path.hash(state);
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.location, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn foo() -> Arc<Location> { Arc::new(Location::new("http://foo.com").unwrap()) }

    #[test]
    fn test_normalized_equality() {
        let loc = foo();
        let a = Resource::new(Arc::clone(&loc), "/path/to/my/file.txt");
        let b = Resource::new(Arc::clone(&loc), "path/to//my/file.txt");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_distinct_locations_do_not_collide() {
        let a = Resource::new(foo(), "/path/to/my/file.txt");
        let b = Resource::new(Location::new("http://bar.com").unwrap(), "/path/to/my/file.txt");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parent_child_and_sibling() {
        let file = Resource::new(foo(), "/path/to/my/file.txt");
        assert_eq!(file.file_name(), Some("file.txt"));

        let dir = file.parent().unwrap();
        assert_eq!(dir.path(), "path/to/my");
        assert_eq!(dir.child("file.txt"), file);
        assert_eq!(file.sibling(".md5").path(), "path/to/my/file.txt.md5");

        let root = Resource::new(foo(), "/");
        assert!(root.is_root());
        assert!(root.parent().is_none());
        assert_eq!(Resource::new(foo(), "top").parent().unwrap(), root);
    }

    #[test]
    fn test_url_joins_location_path() {
        let loc = Location::new("https://repo.example.com/maven2").unwrap();
        let res = Resource::new(loc, "org/foo/1.0/foo-1.0.jar");
        assert_eq!(
            res.url().unwrap().as_str(),
            "https://repo.example.com/maven2/org/foo/1.0/foo-1.0.jar"
        );
    }
}
