use dashmap::DashMap;

use crate::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordKind {
    /// Password for the user named in the location uri.
    User,
    /// Password for the user named in the proxy uri.
    Proxy,
    /// Passphrase of the location's encrypted client key.
    Key,
}

/// Lookup key for a secret belonging to one location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PasswordEntry {
    uri:  String,
    kind: PasswordKind,
}

impl PasswordEntry {
    pub fn new(location: &Location, kind: PasswordKind) -> Self {
        Self {
            uri: location.uri().as_str().to_string(),
            kind,
        }
    }

    pub fn kind(&self) -> PasswordKind { self.kind }
}

/// Source of per-location secrets, consulted when a request is executed.
pub trait PasswordManager: Send + Sync {
    fn password(&self, entry: &PasswordEntry) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct MemoryPasswordManager {
    passwords: DashMap<PasswordEntry, String>,
}

impl MemoryPasswordManager {
    pub fn new() -> Self { Self::default() }

    pub fn bind(&self, location: &Location, kind: PasswordKind, password: impl Into<String>) {
        self.passwords.insert(PasswordEntry::new(location, kind), password.into());
    }
}

impl PasswordManager for MemoryPasswordManager {
    fn password(&self, entry: &PasswordEntry) -> Option<String> {
        self.passwords.get(entry).map(|p| p.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_lookup() {
        let loc = Location::new("https://deployer@repo.example.com").unwrap();
        let other = Location::new("https://other.example.com").unwrap();
        let passwords = MemoryPasswordManager::new();
        passwords.bind(&loc, PasswordKind::User, "s3cret");
        passwords.bind(&loc, PasswordKind::Key, "changeit");

        assert_eq!(
            passwords.password(&PasswordEntry::new(&loc, PasswordKind::User)),
            Some("s3cret".to_string())
        );
        assert_eq!(passwords.password(&PasswordEntry::new(&loc, PasswordKind::Proxy)), None);
        assert_eq!(
            passwords.password(&PasswordEntry::new(&loc, PasswordKind::Key)),
            Some("changeit".to_string())
        );
        assert_eq!(passwords.password(&PasswordEntry::new(&other, PasswordKind::User)), None);
    }
}
