//! Conformance kit for [`CacheProvider`] implementations.
//!
//! Each scenario takes a provider rooted in an empty directory and panics with
//! a descriptive message when the provider breaks the contract. Run them all
//! with [`run_all`]:
//!
//! ```no_run
//! use lading_cache::{FileCacheProvider, tck};
//!
//! let dir = std::env::temp_dir().join("lading-tck");
//! tck::run_all(|| FileCacheProvider::new(&dir)).unwrap();
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use lading_core::{Location, Resource};

use crate::{CacheError, CacheProvider, CacheResult};

pub const PRIMARY_URI: &str = "http://foo.com";
pub const SECONDARY_URI: &str = "http://bar.com";
pub const ENTRY_PATH: &str = "/path/to/my/file.txt";

const CONTENT: &[u8] = b"This is a test";

fn resource(uri: &str, path: &str) -> CacheResult<Resource> {
    let location = Location::new(uri).map_err(|e| CacheError::Usage(e.to_string()))?;
    Ok(Resource::new(Arc::new(location), path))
}

fn write(provider: &dyn CacheProvider, res: &Resource, content: &[u8]) -> CacheResult<()> {
    let mut writer = provider.open_writer(res)?;
    writer
        .write_all(content)
        .map_err(|e| CacheError::io(provider.file_path(res), e))?;
    writer.commit()
}

fn read(provider: &dyn CacheProvider, res: &Resource) -> CacheResult<Vec<u8>> {
    let mut reader = provider.open_reader(res)?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| CacheError::io(provider.file_path(res), e))?;
    Ok(buf)
}

/// After a committed write the parent reads as a directory.
pub fn write_makes_parent_directory(provider: &dyn CacheProvider) -> CacheResult<()> {
    let res = resource(PRIMARY_URI, ENTRY_PATH)?;
    write(provider, &res, CONTENT)?;

    let parent = res.parent().unwrap_or_else(|| res.clone());
    assert!(provider.is_directory(&parent), "parent of {res} should be a directory");
    Ok(())
}

pub fn list_contains_written_entry(provider: &dyn CacheProvider) -> CacheResult<()> {
    let res = resource(PRIMARY_URI, ENTRY_PATH)?;
    write(provider, &res, CONTENT)?;

    let parent = res.parent().unwrap_or_else(|| res.clone());
    let listing = provider.list(&parent)?;
    assert!(
        listing.iter().any(|name| name == "file.txt"),
        "listing of {parent} should contain file.txt, got {listing:?}"
    );
    Ok(())
}

pub fn write_then_exists(provider: &dyn CacheProvider) -> CacheResult<()> {
    let res = resource(PRIMARY_URI, ENTRY_PATH)?;
    write(provider, &res, CONTENT)?;
    assert!(provider.exists(&res), "{res} should exist after commit");
    Ok(())
}

pub fn delete_then_absent(provider: &dyn CacheProvider) -> CacheResult<()> {
    let res = resource(PRIMARY_URI, ENTRY_PATH)?;
    write(provider, &res, CONTENT)?;

    assert!(provider.delete(&res)?, "delete of {res} should report it existed");
    assert!(!provider.exists(&res), "{res} should be gone after delete");
    Ok(())
}

pub fn write_then_read(provider: &dyn CacheProvider) -> CacheResult<()> {
    let res = resource(PRIMARY_URI, ENTRY_PATH)?;
    write(provider, &res, CONTENT)?;
    assert_eq!(read(provider, &res)?, CONTENT, "read of {res} returned other bytes");
    Ok(())
}

pub fn copy_across_locations(provider: &dyn CacheProvider) -> CacheResult<()> {
    let from = resource(PRIMARY_URI, ENTRY_PATH)?;
    let to = resource(SECONDARY_URI, ENTRY_PATH)?;
    write(provider, &from, CONTENT)?;

    provider.copy(&from, &to)?;
    assert_eq!(read(provider, &to)?, CONTENT, "copy to {to} returned other bytes");
    assert!(provider.exists(&from), "copy must leave {from} in place");
    Ok(())
}

pub fn delete_absent_returns_false(provider: &dyn CacheProvider) -> CacheResult<()> {
    let res = resource(PRIMARY_URI, "/never/written.txt")?;
    assert!(!provider.delete(&res)?, "delete of absent {res} should return false");
    Ok(())
}

/// Run every scenario, each against a fresh provider from `make`.
///
/// Scenarios reuse the same paths, so `make` must hand out providers that do
/// not share state, or the kit resets them by deleting what it wrote.
pub fn run_all<P, F>(mut make: F) -> CacheResult<()>
where
    P: CacheProvider,
    F: FnMut() -> P,
{
    let scenarios: [fn(&dyn CacheProvider) -> CacheResult<()>; 7] = [
        write_makes_parent_directory,
        list_contains_written_entry,
        write_then_exists,
        delete_then_absent,
        write_then_read,
        copy_across_locations,
        delete_absent_returns_false,
    ];

    for scenario in scenarios {
        let provider = make();
        scenario(&provider)?;
        for uri in [PRIMARY_URI, SECONDARY_URI] {
            provider.delete(&resource(uri, "/")?)?;
        }
    }
    Ok(())
}
