//! Fixture store.
//!
//! Fixtures live in a flat directory, one `<content_type>.json` document per
//! content type. The whole directory is read into memory when stubbing
//! starts and is never re-read while stubbed.

use crate::error::{FauxError, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Content type name to canned response payload.
pub type FixtureSet = BTreeMap<String, Value>;

/// Payload served for content types with no fixture.
pub fn empty_payload() -> Value {
    json!({ "items": [] })
}

/// Read every `*.json` document in `dir`.
///
/// Fails only when the directory itself cannot be listed. Individual files
/// that are unreadable or not valid JSON are logged and skipped.
pub fn read_dir(dir: &Path) -> Result<FixtureSet> {
    let entries = std::fs::read_dir(dir).map_err(|source| FauxError::FixtureLoad {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut set = FixtureSet::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match parse_fixture(&path) {
            Ok(value) => {
                debug!(content_type = %name, "Loaded fixture");
                set.insert(name.to_string(), value);
            }
            Err(e) => warn!(error = %e, "Skipping fixture"),
        }
    }

    Ok(set)
}

fn parse_fixture(path: &Path) -> Result<Value> {
    let origin = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| FauxError::decode(&origin, e))?;
    serde_json::from_str(&content).map_err(|e| FauxError::decode(origin, e))
}

/// Load `dir` into a fixture set. A missing or unreadable directory yields
/// an empty set.
pub fn load(dir: &Path) -> FixtureSet {
    match read_dir(dir) {
        Ok(set) => set,
        Err(e) => {
            warn!(error = %e, "Fixture directory unavailable, serving empty results");
            FixtureSet::new()
        }
    }
}

/// In-memory fixtures for one stubbing session.
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    fixtures: FixtureSet,
    active: bool,
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the store contents with a fresh load of `dir` and activate it.
    pub fn reload(&mut self, dir: &Path) {
        self.fixtures = load(dir);
        self.active = true;
    }

    /// Drop all fixtures and deactivate.
    pub fn clear(&mut self) {
        self.fixtures.clear();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn fixtures(&self) -> &FixtureSet {
        &self.fixtures
    }

    /// Payload for `content_type`, or `{"items": []}` when there is none or
    /// the store is inactive. Always returns an owned copy.
    pub fn lookup(&self, content_type: Option<&str>) -> Value {
        if !self.active {
            return empty_payload();
        }
        content_type
            .and_then(|name| self.fixtures.get(name))
            .cloned()
            .unwrap_or_else(empty_payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(name), body).unwrap();
    }

    #[test]
    fn test_load_maps_file_stem_to_document() {
        let dir = TempDir::new().unwrap();
        write(&dir, "article.json", r#"{"items":[{"id":1}],"total":1}"#);
        write(&dir, "author.json", r#"{"items":[],"total":0}"#);
        write(&dir, "notes.txt", "not a fixture");

        let set = load(dir.path());
        assert_eq!(set.len(), 2);
        assert_eq!(set["article"]["total"], 1);
        assert!(set.contains_key("author"));
    }

    #[test]
    fn test_malformed_fixture_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "good.json", r#"{"items":[]}"#);
        write(&dir, "bad.json", "{ nope");

        let set = load(dir.path());
        assert_eq!(set.len(), 1);
        assert!(set.contains_key("good"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");

        assert!(matches!(
            read_dir(&missing),
            Err(FauxError::FixtureLoad { .. })
        ));
        assert!(load(&missing).is_empty());
    }

    #[test]
    fn test_lookup_defaults() {
        let dir = TempDir::new().unwrap();
        write(&dir, "article.json", r#"{"items":[{"id":1}]}"#);

        let mut store = FixtureStore::new();
        assert_eq!(store.lookup(Some("article")), empty_payload());

        store.reload(dir.path());
        assert!(store.is_active());
        assert_eq!(store.lookup(Some("article"))["items"][0]["id"], 1);
        assert_eq!(store.lookup(Some("unknown")), empty_payload());
        assert_eq!(store.lookup(None), empty_payload());

        store.clear();
        assert!(!store.is_active());
        assert!(store.is_empty());
        assert_eq!(store.lookup(Some("article")), empty_payload());
    }
}
