use std::collections::{BTreeMap, HashSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::Compatibility;
use crate::error::DownloaderError;
use crate::models::Version;

/// project id -> version id -> raw version payload as served by the catalog.
pub type CacheDocument = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, Default)]
pub struct CacheLookup {
    /// Cached versions that also match the active filter.
    pub matching: Vec<Version>,
    /// Every requested id found in the cache, matching or not.
    pub hits: Vec<String>,
    pub missing: Vec<String>,
}

pub trait VersionCache {
    fn lookup(
        &mut self,
        project_id: &str,
        wanted: &[String],
        filter: &Compatibility,
    ) -> Result<CacheLookup, DownloaderError>;

    fn merge(&mut self, project_id: &str, records: &[Value]) -> Result<(), DownloaderError>;

    fn flush(&mut self) -> Result<(), DownloaderError>;
}

pub fn default_cache_path() -> Result<Utf8PathBuf, DownloaderError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("modrinth-downloader")
                    .join("versions.cache"),
            )
            .ok()
        })
        .ok_or_else(|| DownloaderError::Filesystem("unable to resolve cache directory".to_string()))
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    document: CacheDocument,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> &CacheDocument {
        &self.document
    }
}

impl VersionCache for MemoryCache {
    fn lookup(
        &mut self,
        project_id: &str,
        wanted: &[String],
        filter: &Compatibility,
    ) -> Result<CacheLookup, DownloaderError> {
        Ok(lookup_in(&self.document, project_id, wanted, filter))
    }

    fn merge(&mut self, project_id: &str, records: &[Value]) -> Result<(), DownloaderError> {
        merge_into(&mut self.document, project_id, records);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DownloaderError> {
        Ok(())
    }
}

/// Whole-document JSON cache, loaded on first use and rewritten after every merge.
#[derive(Debug)]
pub struct JsonFileCache {
    path: Utf8PathBuf,
    document: Option<CacheDocument>,
    dirty: bool,
}

impl JsonFileCache {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            document: None,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn loaded(&mut self) -> Result<&mut CacheDocument, DownloaderError> {
        if self.document.is_none() {
            let document = read_document(&self.path)?;
            debug!(path = %self.path, projects = document.len(), "version cache loaded");
            self.document = Some(document);
        }
        Ok(self.document.get_or_insert_with(CacheDocument::new))
    }
}

impl VersionCache for JsonFileCache {
    fn lookup(
        &mut self,
        project_id: &str,
        wanted: &[String],
        filter: &Compatibility,
    ) -> Result<CacheLookup, DownloaderError> {
        let document = self.loaded()?;
        Ok(lookup_in(document, project_id, wanted, filter))
    }

    fn merge(&mut self, project_id: &str, records: &[Value]) -> Result<(), DownloaderError> {
        if records.is_empty() {
            return Ok(());
        }
        let document = self.loaded()?;
        merge_into(document, project_id, records);
        self.dirty = true;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), DownloaderError> {
        if !self.dirty {
            return Ok(());
        }
        let Some(document) = self.document.as_ref() else {
            return Ok(());
        };
        write_document(&self.path, document)?;
        self.dirty = false;
        Ok(())
    }
}

fn read_document(path: &Utf8Path) -> Result<CacheDocument, DownloaderError> {
    if !path.as_std_path().exists() {
        return Ok(CacheDocument::new());
    }
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| DownloaderError::Cache {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    if content.trim().is_empty() {
        return Ok(CacheDocument::new());
    }
    serde_json::from_str(&content).map_err(|err| DownloaderError::Cache {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn write_document(path: &Utf8Path, document: &CacheDocument) -> Result<(), DownloaderError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| DownloaderError::Filesystem(err.to_string()))?;
    }
    let tmp_path = path.with_extension("tmp");
    let content =
        serde_json::to_vec(document).map_err(|err| DownloaderError::Filesystem(err.to_string()))?;
    fs::write(tmp_path.as_std_path(), &content)
        .map_err(|err| DownloaderError::Filesystem(err.to_string()))?;
    fs::rename(tmp_path.as_std_path(), path.as_std_path())
        .map_err(|err| DownloaderError::Filesystem(err.to_string()))?;
    Ok(())
}

fn lookup_in(
    document: &CacheDocument,
    project_id: &str,
    wanted: &[String],
    filter: &Compatibility,
) -> CacheLookup {
    let records = document.get(project_id);
    let mut lookup = CacheLookup::default();
    let mut seen = HashSet::new();
    for id in wanted {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let Some(raw) = records.and_then(|records| records.get(id)) else {
            lookup.missing.push(id.clone());
            continue;
        };
        match serde_json::from_value::<Version>(raw.clone()) {
            Ok(version) => {
                lookup.hits.push(id.clone());
                // A cached id that fails the filter still counts as resolved and is not re-fetched.
                if filter.matches(&version.loaders, &version.game_versions) {
                    lookup.matching.push(version);
                }
            }
            Err(err) => {
                warn!(version_id = %id, error = %err, "cached version record is malformed; refetching");
                lookup.missing.push(id.clone());
            }
        }
    }
    lookup
}

fn merge_into(document: &mut CacheDocument, project_id: &str, records: &[Value]) {
    let entry = document.entry(project_id.to_string()).or_default();
    for record in records {
        match record.get("id").and_then(Value::as_str) {
            Some(id) => {
                entry.insert(id.to_string(), record.clone());
            }
            None => warn!(project_id, "version record without id was not cached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_version(id: &str, loader: &str, game_version: &str) -> Value {
        json!({
            "id": id,
            "project_id": "proj",
            "name": id,
            "version_number": "1.0.0",
            "game_versions": [game_version],
            "loaders": [loader],
            "files": [],
            "dependencies": []
        })
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn lookup_partitions_request() {
        let filter = Compatibility::new("1.20.1", "fabric");
        let mut cache = MemoryCache::new();
        cache
            .merge(
                "proj",
                &[
                    raw_version("a", "fabric", "1.20.1"),
                    raw_version("b", "forge", "1.20.1"),
                ],
            )
            .unwrap();

        let wanted = ids(&["a", "b", "c"]);
        let lookup = cache.lookup("proj", &wanted, &filter).unwrap();

        assert_eq!(lookup.hits, ids(&["a", "b"]));
        assert_eq!(lookup.missing, ids(&["c"]));
        assert_eq!(lookup.matching.len(), 1);
        assert_eq!(lookup.matching[0].id, "a");

        let mut union: Vec<String> = lookup.hits.iter().chain(&lookup.missing).cloned().collect();
        union.sort();
        assert_eq!(union, wanted);
    }

    #[test]
    fn unknown_project_is_all_missing() {
        let filter = Compatibility::new("1.20.1", "fabric");
        let mut cache = MemoryCache::new();
        let lookup = cache.lookup("other", &ids(&["x", "y"]), &filter).unwrap();
        assert!(lookup.hits.is_empty());
        assert_eq!(lookup.missing, ids(&["x", "y"]));
    }

    #[test]
    fn duplicate_ids_are_requested_once() {
        let filter = Compatibility::new("1.20.1", "fabric");
        let mut cache = MemoryCache::new();
        let wanted = ids(&["x", "y", "x"]);

        let lookup = cache.lookup("other", &wanted, &filter).unwrap();
        assert_eq!(lookup.missing, ids(&["x", "y"]));

        cache
            .merge("proj", &[raw_version("a", "fabric", "1.20.1")])
            .unwrap();
        let lookup = cache
            .lookup("proj", &ids(&["a", "b", "a", "b"]), &filter)
            .unwrap();
        assert_eq!(lookup.hits, ids(&["a"]));
        assert_eq!(lookup.missing, ids(&["b"]));
    }

    #[test]
    fn merge_keeps_sibling_records() {
        let mut cache = MemoryCache::new();
        cache
            .merge("proj", &[raw_version("a", "fabric", "1.20.1")])
            .unwrap();
        cache
            .merge("proj", &[raw_version("b", "fabric", "1.20.1")])
            .unwrap();
        let records = &cache.document()["proj"];
        assert!(records.contains_key("a"));
        assert!(records.contains_key("b"));
    }

    #[test]
    fn malformed_record_is_refetched() {
        let filter = Compatibility::new("1.20.1", "fabric");
        let mut cache = MemoryCache::new();
        cache.merge("proj", &[json!({"id": "broken"})]).unwrap();
        let lookup = cache.lookup("proj", &ids(&["broken"]), &filter).unwrap();
        assert!(lookup.hits.is_empty());
        assert_eq!(lookup.missing, ids(&["broken"]));
    }

    #[test]
    fn file_cache_persists_and_reloads() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("versions.cache")).unwrap();
        let filter = Compatibility::new("1.20.1", "fabric");

        let mut cache = JsonFileCache::new(path.clone());
        cache
            .merge("proj", &[raw_version("a", "fabric", "1.20.1")])
            .unwrap();
        assert!(path.as_std_path().exists());

        let mut reloaded = JsonFileCache::new(path);
        let lookup = reloaded.lookup("proj", &ids(&["a"]), &filter).unwrap();
        assert_eq!(lookup.hits, ids(&["a"]));
        assert_eq!(lookup.matching.len(), 1);
    }

    #[test]
    fn empty_cache_file_is_empty_document() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("versions.cache")).unwrap();
        fs::write(path.as_std_path(), "").unwrap();
        let filter = Compatibility::new("1.20.1", "fabric");

        let mut cache = JsonFileCache::new(path);
        let lookup = cache.lookup("proj", &ids(&["a"]), &filter).unwrap();
        assert_eq!(lookup.missing, ids(&["a"]));
    }
}
