#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;

use serde_json::{Value, json};

use modrinth_downloader::cache::MemoryCache;
use modrinth_downloader::catalog::{Catalog, CatalogApi, RemoteFile};
use modrinth_downloader::domain::{Compatibility, TagKind};
use modrinth_downloader::error::DownloaderError;
use modrinth_downloader::models::{Collection, Entry, Project, Version};

pub const GAME_VERSION: &str = "1.20.1";
pub const LOADER: &str = "fabric";

#[derive(Default)]
pub struct MockCatalog {
    pub projects: HashMap<String, Value>,
    pub versions: HashMap<String, Value>,
    pub collections: HashMap<String, Value>,
    pub files: HashMap<String, Vec<u8>>,
    /// Urls whose declared length is larger than the body actually sent.
    pub short_files: HashSet<String>,
    pub failing_projects: HashSet<String>,
    pub version_batches: Mutex<Vec<usize>>,
    pub project_calls: Mutex<Vec<String>>,
    pub file_calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Value) -> Self {
        let id = project["id"].as_str().unwrap().to_string();
        if let Some(slug) = project.get("slug").and_then(Value::as_str) {
            self.projects.insert(slug.to_string(), project.clone());
        }
        self.projects.insert(id, project);
        self
    }

    pub fn with_version(mut self, version: Value) -> Self {
        let id = version["id"].as_str().unwrap().to_string();
        for file in version["files"].as_array().into_iter().flatten() {
            let url = file["url"].as_str().unwrap().to_string();
            let size = file["size"].as_u64().unwrap_or(0) as usize;
            self.files.entry(url).or_insert_with(|| vec![b'x'; size]);
        }
        self.versions.insert(id, version);
        self
    }

    pub fn with_collection(mut self, id: &str, name: &str, projects: &[&str]) -> Self {
        self.collections.insert(
            id.to_string(),
            json!({"id": id, "name": name, "description": null, "projects": projects}),
        );
        self
    }

    pub fn failing_project(mut self, id: &str) -> Self {
        self.failing_projects.insert(id.to_string());
        self
    }

    pub fn short_file(mut self, url: &str) -> Self {
        self.short_files.insert(url.to_string());
        self
    }

    pub fn batches(&self) -> Vec<usize> {
        self.version_batches.lock().unwrap().clone()
    }

    pub fn project_calls(&self) -> Vec<String> {
        self.project_calls.lock().unwrap().clone()
    }

    pub fn file_calls(&self) -> usize {
        self.file_calls.lock().unwrap().len()
    }
}

fn not_found(endpoint: String) -> DownloaderError {
    DownloaderError::CatalogStatus {
        status: 404,
        endpoint,
        message: "not found".to_string(),
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    endpoint: String,
    value: &Value,
) -> Result<T, DownloaderError> {
    serde_json::from_value(value.clone()).map_err(|err| DownloaderError::CatalogParse {
        endpoint,
        message: err.to_string(),
    })
}

impl CatalogApi for MockCatalog {
    fn tag_values(&self, kind: TagKind) -> Result<Vec<String>, DownloaderError> {
        Ok(match kind {
            TagKind::GameVersion => vec!["1.19.2".to_string(), GAME_VERSION.to_string()],
            TagKind::Loader => vec![
                LOADER.to_string(),
                "forge".to_string(),
                "quilt".to_string(),
            ],
        })
    }

    fn project(&self, id: &str) -> Result<Project, DownloaderError> {
        self.project_calls.lock().unwrap().push(id.to_string());
        let endpoint = format!("project/{id}");
        if self.failing_projects.contains(id) {
            return Err(DownloaderError::CatalogStatus {
                status: 500,
                endpoint,
                message: "boom".to_string(),
            });
        }
        let value = self
            .projects
            .get(id)
            .ok_or_else(|| not_found(endpoint.clone()))?;
        parse(endpoint, value)
    }

    fn versions(&self, ids: &[String]) -> Result<Vec<Value>, DownloaderError> {
        self.version_batches.lock().unwrap().push(ids.len());
        Ok(ids
            .iter()
            .filter_map(|id| self.versions.get(id).cloned())
            .collect())
    }

    fn version(&self, id: &str) -> Result<Version, DownloaderError> {
        let endpoint = format!("version/{id}");
        let value = self
            .versions
            .get(id)
            .ok_or_else(|| not_found(endpoint.clone()))?;
        parse(endpoint, value)
    }

    fn collection(&self, id: &str) -> Result<Collection, DownloaderError> {
        let endpoint = format!("collection/{id}");
        let value = self
            .collections
            .get(id)
            .ok_or_else(|| not_found(endpoint.clone()))?;
        parse(endpoint, value)
    }

    fn open_file(&self, url: &str) -> Result<RemoteFile, DownloaderError> {
        self.file_calls.lock().unwrap().push(url.to_string());
        let body = self
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| DownloaderError::Download {
                url: url.to_string(),
                message: "server returned status 404".to_string(),
            })?;
        let total = if self.short_files.contains(url) {
            body.len() as u64 + 10
        } else {
            body.len() as u64
        };
        Ok(RemoteFile {
            total: Some(total),
            reader: Box::new(Cursor::new(body)),
        })
    }
}

pub fn project(id: &str, project_type: &str, loaders: &[&str], versions: &[&str]) -> Value {
    json!({
        "id": id,
        "slug": format!("{id}-slug"),
        "title": format!("Project {id}"),
        "description": null,
        "project_type": project_type,
        "game_versions": [GAME_VERSION],
        "loaders": loaders,
        "versions": versions
    })
}

pub fn fabric_mod(id: &str, versions: &[&str]) -> Value {
    project(id, "mod", &[LOADER], versions)
}

/// `dependencies`: (project id, dependency type, explicit version id).
pub fn version(
    id: &str,
    project_id: &str,
    loader: &str,
    dependencies: &[(&str, &str, Option<&str>)],
) -> Value {
    let dependencies: Vec<Value> = dependencies
        .iter()
        .map(|(project, kind, version)| {
            json!({
                "project_id": project,
                "version_id": version,
                "file_name": null,
                "dependency_type": kind
            })
        })
        .collect();
    json!({
        "id": id,
        "project_id": project_id,
        "name": id,
        "version_number": format!("{id}-number"),
        "changelog": null,
        "game_versions": [GAME_VERSION],
        "loaders": [loader],
        "files": [
            {
                "url": format!("https://cdn.example.test/{project_id}/{id}.jar"),
                "filename": format!("{id}.jar"),
                "primary": true,
                "size": 12
            },
            {
                "url": format!("https://cdn.example.test/{project_id}/{id}-sources.jar"),
                "filename": format!("{id}-sources.jar"),
                "primary": false,
                "size": 4
            }
        ],
        "dependencies": dependencies
    })
}

pub fn fabric_version(
    id: &str,
    project_id: &str,
    dependencies: &[(&str, &str, Option<&str>)],
) -> Value {
    version(id, project_id, LOADER, dependencies)
}

pub fn compatibility() -> Compatibility {
    Compatibility::new(GAME_VERSION, LOADER)
}

pub fn connect(api: MockCatalog) -> Catalog<MockCatalog, MemoryCache> {
    Catalog::connect(api, MemoryCache::new(), compatibility(), 100).unwrap()
}

pub fn project_ids(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.project.id.clone())
        .collect()
}
