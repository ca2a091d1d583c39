use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::VersionCache;
use crate::domain::{Compatibility, TagKind};
use crate::error::DownloaderError;
use crate::models::{Collection, Project, Version};

pub const DEFAULT_API_URL: &str = "https://api.modrinth.com";
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Body of a remote file, with the length the server declared for it.
pub struct RemoteFile {
    pub total: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

/// Raw catalog transport. Policy (filtering, caching, chunking) lives in [`Catalog`].
pub trait CatalogApi: Send + Sync {
    fn tag_values(&self, kind: TagKind) -> Result<Vec<String>, DownloaderError>;
    fn project(&self, id: &str) -> Result<Project, DownloaderError>;
    /// One batched request; callers keep `ids` under the server's batch limit.
    fn versions(&self, ids: &[String]) -> Result<Vec<Value>, DownloaderError>;
    fn version(&self, id: &str) -> Result<Version, DownloaderError>;
    fn collection(&self, id: &str) -> Result<Collection, DownloaderError>;
    fn open_file(&self, url: &str) -> Result<RemoteFile, DownloaderError>;
}

#[derive(Clone, Copy)]
enum ApiRevision {
    V2,
    V3,
}

#[derive(Clone)]
pub struct ModrinthHttpClient {
    client: Client,
    file_client: Client,
    base_url: String,
}

impl ModrinthHttpClient {
    pub fn new(token: &str, base_url: &str) -> Result<Self, DownloaderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("modrinth-downloader/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DownloaderError::CatalogHttp(err.to_string()))?,
        );
        let mut authorization = HeaderValue::from_str(token.trim())
            .map_err(|_| DownloaderError::MissingSetting("token (not a valid header value)".to_string()))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let client = Client::builder()
            .default_headers(headers.clone())
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| DownloaderError::CatalogHttp(err.to_string()))?;
        let mut file_headers = HeaderMap::new();
        if let Some(agent) = headers.get(USER_AGENT) {
            file_headers.insert(USER_AGENT, agent.clone());
        }
        let file_client = Client::builder()
            .default_headers(file_headers)
            .timeout(None)
            .build()
            .map_err(|err| DownloaderError::CatalogHttp(err.to_string()))?;

        Ok(Self {
            client,
            file_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, revision: ApiRevision, endpoint: &str) -> String {
        let prefix = match revision {
            ApiRevision::V2 => "v2",
            ApiRevision::V3 => "v3",
        };
        format!("{}/{prefix}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        revision: ApiRevision,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, DownloaderError> {
        let url = self.url(revision, endpoint);
        let response = self.send_with_retries(|| self.client.get(&url).query(query))?;
        let response = Self::handle_status(response, endpoint)?;
        response
            .json::<T>()
            .map_err(|err| DownloaderError::CatalogParse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
        endpoint: &str,
    ) -> Result<reqwest::blocking::Response, DownloaderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(DownloaderError::CatalogStatus {
            status,
            endpoint: endpoint.to_string(),
            message,
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, DownloaderError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(status, attempt, "catalog request throttled; retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(error = %err, attempt, "catalog request failed; retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(DownloaderError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl CatalogApi for ModrinthHttpClient {
    fn tag_values(&self, kind: TagKind) -> Result<Vec<String>, DownloaderError> {
        let tags: Vec<Value> = self.get_json(ApiRevision::V2, kind.endpoint(), &[])?;
        Ok(tags
            .iter()
            .filter_map(|tag| tag.get(kind.value_key()).and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn project(&self, id: &str) -> Result<Project, DownloaderError> {
        self.get_json(ApiRevision::V2, &format!("project/{id}"), &[])
    }

    fn versions(&self, ids: &[String]) -> Result<Vec<Value>, DownloaderError> {
        let encoded = serde_json::to_string(ids).map_err(|err| DownloaderError::CatalogParse {
            endpoint: "versions".to_string(),
            message: err.to_string(),
        })?;
        self.get_json(ApiRevision::V2, "versions", &[("ids", encoded)])
    }

    fn version(&self, id: &str) -> Result<Version, DownloaderError> {
        self.get_json(ApiRevision::V2, &format!("version/{id}"), &[])
    }

    fn collection(&self, id: &str) -> Result<Collection, DownloaderError> {
        self.get_json(ApiRevision::V3, &format!("collection/{id}"), &[])
    }

    fn open_file(&self, url: &str) -> Result<RemoteFile, DownloaderError> {
        let response = self
            .file_client
            .get(url)
            .send()
            .map_err(|err| DownloaderError::Download {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(DownloaderError::Download {
                url: url.to_string(),
                message: format!("server returned status {}", response.status().as_u16()),
            });
        }
        Ok(RemoteFile {
            total: response.content_length(),
            reader: Box::new(response),
        })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Catalog access under one fixed compatibility filter, backed by a version cache.
pub struct Catalog<A: CatalogApi, C: VersionCache> {
    api: A,
    cache: C,
    filter: Compatibility,
    chunk_size: usize,
}

impl<A: CatalogApi, C: VersionCache> Catalog<A, C> {
    /// Builds the client and rejects an unknown game version or loader before any other request.
    pub fn connect(
        api: A,
        cache: C,
        filter: Compatibility,
        chunk_size: usize,
    ) -> Result<Self, DownloaderError> {
        let catalog = Self {
            api,
            cache,
            filter,
            chunk_size: chunk_size.max(1),
        };
        if !catalog.validate_tag(TagKind::GameVersion, &catalog.filter.game_version)? {
            return Err(DownloaderError::InvalidGameVersion(
                catalog.filter.game_version.clone(),
            ));
        }
        if !catalog.validate_tag(TagKind::Loader, &catalog.filter.loader)? {
            return Err(DownloaderError::InvalidLoader(catalog.filter.loader.clone()));
        }
        Ok(catalog)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn filter(&self) -> &Compatibility {
        &self.filter
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn validate_tag(&self, kind: TagKind, value: &str) -> Result<bool, DownloaderError> {
        let values = self.api.tag_values(kind)?;
        debug!(%kind, known = values.len(), "tag list fetched");
        Ok(values.iter().any(|known| known == value))
    }

    /// `None` means the project exists but cannot be used under the active filter.
    pub fn get_project(&self, id: &str) -> Result<Option<Project>, DownloaderError> {
        let project = self.api.project(id)?;
        info!(project = %project.name, id = %project.id, "project fetched");

        if !self.filter.matches(&project.loaders, &project.game_versions) {
            warn!(
                project = %project.name,
                filter = %self.filter,
                "project does not match the game loader or game version"
            );
            return Ok(None);
        }

        debug!(url = %project.page_url(), versions = project.version_ids.len(), "project details");
        Ok(Some(project))
    }

    /// Compatible versions of `project`, in the project's own (oldest-first) version order.
    pub fn get_project_versions(&mut self, project: &Project) -> Result<Vec<Version>, DownloaderError> {
        let lookup = self
            .cache
            .lookup(&project.id, &project.version_ids, &self.filter)?;
        debug!(
            project = %project.id,
            cached = lookup.hits.len(),
            missing = lookup.missing.len(),
            "version cache consulted"
        );

        let mut versions = lookup.matching;
        let chunks = chunk_ids(&lookup.missing, self.chunk_size);
        if chunks.len() > 1 {
            debug!(chunk_size = self.chunk_size, chunks = chunks.len(), "split version ids into chunks");
        }
        for (number, ids) in chunks.iter().enumerate() {
            if chunks.len() > 1 {
                debug!(chunk = number, ids = ids.len(), "requesting chunk");
            }
            let records = self.api.versions(ids)?;
            let mut parsed = Vec::with_capacity(records.len());
            for record in &records {
                let version: Version = serde_json::from_value(record.clone()).map_err(|err| {
                    DownloaderError::CatalogParse {
                        endpoint: "versions".to_string(),
                        message: err.to_string(),
                    }
                })?;
                parsed.push(version);
            }
            self.cache.merge(&project.id, &records)?;
            versions.extend(
                parsed
                    .into_iter()
                    .filter(|version| self.filter.matches(&version.loaders, &version.game_versions)),
            );
        }

        let versions = order_by_project(versions, &project.version_ids);
        info!(project = %project.id, fetched = lookup.missing.len(), matched = versions.len(), "versions resolved");
        Ok(versions)
    }

    pub fn get_version(&self, id: &str) -> Result<Version, DownloaderError> {
        info!(version = id, "fetching version");
        let version = self.api.version(id)?;
        debug!(version = %version.id, number = %version.version_number, "version fetched");
        Ok(version)
    }

    pub fn get_collection(&self, id: &str) -> Result<Collection, DownloaderError> {
        let collection = self.api.collection(id)?;
        info!(collection = %collection.name, "collection fetched");
        debug!(url = %collection.page_url(), projects = collection.project_ids.len(), "collection details");
        Ok(collection)
    }

    pub fn flush(&mut self) -> Result<(), DownloaderError> {
        self.cache.flush()
    }
}

pub fn chunk_ids(ids: &[String], chunk_size: usize) -> Vec<&[String]> {
    ids.chunks(chunk_size.max(1)).collect()
}

/// Reorders versions to follow `order`, dropping duplicates; ids absent from `order` go last.
fn order_by_project(versions: Vec<Version>, order: &[String]) -> Vec<Version> {
    let positions: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();
    let mut seen = HashSet::new();
    let mut versions: Vec<Version> = versions
        .into_iter()
        .filter(|version| seen.insert(version.id.clone()))
        .collect();
    versions.sort_by_key(|version| {
        positions
            .get(version.id.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
    versions
}
