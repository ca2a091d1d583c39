use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::VersionCache;
use crate::catalog::{Catalog, CatalogApi};
use crate::error::DownloaderError;
use crate::mod_list::ModRequest;
use crate::models::{Collection, Entry, Project, Version};
use crate::progress::{ProgressEvent, ProgressSink};

/// Ordered entries plus the set of project ids they cover.
#[derive(Debug, Default)]
pub struct Resolution {
    entries: Vec<Entry>,
    project_ids: HashSet<String>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.project_ids.contains(project_id)
    }

    /// Appends `entry` unless its project is already present.
    pub fn push(&mut self, entry: Entry) -> bool {
        if !self.project_ids.insert(entry.project.id.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = Entry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ListResolution {
    pub entries: Vec<Entry>,
    pub failures: Vec<ItemFailure>,
}

struct Pending {
    project_id: String,
    preferred_version: Option<String>,
    depth: usize,
}

/// Depth-first, pre-order walk of required dependencies over an explicit stack.
pub struct Resolver<'a, A: CatalogApi, C: VersionCache> {
    catalog: &'a mut Catalog<A, C>,
    sink: &'a dyn ProgressSink,
    incompatible: HashSet<String>,
}

impl<'a, A: CatalogApi, C: VersionCache> Resolver<'a, A, C> {
    pub fn new(catalog: &'a mut Catalog<A, C>, sink: &'a dyn ProgressSink) -> Self {
        Self {
            catalog,
            sink,
            incompatible: HashSet::new(),
        }
    }

    /// Preferred version when it is among the compatible ones, else the newest compatible one.
    pub fn select_version(
        &mut self,
        project: &Project,
        preferred: Option<&str>,
    ) -> Result<Version, DownloaderError> {
        info!(project = %project.id, "fetching versions");
        let mut versions = self.catalog.get_project_versions(project)?;

        if let Some(preferred) = preferred {
            match versions.iter().position(|version| version.id == preferred) {
                Some(index) => return Ok(versions.swap_remove(index)),
                None => debug!(
                    project = %project.id,
                    preferred,
                    "preferred version is not compatible; using latest"
                ),
            }
        }

        versions
            .pop()
            .ok_or_else(|| DownloaderError::NoMatchingVersion {
                project_id: project.id.clone(),
                project_name: project.name.clone(),
            })
    }

    pub fn expand(
        &mut self,
        project: Project,
        accumulated: &Resolution,
    ) -> Result<Vec<Entry>, DownloaderError> {
        let version = self.select_version(&project, None)?;
        self.walk(project, version, accumulated)
    }

    /// Like [`Resolver::expand`], with the root's version already chosen.
    pub fn expand_pinned(
        &mut self,
        project: Project,
        version: Version,
        accumulated: &Resolution,
    ) -> Result<Vec<Entry>, DownloaderError> {
        self.walk(project, version, accumulated)
    }

    pub fn resolve_collection(
        &mut self,
        collection: &Collection,
    ) -> Result<Vec<Entry>, DownloaderError> {
        let mut resolution = Resolution::new();

        for project_id in &collection.project_ids {
            info!(project = %project_id, "fetching collection project");
            if resolution.contains(project_id) {
                debug!(project = %project_id, "project already exist in entry list, skip");
                continue;
            }
            let Some(project) = self.compatible_project(project_id)? else {
                continue;
            };
            let entries = self.expand(project, &resolution)?;
            resolution.extend(entries);
        }

        Ok(resolution.into_entries())
    }

    /// Resolves each row independently; non-fatal failures are recorded and the walk continues.
    pub fn resolve_requests(
        &mut self,
        requests: &[ModRequest],
    ) -> Result<ListResolution, DownloaderError> {
        let mut resolution = Resolution::new();
        let mut failures = Vec::new();

        for request in requests {
            match self.resolve_request(request, &resolution) {
                Ok(entries) => resolution.extend(entries),
                Err(err) if !err.is_fatal() => {
                    warn!(item = %request.id_or_slug, error = %err, "mod could not be resolved");
                    self.sink.event(ProgressEvent::ItemFailed {
                        item: request.id_or_slug.clone(),
                        message: err.to_string(),
                    });
                    failures.push(ItemFailure {
                        item: request.id_or_slug.clone(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(ListResolution {
            entries: resolution.into_entries(),
            failures,
        })
    }

    fn resolve_request(
        &mut self,
        request: &ModRequest,
        accumulated: &Resolution,
    ) -> Result<Vec<Entry>, DownloaderError> {
        if accumulated.contains(&request.id_or_slug) {
            self.skip(&request.id_or_slug, "already resolved");
            return Ok(Vec::new());
        }
        let Some(project) = self.compatible_project(&request.id_or_slug)? else {
            return Ok(Vec::new());
        };
        if accumulated.contains(&project.id) {
            self.skip(&project.name, "already resolved");
            return Ok(Vec::new());
        }

        match request.version_id.as_deref() {
            Some(version_id) => {
                let version = self.catalog.get_version(version_id)?;
                if version.project_id != project.id {
                    return Err(DownloaderError::VersionMismatch {
                        version_id: version.id,
                        expected: project.id,
                        actual: version.project_id,
                    });
                }
                if !self
                    .catalog
                    .filter()
                    .matches(&version.loaders, &version.game_versions)
                {
                    warn!(
                        version = %version.id,
                        filter = %self.catalog.filter(),
                        "pinned version does not match the active filter"
                    );
                    return Err(DownloaderError::NoMatchingVersion {
                        project_id: project.id,
                        project_name: project.name,
                    });
                }
                self.expand_pinned(project, version, accumulated)
            }
            None => self.expand(project, accumulated),
        }
    }

    fn walk(
        &mut self,
        project: Project,
        version: Version,
        accumulated: &Resolution,
    ) -> Result<Vec<Entry>, DownloaderError> {
        let mut local = Resolution::new();
        let mut stack = Vec::new();
        self.admit(project, version, 0, accumulated, &mut local, &mut stack);

        while let Some(pending) = stack.pop() {
            if accumulated.contains(&pending.project_id) || local.contains(&pending.project_id) {
                continue;
            }
            info!(project = %pending.project_id, "fetching dependency");
            let Some(project) = self.compatible_project(&pending.project_id)? else {
                continue;
            };
            if accumulated.contains(&project.id) || local.contains(&project.id) {
                continue;
            }
            let version = self.select_version(&project, pending.preferred_version.as_deref())?;
            self.admit(project, version, pending.depth, accumulated, &mut local, &mut stack);
        }

        Ok(local.into_entries())
    }

    fn admit(
        &mut self,
        project: Project,
        version: Version,
        depth: usize,
        accumulated: &Resolution,
        local: &mut Resolution,
        stack: &mut Vec<Pending>,
    ) {
        info!(
            project = %project.id,
            version = %version.id,
            depth,
            "adding the project to entry list"
        );
        self.sink.event(ProgressEvent::Resolved {
            depth,
            project: project.name.clone(),
            version: version.version_number.clone(),
        });

        let dependencies = version.dependencies.clone();
        local.push(Entry { project, version });

        let mut children = Vec::new();
        for (number, dependency) in dependencies.into_iter().enumerate() {
            if !dependency.dependency_type.must_fetch() {
                debug!(number, project = ?dependency.project_id, "dependency is optional, skip");
                continue;
            }
            let Some(target) = dependency.project_id else {
                warn!(number, version = ?dependency.version_id, "dependency names no project, skip");
                continue;
            };
            if accumulated.contains(&target) || local.contains(&target) {
                debug!(number, project = %target, "dependency project already exist in entry list, skip");
                continue;
            }
            if children.iter().any(|pending: &Pending| pending.project_id == target) {
                continue;
            }
            children.push(Pending {
                project_id: target,
                preferred_version: dependency.version_id,
                depth: depth + 1,
            });
        }
        stack.extend(children.into_iter().rev());
    }

    fn compatible_project(&mut self, id: &str) -> Result<Option<Project>, DownloaderError> {
        if self.incompatible.contains(id) {
            return Ok(None);
        }
        match self.catalog.get_project(id)? {
            Some(project) => Ok(Some(project)),
            None => {
                self.incompatible.insert(id.to_string());
                self.skip(id, "not available for the active game version and loader");
                Ok(None)
            }
        }
    }

    fn skip(&self, item: &str, reason: &str) {
        self.sink.event(ProgressEvent::Skipped {
            item: item.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProjectType;
    use serde_json::json;

    fn entry(project_id: &str) -> Entry {
        Entry {
            project: serde_json::from_value::<Project>(json!({
                "id": project_id,
                "title": project_id,
                "project_type": "mod"
            }))
            .unwrap(),
            version: serde_json::from_value::<Version>(json!({
                "id": format!("{project_id}-v1"),
                "project_id": project_id,
                "name": "v1",
                "version_number": "1.0.0"
            }))
            .unwrap(),
        }
    }

    #[test]
    fn resolution_rejects_duplicate_projects() {
        let mut resolution = Resolution::new();
        assert!(resolution.push(entry("a")));
        assert!(!resolution.push(entry("a")));
        resolution.extend([entry("b"), entry("a")]);
        let ids: Vec<&str> = resolution
            .entries()
            .iter()
            .map(|entry| entry.project.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(resolution.entries()[0].project.project_type, ProjectType::Mod);
    }
}
