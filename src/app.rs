use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::VersionCache;
use crate::catalog::{Catalog, CatalogApi};
use crate::domain::{CollectionRef, ProjectType};
use crate::download::{DownloadOutcome, Downloader};
use crate::error::DownloaderError;
use crate::mod_list::{ModRequest, read_mod_list};
use crate::models::Entry;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::resolver::{ItemFailure, Resolver};

/// User input checked before any catalog request is made.
#[derive(Debug, Clone)]
pub enum Job {
    Collection(CollectionRef),
    ModList(Vec<ModRequest>),
}

impl Job {
    pub fn collection(raw: &str) -> Result<Self, DownloaderError> {
        Ok(Job::Collection(raw.parse()?))
    }

    pub fn mod_list(path: &Utf8Path) -> Result<Self, DownloaderError> {
        Ok(Job::ModList(read_mod_list(path)?))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryAction {
    Downloaded,
    AlreadyPresent,
    NoPrimaryFile,
    Planned,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub project_id: String,
    pub project_name: String,
    pub project_type: ProjectType,
    pub version_id: String,
    pub version_number: String,
    pub file_name: Option<String>,
    pub path: Option<String>,
    pub bytes: Option<u64>,
    pub action: EntryAction,
}

impl EntryReport {
    fn new(entry: &Entry, action: EntryAction) -> Self {
        Self {
            project_id: entry.project.id.clone(),
            project_name: entry.project.name.clone(),
            project_type: entry.project.project_type,
            version_id: entry.version.id.clone(),
            version_number: entry.version.version_number.clone(),
            file_name: entry
                .version
                .primary_file()
                .map(|file| file.file_name.clone()),
            path: None,
            bytes: None,
            action,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub collection: Option<String>,
    pub entries: Vec<EntryReport>,
    pub failures: Vec<ItemFailure>,
}

impl RunReport {
    pub fn count(&self, action: EntryAction) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.action == action)
            .count()
    }
}

pub struct App<A: CatalogApi, C: VersionCache> {
    catalog: Catalog<A, C>,
    downloader: Downloader,
}

impl<A: CatalogApi, C: VersionCache> App<A, C> {
    pub fn new(catalog: Catalog<A, C>, downloader: Downloader) -> Self {
        Self {
            catalog,
            downloader,
        }
    }

    pub fn catalog(&self) -> &Catalog<A, C> {
        &self.catalog
    }

    pub fn run(
        &mut self,
        job: &Job,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, DownloaderError> {
        match job {
            Job::Collection(reference) => self.collection(reference, options, sink),
            Job::ModList(requests) => self.mod_list(requests, options, sink),
        }
    }

    /// Resolves and downloads a collection; the first error stops the run.
    pub fn collection(
        &mut self,
        reference: &CollectionRef,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, DownloaderError> {
        sink.event(ProgressEvent::Phase(
            "Fetching information about collection...".to_string(),
        ));
        info!(collection = %reference, "fetching collection");
        let collection = self.catalog.get_collection(reference.as_str())?;

        sink.event(ProgressEvent::Phase(format!(
            "Fetching information about projects of {}...",
            collection.name
        )));
        let entries = Resolver::new(&mut self.catalog, sink).resolve_collection(&collection)?;
        self.catalog.flush()?;
        info!(entries = entries.len(), "collection resolved");

        let mut report = RunReport {
            collection: Some(collection.name.clone()),
            ..RunReport::default()
        };
        for entry in &entries {
            report.entries.push(self.process(entry, options, sink)?);
        }
        Ok(report)
    }

    /// Resolves and downloads a flat list; failures of single mods are reported, not raised.
    pub fn mod_list(
        &mut self,
        requests: &[ModRequest],
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, DownloaderError> {
        sink.event(ProgressEvent::Phase(
            "Fetching information about projects...".to_string(),
        ));
        let resolution = Resolver::new(&mut self.catalog, sink).resolve_requests(requests)?;
        self.catalog.flush()?;
        info!(
            entries = resolution.entries.len(),
            failures = resolution.failures.len(),
            "mod list resolved"
        );

        let mut report = RunReport {
            collection: None,
            entries: Vec::new(),
            failures: resolution.failures,
        };
        for entry in &resolution.entries {
            match self.process(entry, options, sink) {
                Ok(entry_report) => report.entries.push(entry_report),
                Err(err) if !err.is_fatal() => {
                    warn!(project = %entry.project.id, error = %err, "download failed");
                    sink.event(ProgressEvent::ItemFailed {
                        item: entry.project.name.clone(),
                        message: err.to_string(),
                    });
                    report.failures.push(ItemFailure {
                        item: entry.project.id.clone(),
                        message: err.to_string(),
                    });
                    report
                        .entries
                        .push(EntryReport::new(entry, EntryAction::Failed));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    fn process(
        &self,
        entry: &Entry,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<EntryReport, DownloaderError> {
        if options.dry_run {
            let planned = self.downloader.plan(entry)?;
            let action = if planned.is_some() {
                EntryAction::Planned
            } else {
                EntryAction::NoPrimaryFile
            };
            let mut report = EntryReport::new(entry, action);
            report.path = planned.map(|path| path.to_string());
            return Ok(report);
        }

        let outcome = self.downloader.download(self.catalog.api(), entry, sink)?;
        let report = match outcome {
            DownloadOutcome::Downloaded { path, bytes } => EntryReport {
                path: Some(path.to_string()),
                bytes: Some(bytes),
                ..EntryReport::new(entry, EntryAction::Downloaded)
            },
            DownloadOutcome::AlreadyPresent { path } => EntryReport {
                path: Some(path.to_string()),
                ..EntryReport::new(entry, EntryAction::AlreadyPresent)
            },
            DownloadOutcome::NoPrimaryFile => EntryReport::new(entry, EntryAction::NoPrimaryFile),
        };
        Ok(report)
    }
}
