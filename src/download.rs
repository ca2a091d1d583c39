use std::fs;
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::catalog::CatalogApi;
use crate::error::DownloaderError;
use crate::models::{Entry, VersionFile};
use crate::progress::{ProgressEvent, ProgressSink};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { path: Utf8PathBuf, bytes: u64 },
    AlreadyPresent { path: Utf8PathBuf },
    NoPrimaryFile,
}

/// Writes resolved entries under `<destination>/<type dir>/<file name>`.
#[derive(Debug, Clone)]
pub struct Downloader {
    destination: Utf8PathBuf,
}

impl Downloader {
    pub fn new(destination: Utf8PathBuf) -> Self {
        Self { destination }
    }

    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    pub fn directory_for(&self, entry: &Entry) -> Utf8PathBuf {
        self.destination
            .join(entry.project.project_type.directory_name())
    }

    pub fn target_directory(&self, entry: &Entry) -> Result<Utf8PathBuf, DownloaderError> {
        let dir = self.directory_for(entry);
        debug!(project = %entry.project.id, dir = %dir, "preparing directory");
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| DownloaderError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(dir)
    }

    /// Destination of the entry's primary file, without touching disk or network.
    pub fn plan(&self, entry: &Entry) -> Result<Option<Utf8PathBuf>, DownloaderError> {
        let Some(file) = entry.version.primary_file() else {
            return Ok(None);
        };
        let name = checked_file_name(file)?;
        Ok(Some(self.directory_for(entry).join(name)))
    }

    pub fn download<A: CatalogApi + ?Sized>(
        &self,
        api: &A,
        entry: &Entry,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, DownloaderError> {
        let Some(file) = entry.version.primary_file() else {
            warn!(version = %entry.version.id, "version has no primary file; nothing to download");
            sink.event(ProgressEvent::Skipped {
                item: entry.project.name.clone(),
                reason: "no primary file".to_string(),
            });
            return Ok(DownloadOutcome::NoPrimaryFile);
        };
        let name = checked_file_name(file)?;
        let dir = self.target_directory(entry)?;
        let path = dir.join(name);

        if path.as_std_path().exists() {
            warn!(file = %path, "project was already downloaded, skip");
            sink.event(ProgressEvent::Skipped {
                item: name.to_string(),
                reason: "already downloaded".to_string(),
            });
            return Ok(DownloadOutcome::AlreadyPresent { path });
        }

        info!(file = name, url = %file.url, "downloading file");
        let remote = api.open_file(&file.url)?;
        let bytes = stream_to(&dir, &path, &file.url, name, remote.total, remote.reader, sink)?;
        info!(file = name, bytes, "file downloaded");
        Ok(DownloadOutcome::Downloaded { path, bytes })
    }
}

fn stream_to(
    dir: &Utf8Path,
    path: &Utf8Path,
    url: &str,
    name: &str,
    total: Option<u64>,
    mut reader: Box<dyn Read + Send>,
    sink: &dyn ProgressSink,
) -> Result<u64, DownloaderError> {
    let mut temp = tempfile::Builder::new()
        .prefix(".modrinth-dl")
        .suffix(".part")
        .tempfile_in(dir.as_std_path())
        .map_err(|err| DownloaderError::Filesystem(err.to_string()))?;

    sink.event(ProgressEvent::DownloadStarted {
        file_name: name.to_string(),
        total,
    });

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut completed = 0u64;
    loop {
        let read = reader.read(&mut buffer).map_err(|err| DownloaderError::Download {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        if read == 0 {
            break;
        }
        temp.write_all(&buffer[..read])
            .map_err(|err| DownloaderError::Filesystem(err.to_string()))?;
        completed += read as u64;
        sink.event(ProgressEvent::DownloadProgress {
            file_name: name.to_string(),
            completed,
            total,
        });
    }
    temp.flush()
        .map_err(|err| DownloaderError::Filesystem(err.to_string()))?;

    if let Some(expected) = total {
        if expected != completed {
            return Err(DownloaderError::Download {
                url: url.to_string(),
                message: format!("connection closed after {completed} of {expected} bytes"),
            });
        }
    }

    temp.persist(path.as_std_path())
        .map_err(|err| DownloaderError::Filesystem(err.to_string()))?;
    sink.event(ProgressEvent::DownloadFinished {
        file_name: name.to_string(),
        bytes: completed,
    });
    Ok(completed)
}

fn checked_file_name(file: &VersionFile) -> Result<&str, DownloaderError> {
    let name = file.file_name.as_str();
    let is_plain = Utf8Path::new(name).file_name() == Some(name) && name != "." && name != "..";
    if !is_plain {
        return Err(DownloaderError::Filesystem(format!(
            "refusing to write file with unsafe name: {name}"
        )));
    }
    Ok(name)
}
