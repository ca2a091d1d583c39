use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase(String),
    /// A project joined the resolved set; `depth` 0 is a collection member or list row.
    Resolved {
        depth: usize,
        project: String,
        version: String,
    },
    Skipped {
        item: String,
        reason: String,
    },
    DownloadStarted {
        file_name: String,
        total: Option<u64>,
    },
    DownloadProgress {
        file_name: String,
        completed: u64,
        total: Option<u64>,
    },
    DownloadFinished {
        file_name: String,
        bytes: u64,
    },
    ItemFailed {
        item: String,
        message: String,
    },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// Keeps every event; used by tests and by callers that summarise afterwards.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
