use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::progress::{ProgressEvent, ProgressSink};

const NAME_WIDTH: usize = 64;

/// Terminal rendering: a spinner while resolving, one byte bar per downloaded file.
#[derive(Default)]
pub struct ConsoleProgress {
    spinner: Mutex<Option<ProgressBar>>,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish_phase(&self) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(spinner) = guard.take() {
                spinner.finish_and_clear();
            }
        }
    }

    fn println(&self, line: String) {
        let spinner = self.spinner.lock().ok();
        match spinner.as_ref().and_then(|guard| (**guard).as_ref()) {
            Some(spinner) => spinner.println(line),
            None => println!("{line}"),
        }
    }

    fn create_download_bar(total: Option<u64>) -> ProgressBar {
        let bar = match total {
            Some(total) if total > 0 => ProgressBar::new(total),
            _ => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar
    }

    fn create_spinner(message: String) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase(message) => {
                self.finish_phase();
                if let Ok(mut guard) = self.spinner.lock() {
                    *guard = Some(Self::create_spinner(message));
                }
            }
            ProgressEvent::Resolved {
                depth,
                project,
                version,
            } => {
                let indent = "  ".repeat(depth);
                let width = NAME_WIDTH.saturating_sub(indent.len());
                self.println(format!("{indent}- {project:<width$} {version}"));
            }
            ProgressEvent::Skipped { item, reason } => {
                self.println(format!("- {item:<NAME_WIDTH$} skipped ({reason})"));
            }
            ProgressEvent::ItemFailed { item, message } => {
                self.println(format!("! {item:<NAME_WIDTH$} {message}"));
            }
            ProgressEvent::DownloadStarted { file_name, total } => {
                self.finish_phase();
                let bar = Self::create_download_bar(total);
                bar.set_message(format!("- {file_name:<NAME_WIDTH$}"));
                if let Ok(mut guard) = self.bar.lock() {
                    *guard = Some(bar);
                }
            }
            ProgressEvent::DownloadProgress { completed, .. } => {
                if let Ok(guard) = self.bar.lock() {
                    if let Some(bar) = guard.as_ref() {
                        bar.set_position(completed);
                    }
                }
            }
            ProgressEvent::DownloadFinished { .. } => {
                if let Ok(mut guard) = self.bar.lock() {
                    if let Some(bar) = guard.take() {
                        bar.finish();
                    }
                }
            }
        }
    }
}
