//! Logger and progress collaborators notified by the compressors and the orchestrator.

use crate::constants::{LOG_RULE_WIDTH, PROGRESS_BAR_TEMPLATE};
use crate::utils::{calculate_compression_ratio, format_file_size};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

/// Receives per-file results and batch summaries.
pub trait CompressionLog: Send + Sync {
    fn start(&self, files: usize, input_bytes: u64);
    fn compressed(&self, path: &Path, input_bytes: u64, output_bytes: u64);
    fn error(&self, text: &str);
    fn stop(&self, elapsed: Duration, input_bytes: u64, output_bytes: u64);
}

/// Emits every notification as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl CompressionLog for TracingLog {
    fn start(&self, files: usize, input_bytes: u64) {
        info!(files, input = %format_file_size(input_bytes), "start compressing");
    }

    fn compressed(&self, path: &Path, input_bytes: u64, output_bytes: u64) {
        info!(
            file = %path.display(),
            input = input_bytes,
            output = output_bytes,
            saved = format!("{:.1}%", calculate_compression_ratio(input_bytes, output_bytes)),
            "compressed"
        );
    }

    fn error(&self, text: &str) {
        error!("{}", text);
    }

    fn stop(&self, elapsed: Duration, input_bytes: u64, output_bytes: u64) {
        info!(
            elapsed = ?elapsed,
            output = %format_file_size(output_bytes),
            saved = format!("{:.1}%", calculate_compression_ratio(input_bytes, output_bytes)),
            "compressing complete"
        );
    }
}

/// Appends a human-readable report to a log file.
pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLog {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, text: &str) {
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = file.write_all(text.as_bytes()) {
            warn!(log = %self.path.display(), error = %e, "failed to write compression log");
        }
    }
}

impl fmt::Debug for FileLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLog").field("path", &self.path).finish()
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn kilobytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Centres a file name in a 30-column field.
fn centered_path(path: &Path) -> String {
    let shown = path.display().to_string();
    let name_len = path
        .file_name()
        .map(|n| n.to_string_lossy().chars().count())
        .unwrap_or(0);
    let pad = 30usize.saturating_sub(name_len);
    format!(
        "{}{}{}",
        " ".repeat(pad / 2 + pad % 2),
        shown,
        " ".repeat(pad / 2)
    )
}

impl CompressionLog for FileLog {
    fn start(&self, files: usize, input_bytes: u64) {
        self.write(&format!(
            "\n{}\nStart compressing {} images. Overall size: {:.2}MB\n",
            "_".repeat(LOG_RULE_WIDTH),
            files,
            megabytes(input_bytes)
        ));
    }

    fn compressed(&self, path: &Path, input_bytes: u64, output_bytes: u64) {
        self.write(&format!(
            "\nCompressed: {} | {:>11.2}KB / {:<13} | -{:.2}%",
            centered_path(path),
            kilobytes(input_bytes),
            format!("{:.2}KB", kilobytes(output_bytes)),
            calculate_compression_ratio(input_bytes, output_bytes)
        ));
    }

    fn error(&self, text: &str) {
        let rule = "~".repeat(LOG_RULE_WIDTH);
        self.write(&format!("\n{}\nERROR: {}\n{}", rule, text, rule));
    }

    fn stop(&self, elapsed: Duration, input_bytes: u64, output_bytes: u64) {
        self.write(&format!(
            "\n\nCompressing complete. Elapsed time: {:.2}s. Total output size: {:.2}MB -{:.2}%.\n",
            elapsed.as_secs_f64(),
            megabytes(output_bytes),
            calculate_compression_ratio(input_bytes, output_bytes)
        ));
    }
}

/// Fans notifications out to the optional log and progress bar.
#[derive(Clone, Default)]
pub struct Reporter {
    log: Option<Arc<dyn CompressionLog>>,
    progress: Option<ProgressBar>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("log", &self.log.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: Arc<dyn CompressionLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn progress(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    /// Called exactly once per confirmed file.
    pub fn record_success(&self, path: &Path, input_bytes: u64, output_bytes: u64) {
        if let Some(log) = &self.log {
            log.compressed(path, input_bytes, output_bytes);
        }
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
    }

    pub fn start(&self, files: usize, input_bytes: u64) {
        if let Some(progress) = &self.progress {
            progress.set_length(files as u64);
        }
        if let Some(log) = &self.log {
            log.start(files, input_bytes);
        }
    }

    pub fn error(&self, text: &str) {
        if let Some(log) = &self.log {
            log.error(text);
        }
    }

    pub fn stop(&self, elapsed: Duration, input_bytes: u64, output_bytes: u64) {
        if let Some(progress) = &self.progress {
            progress.finish_with_message("✅ Compression complete");
        }
        if let Some(log) = &self.log {
            log.stop(elapsed, input_bytes, output_bytes);
        }
    }
}

/// Progress bar styled for batch runs.
pub fn batch_progress_bar(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    match ProgressStyle::default_bar().template(PROGRESS_BAR_TEMPLATE) {
        Ok(style) => progress.set_style(style.progress_chars("#>-")),
        Err(_) => progress.set_style(ProgressStyle::default_bar()),
    }
    progress
}
