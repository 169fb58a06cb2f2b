//! Batch orchestration: runs a file set to completion on one strategy.
//!
//! The local strategy fans files out over a worker pool once. The remote
//! strategy works in rounds: every pending file is attempted concurrently on
//! the current session, the outcomes are folded into the confirmed set, and
//! whatever is left is retried on the next credential.

use crate::constants::MAX_STALLED_ROUNDS;
use crate::error::{CompressionError, Result};
use crate::formats::{describe_type, is_image_file};
use crate::keyring::Credential;
use crate::local::LocalCompressor;
use crate::remote::RemoteCompressor;
use crate::report::Reporter;
use crate::transport::Connector;
use crate::utils::{calculate_compression_ratio, total_size};
use futures::future::join_all;
use glob::glob;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub path: PathBuf,
    pub reason: String,
}

impl FailureReport {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub confirmed: BTreeSet<PathBuf>,
    pub failures: Vec<FailureReport>,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub rounds: u32,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn compression_ratio(&self) -> f64 {
        calculate_compression_ratio(self.input_bytes, self.output_bytes)
    }
}

pub enum Strategy<C: Connector> {
    Local(LocalCompressor),
    Remote(RemoteCompressor<C>),
}

impl<C: Connector> Strategy<C> {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Local(_) => "local",
            Strategy::Remote(_) => "remote",
        }
    }

    pub fn reporter(&self) -> &Reporter {
        match self {
            Strategy::Local(local) => local.reporter(),
            Strategy::Remote(remote) => remote.reporter(),
        }
    }
}

pub struct CompressionOrchestrator<C: Connector> {
    strategy: Strategy<C>,
}

impl<C: Connector> CompressionOrchestrator<C> {
    pub fn new(strategy: Strategy<C>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &Strategy<C> {
        &self.strategy
    }

    pub fn into_strategy(self) -> Strategy<C> {
        self.strategy
    }

    /// Drives `files` to completion. The local pool runs on a blocking thread.
    pub async fn run(&mut self, files: Vec<PathBuf>) -> Result<BatchResult> {
        info!(strategy = self.strategy.name(), files = files.len(), "starting batch");
        match &mut self.strategy {
            Strategy::Local(local) => {
                let local = local.clone();
                tokio::task::spawn_blocking(move || run_local(&local, &files)).await?
            }
            Strategy::Remote(remote) => run_remote(remote, files).await,
        }
    }
}

/// One pool task per file; failures are reported per file and never retried.
pub fn run_local(compressor: &LocalCompressor, files: &[PathBuf]) -> Result<BatchResult> {
    let start = Instant::now();
    let reporter = compressor.reporter();
    reporter.start(files.len(), total_size(files));

    let mut result = BatchResult {
        rounds: 1,
        ..BatchResult::default()
    };

    for (file, outcome) in compressor.compress_all(files)? {
        match outcome {
            Ok(outcome) => {
                result.input_bytes += outcome.input_bytes;
                result.output_bytes += outcome.output_bytes;
                result.confirmed.insert(file);
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "local compression failed");
                reporter.error(&format!("{}: {}", file.display(), e));
                result.failures.push(FailureReport::new(file, e.to_string()));
            }
        }
    }

    result.elapsed = start.elapsed();
    reporter.stop(result.elapsed, result.input_bytes, result.output_bytes);
    Ok(result)
}

/// Errors that describe the input file itself; another credential cannot fix them.
/// Failures caused by the file or the local filesystem rather than the
/// service. Retrying them under another credential cannot help.
fn is_input_error(error: &CompressionError) -> bool {
    matches!(
        error,
        CompressionError::FileNotFound(_)
            | CompressionError::UnsupportedType { .. }
            | CompressionError::Io(_)
    )
}

/// Rounds of concurrent attempts until every file is confirmed or the ring
/// runs out.
///
/// After a round, each credential that produced an account error is retired.
/// Without account errors, remaining failures close the session so they are
/// retried on the next credential. A round that confirmed nothing and failed
/// only with client rejections retires its credential. Server errors keep the
/// credential; after [`MAX_STALLED_ROUNDS`] such rounds in a row without a
/// confirmation the remaining files are reported as failed. Files that fail
/// on their own (missing, unsupported, unwritable output) are dropped at once.
pub async fn run_remote<C: Connector>(
    compressor: &mut RemoteCompressor<C>,
    files: Vec<PathBuf>,
) -> Result<BatchResult> {
    let start = Instant::now();
    let reporter = compressor.reporter().clone();
    let mut result = BatchResult::default();

    let mut pending = BTreeSet::new();
    for file in files {
        if compressor.is_supported(&file) {
            pending.insert(file);
        } else {
            let reason = CompressionError::UnsupportedType {
                mime: describe_type(&file),
                path: file.clone(),
            }
            .to_string();
            warn!(file = %file.display(), "skipping unsupported file");
            reporter.error(&reason);
            result.failures.push(FailureReport::new(file, reason));
        }
    }

    let queued: Vec<PathBuf> = pending.iter().cloned().collect();
    reporter.start(queued.len(), total_size(&queued));

    let mut last_errors: BTreeMap<PathBuf, String> = BTreeMap::new();
    let mut stalled_rounds = 0u32;

    while !pending.is_empty() {
        if !compressor.is_active() {
            if let Err(e) = compressor.create_session().await {
                warn!(error = %e, remaining = pending.len(), "cannot open a session, aborting batch");
                for file in &pending {
                    match last_errors.get(file) {
                        Some(last) => reporter.error(&format!("{}: {}", file.display(), last)),
                        None => reporter.error(&format!("{}: not compressed", file.display())),
                    }
                }
                reporter.error(&e.to_string());
                result.elapsed = start.elapsed();
                reporter.stop(result.elapsed, result.input_bytes, result.output_bytes);
                return Err(e);
            }
        }
        result.rounds += 1;

        let session: &RemoteCompressor<C> = &*compressor;
        let outcomes = join_all(pending.iter().map(|file| session.compress(file))).await;

        let mut account_failures: Vec<(Credential, String)> = Vec::new();
        let mut confirmed_this_round = 0usize;
        let mut server_failures = 0usize;
        let mut dropped = Vec::new();

        for (file, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    result.input_bytes += outcome.input_bytes;
                    result.output_bytes += outcome.output_bytes;
                    result.confirmed.insert(file.clone());
                    confirmed_this_round += 1;
                }
                Err(CompressionError::Account {
                    credential,
                    message,
                }) => {
                    if !account_failures.iter().any(|(c, _)| c == &credential) {
                        account_failures.push((credential.clone(), message.clone()));
                    }
                    last_errors.insert(
                        file.clone(),
                        CompressionError::Account {
                            credential,
                            message,
                        }
                        .to_string(),
                    );
                }
                Err(e) if is_input_error(&e) => {
                    warn!(file = %file.display(), error = %e, "dropping file");
                    reporter.error(&format!("{}: {}", file.display(), e));
                    dropped.push(FailureReport::new(file.clone(), e.to_string()));
                }
                Err(e) => {
                    if matches!(e, CompressionError::Server { .. }) {
                        server_failures += 1;
                    }
                    warn!(file = %file.display(), error = %e, "remote compression failed");
                    last_errors.insert(file.clone(), e.to_string());
                }
            }
        }

        for report in dropped {
            pending.remove(&report.path);
            result.failures.push(report);
        }
        pending.retain(|file| !result.confirmed.contains(file));
        info!(
            round = result.rounds,
            confirmed = confirmed_this_round,
            remaining = pending.len(),
            "round finished"
        );

        if !account_failures.is_empty() {
            let summary = account_failures
                .iter()
                .map(|(credential, message)| format!("{}: {}", credential, message))
                .collect::<Vec<_>>()
                .join("; ");
            reporter.error(&format!("Account errors, rotating credentials ({})", summary));
            for (credential, _) in &account_failures {
                compressor.retire_credential(credential);
            }
        } else if !pending.is_empty() {
            if confirmed_this_round > 0 {
                stalled_rounds = 0;
                compressor.close_session();
            } else if server_failures == 0 {
                if let Some(credential) = compressor.retire_session() {
                    warn!(credential = %credential, "every file was rejected, retiring credential");
                }
            } else {
                stalled_rounds += 1;
                if stalled_rounds >= MAX_STALLED_ROUNDS {
                    warn!(
                        rounds = stalled_rounds,
                        remaining = pending.len(),
                        "service keeps failing, giving up on remaining files"
                    );
                    for file in std::mem::take(&mut pending) {
                        let reason = last_errors
                            .remove(&file)
                            .unwrap_or_else(|| "not compressed".to_string());
                        reporter.error(&format!("{}: {}", file.display(), reason));
                        result.failures.push(FailureReport::new(file, reason));
                    }
                } else {
                    compressor.close_session();
                }
            }
        }
    }

    compressor.close_session();
    result.elapsed = start.elapsed();
    reporter.stop(result.elapsed, result.input_bytes, result.output_bytes);
    Ok(result)
}

/// Expands a file, directory or glob pattern into image paths. Hidden
/// entries are skipped; directories are walked one level deep unless
/// `recursive` is set.
pub fn collect_image_files(input: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut image_files = Vec::new();

    let input_path = Path::new(input);
    let canonical_input = if input_path.exists() {
        input_path
            .canonicalize()
            .map_err(|_| CompressionError::NoImageFilesFound(input.to_string()))?
    } else {
        input_path.to_path_buf()
    };

    if canonical_input.is_file() {
        image_files.push(canonical_input);
    } else if canonical_input.is_dir() {
        let walker = if recursive {
            WalkDir::new(&canonical_input)
        } else {
            WalkDir::new(&canonical_input).max_depth(1)
        };

        for entry in walker
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && is_image_file(path) {
                if let Ok(canonical_path) = path.canonicalize() {
                    image_files.push(canonical_path);
                }
            }
        }
    } else if let Ok(pattern) = glob(input) {
        for entry in pattern.flatten() {
            if entry.is_file() && is_image_file(&entry) {
                if let Ok(canonical_path) = entry.canonicalize() {
                    image_files.push(canonical_path);
                }
            }
        }
    } else {
        return Err(CompressionError::NoImageFilesFound(input.to_string()));
    }

    Ok(image_files)
}
