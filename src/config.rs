//! Validated options for both compression strategies.

use crate::constants::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY, DEFAULT_SERVICE_ENDPOINT};
use crate::error::{CompressionError, Result};
use crate::keyring::{Credential, KeyRing};
use crate::optimizer::OptimizerMode;
use crate::quality::{QualityBounds, QualitySearchEngine};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options for [`crate::local::LocalCompressor`].
#[derive(Debug, Clone)]
pub struct LocalOptions {
    pub output_dir: Option<PathBuf>,
    pub fixed_quality: Option<u8>,
    pub search: QualitySearchEngine,
    pub optimizer: OptimizerMode,
    pub threads: usize,
}

impl LocalOptions {
    /// `threads` of `None` sizes the pool to the available CPUs.
    pub fn new(
        output_dir: Option<PathBuf>,
        fixed_quality: Option<u8>,
        target: f64,
        bounds: QualityBounds,
        optimizer: OptimizerMode,
        threads: Option<usize>,
    ) -> Result<Self> {
        if let Some(q) = fixed_quality {
            if !(1..=100).contains(&q) {
                return Err(CompressionError::Configuration(format!(
                    "quality must be between 1 and 100, got {}",
                    q
                )));
            }
        }
        if threads == Some(0) {
            return Err(CompressionError::Configuration(
                "thread count must be at least 1".to_string(),
            ));
        }
        optimizer.validate()?;

        Ok(Self {
            output_dir,
            fixed_quality,
            search: QualitySearchEngine::new(target, bounds)?,
            optimizer,
            threads: threads.unwrap_or_else(num_cpus::get).max(1),
        })
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            fixed_quality: None,
            search: QualitySearchEngine::default(),
            optimizer: OptimizerMode::None,
            threads: num_cpus::get().max(1),
        }
    }
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRY_COUNT,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Options for [`crate::remote::RemoteCompressor`].
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    pub keys: KeyRing,
    pub output_dir: Option<PathBuf>,
    pub endpoint: String,
    pub retry: RetryPolicy,
}

impl RemoteOptions {
    pub fn new(
        credentials: Vec<Credential>,
        output_dir: Option<PathBuf>,
        endpoint: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let credentials: Vec<Credential> = credentials
            .into_iter()
            .filter(|c| !c.secret().trim().is_empty())
            .collect();
        if credentials.is_empty() {
            return Err(CompressionError::Configuration(
                "at least one service credential is required".to_string(),
            ));
        }

        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_SERVICE_ENDPOINT.to_string());
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(CompressionError::Configuration(format!(
                "service endpoint must be an http(s) URL, got \"{}\"",
                endpoint
            )));
        }

        Ok(Self {
            keys: KeyRing::new(credentials),
            output_dir,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            retry,
        })
    }
}

/// Splits a comma-separated key list, as found in the keys environment variable.
pub fn parse_key_list(raw: &str) -> Vec<Credential> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Credential::new)
        .collect()
}
