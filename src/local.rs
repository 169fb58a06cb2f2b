//! Codec-based compressor: adaptive-quality JPEG encode plus an optional
//! secondary optimizer, run across a rayon pool.

use crate::config::LocalOptions;
use crate::error::{CompressionError, Result};
use crate::formats::{ensure_supported, MediaType, LOCAL_SUPPORTED};
use crate::quality::{encode_jpeg, QualityResult};
use crate::report::Reporter;
use crate::utils::{output_path_for, validate_file_exists};
use image::ImageReader;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Result of one successful local compression.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub quality: QualityResult,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct LocalCompressor {
    options: LocalOptions,
    reporter: Reporter,
    output_ready: Arc<AtomicBool>,
}

impl LocalCompressor {
    pub fn new(options: LocalOptions) -> Self {
        Self {
            options,
            reporter: Reporter::default(),
            output_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(&self) -> &LocalOptions {
        &self.options
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn supported_types(&self) -> &'static [MediaType] {
        LOCAL_SUPPORTED
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        ensure_supported(path, LOCAL_SUPPORTED).is_ok()
    }

    pub fn compress(&self, source: &Path) -> Result<LocalOutcome> {
        validate_file_exists(source)?;
        ensure_supported(source, LOCAL_SUPPORTED)?;

        let input_bytes = fs::metadata(source)?.len();
        let img = ImageReader::open(source)?.decode()?;

        let quality = match self.options.fixed_quality {
            Some(q) => QualityResult::fixed(q),
            None => self.options.search.search(&img)?,
        };

        let encoded = encode_jpeg(
            &img.to_rgb8(),
            quality.quality,
            self.options.optimizer.optimizes_coding(),
        )?;

        let output = output_path_for(source, self.options.output_dir())?;
        self.ensure_output_dir()?;
        fs::write(&output, &encoded)?;
        self.options.optimizer.apply_on_disk(&output)?;

        let output_bytes = fs::metadata(&output)?.len();
        debug!(
            file = %source.display(),
            quality = quality.quality,
            similarity = ?quality.similarity,
            input_bytes,
            output_bytes,
            "local compression done"
        );
        self.reporter.record_success(source, input_bytes, output_bytes);

        Ok(LocalOutcome {
            source: source.to_path_buf(),
            output,
            quality,
            input_bytes,
            output_bytes,
        })
    }

    /// Compresses every file on a pool of `options.threads` workers. One
    /// file's failure never affects the others; results come back in input order.
    pub fn compress_all(&self, files: &[PathBuf]) -> Result<Vec<(PathBuf, Result<LocalOutcome>)>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| {
                CompressionError::Configuration(format!("failed to build worker pool: {}", e))
            })?;

        Ok(pool.install(|| {
            files
                .par_iter()
                .map(|file| (file.clone(), self.compress(file)))
                .collect()
        }))
    }

    fn ensure_output_dir(&self) -> Result<()> {
        let Some(dir) = self.options.output_dir() else {
            return Ok(());
        };
        if !self.output_ready.load(Ordering::Acquire) {
            fs::create_dir_all(dir)?;
            self.output_ready.store(true, Ordering::Release);
        }
        Ok(())
    }
}
