//! SSIM-guided JPEG quality selection.
//!
//! The engine binary-searches the configured quality range for the lowest
//! quality whose encode stays within the similarity target of a high-quality
//! reference encode. Scoring runs on a fixed-size thumbnail so the cost of a
//! search does not depend on the source resolution.

use crate::constants::{
    DEFAULT_MAX_QUALITY, DEFAULT_MIN_QUALITY, DEFAULT_SIMILARITY_TARGET, MAX_QUALITY, MIN_QUALITY,
    NORMALIZED_SIDE, REFERENCE_QUALITY,
};
use crate::error::{CompressionError, Result};
use crate::similarity::{SimilarityMetric, Ssim};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use mozjpeg::{ColorSpace, Compress};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Inclusive quality range searched by [`QualitySearchEngine`]. `low < high` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityBounds {
    low: u8,
    high: u8,
}

impl QualityBounds {
    pub fn new(low: u8, high: u8) -> Result<Self> {
        if low >= high {
            return Err(CompressionError::Configuration(format!(
                "quality bounds must satisfy low < high, got ({}, {})",
                low, high
            )));
        }
        if low < MIN_QUALITY || high > MAX_QUALITY {
            return Err(CompressionError::Configuration(format!(
                "quality bounds must lie within {}..={}, got ({}, {})",
                MIN_QUALITY, MAX_QUALITY, low, high
            )));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> u8 {
        self.low
    }

    pub fn high(&self) -> u8 {
        self.high
    }

    /// `floor(log2(high - low)) + 1`
    pub fn iteration_count(&self) -> u32 {
        (self.high - self.low).ilog2() + 1
    }
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self {
            low: DEFAULT_MIN_QUALITY,
            high: DEFAULT_MAX_QUALITY,
        }
    }
}

/// Quality picked for one file, with the similarity measured at that quality.
/// `similarity` is `None` when a fixed quality bypassed the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityResult {
    pub quality: u8,
    pub similarity: Option<f64>,
}

impl QualityResult {
    pub fn fixed(quality: u8) -> Self {
        Self {
            quality,
            similarity: None,
        }
    }
}

#[derive(Clone)]
pub struct QualitySearchEngine {
    target: f64,
    bounds: QualityBounds,
    metric: Arc<dyn SimilarityMetric>,
}

impl fmt::Debug for QualitySearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualitySearchEngine")
            .field("target", &self.target)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

impl Default for QualitySearchEngine {
    fn default() -> Self {
        Self {
            target: DEFAULT_SIMILARITY_TARGET,
            bounds: QualityBounds::default(),
            metric: Arc::new(Ssim::default()),
        }
    }
}

impl QualitySearchEngine {
    pub fn new(target: f64, bounds: QualityBounds) -> Result<Self> {
        Self::with_metric(target, bounds, Arc::new(Ssim::default()))
    }

    pub fn with_metric(
        target: f64,
        bounds: QualityBounds,
        metric: Arc<dyn SimilarityMetric>,
    ) -> Result<Self> {
        if !target.is_finite() || target <= 0.0 || target > 1.0 {
            return Err(CompressionError::Configuration(format!(
                "similarity target must be in (0, 1], got {}",
                target
            )));
        }
        Ok(Self {
            target,
            bounds,
            metric,
        })
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn bounds(&self) -> QualityBounds {
        self.bounds
    }

    pub fn search(&self, image: &DynamicImage) -> Result<QualityResult> {
        let normalized = image
            .resize_exact(NORMALIZED_SIDE, NORMALIZED_SIDE, FilterType::Triangle)
            .to_rgb8();
        let reference = image::imageops::grayscale(&normalized);

        let baseline = self
            .similarity_at(&normalized, &reference, REFERENCE_QUALITY)?
            .max(f64::MIN_POSITIVE);

        let mut low = self.bounds.low;
        let mut high = self.bounds.high;
        let mut best: Option<QualityResult> = None;

        for _ in 0..self.bounds.iteration_count() {
            let candidate = ((u16::from(low) + u16::from(high)) / 2) as u8;
            let similarity = self.similarity_at(&normalized, &reference, candidate)?;
            let ratio = similarity / baseline;
            debug!(candidate, similarity, ratio, "quality probe");

            if ratio >= self.target {
                best = Some(QualityResult {
                    quality: candidate,
                    similarity: Some(similarity),
                });
                high = candidate;
            } else {
                low = candidate;
            }
        }

        match best {
            Some(result) => Ok(result),
            None => {
                let similarity = self.similarity_at(&normalized, &reference, high)?;
                Ok(QualityResult {
                    quality: high,
                    similarity: Some(similarity),
                })
            }
        }
    }

    fn similarity_at(&self, normalized: &RgbImage, reference: &GrayImage, quality: u8) -> Result<f64> {
        let encoded = encode_jpeg(normalized, quality, false)?;
        let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)?.to_luma8();
        Ok(self.metric.compare(reference, &decoded))
    }
}

/// Baseline JPEG encode shared by the search and the local compressor.
///
/// Uses the libjpeg quantization tables without trellis quantization, so the
/// coefficients depend only on the image and the quality. `optimize_coding`
/// rebuilds the Huffman tables for this image, which shrinks the file without
/// changing a single decoded pixel.
pub(crate) fn encode_jpeg(image: &RgbImage, quality: u8, optimize_coding: bool) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();

    let mut compress = Compress::new(ColorSpace::JCS_RGB);
    compress.set_fastest_defaults();
    compress.set_size(width as usize, height as usize);
    compress.set_quality(f32::from(quality));
    compress.set_optimize_coding(optimize_coding);

    let mut started = compress.start_compress(Vec::new())?;
    started.write_scanlines(image.as_raw())?;
    Ok(started.finish()?)
}
