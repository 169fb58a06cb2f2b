//! Perceptual similarity between a reference image and a re-encoded candidate.
//!
//! The search engine only relies on the [`SimilarityMetric`] contract: a score
//! that grows as the candidate gets closer to the reference, `1.0` for
//! identical images.

use image::GrayImage;
use image_compare::Algorithm;
use tracing::debug;

pub trait SimilarityMetric: Send + Sync {
    fn compare(&self, reference: &GrayImage, candidate: &GrayImage) -> f64;
}

/// Mean structural similarity of the luma planes, computed by `image-compare`.
/// Images of different or zero size score `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ssim;

impl SimilarityMetric for Ssim {
    fn compare(&self, reference: &GrayImage, candidate: &GrayImage) -> f64 {
        if reference.dimensions() != candidate.dimensions()
            || reference.width() == 0
            || reference.height() == 0
        {
            return 0.0;
        }

        match image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, reference, candidate)
        {
            Ok(similarity) => similarity.score,
            Err(e) => {
                debug!(error = %e, "images are not comparable");
                0.0
            }
        }
    }
}
