//! Media type detection and supported-type sets
//!
//! Types are guessed from the file extension, the same way the batch file
//! collector decides what counts as an image.

use crate::error::{CompressionError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Image media types the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaType {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Tiff,
    Gif,
    Avif,
}

/// Types the local codec-based compressor accepts
pub const LOCAL_SUPPORTED: &[MediaType] = &[MediaType::Jpeg];

/// Types the remote service accepts
pub const REMOTE_SUPPORTED: &[MediaType] = &[MediaType::Jpeg, MediaType::Png];

impl MediaType {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "webp" => Some(MediaType::WebP),
            "bmp" => Some(MediaType::Bmp),
            "tif" | "tiff" => Some(MediaType::Tiff),
            "gif" => Some(MediaType::Gif),
            "avif" => Some(MediaType::Avif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::WebP => "image/webp",
            MediaType::Bmp => "image/bmp",
            MediaType::Tiff => "image/tiff",
            MediaType::Gif => "image/gif",
            MediaType::Avif => "image/avif",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for MediaType {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_lowercase();
        let name = lowered.strip_prefix("image/").unwrap_or(&lowered);
        MediaType::from_extension(name)
            .ok_or_else(|| CompressionError::Configuration(format!("unknown media type: {}", s)))
    }
}

/// Describes the guessed type of `path` for error messages, `"unknown"` when
/// the extension is not an image type.
pub fn describe_type(path: &Path) -> String {
    MediaType::from_path(path)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Checks `path` against a supported-type set.
pub fn ensure_supported(path: &Path, supported: &[MediaType]) -> Result<MediaType> {
    match MediaType::from_path(path) {
        Some(media) if supported.contains(&media) => Ok(media),
        _ => Err(CompressionError::UnsupportedType {
            path: path.to_path_buf(),
            mime: describe_type(path),
        }),
    }
}

pub fn is_image_file(path: &Path) -> bool {
    MediaType::from_path(path).is_some()
}
