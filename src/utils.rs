//! Small formatting and filesystem helpers shared by the compressors and the CLI.

use crate::error::{CompressionError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Validate that a file exists and return a descriptive error if not
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(CompressionError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// `<output_dir>/<basename(source)>`, or the source itself when no output
/// directory is configured.
pub fn output_path_for(source: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    let Some(dir) = output_dir else {
        return Ok(source.to_path_buf());
    };
    let name = source
        .file_name()
        .ok_or_else(|| CompressionError::FileNotFound(source.to_path_buf()))?;
    Ok(dir.join(name))
}

/// Sum of the sizes of `files`; unreadable entries count as zero.
pub fn total_size(files: &[PathBuf]) -> u64 {
    files
        .iter()
        .filter_map(|f| fs::metadata(f).ok())
        .map(|m| m.len())
        .sum()
}

/// Format file size in human-readable format
///
/// # Arguments
/// * `bytes` - Size in bytes
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 KB")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Percentage saved going from `original_size` to `compressed_size`.
/// Negative when the output grew.
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    ((original_size as f64 - compressed_size as f64) / original_size as f64) * 100.0
}
