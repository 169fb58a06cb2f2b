//! Secondary optimizers for the local compressor: an in-encoder lossless
//! entropy pass or an external tool run on the written file.

use crate::constants::DEFAULT_EXTERNAL_OPTIMIZER;
use crate::error::{CompressionError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptimizerMode {
    /// Write the encoder output as-is.
    #[default]
    None,
    /// Encode with Huffman tables optimized for the image. Pixels are unchanged.
    Lossless,
    /// Run an external tool on the written file, e.g. `jpegoptim` or `Leanify`.
    External(PathBuf),
}

impl OptimizerMode {
    pub fn validate(&self) -> Result<()> {
        if let OptimizerMode::External(tool) = self {
            if tool.as_os_str().is_empty() {
                return Err(CompressionError::Configuration(
                    "external optimizer requires a tool path".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether the encoder itself should run the lossless entropy pass.
    pub fn optimizes_coding(&self) -> bool {
        matches!(self, OptimizerMode::Lossless)
    }

    /// Applies the on-disk stage to a file that has already been written.
    pub fn apply_on_disk(&self, output: &Path) -> Result<()> {
        let OptimizerMode::External(tool) = self else {
            return Ok(());
        };

        debug!(tool = %tool.display(), file = %output.display(), "running external optimizer");
        let result = Command::new(tool).arg(output).output().map_err(|e| {
            CompressionError::Optimizer(format!("failed to run {}: {}", tool.display(), e))
        })?;

        if !result.status.success() {
            return Err(CompressionError::Optimizer(format!(
                "{} exited with {}: {}",
                tool.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for OptimizerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerMode::None => f.write_str("none"),
            OptimizerMode::Lossless => f.write_str("lossless"),
            OptimizerMode::External(tool) => write!(f, "external:{}", tool.display()),
        }
    }
}

impl FromStr for OptimizerMode {
    type Err = CompressionError;

    /// Accepts `none`, `lossless`, `external` (default tool) or `external:<tool>`.
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            "none" | "" => Ok(OptimizerMode::None),
            "lossless" => Ok(OptimizerMode::Lossless),
            "external" => Ok(OptimizerMode::External(PathBuf::from(
                DEFAULT_EXTERNAL_OPTIMIZER,
            ))),
            _ => match s.trim().split_once(':') {
                Some((kind, tool)) if kind.eq_ignore_ascii_case("external") => {
                    let mode = OptimizerMode::External(PathBuf::from(tool));
                    mode.validate()?;
                    Ok(mode)
                }
                _ => Err(CompressionError::Configuration(format!(
                    "unsupported optimizer \"{}\", expected none, lossless or external[:tool]",
                    s
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_optimizer_mode_from_str() {
        assert_eq!(OptimizerMode::from_str("none").unwrap(), OptimizerMode::None);
        assert_eq!(OptimizerMode::from_str("Lossless").unwrap(), OptimizerMode::Lossless);
        assert_eq!(
            OptimizerMode::from_str("external").unwrap(),
            OptimizerMode::External(PathBuf::from("jpegoptim"))
        );
        assert_eq!(
            OptimizerMode::from_str("external:/usr/bin/Leanify").unwrap(),
            OptimizerMode::External(PathBuf::from("/usr/bin/Leanify"))
        );
        assert!(matches!(
            OptimizerMode::from_str("mozjpeg"),
            Err(CompressionError::Configuration(_))
        ));
        assert!(OptimizerMode::from_str("external:").is_err());
    }

    #[test]
    fn test_only_lossless_optimizes_coding() {
        assert!(OptimizerMode::Lossless.optimizes_coding());
        assert!(!OptimizerMode::None.optimizes_coding());
        assert!(!OptimizerMode::External(PathBuf::from("jpegoptim")).optimizes_coding());
    }

    #[test]
    fn test_on_disk_stage_skipped_without_tool() {
        assert!(OptimizerMode::None.apply_on_disk(Path::new("missing.jpg")).is_ok());
        assert!(OptimizerMode::Lossless.apply_on_disk(Path::new("missing.jpg")).is_ok());
    }

    #[test]
    fn test_external_tool_missing() {
        let mode = OptimizerMode::External(PathBuf::from("definitely-not-an-installed-optimizer"));
        let result = mode.apply_on_disk(Path::new("whatever.jpg"));
        assert!(matches!(result, Err(CompressionError::Optimizer(_))));
    }
}
