use std::time::Duration;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

pub const DEFAULT_SIMILARITY_TARGET: f64 = 0.95;
pub const DEFAULT_MIN_QUALITY: u8 = 80;
pub const DEFAULT_MAX_QUALITY: u8 = 85;

/// Quality of the reference encode every candidate is measured against.
pub const REFERENCE_QUALITY: u8 = 95;

/// Side length of the square thumbnail used for similarity scoring.
pub const NORMALIZED_SIDE: u32 = 400;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(DEFAULT_RETRY_DELAY_MS);

/// Consecutive remote rounds that may end in server errors with nothing
/// confirmed before the remaining files are given up on.
pub const MAX_STALLED_ROUNDS: u32 = 3;

pub const DEFAULT_SERVICE_ENDPOINT: &str = "https://api.tinify.com";
pub const SHRINK_PATH: &str = "/shrink";
pub const SERVICE_USER: &str = "api";
pub const COMPRESSION_COUNT_HEADER: &str = "compression-count";
pub const API_KEYS_ENV: &str = "TINIFY_API_KEYS";

pub const DEFAULT_EXTERNAL_OPTIMIZER: &str = "jpegoptim";

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

pub const LOG_RULE_WIDTH: usize = 120;
