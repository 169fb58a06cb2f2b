pub mod batch;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod formats;
pub mod keyring;
pub mod local;
pub mod optimizer;
pub mod quality;
pub mod remote;
pub mod report;
pub mod similarity;
pub mod transport;
pub mod utils;

pub use batch::{
    collect_image_files, run_local, run_remote, BatchResult, CompressionOrchestrator,
    FailureReport, Strategy,
};
pub use config::{parse_key_list, LocalOptions, RemoteOptions, RetryPolicy};
pub use error::{CompressionError, Result};
pub use formats::{is_image_file, MediaType, LOCAL_SUPPORTED, REMOTE_SUPPORTED};
pub use keyring::{Credential, KeyRing};
pub use local::{LocalCompressor, LocalOutcome};
pub use optimizer::OptimizerMode;
pub use quality::{QualityBounds, QualityResult, QualitySearchEngine};
pub use remote::{RemoteCompressor, RemoteOutcome, SessionState};
pub use report::{batch_progress_bar, CompressionLog, FileLog, Reporter, TracingLog};
pub use similarity::{SimilarityMetric, Ssim};
pub use transport::{classify, Channel, Connector, HttpChannel, HttpConnector, Reply};
pub use utils::{calculate_compression_ratio, format_file_size, validate_file_exists};
