use crate::constants::{
    API_KEYS_ENV, DEFAULT_MAX_QUALITY, DEFAULT_MIN_QUALITY, DEFAULT_RETRY_COUNT,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_SIMILARITY_TARGET,
};
use crate::optimizer::OptimizerMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "img-compact",
    about = "Batch JPEG compression with SSIM-guided quality search or a remote compression service",
    long_about = "img-compact shrinks batches of images. The local strategy re-encodes JPEGs at the lowest \
                  quality whose structural similarity stays within a target of a high-quality reference. \
                  The remote strategy sends images to a TinyPNG-compatible service, rotating through a set \
                  of API keys and retrying failed files until every file is compressed or no key is left.",
    version,
    after_help = "EXAMPLES:\n  \
    img-compact local ./photos ./compressed -r\n  \
    img-compact local \"./photos/*.jpg\" ./out --min-quality 70 --max-quality 90 --optimizer lossless\n  \
    img-compact remote ./photos ./compressed --key KEY1 --key KEY2\n  \
    TINIFY_API_KEYS=KEY1,KEY2 img-compact --log log.txt remote ./photos"
)]
pub struct Args {
    #[arg(short, long, global = true, help = "Show debug diagnostics")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Only print errors and the final summary"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Append a compression report to FILE"
    )]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Compress JPEG images locally",
        long_about = "Re-encode JPEG images on a pool of worker threads. Unless a fixed quality is given, \
                      each image is encoded at the lowest quality in [min-quality, max-quality] that keeps \
                      its similarity to a quality-95 reference at or above the target."
    )]
    Local {
        #[arg(
            help = "Input file, directory, or glob",
            long_help = "Input can be a file, a directory, or a glob expression. \
                         Examples: './images', '*.jpg', '/path/to/images/*.jpeg'"
        )]
        input: String,

        #[arg(
            help = "Output directory (default: overwrite the input files)",
            long_help = "Directory that receives <output>/<file name> for every input. \
                         When omitted, every input file is overwritten in place."
        )]
        output: Option<PathBuf>,

        #[arg(
            short = 'q',
            long,
            value_parser = clap::value_parser!(u8).range(1..=100),
            help = "Fixed quality (1-100), skips the quality search"
        )]
        quality: Option<u8>,

        #[arg(
            long,
            default_value_t = DEFAULT_MIN_QUALITY,
            help = "Lowest quality the search may pick"
        )]
        min_quality: u8,

        #[arg(
            long,
            default_value_t = DEFAULT_MAX_QUALITY,
            help = "Highest quality the search may pick"
        )]
        max_quality: u8,

        #[arg(
            short = 't',
            long,
            default_value_t = DEFAULT_SIMILARITY_TARGET,
            help = "Similarity target relative to the reference encode (0-1]"
        )]
        target: f64,

        #[arg(
            short = 'o',
            long,
            default_value = "none",
            help = "Secondary optimizer: none, lossless, external or external:<tool>",
            long_help = "Secondary optimizer applied to each encoded file. 'lossless' optimizes the \
                         Huffman tables while encoding, leaving pixels unchanged; 'external' runs jpegoptim \
                         (or the given tool) on each written file."
        )]
        optimizer: OptimizerMode,

        #[arg(
            short = 'j',
            long,
            help = "Number of parallel threads (default: auto)",
            long_help = "Number of worker threads. If not specified, uses number of CPU cores."
        )]
        threads: Option<usize>,

        #[arg(short = 'r', long, help = "Process subdirectories recursively")]
        recursive: bool,
    },

    #[command(
        about = "Compress JPEG and PNG images with a remote service",
        long_about = "Upload images to a TinyPNG-compatible compression service. Keys that are rejected \
                      or out of quota are dropped and the next key is used; files that failed are retried \
                      in further rounds until all are compressed or every key is used up."
    )]
    Remote {
        #[arg(help = "Input file, directory, or glob")]
        input: String,

        #[arg(help = "Output directory (default: overwrite the input files)")]
        output: Option<PathBuf>,

        #[arg(
            short = 'k',
            long = "key",
            value_name = "KEY",
            env = API_KEYS_ENV,
            value_delimiter = ',',
            hide_env_values = true,
            help = "Service API key; repeat for several keys"
        )]
        keys: Vec<String>,

        #[arg(long, help = "Service endpoint (default: https://api.tinify.com)")]
        endpoint: Option<String>,

        #[arg(
            long,
            default_value_t = DEFAULT_RETRY_COUNT,
            help = "Retries for transient service failures"
        )]
        retries: u32,

        #[arg(
            long,
            default_value_t = DEFAULT_RETRY_DELAY_MS,
            value_name = "MS",
            help = "Delay between retries in milliseconds"
        )]
        retry_delay_ms: u64,

        #[arg(short = 'r', long, help = "Process subdirectories recursively")]
        recursive: bool,
    },
}
