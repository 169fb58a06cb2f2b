use anyhow::{bail, Context, Result};
use clap::Parser;
use img_compact::cli::{Args, Commands};
use img_compact::{
    batch_progress_bar, collect_image_files, format_file_size, parse_key_list, BatchResult,
    CompressionOrchestrator, Credential, FileLog, HttpConnector, LocalCompressor, LocalOptions,
    QualityBounds, RemoteCompressor, RemoteOptions, Reporter, RetryPolicy, Strategy, TracingLog,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match args.command {
        Commands::Local {
            input,
            output,
            quality,
            min_quality,
            max_quality,
            target,
            optimizer,
            threads,
            recursive,
        } => {
            let files = find_inputs(&input, recursive)?;
            if files.is_empty() {
                println!("⚠️  No image files found in the input path");
                return Ok(());
            }

            let bounds = QualityBounds::new(min_quality, max_quality)?;
            let options = LocalOptions::new(output, quality, target, bounds, optimizer, threads)?;
            println!("🗜️  Compressing {} images locally", files.len());
            println!("⚙️  Using {} worker threads", options.threads);
            print_destination(options.output_dir());

            let reporter = build_reporter(args.log.as_deref(), args.quiet, files.len())?;
            let compressor = LocalCompressor::new(options).with_reporter(reporter);
            let mut orchestrator =
                CompressionOrchestrator::<HttpConnector>::new(Strategy::Local(compressor));
            let result = orchestrator.run(files).await?;
            print_summary(&result);
        }
        Commands::Remote {
            input,
            output,
            keys,
            endpoint,
            retries,
            retry_delay_ms,
            recursive,
        } => {
            let credentials: Vec<Credential> =
                keys.iter().flat_map(|k| parse_key_list(k)).collect();
            if credentials.is_empty() {
                bail!("no API keys given: pass --key or set TINIFY_API_KEYS");
            }

            let files = find_inputs(&input, recursive)?;
            if files.is_empty() {
                println!("⚠️  No image files found in the input path");
                return Ok(());
            }

            let retry = RetryPolicy::new(retries, Duration::from_millis(retry_delay_ms));
            let options = RemoteOptions::new(credentials, output, endpoint, retry)?;
            println!(
                "🌐 Compressing {} images with {} ({} keys)",
                files.len(),
                options.endpoint,
                options.keys.len()
            );
            print_destination(options.output_dir.as_deref());

            let connector = HttpConnector::new(options.endpoint.clone())?;
            let reporter = build_reporter(args.log.as_deref(), args.quiet, files.len())?;
            let compressor = RemoteCompressor::new(connector, options).with_reporter(reporter);
            let mut orchestrator = CompressionOrchestrator::new(Strategy::Remote(compressor));
            let result = orchestrator
                .run(files)
                .await
                .context("remote compression aborted")?;
            print_summary(&result);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "img_compact=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn find_inputs(input: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    println!("📁 Input: {}", input);
    let files = collect_image_files(input, recursive)
        .with_context(|| format!("failed to collect images from {}", input))?;
    Ok(files)
}

fn print_destination(output_dir: Option<&Path>) {
    match output_dir {
        Some(dir) => println!("📁 Output: {}", dir.display()),
        None => println!("📁 Output: overwriting input files in place"),
    }
}

fn build_reporter(log: Option<&Path>, quiet: bool, total: usize) -> Result<Reporter> {
    let mut reporter = Reporter::new();
    reporter = match log {
        Some(path) => {
            let file_log = FileLog::open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            reporter.with_log(Arc::new(file_log))
        }
        None => reporter.with_log(Arc::new(TracingLog)),
    };
    if !quiet {
        reporter = reporter.with_progress(batch_progress_bar(total as u64));
    }
    Ok(reporter)
}

fn print_summary(result: &BatchResult) {
    let elapsed = result.elapsed.as_secs_f64();

    println!("\n📊 Compression Summary:");
    println!("  📁 Files compressed: {}", result.confirmed.len());
    println!(
        "  📊 Total original size: {}",
        format_file_size(result.input_bytes)
    );
    println!(
        "  📊 Total compressed size: {}",
        format_file_size(result.output_bytes)
    );
    println!("  🎯 Overall saving: {:.1}%", result.compression_ratio());
    if result.rounds > 1 {
        println!("  🔁 Rounds: {}", result.rounds);
    }
    println!("  ⏱️  Total time: {:.2?}", result.elapsed);
    if elapsed > 0.0 {
        println!(
            "  ⚡ Average speed: {:.2} files/second",
            result.confirmed.len() as f64 / elapsed
        );
    }

    if !result.failures.is_empty() {
        println!("  ⚠️  Failed files: {}", result.failures.len());
        for failure in &result.failures {
            println!("    ❌ {}: {}", failure.path.display(), failure.reason);
        }
    }
}
