use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use img_compact::{
    LocalCompressor, LocalOptions, OptimizerMode, QualityBounds, QualitySearchEngine,
    SimilarityMetric, Ssim,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x % 256) as u8,
            (y % 256) as u8,
            ((x * 3 + y * 5) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

fn create_test_jpeg(width: u32, height: u32) -> (PathBuf, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let test_file = temp_dir.path().join("test.jpg");
    gradient_image(width, height)
        .save_with_format(&test_file, ImageFormat::Jpeg)
        .unwrap();
    (test_file, temp_dir)
}

fn bench_quality_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("quality_search");

    for size in [Small, Medium, Large].iter() {
        let (width, height) = match size {
            Small => (800, 600),
            Medium => (1920, 1080),
            Large => (3840, 2160),
        };
        let img = gradient_image(width, height);
        let engine = QualitySearchEngine::default();

        group.bench_with_input(
            BenchmarkId::new("search", format!("{}x{}", width, height)),
            &img,
            |b, img| b.iter(|| engine.search(black_box(img))),
        );
    }

    group.finish();
}

fn bench_search_bounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_bounds");
    let img = gradient_image(800, 600);

    for (low, high) in [(80u8, 85u8), (60, 90), (1, 100)] {
        let engine = QualitySearchEngine::new(0.95, QualityBounds::new(low, high).unwrap()).unwrap();
        group.bench_with_input(
            BenchmarkId::new("bounds", format!("{}-{}", low, high)),
            &img,
            |b, img| b.iter(|| engine.search(black_box(img))),
        );
    }

    group.finish();
}

fn bench_ssim(c: &mut Criterion) {
    let reference = ImageBuffer::from_fn(400, 400, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
    let candidate = ImageBuffer::from_fn(400, 400, |x, y| Luma([((x * 7 + y * 3 + 2) % 256) as u8]));
    let metric = Ssim::default();

    c.bench_function("ssim_400x400", |b| {
        b.iter(|| metric.compare(black_box(&reference), black_box(&candidate)))
    });
}

fn bench_local_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_compress");
    let (test_file, _temp_dir) = create_test_jpeg(1920, 1080);

    for optimizer in [OptimizerMode::None, OptimizerMode::Lossless] {
        let output_dir = TempDir::new().unwrap();
        let options = LocalOptions::new(
            Some(output_dir.path().to_path_buf()),
            None,
            0.95,
            QualityBounds::default(),
            optimizer.clone(),
            Some(1),
        )
        .unwrap();
        let compressor = LocalCompressor::new(options);

        group.bench_with_input(
            BenchmarkId::new("optimizer", optimizer.to_string()),
            &test_file,
            |b, file| b.iter(|| compressor.compress(black_box(file))),
        );
    }

    group.finish();
}

enum ImageSize {
    Small,
    Medium,
    Large,
}

use ImageSize::*;

criterion_group!(
    benches,
    bench_quality_search,
    bench_search_bounds,
    bench_ssim,
    bench_local_compress
);
criterion_main!(benches);
