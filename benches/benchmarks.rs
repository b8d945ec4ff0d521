// benches/benchmarks.rs -- Per-stage and full-pipeline benchmarks.
//
// Synthetic benchmarks (always run):
//   cargo bench
//
// With a real time-lapse (directory of image_*.jpg photos):
//   STARTER_PATH=/path/to/timelapse cargo bench
//
// The time-lapse benchmark loads the first 20 photos and runs the full
// pipeline with points along the middle row.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use rise_track::contour::find_external_contours;
use rise_track::convert::f32_to_u8;
use rise_track::convolution::gaussian_blur;
use rise_track::histeq;
use rise_track::image::Image;
use rise_track::pyramid::Pyramid;
use rise_track::segment::{BubbleSegmenter, SegmenterConfig};
use rise_track::threshold::{adaptive_threshold_inv, AdaptiveMethod};
use rise_track::tracker::{LkTracker, PointTracker, TrackerConfig};
use rise_track::{
    DirectoryFrameStore, FrameSource, MemoryFrameStore, PipelineConfig, Point2, PointSet,
    TrackingPipeline,
};

use std::env;

// ============================================================
// Helpers
// ============================================================

/// Synthetic jar photo: bright sky above `surface`, starter body below with
/// textured bumps along the surface and a grid of dark bubbles.
fn make_jar(w: usize, h: usize, surface: f32) -> Image<u8> {
    let mut img = Image::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let (xf, yf) = (x as f32, y as f32);
            let mut v = if yf < surface { 230.0 } else { 170.0 + (x * 7 % 13) as f32 };
            let bump_x = (xf / 40.0).round() * 40.0;
            let d2 = (xf - bump_x).powi(2) + (yf - surface).powi(2);
            v -= 90.0 * (-d2 / 32.0).exp();
            if yf > surface + 20.0 {
                let (gx, gy) = ((xf / 30.0).round() * 30.0, (yf / 30.0).round() * 30.0);
                if (xf - gx).powi(2) + (yf - gy).powi(2) <= 25.0 {
                    v = 40.0;
                }
            }
            img.set(x, y, v.clamp(0.0, 255.0) as u8);
        }
    }
    img
}

fn surface_points(w: usize, surface: f32) -> PointSet {
    (1..w / 40).map(|i| Point2::new(i as f32 * 40.0, surface)).collect()
}

// ============================================================
// Per-stage benchmarks (synthetic, always runnable)
// ============================================================

fn bench_histeq(c: &mut Criterion) {
    let img = make_jar(640, 480, 200.0);

    let mut group = c.benchmark_group("histeq");
    group.bench_function("global_640x480", |b| {
        b.iter(|| histeq::equalize_histogram(&img))
    });
    group.finish();
}

fn bench_pyramid(c: &mut Criterion) {
    let img = make_jar(640, 480, 200.0);

    let mut group = c.benchmark_group("pyramid");
    group.bench_function("build_3level_640x480", |b| {
        b.iter(|| Pyramid::build(&img, 3, 1.0))
    });
    group.finish();
}

fn bench_tracker(c: &mut Criterion) {
    let img1 = make_jar(640, 480, 200.0);
    let img2 = make_jar(640, 480, 197.0);
    let points = surface_points(640, 200.0);

    let tracker = LkTracker::new(TrackerConfig::default()).unwrap();
    let pyr1 = Pyramid::build(&img1, 3, 1.0);
    let pyr2 = Pyramid::build(&img2, 3, 1.0);

    let mut group = c.benchmark_group("tracker");
    group.bench_function(
        BenchmarkId::new("pyramids_prebuilt", format!("{}pts", points.len())),
        |b| b.iter(|| tracker.track_pyramids(&pyr1, &pyr2, &points)),
    );
    group.bench_function(
        BenchmarkId::new("from_frames", format!("{}pts", points.len())),
        |b| b.iter(|| tracker.track(&img1, &img2, &points)),
    );
    group.finish();
}

fn bench_segment(c: &mut Criterion) {
    let img = make_jar(640, 480, 200.0);
    let region = img.crop(0, 200, 640, 280);
    let blurred = f32_to_u8(&gaussian_blur(&region, 11));
    let mask = adaptive_threshold_inv(&blurred, AdaptiveMethod::Gaussian, 11, 2.0);
    let segmenter = BubbleSegmenter::new(SegmenterConfig::default()).unwrap();

    let mut group = c.benchmark_group("segment");
    group.bench_function("blur_k11_640x280", |b| {
        b.iter(|| gaussian_blur(&region, 11))
    });
    group.bench_function("threshold_b11_640x280", |b| {
        b.iter(|| adaptive_threshold_inv(&blurred, AdaptiveMethod::Gaussian, 11, 2.0))
    });
    group.bench_function("contours_640x280", |b| {
        b.iter(|| find_external_contours(&mask))
    });
    group.bench_function("full_640x280", |b| {
        b.iter(|| segmenter.segment(&region))
    });
    group.finish();
}

fn bench_pipeline_synthetic(c: &mut Criterion) {
    let frames: MemoryFrameStore = (0..10)
        .map(|i| make_jar(640, 480, 200.0 - i as f32))
        .collect();
    let points = surface_points(640, 200.0);

    let mut group = c.benchmark_group("pipeline");
    for parallel in [false, true] {
        let config = PipelineConfig {
            parallel_segmentation: parallel,
            ..Default::default()
        };
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(BenchmarkId::new("synthetic_640x480_10frames", name), |b| {
            b.iter(|| {
                let mut pipeline = TrackingPipeline::new(config.clone()).unwrap();
                pipeline.run(&frames, points.clone()).unwrap()
            })
        });
    }
    group.finish();
}

// ============================================================
// Time-lapse benchmark (optional, needs STARTER_PATH env var)
// ============================================================

fn bench_timelapse(c: &mut Criterion) {
    let root = match env::var("STARTER_PATH") {
        Ok(p) => p,
        Err(_) => {
            eprintln!("STARTER_PATH not set, skipping time-lapse benchmark");
            return;
        }
    };

    let store = DirectoryFrameStore::open(&root, Some("image_"))
        .unwrap_or_else(|e| panic!("Failed to list {root}: {e}"));
    let n = store.len().min(20);
    if n == 0 {
        eprintln!("No frames in {root}, skipping");
        return;
    }

    let frames: Vec<Image<u8>> = (0..n)
        .filter_map(|i| store.load(i).ok().map(|f| f.gray))
        .collect();
    let Some(first) = frames.first() else {
        eprintln!("No readable frames in {root}, skipping");
        return;
    };
    let (w, h) = (first.width(), first.height());
    let memory: MemoryFrameStore = frames.into_iter().collect();
    let points = surface_points(w, h as f32 / 2.0);

    let mut group = c.benchmark_group("timelapse");
    group.sample_size(10);
    group.bench_function(format!("{n}frames_{w}x{h}"), |b| {
        b.iter(|| {
            let mut pipeline = TrackingPipeline::new(PipelineConfig::default()).unwrap();
            pipeline.run(&memory, points.clone()).unwrap()
        })
    });
    group.finish();
}

// ============================================================
// Register
// ============================================================

criterion_group!(
    benches,
    bench_histeq,
    bench_pyramid,
    bench_tracker,
    bench_segment,
    bench_pipeline_synthetic,
    bench_timelapse,
);
criterion_main!(benches);
