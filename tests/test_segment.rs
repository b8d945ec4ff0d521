// tests/test_segment.rs — Bubble segmentation on synthetic jar regions.
//
// Bubbles are dark discs on a bright starter body; the segmenter should find
// each disc once and the area/circularity filters decide what is counted.

use rise_track::image::Image;
use rise_track::segment::{BubbleSegmenter, SegmenterConfig};

/// Bright background with dark discs of the given radius.
fn disc_scene(w: usize, h: usize, centers: &[(f32, f32)], radius: f32) -> Image<u8> {
    let mut img = Image::filled(w, h, 255u8);
    for y in 0..h {
        for x in 0..w {
            let inside = centers.iter().any(|&(cx, cy)| {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                dx * dx + dy * dy <= radius * radius
            });
            if inside {
                img.set(x, y, 0);
            }
        }
    }
    img
}

fn three_bubbles() -> Image<u8> {
    disc_scene(200, 80, &[(40.0, 40.0), (100.0, 40.0), (160.0, 40.0)], 6.0)
}

fn segmenter(config: SegmenterConfig) -> BubbleSegmenter {
    BubbleSegmenter::new(config).unwrap()
}

// ===== Counting =====

#[test]
fn three_separated_discs_are_counted() {
    let cfg = SegmenterConfig { max_area: 500.0, ..Default::default() };
    let seg = segmenter(cfg).segment(&three_bubbles());
    assert_eq!(seg.count(), 3, "candidates seen: {}", seg.candidates_seen);
    for b in &seg.bubbles {
        assert!(b.area() >= 50.0 && b.area() <= 500.0, "area {}", b.area());
        assert!(b.perimeter() > 0.0);
    }
}

#[test]
fn discs_above_max_area_are_excluded() {
    let cfg = SegmenterConfig { max_area: 80.0, ..Default::default() };
    let seg = segmenter(cfg).segment(&three_bubbles());
    assert_eq!(seg.count(), 0);
    assert!(seg.candidates_seen >= 3, "discs still show up as candidates");
}

#[test]
fn discs_below_min_area_are_excluded() {
    let cfg = SegmenterConfig { min_area: 400.0, max_area: 1500.0, ..Default::default() };
    assert_eq!(segmenter(cfg).count(&three_bubbles()), 0);
}

#[test]
fn bubble_centroids_match_disc_centers() {
    let cfg = SegmenterConfig { max_area: 500.0, ..Default::default() };
    let seg = segmenter(cfg).segment(&three_bubbles());
    let mut xs: Vec<f32> = seg.bubbles.iter().map(|b| b.contour.centroid.0).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for (x, expected) in xs.iter().zip([40.0, 100.0, 160.0]) {
        assert!((x - expected).abs() < 1.0, "centroid x {x} vs {expected}");
    }
}

#[test]
fn uniform_region_has_no_bubbles() {
    let img = Image::filled(120, 60, 180u8);
    let seg = segmenter(SegmenterConfig::default()).segment(&img);
    assert_eq!(seg.count(), 0);
    assert_eq!(seg.candidates_seen, 0);
}

#[test]
fn empty_region_has_no_bubbles() {
    let img: Image<u8> = Image::new(50, 0);
    assert_eq!(segmenter(SegmenterConfig::default()).count(&img), 0);
}

// ===== Filters =====

#[test]
fn circularity_range_filters_discs() {
    let strict = SegmenterConfig {
        max_area: 500.0,
        circularity: Some((0.0, 0.05)),
        ..Default::default()
    };
    assert_eq!(segmenter(strict).count(&three_bubbles()), 0);

    let loose = SegmenterConfig {
        max_area: 500.0,
        circularity: Some((0.3, 10.0)),
        ..Default::default()
    };
    assert_eq!(segmenter(loose).count(&three_bubbles()), 3);
}

#[test]
fn invalid_config_is_rejected() {
    let even_blur = SegmenterConfig { blur_kernel: 10, ..Default::default() };
    assert!(BubbleSegmenter::new(even_blur).is_err());
    let inverted = SegmenterConfig { min_area: 600.0, max_area: 500.0, ..Default::default() };
    assert!(BubbleSegmenter::new(inverted).is_err());
}

// ===== Determinism & preprocessing =====

#[test]
fn segmentation_is_deterministic() {
    let img = three_bubbles();
    let s = segmenter(SegmenterConfig { max_area: 500.0, ..Default::default() });
    assert_eq!(s.segment(&img), s.segment(&img));
}

#[test]
fn equalization_keeps_low_contrast_discs_countable() {
    // Same layout, squeezed into 100..=110.
    let img = three_bubbles().map(|v: u8| 100 + v / 25);
    let cfg = SegmenterConfig {
        equalize: true,
        max_area: 500.0,
        ..Default::default()
    };
    assert_eq!(segmenter(cfg).count(&img), 3);
}

#[test]
fn mask_marks_disc_centers() {
    let mask = segmenter(SegmenterConfig::default()).mask(&three_bubbles());
    assert_eq!(mask.get(40, 40), 255);
    assert_eq!(mask.get(70, 40), 0);
}
