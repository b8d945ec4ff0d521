// overlay.rs — Annotated copies of the frames for visual checking.
//
// Drawn on top of the frame (color if the source kept it):
//   - accepted bubble contours in green, shifted by the region origin
//   - the surface row as a thin yellow line
//   - each surviving point as a filled red disc
//
// Output only; nothing here feeds back into measurement.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::convert::gray_to_rgb;
use crate::error::Result;
use crate::frames::Frame;
use crate::pipeline::FrameOutput;

const BUBBLE: Rgb<u8> = Rgb([0, 255, 0]);
const POINT: Rgb<u8> = Rgb([255, 0, 0]);
const SURFACE: Rgb<u8> = Rgb([255, 255, 0]);
const POINT_RADIUS: i64 = 5;

pub fn render_overlay(frame: &Frame, output: &FrameOutput) -> RgbImage {
    let mut canvas = match &frame.color {
        Some(c) => c.clone(),
        None => gray_to_rgb(&frame.gray),
    };

    if let Some(seg) = &output.segmentation {
        let (ox, oy) = output.region_origin;
        for bubble in &seg.bubbles {
            for &(x, y) in &bubble.contour.points {
                put(&mut canvas, (x + ox) as i64, (y + oy) as i64, BUBBLE);
            }
        }
    }

    if let Some(row) = output.record.crop_row {
        for x in 0..canvas.width() as i64 {
            put(&mut canvas, x, row as i64, SURFACE);
        }
    }

    for p in &output.points {
        fill_disc(&mut canvas, p.x.round() as i64, p.y.round() as i64, POINT_RADIUS, POINT);
    }
    canvas
}

/// Render and write `processed_<name>` into `dir`. The format follows the
/// frame's extension.
pub fn save_overlay(dir: impl AsRef<Path>, frame: &Frame, output: &FrameOutput) -> Result<PathBuf> {
    let path = dir.as_ref().join(format!("processed_{}", frame.name));
    render_overlay(frame, output).save(&path)?;
    Ok(path)
}

fn put(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < canvas.width() as i64 && y < canvas.height() as i64 {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_disc(canvas: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Rgb<u8>) {
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                put(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}
