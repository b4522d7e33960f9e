// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Canny edge detection on a single-channel image.
//!
//! Sobel gradients with clamped borders, L1 magnitude, 4-direction non-maximum
//! suppression and double-threshold hysteresis. The input is expected to be
//! smoothed already; no blur is applied here.

use image::{GrayImage, Luma};

const TAN_22_5_DEG: f32 = 0.414_213_57;

const EDGE: u8 = 255;

struct Gradients {
    width: usize,
    height: usize,
    gx: Vec<i32>,
    gy: Vec<i32>,
    mag: Vec<i32>,
}

fn sobel(gray: &GrayImage) -> Gradients {
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    let raw = gray.as_raw();
    let at = |x: isize, y: isize| -> i32 {
        let cx = x.clamp(0, width as isize - 1) as usize;
        let cy = y.clamp(0, height as isize - 1) as usize;
        raw[cy * width + cx] as i32
    };

    let mut gx = vec![0i32; width * height];
    let mut gy = vec![0i32; width * height];
    let mut mag = vec![0i32; width * height];

    for y in 0..height as isize {
        for x in 0..width as isize {
            let tl = at(x - 1, y - 1);
            let tc = at(x, y - 1);
            let tr = at(x + 1, y - 1);
            let ml = at(x - 1, y);
            let mr = at(x + 1, y);
            let bl = at(x - 1, y + 1);
            let bc = at(x, y + 1);
            let br = at(x + 1, y + 1);

            let dx = (tr + 2 * mr + br) - (tl + 2 * ml + bl);
            let dy = (bl + 2 * bc + br) - (tl + 2 * tc + tr);
            let idx = y as usize * width + x as usize;
            gx[idx] = dx;
            gy[idx] = dy;
            mag[idx] = dx.abs() + dy.abs();
        }
    }

    Gradients {
        width,
        height,
        gx,
        gy,
        mag,
    }
}

/// Keep only local maxima along the quantized gradient direction.
///
/// Ties are broken towards the pixel with the lower index so a plateau yields
/// a one-pixel-wide ridge rather than none.
fn non_maximum_suppression(grad: &Gradients) -> Vec<i32> {
    let (w, h) = (grad.width, grad.height);
    let mut out = vec![0i32; w * h];
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            let mag = grad.mag[idx];
            if mag == 0 {
                continue;
            }

            let gx = grad.gx[idx] as f32;
            let gy = grad.gy[idx] as f32;
            let abs_gx = gx.abs();
            let abs_gy = gy.abs();
            let same_sign = (gx >= 0.0 && gy >= 0.0) || (gx <= 0.0 && gy <= 0.0);

            // (before, after) along the gradient
            let (before, after) = if abs_gy <= abs_gx * TAN_22_5_DEG {
                (idx - 1, idx + 1)
            } else if abs_gx <= abs_gy * TAN_22_5_DEG {
                (idx - w, idx + w)
            } else if same_sign {
                (idx - w - 1, idx + w + 1)
            } else {
                (idx - w + 1, idx + w - 1)
            };

            if mag > grad.mag[before] && mag >= grad.mag[after] {
                out[idx] = mag;
            }
        }
    }

    out
}

/// Run Canny edge detection, returning a binary image (0 / 255).
///
/// Pixels above `high` seed edges; pixels above `low` survive only when
/// 8-connected to a seed.
pub fn canny(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    let grad = sobel(gray);
    let suppressed = non_maximum_suppression(&grad);
    let (w, h) = (grad.width, grad.height);

    let mut edges = GrayImage::new(w as u32, h as u32);
    let mut visited = vec![false; w * h];
    let mut stack = Vec::new();

    for seed in 0..w * h {
        if visited[seed] || (suppressed[seed] as f32) <= high {
            continue;
        }

        visited[seed] = true;
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            edges.put_pixel(x as u32, y as u32, Luma([EDGE]));

            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if !visited[nidx] && (suppressed[nidx] as f32) > low {
                        visited[nidx] = true;
                        stack.push(nidx);
                    }
                }
            }
        }
    }

    edges
}
