// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pixel-level stage functions for the preprocessing chain

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

/// Bilinear resize to exactly `width` x `height` (aspect ratio is not preserved)
pub fn resize(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(img, width, height, FilterType::Triangle)
}

/// Single-channel luma (Rec. 709 weights)
pub fn grayscale(img: &RgbImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Largest blur kernel whose unnormalized 2D sum (`255 * 4^(k-1)`) fits in `u64`
pub const MAX_BLUR_KERNEL_SIZE: u32 = 29;

/// Row `n` of Pascal's triangle, i.e. a binomial kernel of `n + 1` taps
fn binomial_taps(kernel_size: u32) -> Vec<u64> {
    let n = kernel_size.saturating_sub(1) as u64;
    let mut taps = Vec::with_capacity(kernel_size as usize);
    let mut c = 1u64;
    for k in 0..=n {
        taps.push(c);
        c = c * (n - k) / (k + 1);
    }
    taps
}

/// Separable binomial blur with replicated borders.
///
/// For `kernel_size == 5` this is the `[1 4 6 4 1] / 16` kernel, the usual
/// integer approximation of a 5x5 Gaussian with sigma derived from the size.
/// Integer arithmetic with round-half-up keeps the output deterministic.
/// Sizes above [`MAX_BLUR_KERNEL_SIZE`] are clamped to it.
pub fn binomial_blur(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    let kernel_size = kernel_size.min(MAX_BLUR_KERNEL_SIZE);
    if kernel_size <= 1 {
        return gray.clone();
    }

    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let taps = binomial_taps(kernel_size);
    let radius = (taps.len() / 2) as isize;
    let shift = 2 * (taps.len() as u32 - 1);
    let raw = gray.as_raw();

    // horizontal pass, unnormalized
    let mut horizontal = vec![0u64; w * h];
    for y in 0..h {
        let row = &raw[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0u64;
            for (i, &t) in taps.iter().enumerate() {
                let sx = (x as isize + i as isize - radius).clamp(0, w as isize - 1) as usize;
                acc += t * row[sx] as u64;
            }
            horizontal[y * w + x] = acc;
        }
    }

    let half = 1u64 << (shift - 1);
    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u64;
            for (i, &t) in taps.iter().enumerate() {
                let sy = (y as isize + i as isize - radius).clamp(0, h as isize - 1) as usize;
                acc += t * horizontal[sy * w + x];
            }
            let value = ((acc + half) >> shift).min(255) as u8;
            out.put_pixel(x as u32, y as u32, image::Luma([value]));
        }
    }

    out
}

/// Morphological closing followed by dilation with a square structuring element.
///
/// `iterations` passes of a `kernel_size` square compose to a single square of
/// radius `kernel_size / 2 * iterations`, which is what gets applied.
pub fn close_then_dilate(
    binary: &GrayImage,
    kernel_size: u32,
    close_iterations: u32,
    dilate_iterations: u32,
) -> GrayImage {
    let radius = kernel_size / 2;
    let close_radius = radius.saturating_mul(close_iterations).min(u8::MAX as u32) as u8;
    let dilate_radius = radius.saturating_mul(dilate_iterations).min(u8::MAX as u32) as u8;

    let closed = if close_radius > 0 {
        morphology::close(binary, Norm::LInf, close_radius)
    } else {
        binary.clone()
    };

    if dilate_radius > 0 {
        morphology::dilate(&closed, Norm::LInf, dilate_radius)
    } else {
        closed
    }
}
