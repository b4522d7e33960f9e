// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External contour extraction and ROI overlay rendering

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// Colour of the ROI boxes drawn on the contour overlay
pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Stroke width of the ROI boxes
pub const OVERLAY_THICKNESS: u32 = 2;

/// Axis-aligned box in resized-image coordinates (inclusive of both edges)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// `[x, y, width, height]`
    pub fn to_array(&self) -> [u32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    fn from_points(points: &[[u32; 2]]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y) = (first[0], first[1]);
        let (mut max_x, mut max_y) = (first[0], first[1]);
        for p in points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
        Some(Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }
}

/// Candidate region of interest derived from one external contour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub bbox: BoundingBox,
    /// Border points of the contour, `[x, y]`
    pub contour: Vec<[u32; 2]>,
}

fn is_external(contour: &Contour<u32>) -> bool {
    contour.border_type == BorderType::Outer && contour.parent.is_none()
}

/// Extract the outermost contours of a binary image as regions.
///
/// Any non-zero pixel is foreground. Contours nested inside another shape are
/// ignored. Regions come back in raster order of their first border pixel.
pub fn extract_regions(binary: &GrayImage) -> Vec<Region> {
    find_contours::<u32>(binary)
        .into_iter()
        .filter(is_external)
        .filter_map(|contour| {
            let points: Vec<[u32; 2]> = contour.points.iter().map(|p| [p.x, p.y]).collect();
            BoundingBox::from_points(&points).map(|bbox| Region {
                bbox,
                contour: points,
            })
        })
        .collect()
}

/// Draw every region's box over a copy of `base`
pub fn draw_regions(base: &RgbImage, regions: &[Region]) -> RgbImage {
    let mut canvas = base.clone();
    for region in regions {
        let b = region.bbox;
        for inset in 0..OVERLAY_THICKNESS {
            let w = b.width.saturating_sub(2 * inset);
            let h = b.height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((b.x + inset) as i32, (b.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, OVERLAY_COLOR);
        }
    }
    canvas
}
