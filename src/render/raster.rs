//! Minimal software rasterizer over `image::RgbaImage`.
//!
//! Geometry arrives in fractional pixels; rects are snapped outward so that
//! sub-pixel tags still cover at least one column.

use image::{Rgba, RgbaImage};

use crate::core::viewport::RulerTick;
use crate::entities::color::Color;

/// Snapped pixel rect, inclusive start, exclusive end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    /// Snap a float rect to the canvas. None if it falls fully outside or
    /// has non-finite coordinates.
    pub fn snap(x: f64, y: f64, w: f64, h: f64, width: u32, height: u32) -> Option<Self> {
        if ![x, y, w, h].iter().all(|v| v.is_finite()) || w < 0.0 || h < 0.0 {
            return None;
        }
        let x0 = x.floor().max(0.0);
        let y0 = y.floor().max(0.0);
        // At least one pixel wide/tall
        let x1 = (x + w).ceil().max(x0 + 1.0).min(width as f64);
        let y1 = (y + h).ceil().max(y0 + 1.0).min(height as f64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Self {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

pub fn new_canvas(width: u32, height: u32, background: Color) -> RgbaImage {
    RgbaImage::from_pixel(width, height, background.into())
}

/// Source-over blend of `src` onto `dst`
#[inline]
pub fn blend(dst: Rgba<u8>, src: Color) -> Rgba<u8> {
    let sa = src.a() as u32;
    if sa == 255 {
        return src.into();
    }
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;
    let da = dst.0[3] as u32;
    let out_a = sa + da * inv / 255;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mix = |s: u8, d: u8| {
        let v = (s as u32 * sa + d as u32 * da * inv / 255) / out_a;
        v.min(255) as u8
    };
    Rgba([
        mix(src.r(), dst.0[0]),
        mix(src.g(), dst.0[1]),
        mix(src.b(), dst.0[2]),
        out_a.min(255) as u8,
    ])
}

pub fn fill_rect(img: &mut RgbaImage, rect: PixelRect, color: Color) {
    for y in rect.y0..rect.y1 {
        for x in rect.x0..rect.x1 {
            let px = img.get_pixel_mut(x, y);
            *px = blend(*px, color);
        }
    }
}

/// 1px (or `thickness`) outline inside `rect`
pub fn stroke_rect(img: &mut RgbaImage, rect: PixelRect, color: Color, thickness: u32) {
    let t = thickness.max(1);
    let tw = t.min(rect.width());
    let th = t.min(rect.height());
    let edges = [
        PixelRect { y1: rect.y0 + th, ..rect },
        PixelRect { y0: rect.y1 - th, ..rect },
        PixelRect { y0: rect.y0 + th, y1: rect.y1 - th, x1: rect.x0 + tw, ..rect },
        PixelRect { y0: rect.y0 + th, y1: rect.y1 - th, x0: rect.x1 - tw, ..rect },
    ];
    for edge in edges {
        if edge.y0 < edge.y1 && edge.x0 < edge.x1 {
            fill_rect(img, edge, color);
        }
    }
}

/// Vertical line centered on `x`, `thickness` pixels wide
pub fn vline(img: &mut RgbaImage, x: f64, thickness: u32, color: Color) {
    let (w, h) = img.dimensions();
    let t = thickness.max(1) as f64;
    if let Some(rect) = PixelRect::snap(x - t / 2.0, 0.0, t, h as f64, w, h) {
        fill_rect(img, rect, color);
    }
}

/// Ruler marks along the top edge, `length` pixels tall
pub fn ruler_ticks(img: &mut RgbaImage, ticks: &[RulerTick], length: u32, color: Color) {
    let (w, h) = img.dimensions();
    for tick in ticks {
        if let Some(rect) = PixelRect::snap(tick.x - 0.5, 0.0, 1.0, length as f64, w, h) {
            fill_rect(img, rect, color);
        }
    }
}
