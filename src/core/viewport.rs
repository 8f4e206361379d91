//! Zoomable viewport over a fixed-duration timeline.
//!
//! Three coordinate systems:
//! - timeline percentage `0..100` (the zoom/scale UI),
//! - frame number `0..=total_frames`,
//! - pixel offset within a rendered width.
//!
//! Only the scale window `[scale_min, scale_max]` is stored; every derived
//! quantity (visible range, pixels per frame) is computed on demand.

use serde::{Deserialize, Serialize};

use super::timebase::TimeBase;

/// Narrowest allowed zoom window, in percent of the timeline
pub const DEFAULT_MIN_SCALE_SPAN: f64 = 0.05;

/// Zoom factor applied per scroll step
const ZOOM_STEP: f64 = 0.2;

/// Candidate ruler spacings in seconds (coarser than one frame)
const RULER_STEPS_SECONDS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0,
];

/// Candidate ruler spacings in frames (finer than one second)
const RULER_STEPS_FRAMES: &[u64] = &[1, 2, 5, 10];

/// Zoom window in timeline percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self { min: 0.0, max: 100.0 }
    }
}

impl Scale {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// One ruler tick
#[derive(Debug, Clone, PartialEq)]
pub struct RulerTick {
    pub frame: u64,
    pub time: f64,
    pub x: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scale: Scale,
    time_base: TimeBase,
    min_span: f64,
}

impl Viewport {
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            scale: Scale::default(),
            time_base,
            min_span: DEFAULT_MIN_SCALE_SPAN,
        }
    }

    /// Override the narrowest zoom window (percent, clamped to `(0, 100]`)
    pub fn with_min_span(mut self, min_span: f64) -> Self {
        self.min_span = if min_span.is_finite() && min_span > 0.0 {
            min_span.min(100.0)
        } else {
            DEFAULT_MIN_SCALE_SPAN
        };
        let Scale { min, max } = self.scale;
        self.set_scale(min, max);
        self
    }

    pub fn time_base(&self) -> &TimeBase {
        &self.time_base
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn scale_min(&self) -> f64 {
        self.scale.min
    }

    pub fn scale_max(&self) -> f64 {
        self.scale.max
    }

    pub fn min_span(&self) -> f64 {
        self.min_span
    }

    /// Set the zoom window. Clamps to `[0, 100]`, orders the pair and widens
    /// windows narrower than the minimum span around their center.
    pub fn set_scale(&mut self, min: f64, max: f64) {
        let min = if min.is_finite() { min.clamp(0.0, 100.0) } else { 0.0 };
        let max = if max.is_finite() { max.clamp(0.0, 100.0) } else { 100.0 };
        let (mut min, mut max) = if min <= max { (min, max) } else { (max, min) };

        if max - min < self.min_span {
            let center = (min + max) / 2.0;
            min = center - self.min_span / 2.0;
            max = center + self.min_span / 2.0;
            if min < 0.0 {
                min = 0.0;
                max = self.min_span;
            }
            if max > 100.0 {
                max = 100.0;
                min = 100.0 - self.min_span;
            }
        }

        self.scale = Scale {
            min: min.max(0.0),
            max: max.min(100.0),
        };
    }

    /// Apply a [`Scale`] through the same clamping as [`Self::set_scale`]
    pub fn apply_scale(&mut self, scale: Scale) {
        self.set_scale(scale.min, scale.max);
    }

    /// Zoom around `pivot` (percent). Positive `delta_y` zooms out, negative
    /// zooms in. The pivot keeps its relative position inside the window.
    pub fn scroll_scale(&mut self, pivot: f64, delta_y: f64) {
        if !delta_y.is_finite() || delta_y == 0.0 {
            return;
        }
        let Scale { min, max } = self.scale;
        let span = max - min;
        let pivot = if pivot.is_finite() { pivot.clamp(min, max) } else { (min + max) / 2.0 };

        let factor = if delta_y > 0.0 {
            1.0 + ZOOM_STEP
        } else {
            1.0 / (1.0 + ZOOM_STEP)
        };
        let new_span = (span * factor).clamp(self.min_span, 100.0);
        let ratio = if span > 0.0 { (pivot - min) / span } else { 0.5 };

        let mut new_min = pivot - ratio * new_span;
        let mut new_max = new_min + new_span;
        if new_min < 0.0 {
            new_min = 0.0;
            new_max = new_span;
        }
        if new_max > 100.0 {
            new_max = 100.0;
            new_min = 100.0 - new_span;
        }
        self.set_scale(new_min, new_max);
    }

    /// Pan so the window starts at `min`, keeping its width
    pub fn scroll_to(&mut self, min: f64) {
        let span = self.scale.span();
        let min = if min.is_finite() { min.clamp(0.0, 100.0 - span) } else { self.scale.min };
        self.set_scale(min, min + span);
    }

    /// Show the whole timeline
    pub fn reset(&mut self) {
        self.scale = Scale::default();
    }

    // ========== Percent <-> frame / time ==========

    /// Percent -> frame in `[0, total_frames]`
    pub fn percent_to_frame(&self, percent: f64) -> u64 {
        if !percent.is_finite() {
            return 0;
        }
        let total = self.time_base.total_frames();
        let frame = (percent.clamp(0.0, 100.0) / 100.0 * total as f64).round();
        (frame as u64).min(total)
    }

    pub fn frame_to_percent(&self, frame: u64) -> f64 {
        let total = self.time_base.total_frames();
        if total == 0 {
            return 0.0;
        }
        (frame.min(total) as f64 / total as f64) * 100.0
    }

    pub fn percent_to_time(&self, percent: f64) -> f64 {
        if !percent.is_finite() {
            return 0.0;
        }
        percent.clamp(0.0, 100.0) / 100.0 * self.time_base.duration()
    }

    pub fn time_to_percent(&self, seconds: f64) -> f64 {
        let duration = self.time_base.duration();
        if duration <= 0.0 || !seconds.is_finite() {
            return 0.0;
        }
        (seconds / duration * 100.0).clamp(0.0, 100.0)
    }

    // ========== Pixels ==========

    /// Pixel offset of a timeline percent inside the visible window, clamped
    /// to `[0, width]`. Unmeasured widths (0, negative, NaN) give 0.
    pub fn position_to_pixels(&self, percent: f64, width: f64) -> f64 {
        if !width.is_finite() || width <= 0.0 || !percent.is_finite() {
            return 0.0;
        }
        let span = self.scale.span();
        if span <= 0.0 {
            return 0.0;
        }
        ((percent - self.scale.min) / span * width).clamp(0.0, width)
    }

    /// Unclamped pixel offset (may be negative or past `width`). Used for
    /// geometry that starts or ends off screen.
    pub fn position_to_pixels_unclamped(&self, percent: f64, width: f64) -> f64 {
        if !width.is_finite() || width <= 0.0 || !percent.is_finite() {
            return 0.0;
        }
        let span = self.scale.span();
        if span <= 0.0 {
            return 0.0;
        }
        (percent - self.scale.min) / span * width
    }

    /// Inverse of [`Self::position_to_pixels`]
    pub fn pixels_to_percent(&self, px: f64, width: f64) -> f64 {
        if !width.is_finite() || width <= 0.0 || !px.is_finite() {
            return self.scale.min;
        }
        let px = px.clamp(0.0, width);
        self.scale.min + px / width * self.scale.span()
    }

    pub fn time_to_pixels(&self, seconds: f64, width: f64) -> f64 {
        self.position_to_pixels(self.time_to_percent(seconds), width)
    }

    pub fn pixels_to_time(&self, px: f64, width: f64) -> f64 {
        self.percent_to_time(self.pixels_to_percent(px, width))
    }

    /// Visible `[start, end]` in seconds
    pub fn visible_time_range(&self) -> (f64, f64) {
        (
            self.percent_to_time(self.scale.min),
            self.percent_to_time(self.scale.max),
        )
    }

    /// Visible `[first, last]` frames
    pub fn visible_frame_range(&self) -> (u64, u64) {
        (
            self.percent_to_frame(self.scale.min),
            self.percent_to_frame(self.scale.max),
        )
    }

    /// Pixels per frame at `width` (0 when unmeasured or empty)
    pub fn pixels_per_frame(&self, width: f64) -> f64 {
        if !width.is_finite() || width <= 0.0 {
            return 0.0;
        }
        let frames = self.time_base.total_frames() as f64 * self.scale.span() / 100.0;
        if frames <= 0.0 { 0.0 } else { width / frames }
    }

    /// Ruler ticks at least `min_spacing` pixels apart, labelled with SMPTE.
    ///
    /// Steps are whole frames (1, 2, 5, 10) when zoomed in, whole seconds or
    /// minutes otherwise.
    pub fn ruler_ticks(&self, width: f64, min_spacing: f64) -> Vec<RulerTick> {
        let ppf = self.pixels_per_frame(width);
        if ppf <= 0.0 || !min_spacing.is_finite() || min_spacing <= 0.0 {
            return Vec::new();
        }
        let tb = &self.time_base;
        let fps = tb.rate().as_f64();
        let nominal = tb.rate().nominal_fps() as u64;

        let step_frames = RULER_STEPS_FRAMES
            .iter()
            .copied()
            .filter(|&s| s < nominal)
            .map(|s| s as f64)
            .chain(RULER_STEPS_SECONDS.iter().map(|s| s * fps))
            .find(|&step| step * ppf >= min_spacing);
        let Some(step_frames) = step_frames else {
            return Vec::new();
        };

        let (first, last) = self.visible_frame_range();
        let start = (first as f64 / step_frames).ceil() as u64;
        let mut ticks = Vec::new();
        let mut i = start;
        loop {
            let frame = (i as f64 * step_frames).round() as u64;
            if frame > last || frame >= tb.total_frames() {
                break;
            }
            let time = tb.frame_to_time(frame as i64);
            ticks.push(RulerTick {
                frame,
                time,
                x: self.position_to_pixels(self.frame_to_percent(frame), width),
                label: tb.frame_to_smpte(frame as i64),
            });
            i += 1;
        }
        ticks
    }
}
