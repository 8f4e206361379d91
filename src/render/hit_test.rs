//! Click/hover resolution on the interactive thread.
//!
//! Inverse of the render path: pixel -> time through the viewport, then a
//! query against the UI-side index of the track.

use crate::core::viewport::Viewport;
use crate::entities::tag::TagId;
use crate::entities::track::Track;

#[derive(Debug, Clone, Copy)]
pub struct HitTester<'a> {
    viewport: &'a Viewport,
    width: f64,
    tolerance_px: f64,
    filter: &'a str,
}

impl<'a> HitTester<'a> {
    pub fn new(viewport: &'a Viewport, width: f64, tolerance_px: f64) -> Self {
        Self {
            viewport,
            width,
            tolerance_px: if tolerance_px.is_finite() { tolerance_px.max(0.0) } else { 0.0 },
            filter: "",
        }
    }

    /// Only report tags the renderer draws under this (lowercase) filter
    pub fn with_filter(mut self, filter: &'a str) -> Self {
        self.filter = filter;
        self
    }

    pub fn time_at_pixel(&self, x: f64) -> f64 {
        self.viewport.pixels_to_time(x, self.width)
    }

    pub fn frame_at_pixel(&self, x: f64) -> u64 {
        self.viewport
            .time_base()
            .time_to_frame(self.time_at_pixel(x))
    }

    /// Seconds covered by the pixel tolerance at the current zoom
    fn tolerance_secs(&self) -> f64 {
        if self.width <= 0.0 || !self.width.is_finite() {
            return 0.0;
        }
        let (start, end) = self.viewport.visible_time_range();
        (end - start) / self.width * self.tolerance_px
    }

    /// Tag ids under `x`. Exact containment wins; otherwise anything within
    /// the pixel tolerance (so thin markers stay clickable). Tags hidden by
    /// the filter are never hit.
    pub fn tags_at_pixel(&self, track: &Track, x: f64) -> Vec<TagId> {
        if self.width <= 0.0 || !self.width.is_finite() || !x.is_finite() {
            return Vec::new();
        }
        let t = self.time_at_pixel(x);
        let hits = self.visible(track, track.search_point(t));
        if !hits.is_empty() {
            return hits;
        }
        let tol = self.tolerance_secs();
        if tol <= 0.0 {
            return hits;
        }
        self.visible(track, track.search(t - tol, t + tol))
    }

    fn visible(&self, track: &Track, ids: Vec<TagId>) -> Vec<TagId> {
        if self.filter.is_empty() {
            return ids;
        }
        ids.into_iter()
            .filter(|id| track.tag(id).is_some_and(|tag| tag.matches_filter(self.filter)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timebase::{FrameRate, TimeBase};
    use crate::entities::tag::Tag;
    use crate::entities::track::TrackType;

    fn setup() -> (Viewport, Track) {
        let vp = Viewport::new(TimeBase::new(FrameRate::FPS_25, false, 100.0));
        let track = Track::new("t", "T", TrackType::Metadata).with_tags(vec![
            Tag::new("block", 10.0, 20.0),
            Tag::new("marker", 50.0, 50.0),
        ]);
        (vp, track)
    }

    #[test]
    fn test_hit_block() {
        let (vp, track) = setup();
        let hit = HitTester::new(&vp, 1000.0, 0.0);
        assert_eq!(hit.tags_at_pixel(&track, 150.0), vec![TagId::from("block")]);
        assert!(hit.tags_at_pixel(&track, 300.0).is_empty());
        assert_eq!(hit.frame_at_pixel(150.0), 375);
    }

    #[test]
    fn test_marker_needs_tolerance() {
        let (vp, track) = setup();
        assert!(HitTester::new(&vp, 1000.0, 0.0).tags_at_pixel(&track, 502.0).is_empty());
        let hit = HitTester::new(&vp, 1000.0, 4.0);
        assert_eq!(hit.tags_at_pixel(&track, 502.0), vec![TagId::from("marker")]);
        assert!(hit.tags_at_pixel(&track, 510.0).is_empty());
    }

    #[test]
    fn test_zoomed_and_unmeasured() {
        let (mut vp, track) = setup();
        vp.set_scale(10.0, 20.0);
        let hit = HitTester::new(&vp, 1000.0, 0.0);
        assert!((hit.time_at_pixel(500.0) - 15.0).abs() < 1e-9);
        assert_eq!(hit.tags_at_pixel(&track, 500.0), vec![TagId::from("block")]);
        assert!(HitTester::new(&vp, 0.0, 4.0).tags_at_pixel(&track, 500.0).is_empty());
    }

    #[test]
    fn test_filtered_tags_are_not_hit() {
        let vp = Viewport::new(TimeBase::new(FrameRate::FPS_25, false, 100.0));
        let track = Track::new("t", "T", TrackType::Metadata).with_tags(vec![
            Tag::new("dog", 10.0, 20.0).with_text("Dog barks"),
            Tag::new("cat", 15.0, 40.0).with_text("Cat sleeps"),
            Tag::new("pin", 50.0, 50.0).with_text("cat pin"),
        ]);
        let hit = HitTester::new(&vp, 1000.0, 4.0).with_filter("dog");
        assert_eq!(hit.tags_at_pixel(&track, 170.0), vec![TagId::from("dog")]);
        assert!(hit.tags_at_pixel(&track, 350.0).is_empty());
        // Tolerance fallback is filtered too
        assert!(hit.tags_at_pixel(&track, 502.0).is_empty());
        let hit = hit.with_filter("cat");
        assert_eq!(hit.tags_at_pixel(&track, 502.0), vec![TagId::from("pin")]);
    }
}
