//! On-screen canvas: one bitmap layer per track.
//!
//! Results are applied asynchronously as they arrive. A layer only accepts
//! results from the renderer currently attached to it, and only with a
//! sequence number newer than the last one applied.

use crossbeam_channel::Receiver;
use image::RgbaImage;
use image::imageops;
use indexmap::IndexMap;
use uuid::Uuid;

use super::raster;
use super::worker::RenderResult;
use crate::entities::color::Color;
use crate::entities::track::TrackId;

#[derive(Debug, Clone)]
pub struct Layer {
    renderer_id: Uuid,
    last_seq: u64,
    image: Option<RgbaImage>,
    visible: usize,
}

impl Layer {
    pub fn renderer_id(&self) -> Uuid {
        self.renderer_id
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Tags drawn in the applied image
    pub fn visible(&self) -> usize {
        self.visible
    }
}

#[derive(Debug, Clone)]
pub struct TimelineCanvas {
    layers: IndexMap<TrackId, Layer>,
    background: Color,
    applied: u64,
    discarded: u64,
}

impl TimelineCanvas {
    pub fn new(background: Color) -> Self {
        Self {
            layers: IndexMap::new(),
            background,
            applied: 0,
            discarded: 0,
        }
    }

    /// Bind a track's layer to a renderer. Rebinding drops the old image.
    pub fn attach(&mut self, track_id: TrackId, renderer_id: Uuid) {
        self.layers.insert(
            track_id,
            Layer {
                renderer_id,
                last_seq: 0,
                image: None,
                visible: 0,
            },
        );
    }

    pub fn detach(&mut self, track_id: &TrackId) -> bool {
        self.layers.shift_remove(track_id).is_some()
    }

    pub fn layer(&self, track_id: &TrackId) -> Option<&Layer> {
        self.layers.get(track_id)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&TrackId, &Layer)> {
        self.layers.iter()
    }

    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded
    }

    /// Apply one result. Returns false if it was stale and discarded.
    pub fn apply(&mut self, result: RenderResult) -> bool {
        let Some(layer) = self.layers.get_mut(&result.track_id) else {
            log::debug!(
                "Canvas: discarding result for detached track '{}'",
                result.track_id
            );
            self.discarded += 1;
            return false;
        };
        if layer.renderer_id != result.renderer_id {
            log::debug!(
                "Canvas: discarding result from replaced renderer {} on '{}'",
                result.renderer_id,
                result.track_id
            );
            self.discarded += 1;
            return false;
        }
        if result.seq <= layer.last_seq {
            log::debug!(
                "Canvas: discarding stale result seq {} <= {} on '{}'",
                result.seq,
                layer.last_seq,
                result.track_id
            );
            self.discarded += 1;
            return false;
        }
        layer.last_seq = result.seq;
        layer.visible = result.visible;
        layer.image = Some(result.image);
        self.applied += 1;
        true
    }

    /// Apply every result already waiting on `rx`. Never blocks.
    pub fn drain(&mut self, rx: &Receiver<RenderResult>) -> usize {
        let mut applied = 0;
        for result in rx.try_iter() {
            if self.apply(result) {
                applied += 1;
            }
        }
        applied
    }

    /// Stack layers top to bottom in track order. Layers without an image
    /// yet leave a background-colored gap of `row_height`.
    pub fn composite(&self, row_height: u32) -> RgbaImage {
        let width = self
            .layers
            .values()
            .filter_map(|l| l.image.as_ref().map(|img| img.width()))
            .max()
            .unwrap_or(0);
        let heights: Vec<u32> = self
            .layers
            .values()
            .map(|l| l.image.as_ref().map_or(row_height, |img| img.height()))
            .collect();
        let total: u32 = heights.iter().sum();

        let mut out = raster::new_canvas(width, total, self.background);
        let mut y = 0i64;
        for (layer, h) in self.layers.values().zip(heights) {
            if let Some(img) = &layer.image {
                imageops::overlay(&mut out, img, 0, y);
            }
            y += h as i64;
        }
        out
    }
}
