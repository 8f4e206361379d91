//! Per-track renderer state machine.
//!
//! Lifecycle: `Uninitialized -> Ready -> Rendering -> Ready -> ... -> Destroyed`.
//!
//! The renderer owns private copies of everything it draws (tags, scale,
//! selection sets) and its own interval index. It never touches UI-side
//! state; all input arrives as [`RenderMessage`] values. Threading lives in
//! [`super::worker`]; this type is synchronous so it can be tested directly.

use image::RgbaImage;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use super::raster::{self, PixelRect};
use crate::core::interval_index::IntervalIndex;
use crate::core::timebase::TimeBase;
use crate::core::viewport::{Scale, Viewport};
use crate::entities::color::Color;
use crate::entities::tag::{Tag, TagId};
use crate::entities::track::{TrackId, TrackType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Rendering,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Renderer was destroyed; no further messages are accepted
    Destroyed,
    /// Worker thread is gone (panicked or exited)
    Disconnected,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Destroyed => write!(f, "Renderer destroyed"),
            RenderError::Disconnected => write!(f, "Renderer worker disconnected"),
        }
    }
}

impl std::error::Error for RenderError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Colors for the state variants drawn over the base geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: Color,
    pub active: Color,
    pub hover: Color,
    pub selected: Color,
    /// Marker width in pixels for instantaneous metadata tags
    pub marker_width: u32,
    pub outline_width: u32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::rgba(24, 24, 28, 255),
            active: Color::rgba(255, 200, 60, 200),
            hover: Color::rgba(255, 255, 255, 90),
            selected: Color::rgb(255, 255, 255),
            marker_width: 3,
            outline_width: 2,
        }
    }
}

/// Everything a renderer needs to go from Uninitialized to Ready
#[derive(Debug, Clone)]
pub struct InitParams {
    pub track_id: TrackId,
    pub track_type: TrackType,
    pub color: Color,
    pub dimensions: Dimensions,
    pub tags: Vec<Tag>,
    pub scale: Scale,
    pub time_base: TimeBase,
    pub palette: Palette,
    pub filter: String,
    pub selected: HashSet<TagId>,
    pub hover: HashSet<TagId>,
    pub active: HashSet<TagId>,
}

/// Messages accepted by a renderer. All payloads are owned values.
#[derive(Debug, Clone)]
pub enum RenderMessage {
    Initialize(Box<InitParams>),
    SetEntries(Vec<Tag>),
    SetScale { scale: Scale, time_base: TimeBase },
    SetFilter(String),
    SetSelected {
        selected: HashSet<TagId>,
        hover: HashSet<TagId>,
    },
    SetActive(HashSet<TagId>),
    Resize(Dimensions),
    Destroy,
}

impl RenderMessage {
    pub fn name(&self) -> &'static str {
        match self {
            RenderMessage::Initialize(_) => "Initialize",
            RenderMessage::SetEntries(_) => "SetEntries",
            RenderMessage::SetScale { .. } => "SetScale",
            RenderMessage::SetFilter(_) => "SetFilter",
            RenderMessage::SetSelected { .. } => "SetSelected",
            RenderMessage::SetActive(_) => "SetActive",
            RenderMessage::Resize(_) => "Resize",
            RenderMessage::Destroy => "Destroy",
        }
    }
}

/// Deep copy of one render's inputs
#[derive(Debug, Clone)]
pub struct RenderState {
    pub track_id: TrackId,
    pub track_type: TrackType,
    pub color: Color,
    pub palette: Palette,
    pub visible_entries: Vec<Tag>,
    pub selected: HashSet<TagId>,
    pub hover: HashSet<TagId>,
    pub active: HashSet<TagId>,
    pub viewport: Viewport,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub image: RgbaImage,
    /// Tags drawn
    pub visible: usize,
    /// Tags skipped because their geometry failed
    pub skipped: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
enum GeometryError {
    Malformed { start: f64, end: f64 },
    NonFinite,
    Offscreen,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::Malformed { start, end } => {
                write!(f, "malformed range [{}, {}]", start, end)
            }
            GeometryError::NonFinite => write!(f, "non-finite pixel geometry"),
            GeometryError::Offscreen => write!(f, "geometry outside canvas"),
        }
    }
}

/// Drawing variant, in paint order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Base,
    Active,
    Hover,
    Selected,
}

#[derive(Debug)]
pub struct TrackRenderer {
    state: RendererState,
    track_id: TrackId,
    track_type: TrackType,
    color: Color,
    palette: Palette,
    dimensions: Dimensions,
    viewport: Option<Viewport>,
    tags: IndexMap<TagId, Tag>,
    /// Index over tags passing the filter
    index: IntervalIndex<TagId>,
    filter: String,
    selected: HashSet<TagId>,
    hover: HashSet<TagId>,
    active: HashSet<TagId>,
    renders: u64,
}

impl TrackRenderer {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            index: IntervalIndex::named(track_id.as_str()),
            track_id,
            state: RendererState::Uninitialized,
            track_type: TrackType::default(),
            color: Color::default(),
            palette: Palette::default(),
            dimensions: Dimensions::default(),
            viewport: None,
            tags: IndexMap::new(),
            filter: String::new(),
            selected: HashSet::new(),
            hover: HashSet::new(),
            active: HashSet::new(),
            renders: 0,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == RendererState::Destroyed
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn indexed_len(&self) -> usize {
        self.index.len()
    }

    /// Apply one message. Returns `Ok(true)` when a render is needed.
    ///
    /// Messages before `Initialize` update the private state but never
    /// request a render. `Destroy` is accepted any number of times.
    pub fn apply(&mut self, msg: RenderMessage) -> Result<bool, RenderError> {
        if self.is_destroyed() {
            return match msg {
                RenderMessage::Destroy => Ok(false),
                _ => Err(RenderError::Destroyed),
            };
        }
        log::trace!("Renderer '{}': {}", self.track_id, msg.name());

        match msg {
            RenderMessage::Initialize(params) => {
                let p = *params;
                self.track_id = p.track_id;
                self.index = IntervalIndex::named(self.track_id.as_str());
                self.track_type = p.track_type;
                self.color = p.color;
                self.palette = p.palette;
                self.dimensions = p.dimensions;
                self.viewport = Some(scaled_viewport(p.time_base, p.scale));
                self.filter = normalize_filter(&p.filter);
                self.selected = p.selected;
                self.hover = p.hover;
                self.active = p.active;
                self.set_entries(p.tags);
                if self.state == RendererState::Uninitialized {
                    log::debug!("Renderer '{}': Uninitialized -> Ready", self.track_id);
                }
                self.state = RendererState::Ready;
            }
            RenderMessage::SetEntries(tags) => self.set_entries(tags),
            RenderMessage::SetScale { scale, time_base } => {
                self.viewport = Some(scaled_viewport(time_base, scale));
            }
            RenderMessage::SetFilter(filter) => {
                let filter = normalize_filter(&filter);
                if filter != self.filter {
                    self.filter = filter;
                    self.rebuild_index();
                }
            }
            RenderMessage::SetSelected { selected, hover } => {
                self.selected = selected;
                self.hover = hover;
            }
            RenderMessage::SetActive(active) => self.active = active,
            RenderMessage::Resize(dimensions) => self.dimensions = dimensions,
            RenderMessage::Destroy => {
                self.destroy();
                return Ok(false);
            }
        }
        Ok(self.state == RendererState::Ready)
    }

    fn set_entries(&mut self, tags: Vec<Tag>) {
        self.tags = tags.into_iter().map(|t| (t.tag_id.clone(), t)).collect();
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        let filter = &self.filter;
        let rejected = self.index.rebuild(
            self.tags
                .values()
                .filter(|t| t.matches_filter(filter))
                .map(|t| (t.start_time, t.end_time, t.tag_id.clone())),
        );
        if rejected > 0 {
            log::debug!(
                "Renderer '{}': {} malformed tags not indexed",
                self.track_id,
                rejected
            );
        }
    }

    /// Deep copy of the current render inputs. None unless Ready.
    pub fn snapshot(&self) -> Option<RenderState> {
        if self.state != RendererState::Ready {
            return None;
        }
        let viewport = self.viewport?;
        let (start, end) = viewport.visible_time_range();
        let visible_entries = self
            .index
            .search(start, end)
            .iter()
            .filter_map(|id| self.tags.get(id).cloned())
            .collect();
        Some(RenderState {
            track_id: self.track_id.clone(),
            track_type: self.track_type,
            color: self.color,
            palette: self.palette,
            visible_entries,
            selected: self.selected.clone(),
            hover: self.hover.clone(),
            active: self.active.clone(),
            viewport,
            dimensions: self.dimensions,
        })
    }

    /// Ready -> Rendering -> Ready, producing one image.
    pub fn render(&mut self) -> Option<RenderOutput> {
        let snapshot = self.snapshot()?;
        self.state = RendererState::Rendering;
        let started = Instant::now();
        let (image, visible, skipped) = rasterize(&snapshot);
        self.state = RendererState::Ready;
        self.renders += 1;
        let elapsed = started.elapsed();
        log::trace!(
            "Renderer '{}': render #{} ({} tags, {} skipped) in {:.2}ms",
            self.track_id,
            self.renders,
            visible,
            skipped,
            elapsed.as_secs_f64() * 1000.0
        );
        Some(RenderOutput {
            image,
            visible,
            skipped,
            elapsed,
        })
    }

    /// Release buffers. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        log::debug!("Renderer '{}': {:?} -> Destroyed", self.track_id, self.state);
        self.state = RendererState::Destroyed;
        self.tags = IndexMap::new();
        self.index.clear();
        self.selected.clear();
        self.hover.clear();
        self.active.clear();
        self.viewport = None;
    }
}

fn scaled_viewport(time_base: TimeBase, scale: Scale) -> Viewport {
    let mut viewport = Viewport::new(time_base);
    viewport.apply_scale(scale);
    viewport
}

fn normalize_filter(filter: &str) -> String {
    filter.trim().to_lowercase()
}

/// Rasterize a snapshot. Returns (image, drawn, skipped).
pub fn rasterize(state: &RenderState) -> (RgbaImage, usize, usize) {
    let Dimensions { width, height } = state.dimensions;
    let mut img = raster::new_canvas(width, height, state.palette.background);
    if width == 0 || height == 0 {
        return (img, 0, 0);
    }

    let mut skipped: HashSet<&TagId> = HashSet::new();
    let passes = [Pass::Base, Pass::Active, Pass::Hover, Pass::Selected];
    for pass in passes {
        for tag in &state.visible_entries {
            let in_pass = match pass {
                Pass::Base => true,
                Pass::Active => state.active.contains(&tag.tag_id),
                Pass::Hover => state.hover.contains(&tag.tag_id),
                Pass::Selected => state.selected.contains(&tag.tag_id),
            };
            if !in_pass || skipped.contains(&tag.tag_id) {
                continue;
            }
            let drawn = catch_unwind(AssertUnwindSafe(|| draw_tag(&mut img, state, tag, pass)));
            match drawn {
                Ok(Ok(())) => {}
                Ok(Err(GeometryError::Offscreen)) => {}
                Ok(Err(e)) => {
                    log::warn!(
                        "Track '{}': skipping tag '{}': {}",
                        state.track_id,
                        tag.tag_id,
                        e
                    );
                    skipped.insert(&tag.tag_id);
                }
                Err(_) => {
                    log::warn!(
                        "Track '{}': skipping tag '{}': panic while drawing",
                        state.track_id,
                        tag.tag_id
                    );
                    skipped.insert(&tag.tag_id);
                }
            }
        }
    }

    let visible = state.visible_entries.len() - skipped.len();
    (img, visible, skipped.len())
}

/// Horizontal extent of a tag in (unclamped) pixels
fn tag_span_px(viewport: &Viewport, tag: &Tag, width: f64) -> Result<(f64, f64), GeometryError> {
    let duration = viewport.time_base().duration();
    let (start, end) = tag
        .clamped_range(duration)
        .ok_or(GeometryError::Malformed {
            start: tag.start_time,
            end: tag.end_time,
        })?;
    let x0 = viewport.position_to_pixels_unclamped(viewport.time_to_percent(start), width);
    let x1 = viewport.position_to_pixels_unclamped(viewport.time_to_percent(end), width);
    if !x0.is_finite() || !x1.is_finite() {
        return Err(GeometryError::NonFinite);
    }
    Ok((x0, x1))
}

fn draw_tag(img: &mut RgbaImage, state: &RenderState, tag: &Tag, pass: Pass) -> Result<(), GeometryError> {
    let (w, h) = img.dimensions();
    let (width, height) = (w as f64, h as f64);
    let (x0, x1) = tag_span_px(&state.viewport, tag, width)?;
    let palette = &state.palette;

    let blocks = state.track_type.draws_blocks();
    // Metadata markers sit in the middle band, blocks fill the row
    let (y, bar_h) = if blocks {
        (1.0, (height - 2.0).max(1.0))
    } else {
        (height * 0.2, (height * 0.6).max(1.0))
    };

    let marker = !blocks && (x1 - x0) < palette.marker_width as f64;
    let rect = if marker {
        let mw = palette.marker_width.max(1) as f64;
        PixelRect::snap(x0 - mw / 2.0, 0.0, mw, height, w, h)
    } else {
        PixelRect::snap(x0, y, x1 - x0, bar_h, w, h)
    }
    .ok_or(GeometryError::Offscreen)?;

    match pass {
        Pass::Base => {
            let base = tag.color.unwrap_or(state.color);
            // Low-confidence tags fade but stay visible
            let alpha = (base.a() as f32 * (0.35 + 0.65 * tag.confidence())).round() as u8;
            raster::fill_rect(img, rect, base.with_alpha(alpha));
            if blocks && rect.width() > 2 {
                // Separator so adjacent clips read as distinct blocks
                let edge = PixelRect { x1: rect.x0 + 1, ..rect };
                raster::fill_rect(img, edge, palette.background.with_alpha(160));
            }
        }
        Pass::Active => raster::fill_rect(img, rect, palette.active),
        Pass::Hover => raster::fill_rect(img, rect, palette.hover),
        Pass::Selected => raster::stroke_rect(img, rect, palette.selected, palette.outline_width),
    }
    Ok(())
}
