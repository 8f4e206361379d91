//! Rendering - per-track renderer threads, coordination and compositing
//!
//! Data flow:
//! ```text
//! state change -> RenderCoordinator (debounced diff)
//!              -> RendererHandle mailbox -> TrackRenderer (own thread)
//!              -> RenderResult (seq-tagged) -> TimelineCanvas
//! ```
//! Hit-testing runs the inverse path synchronously on the caller's thread.

pub mod canvas;
pub mod coordinator;
pub mod hit_test;
pub mod raster;
pub mod track_renderer;
pub mod worker;

pub use canvas::TimelineCanvas;
pub use coordinator::{CoordinatorStats, RenderCoordinator, SignalGroup};
pub use hit_test::HitTester;
pub use track_renderer::{
    Dimensions, InitParams, Palette, RenderError, RenderMessage, RenderState, RendererState,
    TrackRenderer,
};
pub use worker::{RenderResult, RendererHandle};
