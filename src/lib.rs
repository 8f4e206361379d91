//! FRAMELINE - frame-accurate timeline indexing and rendering engine
//!
//! Re-exports all modules for use by the binary and embedding UIs.

// Core engine (time math, index, viewport, timers)
pub mod core;

// Data model
pub mod entities;

// Renderers, coordinator, canvas
pub mod render;

// App modules
pub mod cli;
pub mod config;
pub mod paths;
pub mod shell;

// Re-export commonly used types
pub use config::EngineSettings;
pub use core::{FrameRate, IntervalIndex, Scale, TimeBase, TimecodeField, Viewport};
pub use entities::{Color, Tag, TagId, TimelineProject, Track, TrackId, TrackType};
pub use render::{HitTester, RenderCoordinator, SignalGroup, TimelineCanvas};
