//! Entities module - the timeline data model
//!
//! Tags belong to tracks, tracks belong to a project that carries the
//! TimeBase context. Nothing here knows about rendering.

pub mod color;
pub mod project;
pub mod tag;
pub mod track;

pub use color::Color;
pub use project::{ProjectFile, TimelineProject, TrackFile};
pub use tag::{Tag, TagId};
pub use track::{Track, TrackId, TrackType};
