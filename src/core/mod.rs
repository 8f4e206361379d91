//! Core timeline engine - time math, interval indexing, viewport, timers
//!
//! Pure data and algorithms, independent of rendering and threads.

pub mod debounce;
pub mod interval_index;
pub mod timebase;
pub mod timecode_field;
pub mod viewport;

// Re-exports for convenience
pub use debounce::{Debouncer, density_scaled};
pub use interval_index::IntervalIndex;
pub use timebase::{FrameRate, FrameRateError, TimeBase, TimecodeError};
pub use timecode_field::TimecodeField;
pub use viewport::{RulerTick, Scale, Viewport};
