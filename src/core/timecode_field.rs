//! Timecode text entry with last-known-good fallback.
//!
//! Transport and form inputs parse SMPTE text on every keystroke. Half-typed
//! or dropped-frame labels are expected, so a failed parse keeps the previous
//! frame instead of surfacing an error.

use super::timebase::TimeBase;

#[derive(Debug, Clone)]
pub struct TimecodeField {
    time_base: TimeBase,
    last_good: u64,
}

impl TimecodeField {
    pub fn new(time_base: TimeBase, frame: i64) -> Self {
        Self {
            last_good: time_base.clamp_frame(frame),
            time_base,
        }
    }

    /// Current frame
    pub fn frame(&self) -> u64 {
        self.last_good
    }

    /// Set from a seek (clamped)
    pub fn set_frame(&mut self, frame: i64) {
        self.last_good = self.time_base.clamp_frame(frame);
    }

    /// Text to display for the current frame
    pub fn text(&self) -> String {
        self.time_base.frame_to_smpte(self.last_good as i64)
    }

    /// Feed user text. Returns the parsed frame, or the last good frame if the
    /// text does not name a valid frame.
    pub fn input(&mut self, text: &str) -> u64 {
        match self.time_base.smpte_to_frame(text) {
            Ok(frame) => {
                self.last_good = frame;
            }
            Err(e) => {
                log::debug!("Timecode input rejected ({}), keeping frame {}", e, self.last_good);
            }
        }
        self.last_good
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timebase::FrameRate;

    #[test]
    fn test_fallback_on_invalid_input() {
        let tb = TimeBase::new(FrameRate::NTSC_29_97, true, 600.0);
        let mut field = TimecodeField::new(tb, 0);

        assert_eq!(field.input("00:00:10:00"), 300);
        // Partially typed
        assert_eq!(field.input("00:00:1"), 300);
        // Dropped label
        assert_eq!(field.input("00:01:00:00"), 300);
        assert_eq!(field.input("00:01:00:02"), 1800);
        assert_eq!(field.text(), "00:01:00:02");
    }

    #[test]
    fn test_overflowing_hours_keep_last_good() {
        let tb = TimeBase::new(FrameRate::NTSC_29_97, true, 600.0);
        let mut field = TimecodeField::new(tb, 300);
        assert_eq!(field.input("1000000000000000:00:00:00"), 300);
        assert_eq!(field.input("18446744073709551615:00:00:00"), 300);
        assert_eq!(field.text(), "00:00:10:00");
    }

    #[test]
    fn test_set_frame_clamps() {
        let tb = TimeBase::new(FrameRate::FPS_24, false, 10.0);
        let mut field = TimecodeField::new(tb, -5);
        assert_eq!(field.frame(), 0);
        field.set_frame(1_000);
        assert_eq!(field.frame(), 239);
        assert_eq!(field.text(), "00:00:09:23");
    }
}
