//! Frame-accurate time conversions: seconds <-> frame index <-> SMPTE timecode.
//!
//! Everything here is derived from a [`TimeBase`] value (frame rate, drop-frame
//! flag, duration). There is no global frame rate state.
//!
//! # Numeric model
//!
//! Frame rates are exact rationals (`30000/1001`, not `29.97`). Frame <-> label
//! conversions run on integers only, so multi-hour content never drifts.
//!
//! # Timecode labels
//!
//! - Integral rates: the label is the frame count (`frame 25 @ 25fps = 00:00:01:00`).
//! - Drop-frame NTSC (29.97, 59.94): the broadcast drop-frame count. Frame
//!   fields `00..drop` are skipped at the start of every minute except minutes
//!   divisible by 10 (2 per minute at 29.97, 4 at 59.94).
//! - Other non-integral rates (23.976 non-drop, 29.97 non-drop...): wall-clock
//!   labels. Each frame is labelled with the first tick of the nominal-rate
//!   grid that falls inside its display interval, so `01:00:00:00` names the
//!   frame on screen one hour into the asset.
//!
//! All three schemes are bijective on valid frames:
//! `smpte_to_frame(frame_to_smpte(f)) == f`.
//!
//! Out-of-range frames and times are clamped into `[0, total_frames)`; the
//! callers are seek bars and sliders that overshoot while dragging.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rates within this distance of an NTSC rational are snapped to it.
const NTSC_SNAP_EPSILON: f64 = 0.005;

/// Nominal rates that have a standard `N*1000/1001` NTSC variant.
const NTSC_NOMINALS: &[u32] = &[24, 30, 48, 60, 120];

/// Tolerance used when deciding whether `duration * fps` is already integral.
const WHOLE_FRAME_EPSILON: f64 = 1e-6;

static SMPTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{1,2}):(\d{1,2})[:;.,](\d{1,3})\s*$")
        .expect("SMPTE pattern is a valid regex")
});

// ============================================================================
// Errors
// ============================================================================

/// Frame rate parsing errors
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRateError {
    Malformed(String),
    NonPositive,
}

impl fmt::Display for FrameRateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameRateError::Malformed(s) => write!(f, "Malformed frame rate: '{}'", s),
            FrameRateError::NonPositive => write!(f, "Frame rate must be positive"),
        }
    }
}

impl std::error::Error for FrameRateError {}

/// SMPTE timecode parsing errors
#[derive(Debug, Clone, PartialEq)]
pub enum TimecodeError {
    /// Not shaped like `HH:MM:SS:FF`
    Malformed(String),
    /// A field exceeds its range (e.g. `SS = 75`, `FF = 31` at 30fps)
    FieldRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
    /// Names a frame label that drop-frame counting skips
    DroppedFrame(String),
}

impl fmt::Display for TimecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimecodeError::Malformed(s) => write!(f, "Malformed timecode: '{}'", s),
            TimecodeError::FieldRange { field, value, max } => {
                write!(f, "Timecode {} field {} out of range (max {})", field, value, max)
            }
            TimecodeError::DroppedFrame(s) => {
                write!(f, "Timecode '{}' names a dropped frame", s)
            }
        }
    }
}

impl std::error::Error for TimecodeError {}

// ============================================================================
// FrameRate
// ============================================================================

/// Exact rational frame rate (`num / den` frames per second).
///
/// Serialized as `"num/den"`; deserializes from that form, from decimal
/// strings (`"29.97"`) or from plain numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFrameRate", into = "String")]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    pub const FPS_24: FrameRate = FrameRate { num: 24, den: 1 };
    pub const FPS_25: FrameRate = FrameRate { num: 25, den: 1 };
    pub const FPS_30: FrameRate = FrameRate { num: 30, den: 1 };
    pub const NTSC_23_976: FrameRate = FrameRate { num: 24000, den: 1001 };
    pub const NTSC_29_97: FrameRate = FrameRate { num: 30000, den: 1001 };
    pub const NTSC_59_94: FrameRate = FrameRate { num: 60000, den: 1001 };

    /// Create a reduced rational rate.
    pub fn new(num: u32, den: u32) -> Result<Self, FrameRateError> {
        if num == 0 || den == 0 {
            return Err(FrameRateError::NonPositive);
        }
        let g = gcd(num as u64, den as u64) as u32;
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// NTSC variant of an integral rate: `nominal * 1000 / 1001`.
    pub fn ntsc(nominal: u32) -> Self {
        Self {
            num: nominal * 1000,
            den: 1001,
        }
    }

    /// Convert a decimal rate. Values near an NTSC rational snap to it,
    /// anything else is kept to millesimal precision.
    pub fn from_f64(value: f64) -> Result<Self, FrameRateError> {
        if !value.is_finite() {
            return Err(FrameRateError::Malformed(value.to_string()));
        }
        if value <= 0.0 {
            return Err(FrameRateError::NonPositive);
        }
        for &nominal in NTSC_NOMINALS {
            let ntsc = Self::ntsc(nominal);
            if (ntsc.as_f64() - value).abs() < NTSC_SNAP_EPSILON {
                return Ok(ntsc);
            }
        }
        if value.fract() == 0.0 && value <= u32::MAX as f64 {
            return Self::new(value as u32, 1);
        }
        let scaled = (value * 1000.0).round();
        if scaled < 1.0 || scaled > u32::MAX as f64 {
            return Err(FrameRateError::Malformed(value.to_string()));
        }
        Self::new(scaled as u32, 1000)
    }

    /// Parse `"30000/1001"`, `"29.97"` or `"25"`.
    pub fn parse(s: &str) -> Result<Self, FrameRateError> {
        let s = s.trim();
        if let Some((num, den)) = s.split_once('/') {
            let num: u32 = num
                .trim()
                .parse()
                .map_err(|_| FrameRateError::Malformed(s.to_string()))?;
            let den: u32 = den
                .trim()
                .parse()
                .map_err(|_| FrameRateError::Malformed(s.to_string()))?;
            return Self::new(num, den);
        }
        let value: f64 = s
            .parse()
            .map_err(|_| FrameRateError::Malformed(s.to_string()))?;
        Self::from_f64(value)
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    /// Approximate rate, for display and float geometry only
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Frames per timecode second: the rate rounded up (24 for 23.976, 30 for 29.97).
    pub fn nominal_fps(&self) -> u32 {
        self.num.div_ceil(self.den)
    }

    pub fn is_integral(&self) -> bool {
        self.den == 1
    }

    /// True for `N*1000/1001` rates
    pub fn is_ntsc(&self) -> bool {
        self.den == 1001 && self.num % 1000 == 0
    }

    /// Drop-frame counting exists only for NTSC rates whose nominal rate is a
    /// multiple of 30.
    pub fn supports_drop_frame(&self) -> bool {
        self.is_ntsc() && (self.num / 1000) % 30 == 0
    }

    /// Frame labels skipped per (non-tenth) minute: 2 at 29.97, 4 at 59.94.
    pub fn drop_frames_per_minute(&self) -> u32 {
        if self.supports_drop_frame() {
            (self.num / 1000) / 15
        } else {
            0
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl From<FrameRate> for String {
    fn from(rate: FrameRate) -> Self {
        format!("{}/{}", rate.num, rate.den)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrameRate {
    Number(f64),
    Text(String),
}

impl TryFrom<RawFrameRate> for FrameRate {
    type Error = FrameRateError;

    fn try_from(raw: RawFrameRate) -> Result<Self, Self::Error> {
        match raw {
            RawFrameRate::Number(v) => FrameRate::from_f64(v),
            RawFrameRate::Text(s) => FrameRate::parse(&s),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

// ============================================================================
// TimeBase
// ============================================================================

/// Immutable timing context of one loaded video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBase {
    rate: FrameRate,
    drop_frame: bool,
    duration: f64,
}

impl TimeBase {
    /// Create a timing context. A drop-frame request on a rate without a
    /// drop-frame convention is ignored; invalid durations become zero.
    pub fn new(rate: FrameRate, drop_frame: bool, duration: f64) -> Self {
        let drop_frame = if drop_frame && !rate.supports_drop_frame() {
            log::warn!("Drop-frame timecode not defined for {} fps, using non-drop", rate);
            false
        } else {
            drop_frame
        };
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
        Self {
            rate,
            drop_frame,
            duration,
        }
    }

    pub fn rate(&self) -> FrameRate {
        self.rate
    }

    pub fn drop_frame(&self) -> bool {
        self.drop_frame
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Seconds per frame (float, display only)
    pub fn frame_duration(&self) -> f64 {
        self.rate.den as f64 / self.rate.num as f64
    }

    /// Number of addressable frames: every frame whose display interval
    /// starts before `duration`.
    pub fn total_frames(&self) -> u64 {
        let exact = self.duration * self.rate.num as f64 / self.rate.den as f64;
        let nearest = exact.round();
        if (exact - nearest).abs() < WHOLE_FRAME_EPSILON {
            nearest as u64
        } else {
            exact.ceil() as u64
        }
    }

    /// Index of the last frame (0 for empty media)
    pub fn last_frame(&self) -> u64 {
        self.total_frames().saturating_sub(1)
    }

    /// Clamp any frame value into `[0, total_frames)`
    pub fn clamp_frame(&self, frame: i64) -> u64 {
        (frame.max(0) as u64).min(self.last_frame())
    }

    /// Start time of a frame in seconds
    pub fn frame_to_time(&self, frame: i64) -> f64 {
        let frame = self.clamp_frame(frame);
        (frame as f64 * self.rate.den as f64) / self.rate.num as f64
    }

    /// Nearest frame to a time; NaN maps to frame 0.
    pub fn time_to_frame(&self, seconds: f64) -> u64 {
        if !seconds.is_finite() {
            return if seconds == f64::INFINITY { self.last_frame() } else { 0 };
        }
        let frames = ((seconds * self.rate.num as f64) / self.rate.den as f64).round();
        if frames <= 0.0 {
            0
        } else {
            (frames as u64).min(self.last_frame())
        }
    }

    /// `HH:MM:SS:FF` for a frame (clamped)
    pub fn frame_to_smpte(&self, frame: i64) -> String {
        let frame = self.clamp_frame(frame);
        let label = self.frame_to_label(frame);
        format_label(label, self.rate.nominal_fps() as u64)
    }

    /// Parse `HH:MM:SS:FF` (`;` or `.` also accepted before the frame field).
    ///
    /// Labels past the end of the media are clamped to the last frame.
    pub fn smpte_to_frame(&self, timecode: &str) -> Result<u64, TimecodeError> {
        let caps = SMPTE_RE
            .captures(timecode)
            .ok_or_else(|| TimecodeError::Malformed(timecode.to_string()))?;
        let field = |i: usize| -> Result<u64, TimecodeError> {
            caps[i]
                .parse::<u64>()
                .map_err(|_| TimecodeError::Malformed(timecode.to_string()))
        };
        let (hh, mm, ss, ff) = (field(1)?, field(2)?, field(3)?, field(4)?);

        let fps = self.rate.nominal_fps() as u64;
        if mm > 59 {
            return Err(TimecodeError::FieldRange { field: "minutes", value: mm, max: 59 });
        }
        if ss > 59 {
            return Err(TimecodeError::FieldRange { field: "seconds", value: ss, max: 59 });
        }
        if ff >= fps {
            return Err(TimecodeError::FieldRange { field: "frames", value: ff, max: fps - 1 });
        }

        let drop = if self.drop_frame {
            self.rate.drop_frames_per_minute() as u64
        } else {
            0
        };
        if drop > 0 && ss == 0 && mm % 10 != 0 && ff < drop {
            return Err(TimecodeError::DroppedFrame(timecode.trim().to_string()));
        }

        let total_minutes = hh.checked_mul(60).and_then(|m| m.checked_add(mm));
        let label = total_minutes
            .and_then(|m| m.checked_mul(60))
            .and_then(|s| s.checked_add(ss))
            .and_then(|s| s.checked_mul(fps))
            .and_then(|l| l.checked_add(ff));
        let (Some(total_minutes), Some(label)) = (total_minutes, label) else {
            return Err(TimecodeError::FieldRange {
                field: "hours",
                value: hh,
                max: u64::MAX / (3600 * fps),
            });
        };
        let frame = self.label_to_frame(label, total_minutes);
        Ok(frame.min(self.last_frame()))
    }

    /// SMPTE label of the frame shown at `seconds`
    pub fn time_to_smpte(&self, seconds: f64) -> String {
        self.frame_to_smpte(self.time_to_frame(seconds) as i64)
    }

    /// Start time of the frame named by a timecode
    pub fn smpte_to_time(&self, timecode: &str) -> Result<f64, TimecodeError> {
        let frame = self.smpte_to_frame(timecode)?;
        Ok(self.frame_to_time(frame as i64))
    }

    /// Frame index -> label (count of nominal-rate ticks since zero).
    fn frame_to_label(&self, frame: u64) -> u64 {
        let fps = self.rate.nominal_fps() as u64;
        let drop = self.rate.drop_frames_per_minute() as u64;

        if self.drop_frame && drop > 0 {
            let per_minute = fps * 60 - drop;
            let per_ten = fps * 600 - 9 * drop;
            let tens = frame / per_ten;
            let rem = frame % per_ten;
            let skipped_minutes = if rem > drop { (rem - drop) / per_minute } else { 0 };
            return frame + 9 * drop * tens + drop * skipped_minutes;
        }

        if self.rate.is_integral() {
            return frame;
        }

        // First nominal tick inside [frame, frame + 1) in display time
        let num = self.rate.num as u128;
        let scaled = frame as u128 * self.rate.den as u128 * fps as u128;
        scaled.div_ceil(num) as u64
    }

    /// Label -> frame index. `total_minutes` is only used for drop-frame.
    fn label_to_frame(&self, label: u64, total_minutes: u64) -> u64 {
        let fps = self.rate.nominal_fps() as u64;
        let drop = self.rate.drop_frames_per_minute() as u64;

        if self.drop_frame && drop > 0 {
            return label - drop * (total_minutes - total_minutes / 10);
        }

        if self.rate.is_integral() {
            return label;
        }

        let scaled = label as u128 * self.rate.num as u128;
        let divisor = self.rate.den as u128 * fps as u128;
        (scaled / divisor) as u64
    }
}

fn format_label(label: u64, fps: u64) -> String {
    let fps = fps.max(1);
    let ff = label % fps;
    let total_seconds = label / fps;
    let ss = total_seconds % 60;
    let mm = (total_seconds / 60) % 60;
    let hh = total_seconds / 3600;
    format!("{:02}:{:02}:{:02}:{:02}", hh, mm, ss, ff)
}

/// Human-readable duration, floored to whole seconds.
///
/// `compact`: `"1h 2m 3s"` with zero units omitted; otherwise `"01:02:03"`.
pub fn time_to_string(seconds: f64, compact: bool) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if !compact {
        return format!("{:02}:{:02}:{:02}", hours, minutes, secs);
    }

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn df_2997(duration: f64) -> TimeBase {
        TimeBase::new(FrameRate::NTSC_29_97, true, duration)
    }

    #[test]
    fn test_frame_rate_parsing() {
        assert_eq!(FrameRate::parse("30000/1001").unwrap(), FrameRate::NTSC_29_97);
        assert_eq!(FrameRate::parse("29.97").unwrap(), FrameRate::NTSC_29_97);
        assert_eq!(FrameRate::parse("23.976").unwrap(), FrameRate::NTSC_23_976);
        assert_eq!(FrameRate::parse(" 25 ").unwrap(), FrameRate::FPS_25);
        assert_eq!(FrameRate::parse("50/2").unwrap(), FrameRate::FPS_25);
        assert_eq!(FrameRate::parse("12.5").unwrap(), FrameRate::new(25, 2).unwrap());
        assert!(FrameRate::parse("abc").is_err());
        assert_eq!(FrameRate::parse("0/1"), Err(FrameRateError::NonPositive));
    }

    #[test]
    fn test_frame_rate_serde() {
        let rate: FrameRate = serde_json::from_str("29.97").unwrap();
        assert_eq!(rate, FrameRate::NTSC_29_97);
        let rate: FrameRate = serde_json::from_str("\"60000/1001\"").unwrap();
        assert_eq!(rate, FrameRate::NTSC_59_94);
        assert_eq!(serde_json::to_string(&rate).unwrap(), "\"60000/1001\"");
    }

    #[test]
    fn test_drop_frame_support() {
        assert_eq!(FrameRate::NTSC_29_97.drop_frames_per_minute(), 2);
        assert_eq!(FrameRate::NTSC_59_94.drop_frames_per_minute(), 4);
        assert_eq!(FrameRate::NTSC_23_976.drop_frames_per_minute(), 0);
        // Drop-frame request ignored for 23.976
        let tb = TimeBase::new(FrameRate::NTSC_23_976, true, 10.0);
        assert!(!tb.drop_frame());
    }

    #[test]
    fn test_total_frames() {
        assert_eq!(TimeBase::new(FrameRate::FPS_24, false, 10.0).total_frames(), 240);
        assert_eq!(TimeBase::new(FrameRate::NTSC_23_976, false, 3600.0).total_frames(), 86314);
        assert_eq!(TimeBase::new(FrameRate::FPS_24, false, 0.0).total_frames(), 0);
        assert_eq!(TimeBase::new(FrameRate::FPS_24, false, f64::NAN).total_frames(), 0);
    }

    #[test]
    fn test_time_frame_round_trip() {
        for rate in [FrameRate::FPS_24, FrameRate::NTSC_23_976, FrameRate::NTSC_29_97, FrameRate::NTSC_59_94] {
            let tb = TimeBase::new(rate, false, 4.0 * 3600.0);
            let total = tb.total_frames();
            let mut f = 0;
            while f < total {
                assert_eq!(tb.time_to_frame(tb.frame_to_time(f as i64)), f, "rate {} frame {}", rate, f);
                f += 997;
            }
            assert_eq!(tb.time_to_frame(tb.frame_to_time(total as i64 - 1)), total - 1);
        }
    }

    #[test]
    fn test_out_of_range_clamps() {
        let tb = TimeBase::new(FrameRate::FPS_25, false, 10.0);
        assert_eq!(tb.clamp_frame(-7), 0);
        assert_eq!(tb.clamp_frame(10_000), 249);
        assert_eq!(tb.time_to_frame(-3.0), 0);
        assert_eq!(tb.time_to_frame(99.0), 249);
        assert_eq!(tb.time_to_frame(f64::NAN), 0);
        assert_eq!(tb.frame_to_smpte(-1), "00:00:00:00");
        assert_eq!(tb.frame_to_smpte(9999), "00:00:09:24");
    }

    #[test]
    fn test_integral_smpte() {
        let tb = TimeBase::new(FrameRate::FPS_25, false, 7200.0);
        assert_eq!(tb.frame_to_smpte(0), "00:00:00:00");
        assert_eq!(tb.frame_to_smpte(25), "00:00:01:00");
        assert_eq!(tb.frame_to_smpte(25 * 3600 + 26), "01:00:01:01");
        assert_eq!(tb.smpte_to_frame("01:00:01:01").unwrap(), 25 * 3600 + 26);
    }

    #[test]
    fn test_drop_frame_minute_boundary() {
        let tb = df_2997(3600.0);
        assert_eq!(tb.frame_to_smpte(1799), "00:00:59:29");
        assert_eq!(tb.frame_to_smpte(1800), "00:01:00:02");
        // Tenth minute keeps :00 and :01
        assert_eq!(tb.frame_to_smpte(17981), "00:09:59:29");
        assert_eq!(tb.frame_to_smpte(17982), "00:10:00:00");
        assert_eq!(tb.frame_to_smpte(17983), "00:10:00:01");
        assert_eq!(tb.smpte_to_frame("00:01:00:02").unwrap(), 1800);
        assert_eq!(tb.smpte_to_frame("00:10:00:00").unwrap(), 17982);
    }

    #[test]
    fn test_drop_frame_hour() {
        // One hour of 29.97 DF is 107892 frames
        let tb = df_2997(7200.0);
        assert_eq!(tb.frame_to_smpte(107892), "01:00:00:00");
        assert_eq!(tb.smpte_to_frame("01:00:00:00").unwrap(), 107892);
    }

    #[test]
    fn test_drop_frame_never_emits_dropped_labels() {
        let tb = df_2997(1200.0);
        for f in 0..tb.total_frames() {
            let tc = tb.frame_to_smpte(f as i64);
            let parts: Vec<u64> = tc.split(':').map(|p| p.parse().unwrap()).collect();
            let (mm, ss, ff) = (parts[1], parts[2], parts[3]);
            assert!(!(ss == 0 && mm % 10 != 0 && ff < 2), "dropped label {} at frame {}", tc, f);
            assert_eq!(tb.smpte_to_frame(&tc).unwrap(), f);
        }
    }

    #[test]
    fn test_drop_frame_5994() {
        let tb = TimeBase::new(FrameRate::NTSC_59_94, true, 1200.0);
        assert_eq!(tb.frame_to_smpte(3599), "00:00:59:59");
        assert_eq!(tb.frame_to_smpte(3600), "00:01:00:04");
        for f in (0..tb.total_frames()).step_by(7) {
            assert_eq!(tb.smpte_to_frame(&tb.frame_to_smpte(f as i64)).unwrap(), f);
        }
    }

    #[test]
    fn test_dropped_label_rejected() {
        let tb = df_2997(600.0);
        assert_eq!(
            tb.smpte_to_frame("00:01:00:00"),
            Err(TimecodeError::DroppedFrame("00:01:00:00".to_string()))
        );
        assert!(tb.smpte_to_frame("00:01:00;01").is_err());
        assert!(tb.smpte_to_frame("00:00:00:00").is_ok());
    }

    #[test]
    fn test_invalid_smpte() {
        let tb = TimeBase::new(FrameRate::FPS_24, false, 600.0);
        assert!(matches!(tb.smpte_to_frame("12:34"), Err(TimecodeError::Malformed(_))));
        assert!(matches!(tb.smpte_to_frame("00:00:00:24"), Err(TimecodeError::FieldRange { .. })));
        assert!(matches!(tb.smpte_to_frame("00:61:00:00"), Err(TimecodeError::FieldRange { .. })));
        // Past the end clamps
        assert_eq!(tb.smpte_to_frame("05:00:00:00").unwrap(), tb.last_frame());
    }

    #[test]
    fn test_huge_hours_rejected() {
        let tb = df_2997(600.0);
        assert!(matches!(
            tb.smpte_to_frame("1000000000000000:00:00:00"),
            Err(TimecodeError::FieldRange { field: "hours", .. })
        ));
        // Too long for u64 at all
        assert!(matches!(
            tb.smpte_to_frame("99999999999999999999999:00:00:00"),
            Err(TimecodeError::Malformed(_))
        ));
        // Large but representable hours clamp to the end
        assert_eq!(tb.smpte_to_frame("100000:00:00:00").unwrap(), tb.last_frame());
    }

    #[test]
    fn test_frame_duration_and_smpte_to_time() {
        let tb = TimeBase::new(FrameRate::FPS_25, false, 60.0);
        assert!((tb.frame_duration() - 0.04).abs() < 1e-12);
        assert!((tb.smpte_to_time("00:00:02:05").unwrap() - 2.2).abs() < 1e-9);

        let df = df_2997(600.0);
        assert!((df.frame_duration() - 1001.0 / 30000.0).abs() < 1e-12);
        let t = df.smpte_to_time("00:01:00:02").unwrap();
        assert!((t - 1800.0 * 1001.0 / 30000.0).abs() < 1e-9);
        assert!(df.smpte_to_time("00:01:00:00").is_err());
    }

    #[test]
    fn test_long_form_23976() {
        let tb = TimeBase::new(FrameRate::NTSC_23_976, false, 3600.0);
        assert_eq!(tb.frame_to_smpte(86313), "01:00:00:00");
        assert_eq!(tb.smpte_to_frame("01:00:00:00").unwrap(), 86313);
    }

    #[test]
    fn test_wall_clock_round_trip() {
        for rate in [FrameRate::NTSC_23_976, FrameRate::NTSC_29_97, FrameRate::new(25, 2).unwrap()] {
            let tb = TimeBase::new(rate, false, 3.0 * 3600.0);
            for f in (0..tb.total_frames()).step_by(13) {
                let tc = tb.frame_to_smpte(f as i64);
                assert_eq!(tb.smpte_to_frame(&tc).unwrap(), f, "rate {} tc {}", rate, tc);
            }
        }
    }

    #[test]
    fn test_time_to_string() {
        assert_eq!(time_to_string(3723.9, false), "01:02:03");
        assert_eq!(time_to_string(3723.9, true), "1h 2m 3s");
        assert_eq!(time_to_string(60.0, true), "1m");
        assert_eq!(time_to_string(0.4, true), "0s");
        assert_eq!(time_to_string(f64::NAN, false), "00:00:00");
    }
}
