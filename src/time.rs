//! Positions on the disc are expressed in "minute:second:frame" form,
//! where a frame is 1/75th of a second (one section). Internally a
//! [`SectionTime`] is a flat frame count so the pipeline can do arithmetic
//! in frame units; the M:S:F and BCD views are derived on demand.

use std::{cmp, fmt, ops};

use crate::bcd::Bcd;
use crate::{EfmError, EfmResult};

/// Upper bound (exclusive) on the frame count: 75 frames per second, 60
/// seconds per minute, 60 minutes per disc side.
pub const MAX_FRAMES: u32 = 75 * 60 * 60;

/// Absolute or track-relative section timestamp, stored as a 24-bit frame
/// count (75 frames per second).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionTime(u32);

impl SectionTime {
    /// Time 00:00:00
    pub const ZERO: SectionTime = SectionTime(0);

    /// Latest representable time, 59:59:74
    pub const MAX: SectionTime = SectionTime(MAX_FRAMES - 1);

    /// Build a `SectionTime` from a flat frame count. Returns an error if
    /// the count is at or beyond 60 minutes.
    pub fn from_frames(frames: u32) -> EfmResult<SectionTime> {
        if frames >= MAX_FRAMES {
            Err(EfmError::BadSectionTime(i64::from(frames)))
        } else {
            Ok(SectionTime(frames))
        }
    }

    /// Build a `SectionTime` from minutes, seconds and frames. Returns an
    /// error if any field is out of range.
    pub fn new(min: u8, sec: u8, frame: u8) -> EfmResult<SectionTime> {
        if min >= 60 || sec >= 60 || frame >= 75 {
            return Err(EfmError::BadSectionTime(
                (i64::from(min) * 60 + i64::from(sec)) * 75 + i64::from(frame),
            ));
        }

        Ok(SectionTime(
            (u32::from(min) * 60 + u32::from(sec)) * 75 + u32::from(frame),
        ))
    }

    /// Build a `SectionTime` from a BCD M:S:F triplet (the Q-channel wire
    /// encoding).
    pub fn from_bcd(m: u8, s: u8, f: u8) -> EfmResult<SectionTime> {
        SectionTime::new(
            Bcd::from_bcd(m)?.binary(),
            Bcd::from_bcd(s)?.binary(),
            Bcd::from_bcd(f)?.binary(),
        )
    }

    /// Return the flat frame count
    pub fn frames(self) -> u32 {
        self.0
    }

    /// Return the minutes field
    pub fn minutes(self) -> u8 {
        (self.0 / (75 * 60)) as u8
    }

    /// Return the seconds field
    pub fn seconds(self) -> u8 {
        ((self.0 / 75) % 60) as u8
    }

    /// Return the frame-within-second field
    pub fn frame_number(self) -> u8 {
        (self.0 % 75) as u8
    }

    /// Return the time as a BCD M:S:F triplet for the Q channel.
    ///
    /// The fields are always in range so the BCD conversion cannot fail.
    pub fn to_bcd(self) -> [u8; 3] {
        [
            Bcd::from_binary(self.minutes()).unwrap().bcd(),
            Bcd::from_binary(self.seconds()).unwrap().bcd(),
            Bcd::from_binary(self.frame_number()).unwrap().bcd(),
        ]
    }

    /// Computes `self + frames`, returning `None` if the result leaves the
    /// disc.
    pub fn checked_add(self, frames: u32) -> Option<SectionTime> {
        let f = self.0.checked_add(frames)?;

        if f < MAX_FRAMES {
            Some(SectionTime(f))
        } else {
            None
        }
    }

    /// Computes `self - frames`, returning `None` on underflow
    pub fn checked_sub(self, frames: u32) -> Option<SectionTime> {
        self.0.checked_sub(frames).map(SectionTime)
    }
}

impl fmt::Display for SectionTime {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{:02}:{:02}:{:02}",
            self.minutes(),
            self.seconds(),
            self.frame_number()
        )
    }
}

impl ops::Add<u32> for SectionTime {
    type Output = SectionTime;

    fn add(self, frames: u32) -> SectionTime {
        match self.checked_add(frames) {
            Some(t) => t,
            None => panic!("SectionTime addition overflow: {} + {}", self, frames),
        }
    }
}

impl ops::Sub<u32> for SectionTime {
    type Output = SectionTime;

    fn sub(self, frames: u32) -> SectionTime {
        match self.checked_sub(frames) {
            Some(t) => t,
            None => panic!("SectionTime subtraction underflow: {} - {}", self, frames),
        }
    }
}

impl ops::Sub for SectionTime {
    type Output = SectionTime;

    fn sub(self, rhs: SectionTime) -> SectionTime {
        if rhs.0 > self.0 {
            panic!("SectionTime subtraction underflow: {} - {}", self, rhs);
        }

        SectionTime(self.0 - rhs.0)
    }
}

impl cmp::PartialEq<u32> for SectionTime {
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod test {
    use super::{SectionTime, MAX_FRAMES};

    #[test]
    fn conversions() {
        for &(m, s, f) in &[
            (0, 0, 0),
            (1, 0, 0),
            (0, 1, 0),
            (0, 0, 1),
            (12, 34, 56),
            (59, 59, 74),
        ] {
            let t = SectionTime::new(m, s, f).unwrap();

            assert_eq!(t, SectionTime::from_frames(t.frames()).unwrap());
            assert_eq!((t.minutes(), t.seconds(), t.frame_number()), (m, s, f));
        }

        assert!(SectionTime::new(60, 0, 0).is_err());
        assert!(SectionTime::new(0, 60, 0).is_err());
        assert!(SectionTime::new(0, 0, 75).is_err());
        assert!(SectionTime::from_frames(MAX_FRAMES).is_err());
    }

    #[test]
    fn bcd_triplet() {
        let t = SectionTime::new(12, 34, 56).unwrap();
        assert_eq!(t.to_bcd(), [0x12, 0x34, 0x56]);

        assert_eq!(SectionTime::from_bcd(0x12, 0x34, 0x56).unwrap(), t);
        assert!(SectionTime::from_bcd(0x1a, 0x00, 0x00).is_err());
        // Valid BCD but not a valid timestamp
        assert!(SectionTime::from_bcd(0x00, 0x00, 0x80).is_err());
    }

    #[test]
    fn arithmetic() {
        let t = SectionTime::new(0, 0, 74).unwrap();

        assert_eq!(t + 1, SectionTime::new(0, 1, 0).unwrap());
        assert_eq!((t + 1) - t, SectionTime::from_frames(1).unwrap());
        assert_eq!(t.checked_sub(75), None);
        assert_eq!(SectionTime::MAX.checked_add(1), None);
    }

    #[test]
    #[should_panic]
    fn negative_difference_traps() {
        let a = SectionTime::new(0, 0, 10).unwrap();
        let b = SectionTime::new(0, 0, 11).unwrap();

        let _ = a - b;
    }

    #[test]
    fn display() {
        let t = SectionTime::new(5, 9, 3).unwrap();
        assert_eq!(t.to_string(), "05:09:03");
    }
}
