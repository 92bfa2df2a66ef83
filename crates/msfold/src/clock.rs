//! Committing decoded time to the host clock
//!
//! Setting the system clock from a radio broadcast is only safe when the
//! decoder is settled and the minute decoded without a single complaint;
//! [`setclock_ok`] is that gate. The actual commit converts the broadcast
//! civil time (UK local) to a Unix timestamp and hands it to the kernel.

use chrono::{LocalResult, TimeZone, Utc};
use log::{info, warn};
use thiserror::Error;

use crate::calendar::MsfDateTime;
use crate::decoder::{DecodeResult, MinuteLength};
use crate::receiver::{BitResult, Marker};

/// Error committing time to the host clock
#[derive(Error, Debug)]
pub enum ClockError {
    /// The decoded time does not map onto a Unix timestamp
    #[error("decoded time is not representable")]
    InvalidTime,

    /// The kernel refused the new time
    #[error("cannot set system clock: {0}")]
    Io(#[from] std::io::Error),

    /// No clock backend on this build
    #[error("setting the system clock is not supported here")]
    Unsupported,
}

/// Commits a decoded time to a host clock
pub trait ClockSetter {
    fn set(&mut self, time: &MsfDateTime) -> Result<(), ClockError>;
}

/// Preconditions for touching the host clock
///
/// The decoder must be settled (`init_min == 0`), every field status must
/// be clean, the minute length must check out, and the minute marker must
/// have arrived on time rather than late.
pub fn setclock_ok(init_min: u8, result: &DecodeResult, gb: &BitResult) -> bool {
    init_min == 0
        && result.fields_ok()
        && result.minute_length == MinuteLength::Ok
        && gb.marker == Marker::Minute
}

/// Unix timestamp of a broadcast time
///
/// The broadcast carries UK civil time; subtract the summer-time hour to
/// get UTC. Returns `None` for times chrono cannot represent.
pub fn unix_timestamp(time: &MsfDateTime) -> Option<i64> {
    let utc = match Utc.with_ymd_and_hms(
        time.year,
        time.month as u32,
        time.mday as u32,
        time.hour as u32,
        time.minute as u32,
        0,
    ) {
        LocalResult::Single(utc) => utc,
        _ => return None,
    };
    Some(utc.timestamp() - 3600 * time.dst.utc_offset_hours())
}

/// Sets the kernel clock with `settimeofday`
///
/// The caller invokes this right after a minute boundary, so the true
/// time is the decoded minute plus the just-sampled marker second.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl ClockSetter for SystemClock {
    #[cfg(unix)]
    fn set(&mut self, time: &MsfDateTime) -> Result<(), ClockError> {
        let seconds = unix_timestamp(time).ok_or(ClockError::InvalidTime)? + 1;
        let tv = libc::timeval {
            tv_sec: seconds as libc::time_t,
            tv_usec: 0,
        };
        if unsafe { libc::settimeofday(&tv, std::ptr::null()) } != 0 {
            let err = std::io::Error::last_os_error();
            warn!("settimeofday: {}", err);
            return Err(ClockError::Io(err));
        }
        info!("system clock set to {}", seconds);
        Ok(())
    }

    #[cfg(not(unix))]
    fn set(&mut self, _time: &MsfDateTime) -> Result<(), ClockError> {
        Err(ClockError::Unsupported)
    }
}

/// Refuses every request; the default when clock setting was not asked for
#[derive(Clone, Copy, Debug, Default)]
pub struct NullClock;

impl ClockSetter for NullClock {
    fn set(&mut self, _time: &MsfDateTime) -> Result<(), ClockError> {
        Err(ClockError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Dst;
    use crate::decoder::FieldStatus;

    fn civil(year: i32, month: u8, mday: u8, hour: u8, minute: u8, dst: Dst) -> MsfDateTime {
        MsfDateTime {
            year,
            month,
            mday,
            wday: 1,
            hour,
            minute,
            dst,
        }
    }

    #[test]
    fn test_unix_timestamp() {
        let winter = civil(2019, 3, 15, 12, 34, Dst::Winter);
        assert_eq!(Some(1_552_653_240), unix_timestamp(&winter));

        // summer time is one hour ahead of UTC
        let summer = civil(2019, 7, 15, 12, 34, Dst::Summer);
        let same_wall_winter = civil(2019, 7, 15, 12, 34, Dst::Winter);
        assert_eq!(
            unix_timestamp(&same_wall_winter).unwrap() - 3600,
            unix_timestamp(&summer).unwrap()
        );

        let junk = civil(2019, 13, 1, 0, 0, Dst::Winter);
        assert_eq!(None, unix_timestamp(&junk));
    }

    #[test]
    fn test_setclock_gate() {
        let clean = DecodeResult::default();
        let mut gb = BitResult::default();
        gb.marker = Marker::Minute;

        assert!(setclock_ok(0, &clean, &gb));
        assert!(!setclock_ok(1, &clean, &gb), "decoder not settled");
        assert!(!setclock_ok(2, &clean, &gb));

        let mut late = gb;
        late.marker = Marker::Late;
        assert!(!setclock_ok(0, &clean, &late), "late marker is not safe");

        let mut flawed = clean;
        flawed.hour_status = FieldStatus::Jump;
        assert!(!setclock_ok(0, &flawed, &gb));

        let mut short = clean;
        short.minute_length = MinuteLength::Short;
        assert!(!setclock_ok(0, &short, &gb));
    }

    #[test]
    fn test_null_clock_refuses() {
        let mut clock = NullClock;
        assert!(matches!(
            clock.set(&civil(2019, 3, 15, 12, 34, Dst::Winter)),
            Err(ClockError::Unsupported)
        ));
    }
}
