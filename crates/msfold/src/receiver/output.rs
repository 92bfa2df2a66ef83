//! Per-second receiver outputs and loop control
//!
//! One [`BitResult`] is produced for every logical second, whether it came
//! from the live sampler or from a replayed session log. The struct is
//! long-lived: minute markers that arrived too late to fit the buffer must
//! survive into following seconds, so only part of the state is cleared
//! when a new second begins.

use std::path::PathBuf;

/// Value carried by one broadcast second
///
/// Each second carries two data bits. The wire/log encoding is the digit
/// shown in parentheses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitValue {
    /// A = 0, B = 0; ~100 ms active carrier (`0`)
    ZeroZero,
    /// A = 1, B = 0; ~200 ms active carrier (`1`)
    OneZero,
    /// A = 0, B = 1; split 100+100 ms active carrier (`2`)
    ZeroOne,
    /// A = 1, B = 1; ~300 ms active carrier (`3`)
    OneOne,
    /// ~500 ms active carrier opening second 0 (`4`)
    BeginOfMinute,
    /// Nothing decodable this second; the buffer keeps its old value (`_`)
    Unknown,
}

impl BitValue {
    /// Buffer/log digit for this value, if it has one
    pub fn digit(self) -> Option<u8> {
        match self {
            BitValue::ZeroZero => Some(0),
            BitValue::OneZero => Some(1),
            BitValue::ZeroOne => Some(2),
            BitValue::OneOne => Some(3),
            BitValue::BeginOfMinute => Some(4),
            BitValue::Unknown => None,
        }
    }
}

/// Minute-boundary state attached to a second
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    /// An ordinary second
    None,
    /// This second carried a begin-of-minute marker
    Minute,
    /// The buffer overflowed before a begin-of-minute was seen
    TooLong,
    /// A begin-of-minute arrived after the overflow was already reported
    Late,
}

/// Hardware-level classification of a second that failed to decode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum HwStatus {
    /// Signal looked sane
    Ok,
    /// Mostly low; receiver saturated or no carrier (`r`)
    Receive,
    /// High at least 99% of the time; transmitter stuck (`x`)
    Transmit,
    /// Random noise, neither of the above (`#`)
    Random,
}

/// Outcome of grabbing one bit from the signal or the log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitResult {
    /// Minute-boundary state; `TooLong`/`Late` persist across seconds
    pub marker: Marker,
    /// Decoded symbol for this second
    pub value: BitValue,
    /// Hardware classification when the second timed out
    pub hwstat: HwStatus,
    /// The pulse source reported a read fault (`*`)
    pub bad_io: bool,
    /// A metadata record was consumed instead of a real bit
    pub skip: bool,
    /// Input is exhausted; the main loop should stop
    pub done: bool,
}

impl BitResult {
    /// Clear the per-second state
    ///
    /// `TooLong` and `Late` markers are kept so later seconds can tell
    /// whether the condition has cleared.
    pub(crate) fn begin_second(&mut self) {
        self.bad_io = false;
        self.value = BitValue::Unknown;
        if self.marker != Marker::TooLong && self.marker != Marker::Late {
            self.marker = Marker::None;
        }
        self.hwstat = HwStatus::Ok;
        self.done = false;
        self.skip = false;
    }
}

impl Default for BitResult {
    fn default() -> Self {
        BitResult {
            marker: Marker::None,
            value: BitValue::Unknown,
            hwstat: HwStatus::Ok,
            bad_io: false,
            skip: false,
            done: false,
        }
    }
}

/// Outcome of a clock-set request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SetClockResult {
    /// No attempt has been made yet
    Unset,
    /// The host clock was set
    Ok,
    /// Preconditions not met; nothing was changed
    Unsafe,
    /// The attempt itself failed
    Fail,
}

/// State shared between the main loop and the input-processing hooks
///
/// Hooks may request termination or a clock set; the main loop reports the
/// clock-set outcome back through [`SetClockResult`].
#[derive(Clone, Debug)]
pub struct LoopControl {
    /// Session log path, if any (informational, for display hooks)
    pub logfilename: Option<PathBuf>,
    /// Set the host clock at the next safe minute boundary
    pub settime: bool,
    /// Outcome of the last clock-set attempt
    pub settime_result: SetClockResult,
    /// Stop the main loop at the next iteration boundary
    pub quit: bool,
}

impl Default for LoopControl {
    fn default() -> Self {
        LoopControl {
            logfilename: None,
            settime: false,
            settime_result: SetClockResult::Unset,
            quit: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_second_keeps_overflow_markers() {
        let mut gb = BitResult {
            marker: Marker::TooLong,
            value: BitValue::OneZero,
            hwstat: HwStatus::Random,
            bad_io: true,
            skip: true,
            done: false,
        };
        gb.begin_second();
        assert_eq!(Marker::TooLong, gb.marker);
        assert_eq!(BitValue::Unknown, gb.value);
        assert_eq!(HwStatus::Ok, gb.hwstat);
        assert!(!gb.bad_io && !gb.skip);

        gb.marker = Marker::Minute;
        gb.begin_second();
        assert_eq!(Marker::None, gb.marker);
    }

    #[test]
    fn test_digits() {
        assert_eq!(Some(4), BitValue::BeginOfMinute.digit());
        assert_eq!(None, BitValue::Unknown.digit());
    }

    #[test]
    fn test_hwstat_display() {
        assert_eq!("random", HwStatus::Random.to_string());
        assert_eq!("unsafe", SetClockResult::Unsafe.to_string());
    }
}
