//! Broadcast calendar arithmetic
//!
//! The decoder tracks a running civil date/time between minute frames and
//! validates every freshly-received frame against it. All of the arithmetic
//! here is pure and total: no clocks, no time zones, no allocation. The
//! transmitted time is UK civil time, so the only offset change this module
//! knows about is the UK daylight-saving rule (last Sunday of March forward
//! at 01:00, last Sunday of October back at 02:00).

/// First year of the century window the two-digit broadcast year can land in
pub const BASE_YEAR: i32 = 1900;

/// Daylight-saving state of a broadcast time
///
/// The broadcast carries a single summer-time bit. Before the first clean
/// minute has been decoded the state is simply not known yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dst {
    /// Not yet determined
    Unknown,
    /// UTC, winter time
    Winter,
    /// UTC+1, summer time
    Summer,
}

impl Dst {
    /// Wire representation: -1 unknown, 0 winter, 1 summer
    ///
    /// The decoder compares this directly against raw buffer symbols, the
    /// same way the summer-time bit is compared on the air.
    pub fn bit(self) -> i8 {
        match self {
            Dst::Unknown => -1,
            Dst::Winter => 0,
            Dst::Summer => 1,
        }
    }

    /// Offset from UTC in hours (unknown counts as winter)
    pub fn utc_offset_hours(self) -> i64 {
        match self {
            Dst::Summer => 1,
            _ => 0,
        }
    }
}

impl Default for Dst {
    fn default() -> Self {
        Dst::Unknown
    }
}

/// A broken-down broadcast date and time
///
/// Always a valid Gregorian date once initialised; [`add_minute`] and
/// [`subtract_minute`] wrap all carries through day, month and year.
/// Weekdays are 1 = Monday … 7 = Sunday.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsfDateTime {
    /// Full Gregorian year (four digits once century-pinned)
    pub year: i32,
    /// Month, 1–12
    pub month: u8,
    /// Day of month, 1–31
    pub mday: u8,
    /// Day of week, 1 = Monday … 7 = Sunday
    pub wday: u8,
    /// Hour, 0–23
    pub hour: u8,
    /// Minute, 0–59
    pub minute: u8,
    /// Summer time state
    pub dst: Dst,
}

/// Gregorian leap-year rule
fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in the month of `time`
pub fn last_day_of_month(time: &MsfDateTime) -> u8 {
    match time.month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(time.year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Day of week for a full Gregorian date, 1 = Monday … 7 = Sunday
///
/// Sakamoto's method.
pub fn day_of_week(year: i32, month: u8, mday: u8) -> u8 {
    const OFFSET: [i32; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];

    let y = if month < 3 { year - 1 } else { year };
    let dow = (y + y / 4 - y / 100 + y / 400 + OFFSET[(month - 1) as usize] + mday as i32) % 7;
    // Sakamoto yields 0 = Sunday
    if dow == 0 {
        7
    } else {
        dow as u8
    }
}

/// Pin the two-digit broadcast year to a century
///
/// `time.year` holds the year within the century (0–99); month, day and
/// weekday hold the decoded values. Returns how many centuries above
/// [`BASE_YEAR`] make the weekday consistent with the date, or `None` when
/// no century matches. An inconsistent weekday means at least one of the
/// decoded fields is wrong, so `None` feeds back into the field checks.
pub fn century_offset(time: &MsfDateTime) -> Option<u8> {
    if time.month < 1 || time.month > 12 || time.mday < 1 || time.mday > 31 {
        return None;
    }
    for century in 0..4u8 {
        let year = BASE_YEAR + 100 * century as i32 + time.year;
        if day_of_week(year, time.month, time.mday) == time.wday {
            return Some(century);
        }
    }
    None
}

/// True when `time` sits on the last Sunday of its month
fn is_last_sunday(time: &MsfDateTime) -> bool {
    time.wday == 7 && time.mday + 7 > last_day_of_month(time)
}

/// Advance `time` by one minute
///
/// When `dst_announce` is set and the new minute lands on a UK transition
/// boundary the hour is adjusted and the summer-time state flipped: 01:00
/// becomes 02:00 on the last Sunday of March, 02:00 becomes 01:00 on the
/// last Sunday of October.
pub fn add_minute(time: &MsfDateTime, dst_announce: bool) -> MsfDateTime {
    let mut t = *time;

    t.minute += 1;
    if t.minute < 60 {
        return t;
    }
    t.minute = 0;
    t.hour += 1;

    // transitions happen on the hour, before any day rollover is possible
    if dst_announce && is_last_sunday(&t) {
        if t.dst == Dst::Winter && t.month == 3 && t.hour == 1 {
            t.hour = 2;
            t.dst = Dst::Summer;
        } else if t.dst == Dst::Summer && t.month == 10 && t.hour == 2 {
            t.hour = 1;
            t.dst = Dst::Winter;
        }
    }

    if t.hour == 24 {
        t.hour = 0;
        t.wday = if t.wday == 7 { 1 } else { t.wday + 1 };
        t.mday += 1;
        if t.mday > last_day_of_month(&t) {
            t.mday = 1;
            t.month += 1;
            if t.month == 13 {
                t.month = 1;
                t.year += 1;
            }
        }
    }
    t
}

/// Step `time` back by one minute, the inverse of [`add_minute`]
pub fn subtract_minute(time: &MsfDateTime, dst_announce: bool) -> MsfDateTime {
    let mut t = *time;

    if t.minute > 0 {
        t.minute -= 1;
        return t;
    }
    t.minute = 59;

    if t.hour == 0 {
        t.hour = 23;
        t.wday = if t.wday == 1 { 7 } else { t.wday - 1 };
        t.mday -= 1;
        if t.mday == 0 {
            t.month -= 1;
            if t.month == 0 {
                t.month = 12;
                t.year -= 1;
            }
            t.mday = last_day_of_month(&t);
        }
    } else {
        t.hour -= 1;
    }

    if dst_announce && is_last_sunday(&t) {
        if t.dst == Dst::Summer && t.month == 3 && t.hour == 1 {
            t.hour = 0;
            t.dst = Dst::Winter;
        } else if t.dst == Dst::Winter && t.month == 10 && t.hour == 0 {
            t.hour = 1;
            t.dst = Dst::Summer;
        }
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u8, mday: u8, hour: u8, minute: u8, dst: Dst) -> MsfDateTime {
        MsfDateTime {
            year,
            month,
            mday,
            wday: day_of_week(year, month, mday),
            hour,
            minute,
            dst,
        }
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(31, last_day_of_month(&at(2019, 1, 1, 0, 0, Dst::Winter)));
        assert_eq!(28, last_day_of_month(&at(2019, 2, 1, 0, 0, Dst::Winter)));
        assert_eq!(29, last_day_of_month(&at(2020, 2, 1, 0, 0, Dst::Winter)));
        assert_eq!(28, last_day_of_month(&at(2100, 2, 1, 0, 0, Dst::Winter)));
        assert_eq!(29, last_day_of_month(&at(2000, 2, 1, 0, 0, Dst::Winter)));
        assert_eq!(30, last_day_of_month(&at(2019, 4, 1, 0, 0, Dst::Winter)));
    }

    #[test]
    fn test_day_of_week() {
        assert_eq!(5, day_of_week(2019, 3, 15)); // Friday
        assert_eq!(7, day_of_week(2019, 3, 31)); // Sunday
        assert_eq!(4, day_of_week(1970, 1, 1)); // Thursday
        assert_eq!(2, day_of_week(2000, 2, 29)); // Tuesday
        assert_eq!(2, day_of_week(2024, 12, 31)); // Tuesday
    }

    #[test]
    fn test_century_offset() {
        // 2019-03-15 was a Friday; year-in-century 19 pins to century 1
        let t = MsfDateTime {
            year: 19,
            month: 3,
            mday: 15,
            wday: 5,
            ..MsfDateTime::default()
        };
        assert_eq!(Some(1), century_offset(&t));

        // a weekday that fits no century between 1900 and 2299
        let mut bad = t;
        for wday in 1..=7 {
            bad.wday = wday;
            let year = century_offset(&bad).map(|c| BASE_YEAR + 100 * c as i32 + bad.year);
            match wday {
                6 => assert_eq!(Some(1919), year),
                5 => assert_eq!(Some(2019), year),
                3 => assert_eq!(Some(2119), year),
                1 => assert_eq!(Some(2219), year),
                _ => assert_eq!(None, year),
            }
        }

        // nonsense dates never match
        let junk = MsfDateTime {
            year: 19,
            month: 13,
            mday: 15,
            wday: 5,
            ..MsfDateTime::default()
        };
        assert_eq!(None, century_offset(&junk));
    }

    #[test]
    fn test_add_minute_carries() {
        let t = add_minute(&at(2019, 12, 31, 23, 59, Dst::Winter), false);
        assert_eq!(t, at(2020, 1, 1, 0, 0, Dst::Winter));
        assert_eq!(3, t.wday); // 2020-01-01 was a Wednesday

        let t = add_minute(&at(2020, 2, 28, 23, 59, Dst::Winter), false);
        assert_eq!((t.month, t.mday), (2, 29));
    }

    #[test]
    fn test_add_subtract_roundtrip() {
        let samples = [
            at(2019, 3, 15, 12, 34, Dst::Winter),
            at(2019, 12, 31, 23, 59, Dst::Winter),
            at(2020, 2, 29, 0, 0, Dst::Winter),
            at(2019, 7, 1, 0, 0, Dst::Summer),
        ];
        for t in &samples {
            assert_eq!(*t, subtract_minute(&add_minute(t, false), false));
            assert_eq!(*t, add_minute(&subtract_minute(t, false), false));
        }
    }

    #[test]
    fn test_dst_spring_forward() {
        // last Sunday of March 2019: 00:59 winter jumps to 02:00 summer
        let before = at(2019, 3, 31, 0, 59, Dst::Winter);
        let after = add_minute(&before, true);
        assert_eq!((after.hour, after.minute), (2, 0));
        assert_eq!(Dst::Summer, after.dst);

        // inverse
        assert_eq!(before, subtract_minute(&after, true));

        // without an announcement nothing special happens
        let plain = add_minute(&before, false);
        assert_eq!((plain.hour, plain.minute), (1, 0));
        assert_eq!(Dst::Winter, plain.dst);
    }

    #[test]
    fn test_dst_fall_back() {
        // last Sunday of October 2019: 01:59 summer falls back to 01:00 winter
        let before = at(2019, 10, 27, 1, 59, Dst::Summer);
        let after = add_minute(&before, true);
        assert_eq!((after.hour, after.minute), (1, 0));
        assert_eq!(Dst::Winter, after.dst);

        assert_eq!(before, subtract_minute(&after, true));
    }

    #[test]
    fn test_dst_announce_on_ordinary_sunday() {
        // an announcement on a mid-month Sunday must not fire
        let before = at(2019, 3, 10, 0, 59, Dst::Winter);
        let after = add_minute(&before, true);
        assert_eq!((after.hour, after.dst), (1, Dst::Winter));
    }
}
