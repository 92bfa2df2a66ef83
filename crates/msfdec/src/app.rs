//! Console presentation of the decoder output
//!
//! One line of bit characters per minute, grouped at the field
//! boundaries, followed by the minute summary and a status report for
//! everything the decoder flagged. The same hooks serve live decoding
//! and log replay.

use std::io::Write;

use log::{debug, warn};

use msfold::{
    is_space_bit, BitResult, BitValue, DecodeResult, Dst, DstStatus, FieldStatus, Hooks,
    HwStatus, LeapStatus, LoopControl, MinuteLength, MsfDateTime, SetClockResult,
};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Stdout display for `msfdec`
#[derive(Clone, Debug, Default)]
pub struct ConsoleHooks {
    quiet: bool,
}

impl ConsoleHooks {
    pub fn new(quiet: bool) -> Self {
        ConsoleHooks { quiet }
    }
}

impl Hooks for ConsoleHooks {
    fn display_bit(&mut self, gb: &BitResult, value: u8, bitpos: usize) {
        if self.quiet {
            return;
        }
        if is_space_bit(bitpos) {
            print!(" ");
        }
        match gb.hwstat {
            HwStatus::Receive => print!("r"),
            HwStatus::Transmit => print!("x"),
            HwStatus::Random => print!("#"),
            HwStatus::Ok => {
                if gb.bad_io {
                    print!("*");
                } else if gb.value == BitValue::Unknown {
                    print!("_");
                } else {
                    print!("{}", value);
                }
            }
        }
    }

    fn display_long_minute(&mut self) {
        if !self.quiet {
            print!(" L ");
        }
    }

    fn display_minute(&mut self, minlen: i32, acc_minlen: u32, cutoff: i32) {
        if self.quiet {
            return;
        }
        print!(" ({}) {} ", acc_minlen, minlen);
        if cutoff == -1 {
            println!("?");
        } else {
            println!("{:6.4}", cutoff as f64 / 1e4);
        }
    }

    fn display_new_second(&mut self) {
        // keep the bit line visible while decoding live
        let _ = std::io::stdout().flush();
    }

    fn display_time(&mut self, result: &DecodeResult, time: &MsfDateTime) {
        let season = match time.dst {
            Dst::Summer => "summer",
            Dst::Winter => "winter",
            Dst::Unknown => "?     ",
        };
        let weekday = if (1..=7).contains(&time.wday) {
            WEEKDAYS[time.wday as usize - 1]
        } else {
            "???"
        };
        println!(
            "{} {:04}-{:02}-{:02} {} {:02}:{:02}",
            season, time.year, time.month, time.mday, weekday, time.hour, time.minute
        );

        match result.minute_length {
            MinuteLength::Long => println!("Minute too long"),
            MinuteLength::Short => println!("Minute too short"),
            MinuteLength::Ok => {}
        }
        match result.dst_status {
            DstStatus::Jump => println!("Time offset jump (ignored)"),
            DstStatus::Done => println!("Time offset changed"),
            DstStatus::Ok => {}
        }
        for (name, status) in [
            ("Minute", result.minute_status),
            ("Hour", result.hour_status),
            ("Day-of-month", result.mday_status),
            ("Day-of-week", result.wday_status),
            ("Month", result.month_status),
            ("Year", result.year_status),
        ] {
            match status {
                FieldStatus::Parity => println!("{} parity error", name),
                FieldStatus::Bcd => println!("{} value error", name),
                FieldStatus::Jump => println!("{} value jump", name),
                FieldStatus::Ok => {}
            }
        }
        if !result.bit0_ok {
            println!("Minute marker error");
        }
        if !result.bit52_ok {
            println!("Second 52 error");
        }
        if !result.bit59_ok {
            println!("Second 59 error");
        }
        if result.dst_announce {
            println!("Time offset change announced");
        }
        if result.leap_announce {
            println!("Leap second announced");
        }
        match result.leap_status {
            LeapStatus::Done => println!("Leap second processed"),
            LeapStatus::One => println!("Leap second processed with value 1 instead of 0"),
            LeapStatus::None => {}
        }
        match result.dut1 {
            Some(0) => {}
            Some(tenths) => println!("UT1 offset {:+.1} s", tenths as f64 / 10.0),
            None => println!("UT1 offset bits inconsistent"),
        }
        println!();
    }

    fn process_setclock_result(&mut self, ctl: &mut LoopControl, _bitpos: usize) {
        match ctl.settime_result {
            SetClockResult::Ok => {
                println!("System clock set");
                ctl.settime = false;
            }
            SetClockResult::Fail => {
                warn!("setting the system clock failed; giving up");
                ctl.settime = false;
            }
            SetClockResult::Unsafe => {
                debug!("minute not safe for clock setting yet");
            }
            SetClockResult::Unset => {}
        }
    }
}
