//! # msfold: MSF 60 kHz time-signal decoding
//!
//! This crate receives and decodes the United Kingdom's NPL MSF time
//! broadcast from Anthorn. It expects a single-bit carrier-present /
//! carrier-absent signal on a GPIO line, driven by an external AM
//! demodulator tuned to 60 kHz; everything after that pin is handled
//! here:
//!
//! 1. a **bit sampler** turns ~1 s stretches of noisy samples into bit
//!    symbols with an exponential low-pass filter and a Schmitt trigger,
//!    self-calibrating its period length as it goes;
//! 2. a **framer** finds begin-of-minute markers and assembles ordered
//!    59/60-bit minute frames with an accumulated true duration;
//! 3. a **time decoder** validates parities and BCD fields, tracks a
//!    running calendar across daylight-saving transitions and leap
//!    seconds, and flags every anomaly it sees;
//! 4. a **main loop** sequences the three, drives pluggable display
//!    hooks, and can commit the decoded time to the host clock.
//!
//! Every decoded second can be recorded to a session log and replayed
//! later through the identical pipeline, which is also how most of the
//! test suite works.
//!
//! ## Example
//!
//! Replay a recorded session log and print each decoded minute:
//!
//! ```no_run
//! use std::io::BufReader;
//!
//! use msfold::{
//!     BitSource, DecodeResult, Hooks, LogReader, LoopControl, MsfDateTime, Receiver,
//! };
//!
//! struct Show;
//!
//! impl Hooks for Show {
//!     fn display_time(&mut self, result: &DecodeResult, time: &MsfDateTime) {
//!         println!(
//!             "{:04}-{:02}-{:02} {:02}:{:02} fields ok: {}",
//!             time.year, time.month, time.mday, time.hour, time.minute,
//!             result.fields_ok()
//!         );
//!     }
//! }
//!
//! let file = std::fs::File::open("session.log")?;
//! let reader = LogReader::new(Box::new(BufReader::new(file)));
//! let mut receiver = Receiver::new(BitSource::replay(reader));
//! receiver.run(&mut Show, &mut LoopControl::default());
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! Live decoding works the same way, with a [`BitSource::live`] built
//! from a [`BitSampler`], a [`GpioPulse`] and an optional [`LogWriter`];
//! see the `msfdec` crate for a complete consumer.
//!
//! ## Background
//!
//! MSF transmits one bit pair per second by switching the 60 kHz carrier
//! off for 100–500 ms at the start of each second: 500 ms marks second 0,
//! and the other lengths encode the two data bits. A minute carries the
//! date, time, day of week, UT1−UTC offset and the summer-time flags,
//! protected by four odd-parity groups. Minutes are 59 data bits long, or
//! 60 when a leap second is inserted.
//!
//! Decoding is minute-granular by design: this is a calendar clock, not
//! an NTP replacement.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod receiver;

pub use calendar::{Dst, MsfDateTime};
pub use clock::{setclock_ok, unix_timestamp, ClockError, ClockSetter, NullClock, SystemClock};
pub use config::{ConfigError, HardwareConfig};
pub use decoder::{
    DecodeResult, DstStatus, FieldStatus, LeapStatus, MinuteLength, TimeDecoder,
};
pub use receiver::{
    is_space_bit, BitInfo, BitResult, BitSampler, BitSource, BitValue, Framer, GpioPulse, Hooks,
    HwStatus, LogReader, LogWriter, LoopControl, Marker, NullHooks, Pulse, PulseError,
    PulseSource, Receiver, SetClockResult, BUFLEN,
};
