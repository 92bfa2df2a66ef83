//! The receiver main loop
//!
//! [`Receiver`] glues the pipeline together: a [`BitSource`] produces one
//! [`BitResult`] per second (live from GPIO through the sampler, or
//! replayed from a session log), the [`Framer`] assembles minutes, the
//! [`TimeDecoder`] turns completed minutes into a running calendar, and a
//! [`ClockSetter`] optionally commits the result to the host clock.
//!
//! Presentation is pluggable through the [`Hooks`] trait: every callback
//! has a no-op default, so a consumer implements only what it shows. The
//! loop is single-threaded and cooperative; the only concurrency anywhere
//! is the log writer's background flusher.

mod framer;
mod logfile;
mod output;
mod pulse;
mod sampler;

#[cfg(not(test))]
use log::warn;

#[cfg(test)]
use std::println as warn;

pub use self::framer::{is_space_bit, Framer, BUFLEN};
pub use self::logfile::{LogReader, LogWriter};
pub use self::output::{BitResult, BitValue, HwStatus, LoopControl, Marker, SetClockResult};
pub use self::pulse::{GpioPulse, Pulse, PulseError, PulseSource};
pub use self::sampler::{BitInfo, BitSampler};

use crate::calendar::MsfDateTime;
use crate::clock::{setclock_ok, ClockSetter, NullClock};
use crate::decoder::{DecodeResult, TimeDecoder};

/// Presentation and input callbacks
///
/// All methods default to doing nothing; implement what you need. The
/// input hooks receive the shared [`LoopControl`] and may request
/// termination or a clock set at any second.
pub trait Hooks {
    /// One bit was received; `value` is the buffer symbol at `bitpos`
    fn display_bit(&mut self, _gb: &BitResult, _value: u8, _bitpos: usize) {}

    /// The buffer overflowed before a minute marker arrived
    fn display_long_minute(&mut self) {}

    /// A minute boundary is being processed
    fn display_minute(&mut self, _minlen: i32, _acc_minlen: u32, _cutoff: i32) {}

    /// A second completed (live pacing indicator)
    fn display_new_second(&mut self) {}

    /// A minute was decoded
    fn display_time(&mut self, _result: &DecodeResult, _time: &MsfDateTime) {}

    /// Runs right after each bit is fetched, before it is displayed
    fn process_input(&mut self, _ctl: &mut LoopControl, _bitpos: usize) {}

    /// Runs after `process_input` once the bit position is current
    fn post_process_input(&mut self, _ctl: &mut LoopControl, _bitpos: usize) {}

    /// A clock-set attempt finished; the outcome is in the control state
    fn process_setclock_result(&mut self, _ctl: &mut LoopControl, _bitpos: usize) {}
}

/// Hooks implementation that shows nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHooks;

impl Hooks for NullHooks {}

/// Where the bits come from
pub enum BitSource {
    /// Sample a demodulator line, optionally recording a session log
    Live {
        sampler: BitSampler,
        source: Box<dyn PulseSource>,
        log: Option<LogWriter>,
    },
    /// Replay a recorded session log
    Replay { reader: LogReader },
}

impl BitSource {
    pub fn live(sampler: BitSampler, source: Box<dyn PulseSource>, log: Option<LogWriter>) -> Self {
        BitSource::Live {
            sampler,
            source,
            log,
        }
    }

    pub fn replay(reader: LogReader) -> Self {
        BitSource::Replay { reader }
    }

    fn get_bit(&mut self, framer: &mut Framer, gb: &mut BitResult) {
        match self {
            BitSource::Live {
                sampler,
                source,
                log,
            } => sampler.get_bit(source.as_mut(), framer, gb, log.as_mut()),
            BitSource::Replay { reader } => reader.get_bit(framer, gb),
        }
    }

    fn close(&mut self) {
        if let BitSource::Live { log, .. } = self {
            if let Some(log) = log.take() {
                if let Err(e) = log.close() {
                    warn!("cannot close session log: {}", e);
                }
            }
        }
    }
}

impl std::fmt::Debug for BitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BitSource::Live { sampler, .. } => {
                f.debug_struct("BitSource::Live").field("sampler", sampler).finish()
            }
            BitSource::Replay { reader } => {
                f.debug_struct("BitSource::Replay").field("reader", reader).finish()
            }
        }
    }
}

/// The complete signal-to-time pipeline
///
/// Owns every component and all mutable state for the process lifetime.
/// [`run`](Receiver::run) drives it until the source is exhausted or a
/// hook requests termination.
pub struct Receiver {
    source: BitSource,
    framer: Framer,
    decoder: TimeDecoder,
    clock: Box<dyn ClockSetter>,
    time: MsfDateTime,
    gb: BitResult,
}

impl Receiver {
    /// New receiver over `source`; clock setting disabled
    pub fn new(source: BitSource) -> Self {
        Receiver {
            source,
            framer: Framer::new(),
            decoder: TimeDecoder::new(),
            clock: Box::new(NullClock),
            time: MsfDateTime::default(),
            gb: BitResult::default(),
        }
    }

    /// Replace the clock backend
    pub fn with_clock(mut self, clock: Box<dyn ClockSetter>) -> Self {
        self.clock = clock;
        self
    }

    /// The running broadcast time
    pub fn time(&self) -> &MsfDateTime {
        &self.time
    }

    /// Filter state, when running live
    pub fn bit_info(&self) -> Option<&BitInfo> {
        match &self.source {
            BitSource::Live { sampler, .. } => Some(sampler.bit_info()),
            BitSource::Replay { .. } => None,
        }
    }

    /// Decode until the input ends or a hook requests termination
    ///
    /// One iteration per second: fetch a bit, let the input hooks mutate
    /// the control state, render, advance the framer, and process any
    /// minute boundary. A pending overflowed minute (`minlen == -1`) is
    /// processed before the boundary that ended it is recorded.
    pub fn run(&mut self, hooks: &mut dyn Hooks, ctl: &mut LoopControl) {
        let mut minlen: i32 = 0;
        let mut bitpos: usize = 0;
        let mut old_bitpos: usize = 0;
        let mut init_min: u8 = 2;
        let mut was_toolong = false;

        loop {
            self.source.get_bit(&mut self.framer, &mut self.gb);
            hooks.process_input(ctl, bitpos);
            if ctl.quit {
                // a done source still gets its final record processed
                // below; a quit request stops right here
                break;
            }

            bitpos = self.framer.bitpos();
            hooks.post_process_input(ctl, bitpos);
            if !self.gb.skip && !ctl.quit {
                hooks.display_bit(&self.gb, self.framer.buffer()[bitpos], bitpos);
            }

            self.framer.next_bit(&mut self.gb);
            if minlen == -1 {
                self.handle_new_minute(hooks, ctl, bitpos, minlen, was_toolong, &mut init_min);
                was_toolong = true;
            }

            if self.gb.marker == Marker::Minute {
                // the minute marker itself sits at bit 0
                minlen = old_bitpos as i32;
            } else if self.gb.marker == Marker::TooLong || self.gb.marker == Marker::Late {
                // leave acc_minlen alone, any minute marker was already
                // processed
                minlen = -1;
                hooks.display_long_minute();
            }
            hooks.display_new_second();

            self.handle_new_minute(hooks, ctl, bitpos, minlen, was_toolong, &mut init_min);
            was_toolong = false;
            if self.gb.done || ctl.quit {
                break;
            }
            old_bitpos = bitpos;
        }
        self.source.close();
    }

    fn handle_new_minute(
        &mut self,
        hooks: &mut dyn Hooks,
        ctl: &mut LoopControl,
        bitpos: usize,
        minlen: i32,
        was_toolong: bool,
        init_min: &mut u8,
    ) {
        let mut have_result = false;

        if (self.gb.marker == Marker::Minute || self.gb.marker == Marker::Late) && !was_toolong {
            hooks.display_minute(minlen, self.framer.acc_minlen(), self.framer.cutoff());
            let result = self.decoder.decode(
                *init_min,
                minlen,
                self.framer.acc_minlen(),
                self.framer.buffer(),
                &mut self.time,
            );
            hooks.display_time(&result, &self.time);

            if ctl.settime {
                have_result = true;
                ctl.settime_result = if setclock_ok(*init_min, &result, &self.gb) {
                    match self.clock.set(&self.time) {
                        Ok(()) => SetClockResult::Ok,
                        Err(e) => {
                            warn!("cannot set the system clock: {}", e);
                            SetClockResult::Fail
                        }
                    }
                } else {
                    SetClockResult::Unsafe
                };
            }

            self.framer.reset_acc_minlen();
            if *init_min > 0 {
                *init_min -= 1;
            }
        }

        if have_result {
            hooks.process_setclock_result(ctl, bitpos);
        }
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("source", &self.source)
            .field("framer", &self.framer)
            .field("time", &self.time)
            .finish()
    }
}
