//! Per-second bit sampling
//!
//! The demodulated GPIO trace is noisy: thunderstorms, AGC breathing and
//! scheduler jitter all show up on the line. Each logical second is
//! recovered by running the raw samples through an exponential low-pass
//! filter and a Schmitt trigger, then classifying the length of the active
//! part of the second against two self-calibrating reference lengths (the
//! 500 ms begin-of-minute pulse and the 100 ms data pulse).
//!
//! All filter math is 64-bit integer fixed-point: the estimated sampling
//! rate `realfreq` carries a 10⁶ scale, the filter value a 10⁹ scale. The
//! only floating-point operation is a single `exp2` when the filter
//! constant is derived at startup.
//!
//! The filter-plus-Schmitt-trigger idea comes from Udo Klein's DCF77 work,
//! with permission:
//! <http://blog.blinkenlight.net/experiments/dcf77/binary-clock/#comment-5916>

use std::thread;
use std::time::{Duration, Instant};

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use super::framer::Framer;
use super::logfile::LogWriter;
use super::output::{BitResult, BitValue, HwStatus, Marker};
use super::pulse::{Pulse, PulseSource};

/// Running filter and calibration state
///
/// Mutated only by the sampler; exposed read-only for display and
/// diagnostics.
#[derive(Clone, Debug)]
pub struct BitInfo {
    /// Estimated samples per second, scaled by 10⁶
    pub realfreq: i64,
    /// Estimated begin-of-minute active length, samples scaled by 10⁶
    pub bit0: i64,
    /// Estimated 100 ms data-pulse active length, samples scaled by 10⁶
    pub bit59: i64,
    /// Sample index at which the level dropped this second, -1 if it never did
    pub tlow: i32,
    /// Last sample index at which the filter sat near zero
    pub tlast0: i32,
    /// Samples consumed this second
    pub t: u32,
    /// The frequency guard fired this second
    pub freq_reset: bool,
    /// The reference-length guard fired this second
    pub bitlen_reset: bool,
    /// Raw signal snapshot, one bit per sample (diagnostics only)
    pub signal: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Init {
    /// No edge seen yet; references still at their nominal values
    Cold,
    /// First second underway; skip calibration until it completes
    FirstBit,
    Running,
}

/// Converts ~1 s stretches of raw samples into bit symbols
///
/// One [`get_bit`](BitSampler::get_bit) call consumes the samples of one
/// logical second, paced to the configured sampling rate with
/// monotonic-clock arithmetic, and classifies the result. The period
/// length self-calibrates, so a sound card, a cheap RC oscillator or a
/// busy scheduler all converge onto usable timing.
#[derive(Debug)]
pub struct BitSampler {
    freq: u32,
    /// Filter constant: 10⁹·(1 − 2^(−20/freq)), reaches 50% in freq/20 samples
    a: i64,
    /// Nominal nanoseconds per sample divided by freq (pacing helper)
    sec2: u64,
    init: Init,
    bit: BitInfo,
}

impl BitSampler {
    /// New sampler for a configured sampling rate
    pub fn new(freq: u32) -> Self {
        let a = 1_000_000_000i64 - (1e9 * (-20.0 / freq as f64).exp2()) as i64;
        let realfreq = freq as i64 * 1_000_000;
        BitSampler {
            freq,
            a,
            sec2: 1_000_000_000u64 / (freq as u64 * freq as u64),
            init: Init::Cold,
            bit: BitInfo {
                realfreq,
                bit0: realfreq / 2,
                bit59: realfreq / 10,
                tlow: -1,
                tlast0: -1,
                t: 0,
                freq_reset: false,
                bitlen_reset: false,
                signal: vec![0; freq as usize / 2],
            },
        }
    }

    /// Filter and calibration state after the last second
    pub fn bit_info(&self) -> &BitInfo {
        &self.bit
    }

    fn reset_frequency(&mut self, log: &mut Option<&mut LogWriter>) {
        let freq = self.freq as i64;
        if let Some(log) = log.as_deref_mut() {
            if self.bit.realfreq <= freq * 500_000 {
                log.record('<');
            } else if self.bit.realfreq > freq * 1_000_000 {
                log.record('>');
            }
        }
        debug!("sample rate estimate out of range, reset to nominal");
        self.bit.realfreq = freq * 1_000_000;
        self.bit.freq_reset = true;
    }

    fn reset_bitlen(&mut self, log: &mut Option<&mut LogWriter>) {
        if let Some(log) = log.as_deref_mut() {
            log.record('!');
        }
        debug!("pulse length references out of range, reset to nominal");
        self.bit.bit0 = self.bit.realfreq / 2;
        self.bit.bit59 = self.bit.realfreq / 10;
        self.bit.bitlen_reset = true;
    }

    // Run the filter until the Schmitt trigger ends the second, a timeout
    // classifies it as noise, or the source faults. Leaves `bit.t` at the
    // sample that ended the loop.
    fn collect_pulses(
        &mut self,
        start: u32,
        src: &mut dyn PulseSource,
        gb: &mut BitResult,
        log: &mut Option<&mut LogWriter>,
        adj_freq: &mut bool,
    ) {
        let mut y: i64 = 1_000_000_000;
        let mut stv: u8 = 1;
        let freq = self.freq as i64;
        let hard_cap = 2 * self.freq;

        self.bit.t = start;
        while self.bit.t < hard_cap {
            let started = Instant::now();
            let p: i64 = match src.read_sample() {
                Pulse::Fault => {
                    gb.bad_io = true;
                    return;
                }
                Pulse::Low => 0,
                Pulse::High => 1,
            };

            let idx = (self.bit.t / 8) as usize;
            if idx < self.bit.signal.len() {
                if self.bit.t & 7 == 0 {
                    // clear data from a previous second
                    self.bit.signal[idx] = 0;
                }
                self.bit.signal[idx] |= (p as u8) << (self.bit.t & 7);
            }

            if y >= 0 && y < self.a / 2 {
                self.bit.tlast0 = self.bit.t as i32;
            }
            y += self.a * (p * 1_000_000_000 - y) / 1_000_000_000;

            // prevent algorithm collapse during thunderstorms or
            // scheduler abuse
            if self.bit.realfreq <= freq * 500_000 || self.bit.realfreq > freq * 1_000_000 {
                self.reset_frequency(log);
                *adj_freq = false;
            }

            // reception timeout after 1.5 nominal seconds
            if 2_000_000 * self.bit.t as i64 > 3 * self.bit.realfreq {
                let t = self.bit.t as i64;
                let tlow = self.bit.tlow as i64;
                gb.hwstat = if tlow <= freq / 20 {
                    HwStatus::Receive
                } else if tlow * 100 / t >= 99 {
                    HwStatus::Transmit
                } else {
                    HwStatus::Random
                };
                *adj_freq = false;
                return;
            }

            // Schmitt trigger; the value is clamped to introduce
            // hysteresis and to avoid infinite memory
            if y < 500_000_000 && stv == 1 {
                // end of the active part of the second
                y = 0;
                stv = 0;
                self.bit.tlow = self.bit.t as i32;
            }
            if y > 500_000_000 && stv == 0 {
                // start of the next second
                if self.init == Init::Cold {
                    self.init = Init::FirstBit;
                }
                return;
            }

            let twait = (self.sec2 as i64 * self.bit.realfreq / 1_000_000)
                - started.elapsed().as_nanos() as i64;
            if twait > 0 {
                thread::sleep(Duration::from_nanos(twait as u64));
            }
            self.bit.t += 1;
        }

        // two nominal seconds without an edge; this can actually happen
        if gb.hwstat == HwStatus::Ok {
            gb.hwstat = HwStatus::Random;
        }
        self.reset_frequency(log);
        *adj_freq = false;
    }

    /// Sample and classify one logical second
    ///
    /// The active part of a second can be 100 ms (`00`), 200 ms (`10`),
    /// 300 ms (`11`) or a split 100+100 ms (`01`); second 0 is 500 ms to
    /// mark the start of a new minute. The decision thresholds scale with
    /// the calibrated reference lengths so a drifting oscillator does not
    /// skew classification.
    pub fn get_bit(
        &mut self,
        src: &mut dyn PulseSource,
        framer: &mut Framer,
        gb: &mut BitResult,
        mut log: Option<&mut LogWriter>,
    ) {
        if !gb.skip {
            framer.set_cutoff(-1);
        }
        gb.begin_second();

        self.bit.freq_reset = false;
        self.bit.bitlen_reset = false;

        if self.init == Init::Cold {
            self.bit.realfreq = self.freq as i64 * 1_000_000;
            self.bit.bit0 = self.bit.realfreq / 2;
            self.bit.bit59 = self.bit.realfreq / 10;
        }
        let len100ms = self.bit.bit0 / 10 + self.bit.bit59 / 2;

        self.bit.tlow = -1;
        self.bit.tlast0 = -1;

        let mut adj_freq = true;
        self.collect_pulses(0, src, gb, &mut log, &mut adj_freq);

        let mut outch = '_';
        if !gb.bad_io && gb.hwstat == HwStatus::Ok {
            let t = self.bit.t as i64;
            let tlow = self.bit.tlow as i64;
            let rf = self.bit.realfreq;

            if 2 * tlow * rf < 3 * len100ms * t {
                // two zero bits, ~100 ms active signal
                gb.value = BitValue::ZeroZero;
                outch = '0';
                framer.put(0);
            } else if 2 * tlow * rf < 5 * len100ms * t {
                // one bit and zero bit, ~200 ms active signal
                gb.value = BitValue::OneZero;
                outch = '1';
                framer.put(1);
            } else if 2 * tlow * rf < 7 * len100ms * t {
                if t >= rf / 2_500_000 {
                    // two one bits, ~300 ms active signal
                    gb.value = BitValue::OneOne;
                    outch = '3';
                    framer.put(3);
                } else {
                    // zero bit and one bit, split signal; read the rest
                    // of the second
                    gb.value = BitValue::ZeroOne;
                    outch = '2';
                    framer.put(2);
                    let resume = self.bit.t;
                    self.collect_pulses(resume, src, gb, &mut log, &mut adj_freq);
                }
            } else if tlow * rf < 6 * len100ms * t {
                if t >= rf / 2_500_000 {
                    // begin-of-minute, ~500 ms active signal
                    gb.marker = Marker::Minute;
                    gb.value = BitValue::BeginOfMinute;
                    outch = '4';
                    framer.restart_minute();
                    framer.put(4);
                } else {
                    gb.value = BitValue::ZeroOne;
                    outch = '2';
                    framer.put(2);
                    let resume = self.bit.t;
                    self.collect_pulses(resume, src, gb, &mut log, &mut adj_freq);
                }
            } else {
                // bad radio signal, retain the previous buffer value
                gb.value = BitValue::Unknown;
                outch = '_';
                adj_freq = false;
            }
        }

        if !gb.bad_io {
            if self.init == Init::FirstBit {
                self.init = Init::Running;
            } else if gb.hwstat == HwStatus::Ok
                && (gb.marker == Marker::None || gb.marker == Marker::Minute)
            {
                let tlow = self.bit.tlow as i64;
                if framer.bitpos() == 59 && gb.value == BitValue::ZeroZero {
                    self.bit.bit59 += (tlow * 1_000_000 - self.bit.bit59) / 2;
                }
                if gb.value == BitValue::BeginOfMinute {
                    self.bit.bit0 += (tlow * 1_000_000 - self.bit.bit0) / 2;
                }

                // force sane reference lengths during e.g. a thunderstorm
                let avg = (self.bit.bit0 - self.bit.bit59) / 2;
                if 4 * self.bit.bit0 < 15 * self.bit.bit59 || 2 * self.bit.bit0 > 15 * self.bit.bit59
                {
                    self.reset_bitlen(&mut log);
                    adj_freq = false;
                }
                if self.bit.bit0 + avg < self.bit.realfreq / 2
                    || self.bit.bit0 - avg > self.bit.realfreq / 2
                {
                    self.reset_bitlen(&mut log);
                    adj_freq = false;
                }
                if self.bit.bit59 + avg < self.bit.realfreq / 10 {
                    self.reset_bitlen(&mut log);
                    adj_freq = false;
                }
            }
        }

        if adj_freq {
            self.bit.realfreq += (self.bit.t as i64 * 1_000_000 - self.bit.realfreq) / 20;
        }

        framer
            .add_duration((1_000_000u64 * self.bit.t as u64 / (self.bit.realfreq / 1000) as u64) as u32);

        let outch = if gb.bad_io {
            '*'
        } else {
            match gb.hwstat {
                HwStatus::Receive => 'r',
                HwStatus::Transmit => 'x',
                HwStatus::Random => '#',
                HwStatus::Ok => outch,
            }
        };
        if let Some(log) = log.as_deref_mut() {
            log.record(outch);
            if gb.marker == Marker::Minute || gb.marker == Marker::Late {
                log.record_acc_minlen(framer.acc_minlen());
            }
        }
        if gb.marker == Marker::Minute || gb.marker == Marker::Late {
            framer.set_cutoff(
                (self.bit.t as i64 * 1_000_000 / (self.bit.realfreq / 10_000)) as i32,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FREQ: u32 = 1000;

    struct FakePulse {
        samples: Vec<Pulse>,
        at: usize,
    }

    impl FakePulse {
        // build a sample stream from (level, count) runs
        fn from_runs(runs: &[(Pulse, usize)]) -> Self {
            let mut samples = Vec::new();
            for &(level, count) in runs {
                samples.extend(std::iter::repeat(level).take(count));
            }
            FakePulse { samples, at: 0 }
        }
    }

    impl PulseSource for FakePulse {
        fn read_sample(&mut self) -> Pulse {
            let sample = self.samples.get(self.at).copied().unwrap_or(Pulse::Fault);
            self.at += 1;
            sample
        }
    }

    const H: Pulse = Pulse::High;
    const L: Pulse = Pulse::Low;

    #[test]
    fn test_bit_symbols() {
        // 100 ms, 200 ms, 300 ms, 500 ms active parts at 1 kHz
        let mut src = FakePulse::from_runs(&[
            (H, 100),
            (L, 900),
            (H, 200),
            (L, 800),
            (H, 300),
            (L, 700),
            (H, 500),
            (L, 500),
            (H, 60),
        ]);
        let mut sampler = BitSampler::new(FREQ);
        let mut framer = Framer::new();
        let mut gb = BitResult::default();

        let mut seen = Vec::new();
        for _ in 0..4 {
            sampler.get_bit(&mut src, &mut framer, &mut gb, None);
            assert!(!gb.bad_io);
            assert_eq!(HwStatus::Ok, gb.hwstat);
            seen.push(gb.value);
            framer.next_bit(&mut gb);
        }

        assert_eq!(
            vec![
                BitValue::ZeroZero,
                BitValue::OneZero,
                BitValue::OneOne,
                BitValue::BeginOfMinute
            ],
            seen
        );
        // the begin-of-minute second rewound the cursor to 0 and next_bit
        // moved it to 1
        assert_eq!(1, framer.bitpos());
        assert_eq!(4, framer.buffer()[0]);
        assert_eq!(1, framer.buffer()[1]);
        assert_eq!(3, framer.buffer()[2]);

        // roughly four seconds of signal were accounted for
        assert!(
            framer.acc_minlen() >= 3900 && framer.acc_minlen() <= 4400,
            "acc_minlen {}",
            framer.acc_minlen()
        );
        // minute boundary recorded a duration ratio near nominal
        assert!(framer.cutoff() > 0);
    }

    #[test]
    fn test_split_bit() {
        // 100 ms active, 150 ms pause, 100 ms active: a 01 split second
        let mut src = FakePulse::from_runs(&[
            (H, 100),
            (L, 150),
            (H, 100),
            (L, 650),
            (H, 60),
        ]);
        let mut sampler = BitSampler::new(FREQ);
        let mut framer = Framer::new();
        let mut gb = BitResult::default();

        sampler.get_bit(&mut src, &mut framer, &mut gb, None);
        assert!(!gb.bad_io);
        assert_eq!(HwStatus::Ok, gb.hwstat);
        assert_eq!(BitValue::ZeroOne, gb.value);
        assert_eq!(2, framer.buffer()[0]);
        // the sampler re-entered and consumed the rest of the second
        assert!(sampler.bit_info().t > 900, "t = {}", sampler.bit_info().t);
    }

    #[test]
    fn test_timeout_classifies_random() {
        // the level drops mid-second and nothing ever starts a new one
        let mut src = FakePulse::from_runs(&[(H, 700), (L, 1000)]);
        let mut sampler = BitSampler::new(FREQ);
        let mut framer = Framer::new();
        let mut gb = BitResult::default();

        sampler.get_bit(&mut src, &mut framer, &mut gb, None);
        assert!(!gb.bad_io);
        assert_eq!(HwStatus::Random, gb.hwstat);
        assert_eq!(BitValue::Unknown, gb.value);
    }

    #[test]
    fn test_timeout_classifies_transmit() {
        // high for over 99% of the timeout window: transmitter stuck on
        let mut src = FakePulse::from_runs(&[(H, 1440), (L, 300)]);
        let mut sampler = BitSampler::new(FREQ);
        let mut framer = Framer::new();
        let mut gb = BitResult::default();

        sampler.get_bit(&mut src, &mut framer, &mut gb, None);
        assert!(!gb.bad_io);
        assert_eq!(HwStatus::Transmit, gb.hwstat);
    }

    #[test]
    fn test_read_fault_sets_bad_io() {
        let mut src = FakePulse::from_runs(&[]);
        let mut sampler = BitSampler::new(FREQ);
        let mut framer = Framer::new();
        let mut gb = BitResult::default();

        sampler.get_bit(&mut src, &mut framer, &mut gb, None);
        assert!(gb.bad_io);
        assert_eq!(BitValue::Unknown, gb.value);
    }

    #[test]
    fn test_filter_constant() {
        // a = 10⁹·(1 − 2^(−20/freq))
        let sampler = BitSampler::new(1000);
        assert!(sampler.a > 13_000_000 && sampler.a < 14_500_000, "a = {}", sampler.a);
        // 50% step response in freq/20 samples regardless of rate
        let fast = BitSampler::new(10_000);
        assert!(fast.a < sampler.a);
    }
}
