//! Session log reading and writing
//!
//! Every decoded second is recorded as a single 7-bit ASCII character, so
//! a session can be replayed later, bit for bit, through the same decoder.
//! The characters are the bit digits `0`–`4`, `_` for an undecodable
//! second, the hardware marks `x` `r` `#` `*`, the calibration marks `<`
//! `>` `!`, a newline between minutes, and `a<ms>` records carrying the
//! accumulated minute length in milliseconds.
//!
//! The reader tolerates CR/CRLF line endings and skips anything else; the
//! writer emits each character as one short write so that a concurrent
//! flusher never splits a record.

use std::fs::OpenOptions;
use std::io::{BufRead, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use arrayvec::ArrayVec;

#[cfg(not(test))]
use log::warn;

#[cfg(test)]
use std::println as warn;

use super::framer::Framer;
use super::output::{BitResult, BitValue, Marker};

/// Characters that form the log syntax; everything else is skipped
const RECORD_SET: &[u8] = b"012345\nxr#*_a";

/// Session header written when a log is opened for append
const SESSION_HEADER: &[u8] = b"\n--new log--\n\n";

/// Seconds between background flushes of a live log
const FLUSH_PERIOD: Duration = Duration::from_secs(60);

type SharedSink = Arc<Mutex<BufWriter<Box<dyn Write + Send>>>>;

/// Append-only session log
///
/// In live mode the log is flushed once per minute by a background thread;
/// the thread only ever calls flush, and each record is written under the
/// lock in a single operation, so records stay whole. Dropping the writer
/// stops and joins the flusher.
pub struct LogWriter {
    sink: SharedSink,
    stop: Option<Arc<(Mutex<bool>, Condvar)>>,
    flusher: Option<JoinHandle<()>>,
}

impl LogWriter {
    /// Open `path` for append, write the session header, start the flusher
    pub fn append<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = LogWriter::to_writer(Box::new(file));

        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let sink = Arc::clone(&writer.sink);
        let thread_stop = Arc::clone(&stop);
        let flusher = std::thread::spawn(move || {
            let (lock, condvar) = &*thread_stop;
            let mut stopped = lock.lock().expect("flusher lock poisoned");
            loop {
                let (guard, _timeout) = condvar
                    .wait_timeout(stopped, FLUSH_PERIOD)
                    .expect("flusher lock poisoned");
                stopped = guard;
                if *stopped {
                    return;
                }
                if let Ok(mut sink) = sink.lock() {
                    let _ = sink.flush();
                }
            }
        });

        writer.stop = Some(stop);
        writer.flusher = Some(flusher);
        Ok(writer)
    }

    /// Wrap an arbitrary sink; no background flusher
    ///
    /// Writes the session header like [`append`](LogWriter::append) does.
    pub fn to_writer(sink: Box<dyn Write + Send>) -> Self {
        let mut sink = BufWriter::new(sink);
        if let Err(e) = sink.write_all(SESSION_HEADER) {
            warn!("cannot write session header: {}", e);
        }
        LogWriter {
            sink: Arc::new(Mutex::new(sink)),
            stop: None,
            flusher: None,
        }
    }

    /// Record a single log character
    pub fn record(&mut self, ch: char) {
        let buf = [ch as u8];
        self.write_record(&buf);
    }

    /// Record an accumulated minute length, `a<ms>` and a newline
    pub fn record_acc_minlen(&mut self, acc_minlen: u32) {
        let mut buf = ArrayVec::<u8, 12>::new();
        let _ = write!(&mut buf, "a{}\n", acc_minlen);
        self.write_record(&buf);
    }

    fn write_record(&mut self, record: &[u8]) {
        match self.sink.lock() {
            Ok(mut sink) => {
                if let Err(e) = sink.write_all(record) {
                    warn!("cannot write to session log: {}", e);
                }
            }
            Err(_) => warn!("session log lock poisoned; record dropped"),
        }
    }

    /// Stop the flusher and flush whatever is buffered
    pub fn close(mut self) -> std::io::Result<()> {
        self.shutdown();
        match self.sink.lock() {
            Ok(mut sink) => sink.flush(),
            Err(_) => Ok(()),
        }
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let (lock, condvar) = &*stop;
            if let Ok(mut stopped) = lock.lock() {
                *stopped = true;
            }
            condvar.notify_all();
        }
        if let Some(flusher) = self.flusher.take() {
            let _ = flusher.join();
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        self.shutdown();
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.flush();
        }
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("flusher", &self.flusher.is_some())
            .finish()
    }
}

/// Replays a session log one record at a time
///
/// Each call to [`get_bit`](LogReader::get_bit) consumes one record and
/// produces the same [`BitResult`] the live sampler would have produced,
/// with synthetic durations for logs that predate `a` records. A
/// one-record look-ahead detects minute boundaries that follow the last
/// bit of an under-length minute and asks the framer to step back one
/// position before the boundary is processed.
pub struct LogReader {
    input: Box<dyn BufRead>,
    pushback: Option<u8>,
    // once an `a` record has been seen, synthetic durations stop
    acc_driven: bool,
}

impl LogReader {
    pub fn new(input: Box<dyn BufRead>) -> Self {
        LogReader {
            input,
            pushback: None,
            acc_driven: false,
        }
    }

    fn getc(&mut self) -> Option<u8> {
        if let Some(c) = self.pushback.take() {
            return Some(c);
        }
        let mut buf = [0u8; 1];
        match self.input.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            Ok(_) => None,
            Err(e) => {
                warn!("log read error treated as end of input: {}", e);
                None
            }
        }
    }

    // Skip to the next character of the record set, folding CR and CRLF
    // into a plain newline.
    fn next_record(&mut self) -> Option<u8> {
        let mut prev: Option<u8> = None;
        loop {
            let mut c = self.getc()?;
            if prev == Some(b'\r') && c != b'\n' {
                self.pushback = Some(c);
                c = b'\n';
            }
            if RECORD_SET.contains(&c) {
                return Some(c);
            }
            prev = Some(c);
        }
    }

    // Up-to-ten-digit decimal accumulator following an `a`
    fn scan_acc_minlen(&mut self) -> Option<u32> {
        let mut digits = ArrayVec::<u8, 10>::new();
        while digits.len() < digits.capacity() {
            match self.getc() {
                Some(c) if c.is_ascii_digit() => digits.push(c),
                Some(c) => {
                    self.pushback = Some(c);
                    break;
                }
                None => break,
            }
        }
        if digits.is_empty() {
            return None;
        }
        let value = digits
            .iter()
            .fold(0u64, |acc, &d| acc * 10 + (d - b'0') as u64);
        Some(value.min(u32::MAX as u64) as u32)
    }

    /// Consume one log record
    pub fn get_bit(&mut self, framer: &mut Framer, gb: &mut BitResult) {
        if !gb.skip {
            framer.set_cutoff(-1);
        }
        gb.begin_second();

        let inch = match self.next_record() {
            Some(c) => c,
            None => {
                gb.done = true;
                return;
            }
        };

        // synthetic duration for logs that do not store acc_minlen
        let mut duration_ms: u32 = 0;
        match inch {
            b'0'..=b'4' => {
                let value = inch - b'0';
                framer.put(value);
                gb.value = match value {
                    0 => BitValue::ZeroZero,
                    1 => BitValue::OneZero,
                    2 => BitValue::ZeroOne,
                    3 => BitValue::OneOne,
                    _ => BitValue::BeginOfMinute,
                };
                duration_ms = 1000;
                if inch == b'4' {
                    if gb.marker == Marker::None {
                        gb.marker = Marker::Minute;
                    } else if gb.marker == Marker::TooLong {
                        gb.marker = Marker::Late;
                    }
                }
            }
            b'x' => {
                gb.hwstat = super::output::HwStatus::Transmit;
                duration_ms = 1500;
            }
            b'r' => {
                gb.hwstat = super::output::HwStatus::Receive;
                duration_ms = 1500;
            }
            b'#' => {
                gb.hwstat = super::output::HwStatus::Random;
                duration_ms = 1500;
            }
            b'*' => {
                gb.bad_io = true;
            }
            b'_' => {
                // retain the previous buffer value
                gb.value = BitValue::Unknown;
                duration_ms = 1000;
            }
            b'a' => {
                gb.skip = true;
                match self.scan_acc_minlen() {
                    Some(acc) => {
                        framer.set_acc_minlen(acc);
                        self.acc_driven = true;
                    }
                    None => gb.done = true,
                }
            }
            // '5' is reserved and '\n' only separates minutes
            _ => {}
        }

        if !self.acc_driven {
            framer.add_duration(duration_ms);
        }

        // Read ahead one record to check whether a minute boundary is
        // coming. This prevents a too-long or late marker being reported
        // one bit early for an under-length minute.
        match self.next_record() {
            Some(ahead) => {
                if framer.stepback_idle()
                    && framer.bitpos() > 0
                    && inch != b'\n'
                    && (ahead == b'\n' || ahead == b'a')
                {
                    framer.arm_stepback();
                }
                self.pushback = Some(ahead);
            }
            None => gb.done = true,
        }
    }
}

impl std::fmt::Debug for LogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReader")
            .field("acc_driven", &self.acc_driven)
            .finish()
    }
}
