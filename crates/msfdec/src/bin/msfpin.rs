//! Raw GPIO probe
//!
//! Reads the configured pin at the configured sampling rate and prints
//! one character per sample: `1` carrier present, `0` carrier absent,
//! `*` read fault, with a newline every second. Useful for checking the
//! wiring and the `activehigh` polarity before decoding anything.

use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;

use msfold::{GpioPulse, HardwareConfig, Pulse, PulseSource};

#[derive(Parser, Debug)]
#[command(version)]
#[command(about = "Print raw samples from the configured MSF input pin")]
struct Args {
    /// Hardware configuration (JSON)
    config: PathBuf,

    /// Stop after this many seconds (default: run until interrupted)
    #[arg(short, long)]
    seconds: Option<u64>,
}

fn main() {
    let args = Args::parse();

    let config = match HardwareConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("msfpin: {}", e);
            std::process::exit(65);
        }
    };
    let mut gpio = match GpioPulse::open(&config) {
        Ok(gpio) => gpio,
        Err(e) => {
            eprintln!("msfpin: {}", e);
            std::process::exit(74);
        }
    };

    let period = Duration::from_nanos(1_000_000_000 / config.freq as u64);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut second: u64 = 0;
    loop {
        for _ in 0..config.freq {
            let ch = match gpio.read_sample() {
                Pulse::High => b'1',
                Pulse::Low => b'0',
                Pulse::Fault => b'*',
            };
            if out.write_all(&[ch]).is_err() {
                return;
            }
            thread::sleep(period);
        }
        let _ = out.write_all(b"\n");
        let _ = out.flush();

        second += 1;
        if args.seconds.map_or(false, |limit| second >= limit) {
            return;
        }
    }
}
