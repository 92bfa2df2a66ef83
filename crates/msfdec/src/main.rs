use std::io;

use anyhow::anyhow;
use clap::Parser;
use log::{info, LevelFilter};

use msfold::{
    BitSampler, BitSource, GpioPulse, HardwareConfig, LogReader, LogWriter, LoopControl,
    Receiver, SystemClock,
};

mod app;
mod cli;

use app::ConsoleHooks;
use cli::{Args, CliError};

fn main() {
    match msfdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn msfdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    let source = if args.file.is_some() {
        replay_setup(&args)?
    } else {
        live_setup(&args)?
    };

    let mut receiver = Receiver::new(source);
    if args.settime {
        receiver = receiver.with_clock(Box::new(SystemClock));
    }

    let mut hooks = ConsoleHooks::new(args.quiet);
    let mut ctl = LoopControl {
        logfilename: args.logfile.clone(),
        settime: args.settime,
        ..LoopControl::default()
    };
    receiver.run(&mut hooks, &mut ctl);

    Ok(())
}

fn log_setup(args: &Args) {
    if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("msfold", log_filter)
            .filter_module("msfdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn replay_setup(args: &Args) -> Result<BitSource, CliError> {
    let reader: Box<dyn io::BufRead> = if args.input_is_stdin() {
        info!("replaying session log from standard input");
        if is_terminal(&io::stdin()) {
            return Err(CliError::new(
                anyhow!(
                    "cowardly refusing to replay a session log from a terminal.

Pipe a recorded log into this program, or name it with --file."
                ),
                cli::EX_USAGE,
            ));
        }
        Box::new(io::stdin().lock())
    } else {
        let file = args.file.as_deref().unwrap_or(cli::STDIN_FILE);
        info!("replaying session log \"{}\"", file);
        Box::new(io::BufReader::new(
            std::fs::File::open(file)
                .map_err(|e| CliError::io(e, &format!("cannot open --file \"{}\"", file)))?,
        ))
    };
    Ok(BitSource::replay(LogReader::new(reader)))
}

fn live_setup(args: &Args) -> Result<BitSource, CliError> {
    let config_path = args
        .config
        .as_ref()
        .expect("clap guarantees --config in live mode");
    let config = HardwareConfig::from_file(config_path)?;
    info!(
        "decoding live from pin {} at {} Hz",
        config.pin, config.freq
    );

    let gpio = GpioPulse::open(&config)
        .map_err(|e| CliError::new(anyhow::Error::new(e).context("GPIO setup"), cli::EX_IOERR))?;

    let log = match &args.logfile {
        Some(path) => Some(
            LogWriter::append(path)
                .map_err(|e| CliError::io(e, "cannot open session log for append"))?,
        ),
        None => None,
    };

    Ok(BitSource::live(
        BitSampler::new(config.freq),
        Box::new(gpio),
        log,
    ))
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
