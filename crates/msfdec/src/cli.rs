use std::fmt::Display;
use std::path::PathBuf;

use clap::{error::ErrorKind, CommandFactory, Parser};

/// Standard input filename
pub const STDIN_FILE: &str = "-";

/// sysexits-style exit categories
pub const EX_USAGE: i32 = 64;
pub const EX_DATAERR: i32 = 65;
pub const EX_IOERR: i32 = 74;

const USAGE_LONG: &str = r#"
Decodes the NPL MSF 60 kHz time broadcast, either live from a GPIO pin carrying a demodulated carrier-present signal, or offline from a session log recorded by an earlier run.

Live decoding needs a JSON hardware configuration:

    { "pin": 17, "activehigh": true, "freq": 1000 }

    msfdec --config hardware.json --logfile session.log

Offline replay reads the single-character-per-second log format back through the identical pipeline:

    msfdec --file session.log
    cat session.log | msfdec --file -

With --settime the host clock is set once a minute decodes with every check clean; this normally needs elevated privileges.
"#;

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about = "Decode the NPL MSF 60 kHz time broadcast")]
#[command(long_about = None)]
#[command(after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print only decoded minutes, no per-bit display
    #[arg(short, long)]
    pub quiet: bool,

    /// Replay a recorded session log (or "-" for stdin)
    #[arg(long, value_name = "LOG", conflicts_with = "config")]
    pub file: Option<String>,

    /// Hardware configuration (JSON) for live decoding
    #[arg(long, value_name = "JSON", required_unless_present = "file")]
    pub config: Option<PathBuf>,

    /// Append a session log while decoding live
    #[arg(long, value_name = "PATH", requires = "config")]
    pub logfile: Option<PathBuf>,

    /// Set the system clock from safely decoded minutes
    #[arg(long)]
    pub settime: bool,
}

impl Args {
    /// True if the user requests replay from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file.as_deref() == Some(STDIN_FILE)
    }
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Wrap an I/O error, preserving the OS errno when there is one
    pub fn io(error: std::io::Error, context: &str) -> CliError {
        let code = error.raw_os_error().unwrap_or(EX_IOERR);
        CliError::new(
            anyhow::Error::new(error).context(context.to_string()),
            code,
        )
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { EX_USAGE } else { 0 };
        CliError::new(err.into(), code)
    }
}

impl From<msfold::ConfigError> for CliError {
    fn from(err: msfold::ConfigError) -> CliError {
        let code = match &err {
            msfold::ConfigError::Io(io) => io.raw_os_error().unwrap_or(EX_IOERR),
            _ => EX_DATAERR,
        };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_modes_conflict() {
        assert!(Args::try_parse_from(["msfdec", "--file", "x", "--config", "y"]).is_err());
        assert!(Args::try_parse_from(["msfdec"]).is_err());
        assert!(Args::try_parse_from(["msfdec", "--file", "-"]).is_ok());
        assert!(Args::try_parse_from(["msfdec", "--config", "hw.json", "--settime"]).is_ok());
        // a session log only makes sense while decoding live
        assert!(Args::try_parse_from(["msfdec", "--file", "x", "--logfile", "y"]).is_err());
    }
}
