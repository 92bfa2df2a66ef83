//! Receiver hardware configuration
//!
//! Live decoding needs to know which GPIO pin carries the demodulated
//! signal, its polarity, and how often to sample it. The configuration is
//! a small JSON object read once at startup:
//!
//! ```json
//! {
//!   "pin": 17,
//!   "activehigh": true,
//!   "freq": 1000,
//!   "iodev": 0
//! }
//! ```
//!
//! `iodev` selects the `/dev/gpioc<N>` controller and is only meaningful on
//! FreeBSD. Missing keys and out-of-range values are data errors; nothing
//! is defaulted except `iodev`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Sampling rate bounds, inclusive
pub const FREQ_RANGE: (u32, u32) = (10, 120_000);

/// GPIO input description, read once at startup
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct HardwareConfig {
    /// GPIO pin number carrying the demodulated signal
    pub pin: u32,

    /// True if carrier-present reads as logic high
    #[serde(rename = "activehigh")]
    pub active_high: bool,

    /// Sampling rate in Hz; must be even and within [`FREQ_RANGE`]
    pub freq: u32,

    /// GPIO controller index (FreeBSD `/dev/gpioc<N>`)
    #[serde(default)]
    pub iodev: Option<u32>,
}

/// Error loading or validating a [`HardwareConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be opened or read
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON or a missing/mistyped key
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Keys present but values out of contract
    #[error("freq must be an even number between 10 and 120000 inclusive, got {0}")]
    BadFrequency(u32),
}

impl HardwareConfig {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let cfg: HardwareConfig = serde_json::from_reader(BufReader::new(file))?;
        cfg.validate()
    }

    /// Parse and validate a configuration from a JSON string
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: HardwareConfig = serde_json::from_str(text)?;
        cfg.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.freq < FREQ_RANGE.0 || self.freq > FREQ_RANGE.1 || self.freq % 2 == 1 {
            return Err(ConfigError::BadFrequency(self.freq));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let cfg = HardwareConfig::from_json(
            r#"{"pin": 17, "activehigh": false, "freq": 1000, "iodev": 2}"#,
        )
        .unwrap();
        assert_eq!(17, cfg.pin);
        assert!(!cfg.active_high);
        assert_eq!(1000, cfg.freq);
        assert_eq!(Some(2), cfg.iodev);
    }

    #[test]
    fn test_iodev_optional() {
        let cfg =
            HardwareConfig::from_json(r#"{"pin": 4, "activehigh": true, "freq": 250}"#).unwrap();
        assert_eq!(None, cfg.iodev);
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let err = HardwareConfig::from_json(r#"{"pin": 4, "freq": 250}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_frequency_bounds() {
        for (freq, ok) in [(10, true), (8, false), (251, false), (120000, true), (120002, false)] {
            let text = format!(r#"{{"pin": 4, "activehigh": true, "freq": {}}}"#, freq);
            let res = HardwareConfig::from_json(&text);
            assert_eq!(ok, res.is_ok(), "freq {}", freq);
            if !ok {
                assert!(matches!(res.unwrap_err(), ConfigError::BadFrequency(_)));
            }
        }
    }
}
