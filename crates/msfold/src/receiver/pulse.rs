//! Demodulated signal sources
//!
//! The external AM demodulator drives a single GPIO line: carrier present
//! or carrier absent, one sample per read. [`PulseSource`] is the seam the
//! sampler sees; the platform backends live behind it and the decoding
//! core never branches on the operating system.
//!
//! On Linux the pin is exported through sysfs and its `value` file is read
//! and rewound once per sample. On FreeBSD the pin is read with `GPIOGET`
//! on `/dev/gpioc<iodev>`.

use std::fmt;

use thiserror::Error;

use crate::config::HardwareConfig;

/// One demodulator sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pulse {
    /// Carrier absent
    Low,
    /// Carrier present
    High,
    /// The read failed; surfaces upstream as `bad_io`
    Fault,
}

/// A source of demodulator samples
///
/// `read_sample` must not block longer than one sampling interval; the
/// sampler owns the pacing between samples.
pub trait PulseSource {
    fn read_sample(&mut self) -> Pulse;
}

/// Error opening a GPIO pin
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("cannot set up GPIO pin {pin}: {source}")]
    Setup {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO input is not supported on this platform")]
    Unsupported,
}

/// GPIO-backed pulse source
///
/// Construction configures the pin as an input; each [`read_sample`]
/// performs one level read. Polarity is normalised here so that
/// [`Pulse::High`] always means carrier present.
///
/// [`read_sample`]: PulseSource::read_sample
pub struct GpioPulse {
    inner: backend::Gpio,
    active_high: bool,
}

impl GpioPulse {
    /// Export and configure the pin described by `cfg`
    pub fn open(cfg: &HardwareConfig) -> Result<Self, PulseError> {
        Ok(GpioPulse {
            inner: backend::Gpio::open(cfg)?,
            active_high: cfg.active_high,
        })
    }
}

impl PulseSource for GpioPulse {
    fn read_sample(&mut self) -> Pulse {
        match (self.inner.read_level(), self.active_high) {
            (Some(level), true) => level,
            (Some(Pulse::High), false) => Pulse::Low,
            (Some(Pulse::Low), false) => Pulse::High,
            (Some(Pulse::Fault), false) | (None, _) => Pulse::Fault,
        }
    }
}

impl fmt::Debug for GpioPulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpioPulse")
            .field("active_high", &self.active_high)
            .finish()
    }
}

#[cfg(target_os = "linux")]
mod backend {
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Seek, SeekFrom, Write};

    use log::warn;

    use super::{Pulse, PulseError};
    use crate::config::HardwareConfig;

    /// Sysfs GPIO handle: the pin's `value` file, rewound on every read
    pub struct Gpio {
        value: File,
    }

    impl Gpio {
        pub fn open(cfg: &HardwareConfig) -> Result<Self, PulseError> {
            let setup = |source| PulseError::Setup { pin: cfg.pin, source };

            // export is allowed to fail with EBUSY when the pin is
            // already exported from a previous run
            match OpenOptions::new()
                .write(true)
                .open("/sys/class/gpio/export")
                .and_then(|mut f| f.write_all(format!("{}", cfg.pin).as_bytes()))
            {
                Ok(()) => {}
                Err(e) if e.raw_os_error() == Some(libc::EBUSY) => {}
                Err(e) => return Err(setup(e)),
            }

            OpenOptions::new()
                .write(true)
                .open(format!("/sys/class/gpio/gpio{}/direction", cfg.pin))
                .and_then(|mut f| f.write_all(b"in"))
                .map_err(setup)?;

            let value = File::open(format!("/sys/class/gpio/gpio{}/value", cfg.pin))
                .map_err(setup)?;

            Ok(Gpio { value })
        }

        pub fn read_level(&mut self) -> Option<Pulse> {
            let mut buf = [0u8; 1];
            let level = match self.value.read(&mut buf) {
                Ok(1) => match buf[0] {
                    b'0' => Pulse::Low,
                    b'1' => Pulse::High,
                    other => {
                        warn!("unexpected GPIO value byte {:#04x}", other);
                        Pulse::Fault
                    }
                },
                _ => Pulse::Fault,
            };
            // rewind so the next read sees a fresh level
            if self.value.seek(SeekFrom::Start(0)).is_err() {
                return Some(Pulse::Fault);
            }
            Some(level)
        }
    }
}

#[cfg(target_os = "freebsd")]
mod backend {
    use std::fs::{File, OpenOptions};
    use std::os::fd::AsRawFd;

    use super::{Pulse, PulseError};
    use crate::config::HardwareConfig;

    const GPIO_PIN_INPUT: u32 = 0x0001;
    const GPIO_PIN_HIGH: u32 = 1;
    const GPIOMAXNAME: usize = 64;

    #[repr(C)]
    struct GpioPin {
        gp_pin: u32,
        gp_name: [u8; GPIOMAXNAME],
        gp_caps: u32,
        gp_flags: u32,
    }

    #[repr(C)]
    struct GpioReq {
        gp_pin: u32,
        gp_value: u32,
    }

    // FreeBSD ioccom.h encoding
    const IOC_IN: u64 = 0x8000_0000;
    const IOC_OUT: u64 = 0x4000_0000;
    const IOCPARM_MASK: u64 = (1 << 13) - 1;

    const fn ioc(inout: u64, group: u64, num: u64, len: usize) -> u64 {
        inout | ((len as u64 & IOCPARM_MASK) << 16) | (group << 8) | num
    }

    const GPIOSETCONFIG: u64 = ioc(IOC_IN, b'G' as u64, 2, std::mem::size_of::<GpioPin>());
    const GPIOGET: u64 = ioc(IOC_IN | IOC_OUT, b'G' as u64, 3, std::mem::size_of::<GpioReq>());

    /// `/dev/gpioc<N>` handle
    pub struct Gpio {
        dev: File,
        pin: u32,
    }

    impl Gpio {
        pub fn open(cfg: &HardwareConfig) -> Result<Self, PulseError> {
            let setup = |source| PulseError::Setup { pin: cfg.pin, source };
            let iodev = cfg.iodev.unwrap_or(0);

            let dev = OpenOptions::new()
                .read(true)
                .write(true)
                .open(format!("/dev/gpioc{}", iodev))
                .map_err(setup)?;

            let mut pin = GpioPin {
                gp_pin: cfg.pin,
                gp_name: [0; GPIOMAXNAME],
                gp_caps: 0,
                gp_flags: GPIO_PIN_INPUT,
            };
            if unsafe { libc::ioctl(dev.as_raw_fd(), GPIOSETCONFIG, &mut pin) } < 0 {
                return Err(setup(std::io::Error::last_os_error()));
            }

            Ok(Gpio { dev, pin: cfg.pin })
        }

        pub fn read_level(&mut self) -> Option<Pulse> {
            let mut req = GpioReq {
                gp_pin: self.pin,
                gp_value: 0,
            };
            if unsafe { libc::ioctl(self.dev.as_raw_fd(), GPIOGET, &mut req) } < 0 {
                return Some(Pulse::Fault);
            }
            Some(if req.gp_value == GPIO_PIN_HIGH {
                Pulse::High
            } else {
                Pulse::Low
            })
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
mod backend {
    use super::{Pulse, PulseError};
    use crate::config::HardwareConfig;

    /// Placeholder for platforms without a GPIO backend
    pub struct Gpio {}

    impl Gpio {
        pub fn open(_cfg: &HardwareConfig) -> Result<Self, PulseError> {
            Err(PulseError::Unsupported)
        }

        pub fn read_level(&mut self) -> Option<Pulse> {
            Some(Pulse::Fault)
        }
    }
}
