use std::error;
use std::fmt;

use crate::hih6130::Status;

/// Errors returned by the sensor drivers.
#[derive(Debug)]
pub enum Error {
    /// `/dev/i2c-N` could not be opened or the slave address could not be set.
    BusOpen {
        bus: u8,
        address: u16,
        source: rppal::i2c::Error,
    },
    /// A transfer on an open device failed. `register` is `None` for
    /// register-less transfers (plain reads/writes, quick command).
    BusTransfer {
        register: Option<u8>,
        source: rppal::i2c::Error,
    },
    /// The humidity sensor never reported a usable status.
    SensorNotReady(Status),
    /// A calibration word read back as 0x0000 or 0xFFFF.
    InvalidCalibration { register: u8, value: u16 },
    /// The calibration constants produce a zero divisor.
    DegenerateCalibration,
    /// The sensor answered a command-mode request without a positive acknowledge.
    CommandRejected(u8),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn transfer(register: u8, source: rppal::i2c::Error) -> Self {
        Error::BusTransfer {
            register: Some(register),
            source,
        }
    }

    pub(crate) fn raw_transfer(source: rppal::i2c::Error) -> Self {
        Error::BusTransfer {
            register: None,
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BusOpen {
                bus,
                address,
                source,
            } => write!(
                f,
                "error while opening /dev/i2c-{} for slave {:#04x}: {}",
                bus, address, source
            ),
            Error::BusTransfer {
                register: Some(register),
                source,
            } => write!(f, "transfer at register {:#04x} failed: {}", register, source),
            Error::BusTransfer {
                register: None,
                source,
            } => write!(f, "transfer failed: {}", source),
            Error::SensorNotReady(status) => write!(f, "sensor not ready (status: {})", status),
            Error::InvalidCalibration { register, value } => write!(
                f,
                "calibration word at {:#04x} reads {:#06x}",
                register, value
            ),
            Error::DegenerateCalibration => write!(f, "calibration constants divide by zero"),
            Error::CommandRejected(response) => {
                write!(f, "command rejected (response {:#04x})", response)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::BusOpen { source, .. } | Error::BusTransfer { source, .. } => Some(source),
            _ => None,
        }
    }
}
