//! Userspace I2C transport.
//!
//! A [`Transport`] opens a [`Session`] bound to one slave address. The session
//! owns the device handle and closes it when dropped, so every read cycle
//! releases the bus on all exit paths, including early `?` returns.

use std::io;
use std::thread;
use std::time::Duration;

use log::trace;
use rppal::i2c::I2c;

use crate::error::{Error, Result};

/// Opens device sessions on one bus.
pub trait Transport {
    type Session: Session;

    fn open(&self, address: u16) -> Result<Self::Session>;
}

/// Transfer primitives on an open device handle.
///
/// Word reads are returned big-endian: the SMBus word is byte-swapped exactly
/// once by the implementation.
pub trait Session {
    /// Receives one byte without sending a register first.
    fn read_byte(&mut self) -> Result<u8>;

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()>;

    fn read_word(&mut self, register: u8) -> Result<u16>;

    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<()>;

    fn write_block(&mut self, register: u8, bytes: &[u8]) -> Result<()>;

    /// Plain read, no register.
    fn read(&mut self, buffer: &mut [u8]) -> Result<()>;

    /// Plain write, no register.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Zero-length write: address + W bit, then stop.
    fn write_quick(&mut self) -> Result<()>;

    /// Blocks for a sensor settle time.
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// `/dev/i2c-<bus>` through rppal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinuxBus {
    bus: u8,
}

impl LinuxBus {
    pub fn new(bus: u8) -> Self {
        LinuxBus { bus }
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }
}

impl Transport for LinuxBus {
    type Session = LinuxSession;

    fn open(&self, address: u16) -> Result<LinuxSession> {
        let open_error = |source| Error::BusOpen {
            bus: self.bus,
            address,
            source,
        };

        let mut i2c = I2c::with_bus(self.bus).map_err(open_error)?;
        i2c.set_slave_address(address).map_err(open_error)?;
        trace!("opened /dev/i2c-{} at {:#04x}", self.bus, address);

        Ok(LinuxSession { i2c })
    }
}

/// An open rppal handle. The file descriptor is closed on drop.
pub struct LinuxSession {
    i2c: I2c,
}

fn short_transfer(expected: usize, actual: usize) -> rppal::i2c::Error {
    rppal::i2c::Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("transferred {} of {} bytes", actual, expected),
    ))
}

impl Session for LinuxSession {
    fn read_byte(&mut self) -> Result<u8> {
        self.i2c.smbus_receive_byte().map_err(Error::raw_transfer)
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .smbus_write_byte(register, value)
            .map_err(|e| Error::transfer(register, e))
    }

    fn read_word(&mut self, register: u8) -> Result<u16> {
        // SMBus words arrive low byte first; the sensors send MSB first.
        self.i2c
            .smbus_read_word(register)
            .map(u16::swap_bytes)
            .map_err(|e| Error::transfer(register, e))
    }

    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<()> {
        self.i2c
            .block_read(register, buffer)
            .map_err(|e| Error::transfer(register, e))
    }

    fn write_block(&mut self, register: u8, bytes: &[u8]) -> Result<()> {
        self.i2c
            .block_write(register, bytes)
            .map_err(|e| Error::transfer(register, e))
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let count = self.i2c.read(buffer).map_err(Error::raw_transfer)?;
        if count != buffer.len() {
            return Err(Error::raw_transfer(short_transfer(buffer.len(), count)));
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let count = self.i2c.write(bytes).map_err(Error::raw_transfer)?;
        if count != bytes.len() {
            return Err(Error::raw_transfer(short_transfer(bytes.len(), count)));
        }
        Ok(())
    }

    fn write_quick(&mut self) -> Result<()> {
        self.i2c.smbus_quick_command(false).map_err(Error::raw_transfer)
    }
}
