//! Honeywell HumidIcon HIH6130/6131 humidity and temperature sensor.
//!
//! The sensor has no register map. A zero-length write requests a
//! measurement, and every byte read back starts with a two-bit status. Data
//! is only fetched once the status has been polled, and the scale factors are
//! fixed datasheet literals (there is no per-part calibration).

use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::bus::{Session, Transport};
use crate::error::{Error, Result};
use crate::structs::{HumidityFrame, HumidityReading};

pub const DEFAULT_ADDRESS: u16 = 0x27;

pub const POLL_ATTEMPTS: u8 = 10;
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

const STATUS_MASK: u8 = 0xC0;
const RAW_MASK: u16 = 0x3FFF;

// 2^14 - 2
const FULL_SCALE: f32 = 16382.0;
const HUMIDITY_DIVISOR: f32 = 163.82;

// Command mode
const CMD_START_COMMAND_MODE: u8 = 0xA0;
const CMD_START_NORMAL_MODE: u8 = 0x80;
const CMD_EEPROM_WRITE_OFFSET: u8 = 0x40;
const RESPONSE_ACK_MASK: u8 = 0x03;
const RESPONSE_ACK: u8 = 0x01;
const EEPROM_READ_TIME: Duration = Duration::from_micros(100);
const EEPROM_WRITE_TIME: Duration = Duration::from_millis(12);

/// Status bits, the top two bits of the first byte of every transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Fresh data.
    Normal = 0,
    /// Data already fetched since the last measurement cycle.
    Stale = 1,
    CommandMode = 2,
    Diagnostic = 3,
}

impl Status {
    pub fn from_byte(byte: u8) -> Self {
        match byte >> 6 {
            0 => Status::Normal,
            1 => Status::Stale,
            2 => Status::CommandMode,
            _ => Status::Diagnostic,
        }
    }

    /// Normal and stale data can be decoded.
    pub fn is_usable(self) -> bool {
        matches!(self, Status::Normal | Status::Stale)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Normal => "normal",
            Status::Stale => "stale data",
            Status::CommandMode => "command mode",
            Status::Diagnostic => "diagnostic",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Last status observed.
    pub status: Status,
    pub attempts: u8,
}

/// Polls until `poll` reports `target` or `max_attempts` polls have been made,
/// sleeping `interval` between attempts.
///
/// Running out of attempts is not an error: the last observed status is
/// returned and the caller decides whether it is usable.
pub fn poll_status<P, S>(
    mut poll: P,
    target: Status,
    max_attempts: u8,
    interval: Duration,
    mut sleep: S,
) -> Result<PollOutcome>
where
    P: FnMut() -> Result<Status>,
    S: FnMut(Duration),
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        let status = poll()?;
        trace!("poll {}/{}: {}", attempts, max_attempts, status);
        if status == target || attempts == max_attempts {
            return Ok(PollOutcome { status, attempts });
        }
        sleep(interval);
    }
}

/// 14-bit humidity code to %RH.
pub fn humidity_from_raw(raw: u16) -> f32 {
    f32::from(raw & RAW_MASK) / HUMIDITY_DIVISOR
}

/// 14-bit temperature code to °C.
pub fn temperature_from_raw(raw: u16) -> f32 {
    f32::from(raw & RAW_MASK) / FULL_SCALE * 165.0 - 40.0
}

/// Packs a humidity threshold the way the alarm registers store it, MSB first.
pub fn encode_humidity(humidity: f32) -> [u8; 2] {
    let raw = (humidity * HUMIDITY_DIVISOR)
        .round()
        .max(0.0)
        .min(f32::from(RAW_MASK)) as u16;
    raw.to_be_bytes()
}

/// Inverse of [`encode_humidity`]. Status bits in the MSB are ignored.
pub fn decode_humidity(bytes: [u8; 2]) -> f32 {
    humidity_from_raw(u16::from_be_bytes(bytes))
}

/// Humidity alarm thresholds in the sensor EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmRegister {
    HighOn = 0x18,
    HighOff = 0x19,
    LowOn = 0x1A,
    LowOff = 0x1B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hih6130Config {
    pub address: u16,
    pub poll_attempts: u8,
    pub poll_interval: Duration,
}

impl Hih6130Config {
    pub fn with_address(self, address: u16) -> Self {
        Hih6130Config { address, ..self }
    }
}

impl Default for Hih6130Config {
    fn default() -> Self {
        Hih6130Config {
            address: DEFAULT_ADDRESS,
            poll_attempts: POLL_ATTEMPTS,
            poll_interval: POLL_INTERVAL,
        }
    }
}

pub struct Hih6130<T: Transport> {
    transport: T,
    config: Hih6130Config,
}

impl<T: Transport> Hih6130<T> {
    pub fn new(transport: T, config: Hih6130Config) -> Self {
        Hih6130 { transport, config }
    }

    pub fn config(&self) -> &Hih6130Config {
        &self.config
    }

    /// Requests a measurement and returns the status the poll ended on.
    pub fn read_status(&self) -> Result<Status> {
        let mut session = self.transport.open(self.config.address)?;
        session.write_quick()?;
        Ok(self.poll(&mut session, Status::Normal)?.status)
    }

    /// Requests a measurement, waits for the status and fetches the frame.
    ///
    /// In command mode or a diagnostic condition nothing is read and the
    /// frame is zero-filled.
    pub fn measure(&self) -> Result<HumidityFrame> {
        let mut session = self.transport.open(self.config.address)?;
        session.write_quick()?;
        let outcome = self.poll(&mut session, Status::Normal)?;

        let mut data = [0u8; 4];
        if outcome.status.is_usable() {
            session.read(&mut data)?;
            data[0] &= !STATUS_MASK;
        } else {
            warn!("HIH6130 is in {}, no data read", outcome.status);
        }

        Ok(HumidityFrame {
            status: outcome.status,
            data,
            attempts: outcome.attempts,
        })
    }

    /// Humidity and temperature together with the status they were read under.
    pub fn read_values(&self) -> Result<HumidityReading> {
        let frame = self.measure()?;
        let reading = HumidityReading {
            status: frame.status,
            humidity: humidity_from_raw(frame.raw_humidity()),
            temperature: temperature_from_raw(frame.raw_temperature()),
        };
        debug!(
            "HIH6130 {:02x?} -> {:.2} %RH, {:.2} C ({})",
            frame.data, reading.humidity, reading.temperature, reading.status
        );
        Ok(reading)
    }

    /// Humidity in %RH, or `SensorNotReady` if the status is not usable.
    pub fn read_humidity(&self) -> Result<f32> {
        self.usable_values().map(|r| r.humidity)
    }

    /// Temperature in °C, or `SensorNotReady` if the status is not usable.
    pub fn read_temperature(&self) -> Result<f32> {
        self.usable_values().map(|r| r.temperature)
    }

    /// Reads an alarm threshold in %RH.
    ///
    /// The sensor only accepts command mode within 10 ms of power-on; later
    /// attempts come back without an acknowledge and fail with
    /// `CommandRejected`.
    pub fn read_alarm(&self, register: AlarmRegister) -> Result<f32> {
        let mut session = self.transport.open(self.config.address)?;
        session.write_block(CMD_START_COMMAND_MODE, &[0, 0])?;
        let word = Self::command_read(&mut session, register as u8);
        let exit = session.write_block(CMD_START_NORMAL_MODE, &[0, 0]);
        let word = word?;
        exit?;
        Ok(decode_humidity(word))
    }

    /// Programs an alarm threshold in %RH. Same power-on window as
    /// [`read_alarm`](Self::read_alarm).
    pub fn write_alarm(&self, register: AlarmRegister, humidity: f32) -> Result<()> {
        let mut session = self.transport.open(self.config.address)?;
        session.write_block(CMD_START_COMMAND_MODE, &[0, 0])?;
        let written = Self::command_write(
            &mut session,
            register as u8 + CMD_EEPROM_WRITE_OFFSET,
            encode_humidity(humidity),
        );
        let exit = session.write_block(CMD_START_NORMAL_MODE, &[0, 0]);
        written?;
        exit
    }

    fn usable_values(&self) -> Result<HumidityReading> {
        let reading = self.read_values()?;
        if !reading.is_usable() {
            return Err(Error::SensorNotReady(reading.status));
        }
        Ok(reading)
    }

    fn poll(&self, session: &mut T::Session, target: Status) -> Result<PollOutcome> {
        let session = RefCell::new(session);
        let outcome = poll_status(
            || session.borrow_mut().read_byte().map(Status::from_byte),
            target,
            self.config.poll_attempts,
            self.config.poll_interval,
            |interval| session.borrow_mut().delay(interval),
        )?;
        if outcome.status != target {
            warn!(
                "HIH6130 status {} after {} attempts, wanted {}",
                outcome.status, outcome.attempts, target
            );
        }
        Ok(outcome)
    }

    fn command_read(session: &mut T::Session, command: u8) -> Result<[u8; 2]> {
        session.write_block(command, &[0, 0])?;
        session.delay(EEPROM_READ_TIME);
        let mut response = [0u8; 3];
        session.read(&mut response)?;
        check_response(response[0])?;
        Ok([response[1], response[2]])
    }

    fn command_write(session: &mut T::Session, command: u8, word: [u8; 2]) -> Result<()> {
        session.write_block(command, &word)?;
        session.delay(EEPROM_WRITE_TIME);
        check_response(session.read_byte()?)
    }
}

fn check_response(response: u8) -> Result<()> {
    if Status::from_byte(response) != Status::CommandMode
        || response & RESPONSE_ACK_MASK != RESPONSE_ACK
    {
        return Err(Error::CommandRejected(response));
    }
    Ok(())
}
