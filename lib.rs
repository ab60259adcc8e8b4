//! Userspace I2C drivers for a Raspberry Pi style Linux board.
//!
//! - [`bmp085`]: Bosch BMP085/BMP180 pressure sensor with the datasheet's
//!   fixed-point compensation.
//! - [`hih6130`]: Honeywell HIH6130/6131 humidity sensor with status-gated
//!   reads and alarm threshold access.
//! - [`eeprom`]: Microchip 24AAxxx serial EEPROM.
//!
//! Every read opens its own [`Session`] on the bus and closes it before
//! returning.

pub mod bmp085;
pub mod bus;
pub mod eeprom;
mod error;
pub mod hih6130;
mod structs;

pub use bmp085::{Bmp085, Bmp085Config, Oversampling};
pub use bus::{LinuxBus, LinuxSession, Session, Transport};
pub use eeprom::{Eeprom24aa, EepromConfig};
pub use error::{Error, Result};
pub use hih6130::{AlarmRegister, Hih6130, Hih6130Config, Status};
pub use structs::{
    Calibration, CompensatedTemperature, HumidityFrame, HumidityReading, PhysicalReading,
};
