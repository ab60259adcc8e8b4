use crate::hih6130::Status;

/// BMP085 factory calibration, read from the EEPROM at 0xAA..=0xBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

/// Result of the temperature step. `b5` feeds the pressure step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompensatedTemperature {
    pub b5: i32,
    /// Temperature in 0.1 °C.
    pub deci_celsius: i32,
}

impl CompensatedTemperature {
    pub fn celsius(&self) -> f32 {
        self.deci_celsius as f32 / 10.0
    }
}

/// One read cycle. Quantities a sensor does not measure are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysicalReading {
    /// °C
    pub temperature: f32,
    /// mbar
    pub pressure: Option<f32>,
    /// %RH
    pub humidity: Option<f32>,
    /// m
    pub altitude: Option<f32>,
}

/// Raw HIH6130 transfer together with the status it was read under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumidityFrame {
    pub status: Status,
    /// Status bits already masked off byte 0. All zero when `status` is not usable.
    pub data: [u8; 4],
    /// Poll attempts spent before the data read.
    pub attempts: u8,
}

impl HumidityFrame {
    pub fn raw_humidity(&self) -> u16 {
        u16::from_be_bytes([self.data[0] & 0x3F, self.data[1]])
    }

    pub fn raw_temperature(&self) -> u16 {
        u16::from_be_bytes([self.data[2], self.data[3]]) >> 2
    }
}

/// Decoded HIH6130 values. When `status` is not usable they are decoded from
/// the zero-filled frame and carry no information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityReading {
    pub status: Status,
    /// %RH
    pub humidity: f32,
    /// °C
    pub temperature: f32,
}

impl HumidityReading {
    pub fn is_usable(&self) -> bool {
        self.status.is_usable()
    }
}
