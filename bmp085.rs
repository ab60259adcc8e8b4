//! Bosch BMP085 barometric pressure sensor (the BMP180 is register compatible).
//!
//! Every read opens its own session: trigger a conversion on the control
//! register, wait for the settle time, read the result register and run the
//! datasheet fixed-point compensation. Pressure compensation needs the `b5`
//! term of a temperature conversion, so pressure reads always convert
//! temperature first within the same session.

use std::time::Duration;

use log::debug;

use crate::bus::{Session, Transport};
use crate::error::{Error, Result};
use crate::structs::{Calibration, CompensatedTemperature, PhysicalReading};

pub const DEFAULT_ADDRESS: u16 = 0x77;

// BMP085 register addresses and commands.
const REG_CALIB_AC1: u8 = 0xAA;
const REG_CALIB_LEN: usize = 11;
const REG_CONTROL: u8 = 0xF4;
const REG_RESULT: u8 = 0xF6;
const CMD_TEMPERATURE: u8 = 0x2E;
const CMD_PRESSURE: u8 = 0x34;

// Datasheet minimum is 4.5 ms.
const TEMPERATURE_SETTLE_TIME: Duration = Duration::from_millis(5);

/// Reference pressure for altitude, mbar.
pub const SEA_LEVEL_PRESSURE: f32 = 1013.25;

/// Pressure oversampling setting (`oss`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversampling {
    Low = 0,
    Standard = 1,
    High = 2,
    Ultra = 3,
}

impl Oversampling {
    pub fn oss(self) -> u8 {
        self as u8
    }

    /// Value written to the control register to start a pressure conversion.
    pub fn command(self) -> u8 {
        CMD_PRESSURE + (self.oss() << 6)
    }

    /// Conversion time: 5, 8, 14 or 26 ms.
    pub fn settle_time(self) -> Duration {
        Duration::from_millis(2 + (3 << self.oss()))
    }

    /// Right shift applied to the 24-bit MSB/LSB/XLSB result.
    pub fn raw_shift(self) -> u32 {
        8 - u32::from(self.oss())
    }
}

impl Default for Oversampling {
    fn default() -> Self {
        Oversampling::Standard
    }
}

/// Fixed for the lifetime of a [`Bmp085`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bmp085Config {
    pub address: u16,
    pub oversampling: Oversampling,
}

impl Bmp085Config {
    pub fn with_address(self, address: u16) -> Self {
        Bmp085Config { address, ..self }
    }

    pub fn with_oversampling(self, oversampling: Oversampling) -> Self {
        Bmp085Config {
            oversampling,
            ..self
        }
    }
}

impl Default for Bmp085Config {
    fn default() -> Self {
        Bmp085Config {
            address: DEFAULT_ADDRESS,
            oversampling: Oversampling::default(),
        }
    }
}

impl Calibration {
    /// Reads the eleven calibration words, AC1 first.
    ///
    /// The datasheet guarantees no word is 0x0000 or 0xFFFF, so either value
    /// means the EEPROM was not actually read.
    pub fn fetch<S: Session>(session: &mut S) -> Result<Calibration> {
        let mut words = [0u16; REG_CALIB_LEN];
        for (n, word) in words.iter_mut().enumerate() {
            let register = REG_CALIB_AC1 + 2 * n as u8;
            let value = session.read_word(register)?;
            if value == 0x0000 || value == 0xFFFF {
                return Err(Error::InvalidCalibration { register, value });
            }
            *word = value;
        }

        Ok(Calibration {
            ac1: words[0] as i16,
            ac2: words[1] as i16,
            ac3: words[2] as i16,
            ac4: words[3],
            ac5: words[4],
            ac6: words[5],
            b1: words[6] as i16,
            b2: words[7] as i16,
            mb: words[8] as i16,
            mc: words[9] as i16,
            md: words[10] as i16,
        })
    }

    /// Temperature compensation on the raw 16-bit code.
    pub fn compensate_temperature(&self, raw: u16) -> Result<CompensatedTemperature> {
        let x1 = (i32::from(raw) - i32::from(self.ac6)).wrapping_mul(i32::from(self.ac5)) >> 15;
        let divisor = x1 + i32::from(self.md);
        if divisor == 0 {
            return Err(Error::DegenerateCalibration);
        }
        let x2 = (i32::from(self.mc) << 11) / divisor;
        let b5 = x1 + x2;

        Ok(CompensatedTemperature {
            b5,
            deci_celsius: (b5 + 8) >> 4,
        })
    }

    /// Pressure compensation, in Pa (0.01 mbar).
    ///
    /// Multiplications wrap at 32 bits like the datasheet reference code.
    pub fn compensate_pressure(
        &self,
        raw: u32,
        temperature: &CompensatedTemperature,
        oversampling: Oversampling,
    ) -> Result<i32> {
        let oss = u32::from(oversampling.oss());

        let b6 = temperature.b5 - 4000;
        let b6_squared = b6.wrapping_mul(b6) >> 12;

        let mut x1 = i32::from(self.b2).wrapping_mul(b6_squared) >> 11;
        let mut x2 = i32::from(self.ac2).wrapping_mul(b6) >> 11;
        let mut x3 = x1 + x2;
        let b3 = (((i32::from(self.ac1) * 4 + x3) << oss) + 2) >> 2;

        x1 = i32::from(self.ac3).wrapping_mul(b6) >> 13;
        x2 = i32::from(self.b1).wrapping_mul(b6_squared) >> 16;
        x3 = ((x1 + x2) + 2) >> 2;
        let b4 = u32::from(self.ac4).wrapping_mul((x3 + 32768) as u32) >> 15;
        if b4 == 0 {
            return Err(Error::DegenerateCalibration);
        }

        let b7 = ((raw as i32).wrapping_sub(b3) as u32).wrapping_mul(50000 >> oss);
        let quotient = if b7 < 0x8000_0000 {
            (b7 << 1) / b4
        } else {
            (b7 / b4).wrapping_mul(2)
        };
        let mut p = quotient as i32;

        x1 = (p >> 8).wrapping_mul(p >> 8);
        x1 = x1.wrapping_mul(3038) >> 16;
        x2 = (-7357i32).wrapping_mul(p) >> 16;
        p = p.wrapping_add((x1 + x2 + 3791) >> 4);

        Ok(p)
    }
}

/// Barometric altitude in metres for a pressure in mbar.
pub fn altitude(pressure: f32) -> f32 {
    44330.0 * (1.0 - (pressure / SEA_LEVEL_PRESSURE).powf(0.1903))
}

/// A BMP085 with its calibration loaded.
pub struct Bmp085<T: Transport> {
    transport: T,
    config: Bmp085Config,
    calibration: Calibration,
}

impl<T: Transport> Bmp085<T> {
    /// Opens the device once to read the calibration EEPROM.
    pub fn new(transport: T, config: Bmp085Config) -> Result<Self> {
        let calibration = {
            let mut session = transport.open(config.address)?;
            Calibration::fetch(&mut session)?
        };
        debug!("BMP085 calibration: {:?}", calibration);

        Ok(Bmp085 {
            transport,
            config,
            calibration,
        })
    }

    pub fn config(&self) -> &Bmp085Config {
        &self.config
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Re-reads the calibration EEPROM. The constants never change on a given
    /// part, so this only costs bus traffic.
    pub fn refresh_calibration(&mut self) -> Result<()> {
        let mut session = self.transport.open(self.config.address)?;
        self.calibration = Calibration::fetch(&mut session)?;
        Ok(())
    }

    /// Temperature in °C.
    pub fn read_temperature(&self) -> Result<f32> {
        let mut session = self.transport.open(self.config.address)?;
        Ok(self.measure_temperature(&mut session)?.celsius())
    }

    /// Pressure in mbar. Converts temperature first and discards it.
    pub fn read_pressure(&self) -> Result<f32> {
        let mut session = self.transport.open(self.config.address)?;
        let temperature = self.measure_temperature(&mut session)?;
        self.measure_pressure(&mut session, &temperature)
    }

    /// Altitude in metres derived from a fresh pressure reading.
    pub fn read_altitude(&self) -> Result<f32> {
        self.read_pressure().map(altitude)
    }

    /// Temperature, pressure and altitude from one session.
    pub fn read_all(&self) -> Result<PhysicalReading> {
        let mut session = self.transport.open(self.config.address)?;
        let temperature = self.measure_temperature(&mut session)?;
        let pressure = self.measure_pressure(&mut session, &temperature)?;

        Ok(PhysicalReading {
            temperature: temperature.celsius(),
            pressure: Some(pressure),
            humidity: None,
            altitude: Some(altitude(pressure)),
        })
    }

    fn measure_temperature(&self, session: &mut T::Session) -> Result<CompensatedTemperature> {
        session.write_byte(REG_CONTROL, CMD_TEMPERATURE)?;
        session.delay(TEMPERATURE_SETTLE_TIME);
        let raw = session.read_word(REG_RESULT)?;
        let temperature = self.calibration.compensate_temperature(raw)?;
        debug!("UT {} -> b5 {}", raw, temperature.b5);
        Ok(temperature)
    }

    fn measure_pressure(
        &self,
        session: &mut T::Session,
        temperature: &CompensatedTemperature,
    ) -> Result<f32> {
        let oversampling = self.config.oversampling;
        session.write_byte(REG_CONTROL, oversampling.command())?;
        session.delay(oversampling.settle_time());

        // 0xF6 = MSB, 0xF7 = LSB, 0xF8 = XLSB
        let mut data = [0u8; 3];
        session.read_block(REG_RESULT, &mut data)?;
        let raw = ((u32::from(data[0]) << 16) | (u32::from(data[1]) << 8) | u32::from(data[2]))
            >> oversampling.raw_shift();

        let pascal = self
            .calibration
            .compensate_pressure(raw, temperature, oversampling)?;
        debug!("UP {} -> {} Pa", raw, pascal);
        Ok(pascal as f32 / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{Event, Op, SimBus, Transaction};

    // Worked example from the BMP085 datasheet.
    const DATASHEET: Calibration = Calibration {
        ac1: 408,
        ac2: -72,
        ac3: -14383,
        ac4: 32741,
        ac5: 32757,
        ac6: 23153,
        b1: 6190,
        b2: 4,
        mb: -32768,
        mc: -8711,
        md: 2868,
    };
    const DATASHEET_UT: u16 = 27898;
    const DATASHEET_UP: u32 = 23843;

    fn calibration_reads() -> Vec<Transaction> {
        let c = DATASHEET;
        let words = [
            c.ac1 as u16,
            c.ac2 as u16,
            c.ac3 as u16,
            c.ac4,
            c.ac5,
            c.ac6,
            c.b1 as u16,
            c.b2 as u16,
            c.mb as u16,
            c.mc as u16,
            c.md as u16,
        ];
        words
            .iter()
            .enumerate()
            .map(|(n, &word)| Transaction::read_word(0xAA + 2 * n as u8, word))
            .collect()
    }

    fn temperature_cycle() -> Vec<Transaction> {
        vec![
            Transaction::write_byte(0xF4, 0x2E),
            Transaction::read_word(0xF6, DATASHEET_UT),
        ]
    }

    fn low_power() -> Bmp085Config {
        Bmp085Config::default().with_oversampling(Oversampling::Low)
    }

    #[test]
    fn temperature_matches_datasheet_example() {
        let t = DATASHEET.compensate_temperature(DATASHEET_UT).unwrap();
        assert!((t.b5 - 2399).abs() <= 1, "b5 = {}", t.b5);
        assert_eq!(t.deci_celsius, 150);
        assert_eq!(t.celsius(), 15.0);
    }

    #[test]
    fn pressure_matches_datasheet_example() {
        let t = DATASHEET.compensate_temperature(DATASHEET_UT).unwrap();
        let p = DATASHEET
            .compensate_pressure(DATASHEET_UP, &t, Oversampling::Low)
            .unwrap();
        assert_eq!(p, 69964);
    }

    #[test]
    fn zero_divisor_is_reported() {
        let calibration = Calibration { md: 0, ..DATASHEET };
        // ut == ac6 makes x1 zero
        assert!(matches!(
            calibration.compensate_temperature(calibration.ac6),
            Err(Error::DegenerateCalibration)
        ));
    }

    #[test]
    fn oversampling_commands_and_settle_times() {
        let table = [
            (Oversampling::Low, 0x34, 5, 8),
            (Oversampling::Standard, 0x74, 8, 7),
            (Oversampling::High, 0xB4, 14, 6),
            (Oversampling::Ultra, 0xF4, 26, 5),
        ];
        for &(mode, command, millis, shift) in table.iter() {
            assert_eq!(mode.command(), command);
            assert_eq!(mode.settle_time(), Duration::from_millis(millis));
            assert_eq!(mode.raw_shift(), shift);
        }
    }

    #[test]
    fn altitude_is_zero_at_sea_level() {
        assert_eq!(altitude(SEA_LEVEL_PRESSURE), 0.0);
    }

    #[test]
    fn altitude_decreases_with_pressure() {
        let mut previous = altitude(300.0);
        let mut pressure = 310.0;
        while pressure <= 1100.0 {
            let current = altitude(pressure);
            assert!(current < previous, "{} mbar", pressure);
            previous = current;
            pressure += 10.0;
        }
    }

    #[test]
    fn new_reads_calibration_words() {
        let bus = SimBus::new(&calibration_reads());
        let bmp = Bmp085::new(bus.clone(), low_power()).unwrap();
        assert_eq!(*bmp.calibration(), DATASHEET);
        assert_eq!(bus.events()[0], Event::Open(DEFAULT_ADDRESS));
        bus.done();
    }

    #[test]
    fn invalid_calibration_word_is_rejected() {
        let bus = SimBus::new(&[
            Transaction::read_word(0xAA, 408),
            Transaction::read_word(0xAC, 0xFFFF),
        ]);
        match Bmp085::new(bus.clone(), low_power()) {
            Err(Error::InvalidCalibration { register, value }) => {
                assert_eq!(register, 0xAC);
                assert_eq!(value, 0xFFFF);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        bus.done();
    }

    #[test]
    fn failed_calibration_read_names_register() {
        let bus = SimBus::new(&[
            Transaction::read_word(0xAA, 408),
            Transaction::read_word(0xAC, 0).fail(),
        ]);
        assert!(matches!(
            Bmp085::new(bus.clone(), low_power()),
            Err(Error::BusTransfer {
                register: Some(0xAC),
                ..
            })
        ));
        bus.done();
    }

    #[test]
    fn open_failure_is_distinct() {
        let bus = SimBus::refusing();
        assert!(matches!(
            Bmp085::new(bus, low_power()),
            Err(Error::BusOpen { address: 0x77, .. })
        ));
    }

    #[test]
    fn temperature_waits_before_reading_result() {
        let mut script = calibration_reads();
        script.extend(temperature_cycle());
        let bus = SimBus::new(&script);
        let bmp = Bmp085::new(bus.clone(), low_power()).unwrap();

        assert_eq!(bmp.read_temperature().unwrap(), 15.0);

        let events = bus.events();
        let cycle = &events[events.len() - 4..];
        assert_eq!(
            cycle,
            &[
                Event::Transfer(Op::WriteByte {
                    register: 0xF4,
                    value: 0x2E
                }),
                Event::Delay(Duration::from_millis(5)),
                Event::Transfer(Op::ReadWord(0xF6)),
                Event::Close,
            ]
        );
        assert!(bus.delays()[0] >= Duration::from_micros(4500));
        bus.done();
    }

    #[test]
    fn pressure_converts_temperature_first() {
        let mut script = calibration_reads();
        script.extend(temperature_cycle());
        script.push(Transaction::write_byte(0xF4, 0x34));
        script.push(Transaction::read_block(0xF6, vec![0x5D, 0x23, 0x00]));
        let bus = SimBus::new(&script);
        let bmp = Bmp085::new(bus.clone(), low_power()).unwrap();

        let pressure = bmp.read_pressure().unwrap();
        assert!((pressure - 699.64).abs() < 0.001, "{}", pressure);
        assert_eq!(
            bus.delays(),
            vec![Duration::from_millis(5), Duration::from_millis(5)]
        );
        bus.done();
    }

    #[test]
    fn pressure_uses_oversampling_from_config() {
        let config = low_power().with_oversampling(Oversampling::Ultra);
        let mut script = calibration_reads();
        script.extend(temperature_cycle());
        script.push(Transaction::write_byte(0xF4, 0xF4));
        script.push(Transaction::read_block(0xF6, vec![0x5D, 0x23, 0x60]));
        let bus = SimBus::new(&script);
        let bmp = Bmp085::new(bus.clone(), config).unwrap();

        let pressure = bmp.read_pressure().unwrap();

        let t = DATASHEET.compensate_temperature(DATASHEET_UT).unwrap();
        let raw = 0x5D_2360 >> 5;
        let expected = DATASHEET
            .compensate_pressure(raw, &t, Oversampling::Ultra)
            .unwrap();
        assert_eq!(pressure, expected as f32 / 100.0);
        assert_eq!(bus.delays()[1], Duration::from_millis(26));
        bus.done();
    }

    #[test]
    fn failed_pressure_read_is_an_error_not_zero() {
        let mut script = calibration_reads();
        script.extend(temperature_cycle());
        script.push(Transaction::write_byte(0xF4, 0x34));
        script.push(Transaction::read_block(0xF6, vec![0, 0, 0]).fail());
        let bus = SimBus::new(&script);
        let bmp = Bmp085::new(bus.clone(), low_power()).unwrap();

        match bmp.read_pressure() {
            Err(Error::BusTransfer { register, .. }) => assert_eq!(register, Some(0xF6)),
            other => panic!("expected transfer error, got {:?}", other),
        }
        // session still closed
        bus.done();
    }

    #[test]
    fn read_all_uses_one_session() {
        let mut script = calibration_reads();
        script.extend(temperature_cycle());
        script.push(Transaction::write_byte(0xF4, 0x34));
        script.push(Transaction::read_block(0xF6, vec![0x5D, 0x23, 0x00]));
        let bus = SimBus::new(&script);
        let bmp = Bmp085::new(bus.clone(), low_power()).unwrap();

        let reading = bmp.read_all().unwrap();
        assert_eq!(reading.temperature, 15.0);
        assert_eq!(reading.humidity, None);
        let pressure = reading.pressure.unwrap();
        assert_eq!(reading.altitude, Some(altitude(pressure)));
        let opens = bus
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Open(_)))
            .count();
        assert_eq!(opens, 2);
        bus.done();
    }

    #[test]
    fn refresh_calibration_reads_again() {
        let mut script = calibration_reads();
        script.extend(calibration_reads());
        let bus = SimBus::new(&script);
        let mut bmp = Bmp085::new(bus.clone(), low_power()).unwrap();
        bmp.refresh_calibration().unwrap();
        assert_eq!(bus.count(&Op::ReadWord(0xBE)), 2);
        bus.done();
    }
}
