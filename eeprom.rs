//! Microchip 24AAxxx serial EEPROM with 16-bit memory addressing.

use std::time::Duration;

use log::debug;

use crate::bus::{Session, Transport};
use crate::error::Result;

pub const DEFAULT_ADDRESS: u16 = 0x50;

/// 24AA256/24AA512 page size.
pub const DEFAULT_PAGE_SIZE: u16 = 64;

/// Worst-case internal write cycle.
const WRITE_CYCLE_TIME: Duration = Duration::from_millis(5);
const ADDRESS_SETTLE_TIME: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EepromConfig {
    pub address: u16,
    /// Writes never cross a multiple of this.
    pub page_size: u16,
}

impl EepromConfig {
    pub fn with_address(self, address: u16) -> Self {
        EepromConfig { address, ..self }
    }

    pub fn with_page_size(self, page_size: u16) -> Self {
        EepromConfig {
            page_size: page_size.max(1),
            ..self
        }
    }
}

impl Default for EepromConfig {
    fn default() -> Self {
        EepromConfig {
            address: DEFAULT_ADDRESS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub struct Eeprom24aa<T: Transport> {
    transport: T,
    config: EepromConfig,
}

impl<T: Transport> Eeprom24aa<T> {
    pub fn new(transport: T, config: EepromConfig) -> Self {
        Eeprom24aa { transport, config }
    }

    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    /// Sequential read of `buffer.len()` bytes starting at `address`.
    pub fn read(&self, address: u16, buffer: &mut [u8]) -> Result<()> {
        let mut session = self.transport.open(self.config.address)?;
        session.write(&address.to_be_bytes())?;
        session.delay(ADDRESS_SETTLE_TIME);
        session.read(buffer)?;
        debug!("24AA read {} bytes at {:#06x}", buffer.len(), address);
        Ok(())
    }

    /// Writes `bytes` at `address`, one page write per page touched.
    pub fn write(&self, address: u16, bytes: &[u8]) -> Result<()> {
        let mut session = self.transport.open(self.config.address)?;
        let mut address = address;
        let mut rest = bytes;
        while !rest.is_empty() {
            let take = page_room(address, self.config.page_size).min(rest.len());
            let (page, tail) = rest.split_at(take);

            let mut frame = Vec::with_capacity(page.len() + 2);
            frame.extend_from_slice(&address.to_be_bytes());
            frame.extend_from_slice(page);
            session.write(&frame)?;
            session.delay(WRITE_CYCLE_TIME);
            debug!("24AA page write {} bytes at {:#06x}", page.len(), address);

            address = address.wrapping_add(take as u16);
            rest = tail;
        }
        Ok(())
    }

    pub fn read_byte(&self, address: u16) -> Result<u8> {
        let mut buffer = [0u8; 1];
        self.read(address, &mut buffer)?;
        Ok(buffer[0])
    }

    pub fn write_byte(&self, address: u16, value: u8) -> Result<()> {
        self.write(address, &[value])
    }
}

// Bytes left before the next page boundary.
fn page_room(address: u16, page_size: u16) -> usize {
    let page_size = page_size.max(1);
    usize::from(page_size - address % page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{Op, SimBus, Transaction};
    use crate::error::Error;

    fn eeprom(bus: &SimBus, page_size: u16) -> Eeprom24aa<SimBus> {
        Eeprom24aa::new(
            bus.clone(),
            EepromConfig::default().with_page_size(page_size),
        )
    }

    #[test]
    fn room_to_page_boundary() {
        assert_eq!(page_room(0, 64), 64);
        assert_eq!(page_room(60, 64), 4);
        assert_eq!(page_room(64, 64), 64);
        assert_eq!(page_room(5, 0), 1);
    }

    #[test]
    fn read_sends_address_first() {
        let bus = SimBus::new(&[
            Transaction::write(vec![0x01, 0x20]),
            Transaction::read(vec![0xDE, 0xAD, 0xBE]),
        ]);
        let mut buffer = [0u8; 3];
        eeprom(&bus, 64).read(0x0120, &mut buffer).unwrap();

        assert_eq!(buffer, [0xDE, 0xAD, 0xBE]);
        assert_eq!(bus.delays(), vec![ADDRESS_SETTLE_TIME]);
        bus.done();
    }

    #[test]
    fn write_splits_at_page_boundaries() {
        let bus = SimBus::new(&[
            Transaction::write(vec![0x00, 0x0E, 1, 2]),
            Transaction::write(vec![
                0x00, 0x10, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18,
            ]),
            Transaction::write(vec![0x00, 0x20, 19, 20]),
        ]);
        let bytes: Vec<u8> = (1..=20).collect();
        eeprom(&bus, 16).write(0x000E, &bytes).unwrap();

        assert_eq!(bus.delays(), vec![WRITE_CYCLE_TIME; 3]);
        bus.done();
    }

    #[test]
    fn single_byte_round() {
        let bus = SimBus::new(&[
            Transaction::write(vec![0x00, 0x01, 0x06]),
            Transaction::write(vec![0x00, 0x01]),
            Transaction::read(vec![0x06]),
        ]);
        let eeprom = eeprom(&bus, 64);
        eeprom.write_byte(0x0001, 0x06).unwrap();
        assert_eq!(eeprom.read_byte(0x0001).unwrap(), 0x06);
        bus.done();
    }

    #[test]
    fn failed_page_write_stops() {
        let bus = SimBus::new(&[Transaction::write(vec![0x00, 0x3F, 0xAA]).fail()]);
        let result = eeprom(&bus, 64).write(0x003F, &[0xAA, 0xBB]);

        assert!(matches!(result, Err(Error::BusTransfer { register: None, .. })));
        assert_eq!(bus.count(&Op::Write(vec![0x00, 0x40, 0xBB])), 0);
        bus.done();
    }
}
