use std::env;
use std::process;

use log::error;

use uspace_i2c::{Eeprom24aa, EepromConfig, LinuxBus, Result};

const I2C_BUS: u8 = 1;

const USAGE: &str = "Microchip 24AAxxx serial EEPROM
Usage: eeprom24aa -r ADDR [LEN]
       eeprom24aa -w ADDR BYTE...

Numbers are decimal or 0x-prefixed hex.";

enum Command {
    Read { address: u16, len: usize },
    Write { address: u16, bytes: Vec<u8> },
}

fn parse_u32(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn parse_u16(text: &str) -> Option<u16> {
    parse_u32(text).filter(|&n| n <= u32::from(u16::MAX)).map(|n| n as u16)
}

fn parse_u8(text: &str) -> Option<u8> {
    parse_u32(text).filter(|&n| n <= u32::from(u8::MAX)).map(|n| n as u8)
}

fn parse(args: &[String]) -> Option<Command> {
    let flag = args.get(0)?;
    let address = parse_u16(args.get(1)?)?;
    match flag.as_str() {
        "-r" => {
            let len = match args.get(2) {
                Some(len) => parse_u32(len)? as usize,
                None => 1,
            };
            if len == 0 {
                return None;
            }
            Some(Command::Read { address, len })
        }
        "-w" => {
            let bytes = args[2..]
                .iter()
                .map(|b| parse_u8(b))
                .collect::<Option<Vec<u8>>>()?;
            if bytes.is_empty() {
                return None;
            }
            Some(Command::Write { address, bytes })
        }
        _ => None,
    }
}

fn run(eeprom: &Eeprom24aa<LinuxBus>, command: Command) -> Result<()> {
    match command {
        Command::Read { address, len } => {
            let mut buffer = vec![0u8; len];
            eeprom.read(address, &mut buffer)?;
            for (row, chunk) in buffer.chunks(16).enumerate() {
                let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
                println!(
                    "{:04x}: {}",
                    address as usize + row * 16,
                    hex.join(" ")
                );
            }
        }
        Command::Write { address, bytes } => {
            eeprom.write(address, &bytes)?;
            println!("{} bytes written at {:#06x}", bytes.len(), address);
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse(&args) {
        Some(command) => command,
        None => {
            println!("{}", USAGE);
            return;
        }
    };

    let eeprom = Eeprom24aa::new(LinuxBus::new(I2C_BUS), EepromConfig::default());
    if let Err(e) = run(&eeprom, command) {
        error!("{}", e);
        process::exit(1);
    }
}
