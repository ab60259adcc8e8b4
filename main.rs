use std::env;
use std::io::{self, Write};
use std::process;
use std::thread;
use std::time::Duration;

use chrono::Local;
use log::error;

use uspace_i2c::bmp085::{self, Bmp085, Bmp085Config, Oversampling};
use uspace_i2c::{LinuxBus, Result};

// /dev/i2c-1 on every Pi since rev. 2
const I2C_BUS: u8 = 1;

const USAGE: &str = "BOSCH Digital Pressure Sensor
Usage: bmp085 [OPTION]

Options:
  -v   Get all values
  -t   Get temperature
  -p   Get pressure
  -a   Get altitude
  -s   Print all values every second
  -h   Show this help";

enum Mode {
    All,
    Temperature,
    Pressure,
    Altitude,
    Stream,
}

fn line() {
    println!("{}", "-".repeat(71));
}

fn print_all(bmp: &Bmp085<LinuxBus>) -> Result<()> {
    let reading = bmp.read_all()?;
    println!("\nBMP085 values:");
    line();
    println!("Temperature:\t {:6.1} °C", reading.temperature);
    if let Some(pressure) = reading.pressure {
        println!("Pressure:\t {:6.1} mbar", pressure);
    }
    if let Some(altitude) = reading.altitude {
        println!("Altitude:\t {:6.1} m", altitude);
    }
    Ok(())
}

fn stream(bmp: &Bmp085<LinuxBus>) -> Result<()> {
    println!("Time      Temperature    Pressure    Altitude");
    line();
    loop {
        let reading = bmp.read_all()?;
        print!(
            "\r{}  {:8.1} °C  {:6.1} mbar  {:7.1} m",
            Local::now().format("%H:%M:%S"),
            reading.temperature,
            reading.pressure.unwrap_or_default(),
            reading.altitude.unwrap_or_default(),
        );
        let _ = io::stdout().flush();
        thread::sleep(Duration::from_secs(1));
    }
}

fn run(bmp: &Bmp085<LinuxBus>, mode: Mode) -> Result<()> {
    match mode {
        Mode::All => print_all(bmp),
        Mode::Temperature => {
            let temperature = bmp.read_temperature()?;
            println!("\nBMP085 temperature:");
            line();
            println!("Temperature:\t {:5.1} °C", temperature);
            Ok(())
        }
        Mode::Pressure => {
            let pressure = bmp.read_pressure()?;
            println!("\nBMP085 pressure:");
            line();
            println!("Pressure:\t {:5.1} mbar", pressure);
            Ok(())
        }
        Mode::Altitude => {
            let altitude = bmp085::altitude(bmp.read_pressure()?);
            println!("\nBMP085 altitude:");
            line();
            println!("Altitude:\t {:5.1} m", altitude);
            Ok(())
        }
        Mode::Stream => stream(bmp),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mode = match args.get(1).map(String::as_str) {
        None | Some("-v") => Mode::All,
        Some("-t") => Mode::Temperature,
        Some("-p") => Mode::Pressure,
        Some("-a") => Mode::Altitude,
        Some("-s") => Mode::Stream,
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            return;
        }
        Some(other) => {
            println!("Error: unknown option '{}'", other);
            println!("{}", USAGE);
            return;
        }
    };

    let config = Bmp085Config::default().with_oversampling(Oversampling::Low);
    let result = Bmp085::new(LinuxBus::new(I2C_BUS), config).and_then(|bmp| run(&bmp, mode));
    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
