use std::env;
use std::io::{self, Write};
use std::process;
use std::thread;
use std::time::Duration;

use chrono::Local;
use log::error;

use uspace_i2c::{Hih6130, Hih6130Config, LinuxBus, Result};

const I2C_BUS: u8 = 1;

const USAGE: &str = "Honeywell Digital Humidity/Temperature Sensor
Usage: hih6130 [OPTION]

Options:
  -v   Get all values
  -t   Get temperature
  -rh  Get humidity
  -s   Print all values every second
  -h   Show this help";

enum Mode {
    All,
    Temperature,
    Humidity,
    Stream,
}

fn line() {
    println!("{}", "-".repeat(71));
}

fn run(hih: &Hih6130<LinuxBus>, mode: Mode) -> Result<()> {
    match mode {
        Mode::All => {
            let reading = hih.read_values()?;
            println!("\nHIH6130 values:");
            line();
            println!("Temperature:\t {:5.1} °C", reading.temperature);
            println!("Humidity:\t {:5.1} %RH", reading.humidity);
            println!("Status:\t\t {}", reading.status);
        }
        Mode::Temperature => {
            let temperature = hih.read_temperature()?;
            println!("\nHIH6130 temperature:");
            line();
            println!("Temperature:\t {:5.1} °C", temperature);
        }
        Mode::Humidity => {
            let humidity = hih.read_humidity()?;
            println!("\nHIH6130 humidity:");
            line();
            println!("Humidity:\t {:5.1} %RH", humidity);
        }
        Mode::Stream => {
            println!("Time      Temperature    Humidity   Status");
            line();
            loop {
                let reading = hih.read_values()?;
                print!(
                    "\r{}  {:8.1} °C  {:6.1} %RH  {:<12}",
                    Local::now().format("%H:%M:%S"),
                    reading.temperature,
                    reading.humidity,
                    reading.status,
                );
                let _ = io::stdout().flush();
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mode = match args.get(1).map(String::as_str) {
        None | Some("-v") => Mode::All,
        Some("-t") => Mode::Temperature,
        Some("-rh") => Mode::Humidity,
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

    let hih = Hih6130::new(LinuxBus::new(I2C_BUS), Hih6130Config::default());
    if let Err(e) = run(&hih, mode) {
        error!("{}", e);
        process::exit(1);
    }
}
