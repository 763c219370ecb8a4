/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

#![cfg_attr(not(any(target_os = "linux", target_os = "android")), allow(dead_code, unused_imports))]
#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {
    eprintln!("i2cconn currently supports Linux only.");
}

use chrono::Utc;
use clap::ArgMatches;
use env_logger::Env;
use i2cconn::device::{bmp, s35390a};
use i2cconn::{ByteOrder, Connection};
use log::{error, info};
use std::{
    path::Path,
    process::ExitCode,
    thread,
    time::{Duration, Instant},
};

const WATCH_POLL: Duration = Duration::from_millis(233);
/// i2c-dev refuses single transfers longer than this.
const MAX_TRANSFER: usize = 8192;

#[derive(Debug)]
#[allow(dead_code)]
enum Error {
    Conn(i2cconn::Error),
    Parse(std::num::ParseIntError),
    Range(u64),
    NotFound,
}

impl From<i2cconn::Error> for Error {
    fn from(e: i2cconn::Error) -> Self {
        Error::Conn(e)
    }
}

type Result<T> = std::result::Result<T, Error>;

fn parse_number(s: &str) -> Result<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(Error::Parse)
    } else {
        s.parse::<u64>().map_err(Error::Parse)
    }
}

fn parse_as<T: TryFrom<u64>>(s: &str) -> Result<T> {
    let v = parse_number(s)?;
    T::try_from(v).map_err(|_| Error::Range(v))
}

fn transfer_len(s: &str) -> Result<usize> {
    let len = parse_as::<usize>(s)?;
    if len > MAX_TRANSFER {
        return Err(Error::Range(len as u64));
    }
    Ok(len)
}

fn watch_deadline(start: Instant, secs: u64) -> Result<Instant> {
    start
        .checked_add(Duration::from_secs(secs))
        .ok_or(Error::Range(secs))
}

fn address_of(args: &ArgMatches) -> Result<u16> {
    let addr = args.get_one::<String>("address").ok_or(Error::NotFound)?;
    parse_as(addr)
}

fn open(bus: &Path, args: &ArgMatches) -> Result<Connection> {
    let addr = address_of(args)?;
    let ten_bit = args.get_flag("ten-bit");
    Ok(Connection::open(bus, addr, ten_bit, ByteOrder::Little)?)
}

fn hex_line(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn address_args() -> [clap::Arg; 2] {
    [
        clap::arg!(-a --address <ADDRESS> "i2c slave address of the device."),
        clap::arg!(--"ten-bit" "Use 10-bit addressing."),
    ]
}

fn command() -> clap::Command {
    clap::command!()
        .arg(
            clap::arg!(-b --bus [BUS] "i2c bus device file.")
                .default_value("/dev/i2c-1"),
        )
        .subcommand(
            clap::Command::new("read")
                .about("read bytes from a device")
                .args(address_args())
                .arg(clap::arg!(-n --len [LEN] "Number of bytes to read.").default_value("1")),
        )
        .subcommand(
            clap::Command::new("write")
                .about("write bytes to a device")
                .args(address_args())
                .arg(clap::arg!(<BYTES> ... "Bytes to write.")),
        )
        .subcommand(
            clap::Command::new("funcs")
                .about("show what the bus adapter supports")
                .args(address_args()),
        )
        .subcommand(clap::Command::new("bmp").about("look for BMP pressure sensors"))
        .subcommand(
            clap::Command::new("rtc")
                .about("S-35390A real time clock")
                .subcommand(clap::Command::new("time").about("print the clock time"))
                .subcommand(clap::Command::new("dump").about("dump every register"))
                .subcommand(clap::Command::new("reset").about("reset into 24 hour mode"))
                .subcommand(
                    clap::Command::new("set").about("set the clock, in UTC, from the system clock"),
                )
                .subcommand(
                    clap::Command::new("watch")
                        .about("track the clock time")
                        .arg(
                            clap::arg!(-d --duration [SECONDS] "How long to watch the clock for.")
                                .default_value("180"),
                        ),
                )
                .subcommand_required(true),
        )
        .arg_required_else_help(true)
}

fn rtc(rtc: &s35390a::Rtc, args: &ArgMatches) -> Result<()> {
    match args.subcommand() {
        Some(("time", _)) => {
            println!("{}", rtc.now()?);
        }
        Some(("dump", _)) => {
            for cmd in s35390a::Command::ALL {
                match rtc.dump(cmd) {
                    Ok(data) => {
                        for (i, v) in data.iter().enumerate() {
                            let r = v.reverse_bits();
                            println!(
                                "read[{:x};{i}]: {v:02x} {v:08b} {r:08b} {r}",
                                cmd.address()
                            );
                        }
                    }
                    Err(e) => error!("read[{:x}]: {e}", cmd.address()),
                }
            }
        }
        Some(("reset", _)) => {
            let status = rtc.reset()?;
            info!("status1 was {status:08b}");
        }
        Some(("set", _)) => {
            let latency = rtc.set_time(Duration::ZERO)?;
            info!("[0] latency={latency:?}");
            let latency = rtc.set_time(latency)?;
            info!("[1] latency={latency:?}");
        }
        Some(("watch", args)) => {
            let secs = args
                .get_one::<String>("duration")
                .map(|s| parse_number(s))
                .transpose()?
                .unwrap_or(180);
            let deadline = watch_deadline(Instant::now(), secs)?;
            let mut last = None;
            while Instant::now() < deadline {
                match rtc.now() {
                    Ok(t) if last != Some(t) => {
                        println!("{t} (system {})", Utc::now());
                        last = Some(t);
                    }
                    Ok(_) => {}
                    Err(e) => error!("{e}"),
                }
                thread::sleep(WATCH_POLL);
            }
        }
        _ => {}
    }
    Ok(())
}

fn i2cconn() -> Result<()> {
    let matches = command().get_matches();
    let bus = Path::new(
        matches
            .get_one::<String>("bus")
            .ok_or(Error::NotFound)?
            .as_str(),
    );

    match matches.subcommand() {
        Some(("read", args)) => {
            let len = transfer_len(args.get_one::<String>("len").ok_or(Error::NotFound)?)?;
            let conn = open(bus, args)?;
            let mut buf = vec![0u8; len];
            let n = conn.read(&mut buf)?;
            conn.close()?;
            if n != len {
                error!("short read: {n} of {len} bytes");
            }
            println!("{}", hex_line(&buf[..n]));
        }
        Some(("write", args)) => {
            let data = args
                .get_many::<String>("BYTES")
                .ok_or(Error::NotFound)?
                .map(|s| parse_as::<u8>(s))
                .collect::<Result<Vec<u8>>>()?;
            let conn = open(bus, args)?;
            let n = conn.write(&data)?;
            conn.close()?;
            if n != data.len() {
                return Err(Error::Conn(i2cconn::Error::Truncated {
                    expected: data.len(),
                    actual: n,
                }));
            }
        }
        Some(("funcs", args)) => {
            let conn = open(bus, args)?;
            let funcs = conn.functionality()?;
            conn.close()?;
            for (name, _) in funcs.iter_names() {
                println!("{name}");
            }
        }
        Some(("bmp", _)) => {
            if bmp::probe(bus).is_empty() {
                error!("BMP sensor not found.");
                return Err(Error::NotFound);
            }
        }
        Some(("rtc", args)) => {
            rtc(&s35390a::Rtc::new(bus), args)?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match i2cconn() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("i2cconn: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
