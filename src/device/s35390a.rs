/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! ABLIC S-35390A real-time clock.
//!
//! The chip has no register pointer: each command is its own i2c address
//! (0x30..=0x37) and data bytes travel least significant bit first, so BCD
//! digits arrive bit-reversed.
//!
//! Datasheet: <https://www.ablic.com/en/doc/datasheet/real_time_clock/S35390A_E.pdf>

use crate::conn::{ByteOrder, Connection};
use crate::transport::{i2c::I2cDevFile, Transport};
use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, SubsecRound, TimeDelta, Timelike, Utc};
use log::{debug, info};
use std::{
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

const RESET_WAIT: Duration = Duration::from_millis(500);
const SETTLE: Duration = Duration::from_millis(1);

/// Status register 1: reset (bit 0) and 24 hour mode (bit 1), LSB first.
const STATUS1_RESET_24H: u8 = 0x80 | 0x40;
/// PM flag in the hour byte, as sent on the wire.
const HOUR_PM: u8 = 0x02;

const TIME_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status1,
    Status2,
    RealTime1,
    RealTime2,
    Interrupt1,
    Interrupt2,
    ClockCorrection,
    Free,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Status1,
        Command::Status2,
        Command::RealTime1,
        Command::RealTime2,
        Command::Interrupt1,
        Command::Interrupt2,
        Command::ClockCorrection,
        Command::Free,
    ];

    pub fn address(self) -> u16 {
        0x30 + self as u16
    }

    /// Number of data bytes the command transfers.
    pub fn data_len(self) -> usize {
        match self {
            Command::RealTime1 => TIME_LEN,
            Command::RealTime2 => 3,
            _ => 1,
        }
    }
}

/// Encodes `v` (0..=99) as the bit-reversed BCD the chip expects.
pub fn to_device_bcd(v: u8) -> u8 {
    (((v / 10) << 4) | (v % 10)).reverse_bits()
}

pub fn from_device_bcd(b: u8) -> u8 {
    let v = b.reverse_bits();
    (v >> 4) * 10 + (v & 0x0f)
}

/// Packs `t` into the seven real-time data bytes (24 hour mode).
pub fn encode_datetime(t: &DateTime<Utc>) -> Result<[u8; TIME_LEN]> {
    let year = t.year() - 2000;
    if !(0..100).contains(&year) {
        return Err(Error::InvalidArgument(format!(
            "{t} is not representable by the clock"
        )));
    }
    let hour = t.hour() as u8;
    let pm = if hour < 12 { 0 } else { HOUR_PM };
    Ok([
        to_device_bcd(year as u8),
        to_device_bcd(t.month() as u8),
        to_device_bcd(t.day() as u8),
        to_device_bcd(t.weekday().num_days_from_sunday() as u8),
        to_device_bcd(hour) | pm,
        to_device_bcd(t.minute() as u8),
        to_device_bcd(t.second() as u8),
    ])
}

/// Unpacks the seven real-time data bytes. The weekday byte is ignored.
pub fn decode_datetime(buf: &[u8; TIME_LEN]) -> Result<DateTime<Utc>> {
    let year = 2000 + i32::from(from_device_bcd(buf[0]));
    let month = u32::from(from_device_bcd(buf[1]));
    let day = u32::from(from_device_bcd(buf[2]));
    let hour = u32::from(from_device_bcd(buf[4] & !0x03));
    let minute = u32::from(from_device_bcd(buf[5]));
    let second = u32::from(from_device_bcd(buf[6]));

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|t| t.and_utc())
        .ok_or_else(|| Error::Device(format!("invalid clock reading {buf:02x?}")))
}

/// The whole second a write started now should carry, given it takes
/// `delay` to land.
fn aligned_goal(now: DateTime<Utc>, delay: Duration) -> Result<DateTime<Utc>> {
    let delay = TimeDelta::from_std(delay)
        .map_err(|_| Error::InvalidArgument(format!("delay {delay:?} out of range")))?;
    // Rounds now + 500ms + delay to the nearest second.
    Ok((now + TimeDelta::seconds(1) + delay).trunc_subsecs(0))
}

fn wait_until(target: DateTime<Utc>) {
    while let Ok(remaining) = (target - Utc::now()).to_std() {
        if remaining <= SETTLE {
            thread::sleep(remaining);
            break;
        }
        thread::sleep(remaining / 2);
    }
}

type Opener<T> = Box<dyn Fn(&Path) -> io::Result<T> + Send + Sync>;

/// The clock on one bus. Each command opens its own connection through
/// the opener.
pub struct Rtc<T: Transport = I2cDevFile> {
    bus: PathBuf,
    open: Opener<T>,
}

impl Rtc {
    pub fn new(bus: impl Into<PathBuf>) -> Self {
        Self::with_opener(bus, |bus| I2cDevFile::open(bus))
    }
}

impl<T: Transport> Rtc<T> {
    /// Uses `open` to get a fresh transport on `bus` for every command.
    pub fn with_opener(
        bus: impl Into<PathBuf>,
        open: impl Fn(&Path) -> io::Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            bus: bus.into(),
            open: Box::new(open),
        }
    }

    pub fn bus(&self) -> &Path {
        &self.bus
    }

    pub fn open(&self, cmd: Command) -> Result<Connection<T>> {
        let transport = (self.open)(&self.bus)?;
        Connection::with_transport(
            transport,
            self.bus.clone(),
            cmd.address(),
            false,
            ByteOrder::Little,
        )
    }

    /// Reads the data bytes of `cmd`.
    pub fn dump(&self, cmd: Command) -> Result<Vec<u8>> {
        let conn = self.open(cmd)?;
        let mut buf = vec![0u8; cmd.data_len()];
        let n = conn.read(&mut buf)?;
        conn.close()?;
        if n != buf.len() {
            return Err(Error::Truncated {
                expected: buf.len(),
                actual: n,
            });
        }
        Ok(buf)
    }

    /// Current time held by the clock.
    pub fn now(&self) -> Result<DateTime<Utc>> {
        let data = self.dump(Command::RealTime1)?;
        let buf: [u8; TIME_LEN] = data
            .as_slice()
            .try_into()
            .map_err(|_| Error::Device(format!("short clock reading {data:02x?}")))?;
        decode_datetime(&buf)
    }

    /// Resets the chip into 24 hour mode. Returns status register 1 as it
    /// was before the reset.
    pub fn reset(&self) -> Result<u8> {
        let status = self.dump(Command::Status1)?[0];
        debug!("status1 before reset: {status:08b}");
        thread::sleep(RESET_WAIT);

        let conn = self.open(Command::Status1)?;
        let n = conn.write(&[STATUS1_RESET_24H])?;
        conn.close()?;
        if n != 1 {
            return Err(Error::Truncated {
                expected: 1,
                actual: n,
            });
        }
        Ok(status)
    }

    /// Sets the clock from the system clock (UTC).
    ///
    /// The write is timed so that the value lands on a whole second, with
    /// `delay` the expected time for the write to take effect. Returns the
    /// latency measured for this write, which is a good `delay` for the next
    /// call. Can take over a second because of the alignment.
    pub fn set_time(&self, delay: Duration) -> Result<Duration> {
        let conn = self.open(Command::RealTime1)?;

        let goal = aligned_goal(Utc::now(), delay)?;
        let data = encode_datetime(&goal)?;
        let start = goal - TimeDelta::from_std(delay).unwrap_or(TimeDelta::zero());
        wait_until(start);

        let t1 = Instant::now();
        let n = conn.write(&data)?;
        let t2 = Instant::now();
        conn.close()?;
        if n != data.len() {
            return Err(Error::Truncated {
                expected: data.len(),
                actual: n,
            });
        }

        let readback = self.now();
        let t3 = Instant::now();
        info!("goal {goal}, read back {readback:?}");

        let latency = ((t3 - t1) + (t2 - t1)) / 2;
        readback.map(|_| latency)
    }
}
