/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! Bosch BMP-series pressure sensor identification.
//!
//! Design guide: <https://community.bosch-sensortec.com/t5/Knowledge-base/BMP-series-pressure-sensor-design-guide/ta-p/7103>

use crate::conn::{ByteOrder, Connection};
use crate::transport::Transport;
use crate::{Error, Result};
use log::{debug, info};
use std::{fmt, path::Path};

/// Addresses a BMP sensor can be strapped to.
pub const SENSOR_ADDRESSES: [u16; 2] = [0x76, 0x77];

pub const CHIP_ID_REGISTER: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Bmp280,
    Bmp388,
}

impl Sensor {
    pub fn from_chip_id(id: u8) -> Option<Sensor> {
        match id {
            0x58 => Some(Sensor::Bmp280),
            0x50 => Some(Sensor::Bmp388),
            _ => None,
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sensor::Bmp280 => "BMP280",
            Sensor::Bmp388 => "BMP388",
        })
    }
}

/// Reads the chip id of the device behind `conn`.
pub fn identify<T: Transport>(conn: &Connection<T>) -> Result<Sensor> {
    let id = conn.read_register(CHIP_ID_REGISTER)?;
    Sensor::from_chip_id(id).ok_or_else(|| {
        Error::Device(format!(
            "unrecognized device @ {:02x}h ID:{id:02x}h",
            conn.address()
        ))
    })
}

/// Looks for sensors at every [`SENSOR_ADDRESSES`] entry on `bus`.
pub fn probe(bus: &Path) -> Vec<(u16, Sensor)> {
    let mut found = Vec::new();
    for addr in SENSOR_ADDRESSES {
        let conn = match Connection::open(bus, addr, false, ByteOrder::Little) {
            Ok(conn) => conn,
            Err(e) => {
                debug!("no device @ {addr:02x}h: {e}");
                continue;
            }
        };
        match identify(&conn) {
            Ok(sensor) => {
                info!("Found device {sensor} @ {addr:02x}h");
                found.push((addr, sensor));
            }
            Err(e) => info!("skipping {addr:02x}h: {e}"),
        }
        if let Err(e) = conn.close() {
            debug!("closing {addr:02x}h: {e}");
        }
    }
    found
}
