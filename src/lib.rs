/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! Connections to devices on Linux i2c/smbus buses.
//!
//! A [`Connection`] owns one open bus device file (`/dev/i2c-N`), bound to
//! a single device address, and serializes every transfer on it behind a
//! mutex. Fixed-width integer helpers encode and decode with the byte order
//! chosen when the connection was opened.
//!
//! ```no_run
//! use i2cconn::{bus_file, ByteOrder, Connection};
//!
//! let conn = Connection::open(bus_file(1), 0x76, false, ByteOrder::Little)?;
//! let id = conn.read_register(0x00)?;
//! println!("chip id {id:#04x}");
//! conn.close()?;
//! # Ok::<(), i2cconn::Error>(())
//! ```

pub mod conn;
pub mod device;
pub mod ioctl;
pub mod transport;

use std::{io, path::PathBuf};

pub use conn::{ByteOrder, Connection};
pub use ioctl::Functionality;
pub use transport::Transport;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use transport::i2c::I2cDevFile;

/// Errors reported by connections and the device helpers built on them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection was never bound to a bus.
    #[error("invalid connection")]
    Invalid,

    /// The connection has been closed.
    #[error("connection closed")]
    Closed,

    /// A fixed-width transfer moved a different number of bytes than asked.
    #[error("truncated transaction: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The device answered with data that cannot be decoded.
    #[error("unexpected device data: {0}")]
    Device(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Path of the device file for bus number `n`.
pub fn bus_file(n: u32) -> PathBuf {
    PathBuf::from(format!("/dev/i2c-{n}"))
}
