/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! Request codes from `linux/i2c-dev.h` and typed wrappers for the ones a
//! [`Connection`](crate::Connection) issues itself.
//!
//! `I2C_RDWR` and `I2C_SMBUS` are exported for callers driving combined
//! transactions on the raw descriptor; nothing here wraps them.

use std::time::Duration;

/// Number of times a device address is polled when not acknowledging.
pub const I2C_RETRIES: u32 = 0x0701;
/// Adapter timeout, in units of 10 ms.
pub const I2C_TIMEOUT: u32 = 0x0702;
/// Use this slave address.
pub const I2C_SLAVE: u32 = 0x0703;
/// 0 for 7-bit addresses, != 0 for 10-bit.
pub const I2C_TENBIT: u32 = 0x0704;
/// Get the adapter functionality mask.
pub const I2C_FUNCS: u32 = 0x0705;
/// Use this slave address, even if it is already in use by a driver.
pub const I2C_SLAVE_FORCE: u32 = 0x0706;
/// Combined R/W transfer (one STOP only).
pub const I2C_RDWR: u32 = 0x0707;
/// != 0 to use packet error checking.
pub const I2C_PEC: u32 = 0x0708;
/// SMBus transfer.
pub const I2C_SMBUS: u32 = 0x0720;

const TIMEOUT_TICK: Duration = Duration::from_millis(10);

bitflags::bitflags! {
    /// Adapter capabilities reported by `I2C_FUNCS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Functionality: u64 {
        const I2C = 0x0000_0001;
        const TEN_BIT_ADDR = 0x0000_0002;
        const PROTOCOL_MANGLING = 0x0000_0004;
        const SMBUS_PEC = 0x0000_0008;
        const NOSTART = 0x0000_0010;
        const SLAVE = 0x0000_0020;
        const SMBUS_BLOCK_PROC_CALL = 0x0000_8000;
        const SMBUS_QUICK = 0x0001_0000;
        const SMBUS_READ_BYTE = 0x0002_0000;
        const SMBUS_WRITE_BYTE = 0x0004_0000;
        const SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const SMBUS_READ_WORD_DATA = 0x0020_0000;
        const SMBUS_WRITE_WORD_DATA = 0x0040_0000;
        const SMBUS_PROC_CALL = 0x0080_0000;
        const SMBUS_READ_BLOCK_DATA = 0x0100_0000;
        const SMBUS_WRITE_BLOCK_DATA = 0x0200_0000;
        const SMBUS_READ_I2C_BLOCK = 0x0400_0000;
        const SMBUS_WRITE_I2C_BLOCK = 0x0800_0000;
        const SMBUS_HOST_NOTIFY = 0x1000_0000;
    }
}

/// Converts a timeout into `I2C_TIMEOUT` ticks, rounding up so that any
/// non-zero duration stays non-zero. `None` if it does not fit the ioctl
/// argument.
pub fn timeout_ticks(timeout: Duration) -> Option<u32> {
    let ticks = timeout.as_nanos().div_ceil(TIMEOUT_TICK.as_nanos());
    let ticks = u32::try_from(ticks).ok()?;
    // The argument travels as a C int.
    if ticks > i32::MAX as u32 {
        return None;
    }
    Some(ticks)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) mod sys {
    use nix::libc::c_ulong;

    nix::ioctl_write_int_bad!(set_retries, super::I2C_RETRIES);
    nix::ioctl_write_int_bad!(set_timeout, super::I2C_TIMEOUT);
    nix::ioctl_write_int_bad!(set_slave, super::I2C_SLAVE);
    nix::ioctl_write_int_bad!(set_slave_force, super::I2C_SLAVE_FORCE);
    nix::ioctl_write_int_bad!(set_ten_bit, super::I2C_TENBIT);
    nix::ioctl_write_int_bad!(set_pec, super::I2C_PEC);
    nix::ioctl_read_bad!(get_funcs, super::I2C_FUNCS, c_ulong);
}
