/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

use crate::transport::Transport;
use std::{io, path::Path};

#[cfg(any(target_os = "linux", target_os = "android"))]
use crate::ioctl::sys;
#[cfg(any(target_os = "linux", target_os = "android"))]
use nix::libc::{c_int, c_ulong};
#[cfg(any(target_os = "linux", target_os = "android"))]
use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    os::fd::{AsRawFd, IntoRawFd, RawFd},
};

/// An open i2c bus character device, e.g. `/dev/i2c-1`.
#[cfg(any(target_os = "linux", target_os = "android"))]
#[derive(Debug)]
pub struct I2cDevFile {
    file: File,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl I2cDevFile {
    /// Opens the bus device file for reading and writing. No address is
    /// bound yet.
    pub fn open(bus: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(bus)?;
        Ok(Self { file })
    }

    fn fd(&self) -> c_int {
        self.file.as_raw_fd()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl AsRawFd for I2cDevFile {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn int_arg(value: u32) -> io::Result<c_int> {
    c_int::try_from(value).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("ioctl argument {value} out of range"),
        )
    })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Transport for I2cDevFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write(data)
    }

    fn set_ten_bit(&mut self, enabled: bool) -> io::Result<()> {
        unsafe { sys::set_ten_bit(self.fd(), enabled as c_int) }?;
        Ok(())
    }

    fn set_slave_address(&mut self, address: u16, force: bool) -> io::Result<()> {
        let address = c_int::from(address);
        if force {
            unsafe { sys::set_slave_force(self.fd(), address) }?;
        } else {
            unsafe { sys::set_slave(self.fd(), address) }?;
        }
        Ok(())
    }

    fn set_retries(&mut self, count: u32) -> io::Result<()> {
        unsafe { sys::set_retries(self.fd(), int_arg(count)?) }?;
        Ok(())
    }

    fn set_timeout(&mut self, ticks: u32) -> io::Result<()> {
        unsafe { sys::set_timeout(self.fd(), int_arg(ticks)?) }?;
        Ok(())
    }

    fn set_pec(&mut self, enabled: bool) -> io::Result<()> {
        unsafe { sys::set_pec(self.fd(), enabled as c_int) }?;
        Ok(())
    }

    fn functionality(&mut self) -> io::Result<u64> {
        let mut funcs: c_ulong = 0;
        unsafe { sys::get_funcs(self.fd(), &mut funcs) }?;
        Ok(funcs as u64)
    }

    fn close(self) -> io::Result<()> {
        nix::unistd::close(self.file.into_raw_fd())?;
        Ok(())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
#[derive(Debug)]
pub struct I2cDevFile;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
impl I2cDevFile {
    pub fn open(_bus: impl AsRef<Path>) -> io::Result<Self> {
        Err(linux_only())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn linux_only() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "i2c transport is linux-only")
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
impl Transport for I2cDevFile {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(linux_only())
    }

    fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
        Err(linux_only())
    }

    fn set_ten_bit(&mut self, _enabled: bool) -> io::Result<()> {
        Err(linux_only())
    }

    fn set_slave_address(&mut self, _address: u16, _force: bool) -> io::Result<()> {
        Err(linux_only())
    }
}
