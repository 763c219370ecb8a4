/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

use crate::ioctl::{self, Functionality};
use crate::transport::{i2c::I2cDevFile, Transport};
use crate::{Error, Result};
use log::{debug, warn};
use std::{
    fmt, mem,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

/// Byte order used by the fixed-width integer helpers of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    Big,
    #[default]
    Little,
}

/// Fixed-width unsigned integers the connection can move.
trait Word: Sized + Copy {
    const WIDTH: usize;
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    fn encode(self, order: ByteOrder) -> Self::Bytes;
    fn decode(bytes: Self::Bytes, order: ByteOrder) -> Self;
}

macro_rules! word {
    ($($ty:ty),*) => {$(
        impl Word for $ty {
            const WIDTH: usize = mem::size_of::<$ty>();
            type Bytes = [u8; mem::size_of::<$ty>()];

            fn encode(self, order: ByteOrder) -> Self::Bytes {
                match order {
                    ByteOrder::Big => self.to_be_bytes(),
                    ByteOrder::Little => self.to_le_bytes(),
                }
            }

            fn decode(bytes: Self::Bytes, order: ByteOrder) -> Self {
                match order {
                    ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                    ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                }
            }
        }
    )*};
}

word!(u16, u32, u64);

enum Handle<T> {
    Unbound,
    Open(T),
    Closed,
}

/// An open connection to one addressed device on an i2c bus.
///
/// Every operation locks the connection for its whole duration, so a
/// connection can be shared between threads (e.g. behind an `Arc`) without
/// transfers interleaving. Once closed it stays closed.
///
/// `Connection::default()` is an unbound connection on which every
/// operation fails with [`Error::Invalid`].
pub struct Connection<T: Transport = I2cDevFile> {
    bus: PathBuf,
    address: u16,
    ten_bit: bool,
    byte_order: ByteOrder,
    handle: Mutex<Handle<T>>,
}

impl Connection<I2cDevFile> {
    /// Opens `bus` and binds it to the device at `address`.
    ///
    /// Whether the device uses 10-bit addressing and which byte order its
    /// registers use are device specific.
    pub fn open(
        bus: impl AsRef<Path>,
        address: u16,
        ten_bit: bool,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        let bus = bus.as_ref();
        let dev = I2cDevFile::open(bus)?;
        Self::configure(dev, bus.to_path_buf(), address, ten_bit, byte_order, false)
    }

    /// Like [`Connection::open`], but binds the address even if a kernel
    /// driver already claimed it.
    ///
    /// # Safety
    ///
    /// The kernel driver owning the device keeps talking to it; transfers
    /// from both sides may corrupt the device state.
    pub unsafe fn open_forced(
        bus: impl AsRef<Path>,
        address: u16,
        ten_bit: bool,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        let bus = bus.as_ref();
        let dev = I2cDevFile::open(bus)?;
        Self::configure(dev, bus.to_path_buf(), address, ten_bit, byte_order, true)
    }
}

impl<T: Transport> Connection<T> {
    /// Binds an already opened transport to the device at `address`.
    ///
    /// `bus` only names the transport; it is not opened. If configuring the
    /// addressing fails the transport is closed and the error returned.
    pub fn with_transport(
        transport: T,
        bus: impl Into<PathBuf>,
        address: u16,
        ten_bit: bool,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        Self::configure(transport, bus.into(), address, ten_bit, byte_order, false)
    }

    /// Like [`Connection::with_transport`], but binds with `I2C_SLAVE_FORCE`.
    ///
    /// # Safety
    ///
    /// See [`Connection::open_forced`].
    pub unsafe fn with_transport_forced(
        transport: T,
        bus: impl Into<PathBuf>,
        address: u16,
        ten_bit: bool,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        Self::configure(transport, bus.into(), address, ten_bit, byte_order, true)
    }

    fn configure(
        mut transport: T,
        bus: PathBuf,
        address: u16,
        ten_bit: bool,
        byte_order: ByteOrder,
        force: bool,
    ) -> Result<Self> {
        let configured = transport
            .set_ten_bit(ten_bit)
            .and_then(|()| transport.set_slave_address(address, force));
        if let Err(e) = configured {
            debug!(
                "{}: failed to bind address {address:#04x}: {e}",
                bus.display()
            );
            if let Err(close_err) = transport.close() {
                warn!("{}: close after failed setup: {close_err}", bus.display());
            }
            return Err(Error::Io(e));
        }

        debug!(
            "{}: bound to {address:#04x} ({}-bit, {byte_order:?} endian)",
            bus.display(),
            if ten_bit { 10 } else { 7 }
        );
        Ok(Self {
            bus,
            address,
            ten_bit,
            byte_order,
            handle: Mutex::new(Handle::Open(transport)),
        })
    }

    pub fn bus(&self) -> &Path {
        &self.bus
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn is_ten_bit(&self) -> bool {
        self.ten_bit
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), Handle::Closed)
    }

    // The guarded state is a plain enum; a panic elsewhere cannot leave it
    // half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Handle<T>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the open transport while holding the lock.
    fn with<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        match &mut *self.lock() {
            Handle::Open(transport) => f(transport),
            Handle::Closed => Err(Error::Closed),
            Handle::Unbound => Err(Error::Invalid),
        }
    }

    /// Releases the bus handle. Later operations, including another
    /// `close`, fail with [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut handle = self.lock();
        match mem::replace(&mut *handle, Handle::Closed) {
            Handle::Open(transport) => {
                debug!("{}: closing {:#04x}", self.bus.display(), self.address);
                transport.close()?;
                Ok(())
            }
            Handle::Closed => Err(Error::Closed),
            Handle::Unbound => {
                *handle = Handle::Unbound;
                Err(Error::Invalid)
            }
        }
    }

    /// Reads up to `buf.len()` bytes in a single transfer.
    ///
    /// A short read is not an error here; callers needing an exact count
    /// check the returned length.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.with(|t| Ok(t.read(buf)?))
    }

    /// Writes `data` in a single transfer, returning the count accepted.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.with(|t| Ok(t.write(data)?))
    }

    /// Selects register `reg` and reads one byte from it.
    pub fn read_register(&self, reg: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.read_registers(reg, &mut value)?;
        Ok(value[0])
    }

    /// Selects register `reg` and fills `buf` from it. The register write
    /// and the read happen under one lock.
    pub fn read_registers(&self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.with(|t| {
            exact(1, t.write(&[reg])?)?;
            exact(buf.len(), t.read(buf)?)
        })
    }

    fn read_word<W: Word>(&self) -> Result<W> {
        let mut bytes = W::Bytes::default();
        let n = self.read(bytes.as_mut())?;
        exact(W::WIDTH, n)?;
        Ok(W::decode(bytes, self.byte_order))
    }

    fn write_word<W: Word>(&self, value: W) -> Result<()> {
        let bytes = value.encode(self.byte_order);
        let n = self.write(bytes.as_ref())?;
        exact(W::WIDTH, n)
    }

    pub fn read_u16(&self) -> Result<u16> {
        self.read_word()
    }

    pub fn read_u32(&self) -> Result<u32> {
        self.read_word()
    }

    pub fn read_u64(&self) -> Result<u64> {
        self.read_word()
    }

    pub fn write_u16(&self, value: u16) -> Result<()> {
        self.write_word(value)
    }

    pub fn write_u32(&self, value: u32) -> Result<()> {
        self.write_word(value)
    }

    pub fn write_u64(&self, value: u64) -> Result<()> {
        self.write_word(value)
    }

    /// Sets how often the adapter retries an unacknowledged address.
    pub fn set_retries(&self, count: u32) -> Result<()> {
        self.with(|t| Ok(t.set_retries(count)?))
    }

    /// Sets the adapter timeout. The kernel counts in 10 ms ticks; the
    /// duration is rounded up to the next tick.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        let ticks = ioctl::timeout_ticks(timeout)
            .ok_or_else(|| Error::InvalidArgument(format!("timeout {timeout:?} too long")))?;
        self.with(|t| Ok(t.set_timeout(ticks)?))
    }

    /// Enables or disables SMBus packet error checking.
    pub fn set_pec(&self, enabled: bool) -> Result<()> {
        self.with(|t| Ok(t.set_pec(enabled)?))
    }

    /// Queries what the bus adapter supports.
    pub fn functionality(&self) -> Result<Functionality> {
        self.with(|t| Ok(Functionality::from_bits_truncate(t.functionality()?)))
    }
}

fn exact(expected: usize, actual: usize) -> Result<()> {
    if actual != expected {
        return Err(Error::Truncated { expected, actual });
    }
    Ok(())
}

impl<T: Transport> Default for Connection<T> {
    fn default() -> Self {
        Self {
            bus: PathBuf::new(),
            address: 0,
            ten_bit: false,
            byte_order: ByteOrder::default(),
            handle: Mutex::new(Handle::Unbound),
        }
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.lock() {
            Handle::Unbound => "unbound",
            Handle::Open(_) => "open",
            Handle::Closed => "closed",
        };
        f.debug_struct("Connection")
            .field("bus", &self.bus)
            .field("address", &format_args!("{:#04x}", self.address))
            .field("ten_bit", &self.ten_bit)
            .field("byte_order", &self.byte_order)
            .field("state", &state)
            .finish()
    }
}
