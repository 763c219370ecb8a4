pub mod i2c;

use std::io;

/// The raw operations a [`Connection`](crate::Connection) performs on a bus
/// handle.
///
/// `read` and `write` are single pass-through calls: short transfers are
/// returned as-is. The optional adapter settings default to
/// [`io::ErrorKind::Unsupported`].
pub trait Transport: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    fn set_ten_bit(&mut self, enabled: bool) -> io::Result<()>;
    fn set_slave_address(&mut self, address: u16, force: bool) -> io::Result<()>;

    fn set_retries(&mut self, _count: u32) -> io::Result<()> {
        Err(unsupported("I2C_RETRIES"))
    }

    /// `ticks` is in units of 10 ms.
    fn set_timeout(&mut self, _ticks: u32) -> io::Result<()> {
        Err(unsupported("I2C_TIMEOUT"))
    }

    fn set_pec(&mut self, _enabled: bool) -> io::Result<()> {
        Err(unsupported("I2C_PEC"))
    }

    fn functionality(&mut self) -> io::Result<u64> {
        Err(unsupported("I2C_FUNCS"))
    }

    /// Releases the handle, reporting the result of the release.
    fn close(self) -> io::Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

pub(crate) fn unsupported(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{what} is not supported by this transport"),
    )
}
