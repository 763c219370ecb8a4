#![allow(dead_code)]

use i2cconn::Transport;
use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

/// Configuration calls seen by a mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ioctl {
    TenBit(bool),
    Slave(u16, bool),
    Retries(u32),
    Timeout(u32),
    Pec(bool),
    Funcs,
}

/// Counters shared between a test and the mocks it hands out.
#[derive(Debug, Default)]
pub struct Recorder {
    active: AtomicUsize,
    pub overlaps: AtomicUsize,
    pub closes: AtomicUsize,
    pub ioctls: Mutex<Vec<Ioctl>>,
}

impl Recorder {
    /// Marks a transport call in progress; a second concurrent call counts
    /// as an overlap.
    fn enter(&self) {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(20));
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn record(&self, ioctl: Ioctl) {
        self.enter();
        self.ioctls.lock().unwrap().push(ioctl);
    }

    pub fn ioctls(&self) -> Vec<Ioctl> {
        self.ioctls.lock().unwrap().clone()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Whatever is written comes back on the next reads, in order.
pub struct Loopback {
    pub rec: Arc<Recorder>,
    fifo: VecDeque<u8>,
    /// Caps every transfer to this many bytes.
    pub limit: Option<usize>,
}

impl Loopback {
    pub fn new(rec: Arc<Recorder>) -> Self {
        Self {
            rec,
            fifo: VecDeque::new(),
            limit: None,
        }
    }

    pub fn limited(rec: Arc<Recorder>, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(rec)
        }
    }

    fn cap(&self, len: usize) -> usize {
        self.limit.map_or(len, |l| len.min(l))
    }
}

impl Transport for Loopback {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rec.enter();
        let n = self.cap(buf.len()).min(self.fifo.len());
        for (dst, src) in buf.iter_mut().zip(self.fifo.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.rec.enter();
        let n = self.cap(data.len());
        self.fifo.extend(&data[..n]);
        Ok(n)
    }

    fn set_ten_bit(&mut self, enabled: bool) -> io::Result<()> {
        self.rec.record(Ioctl::TenBit(enabled));
        Ok(())
    }

    fn set_slave_address(&mut self, address: u16, force: bool) -> io::Result<()> {
        self.rec.record(Ioctl::Slave(address, force));
        Ok(())
    }

    fn set_retries(&mut self, count: u32) -> io::Result<()> {
        self.rec.record(Ioctl::Retries(count));
        Ok(())
    }

    fn set_timeout(&mut self, ticks: u32) -> io::Result<()> {
        self.rec.record(Ioctl::Timeout(ticks));
        Ok(())
    }

    fn set_pec(&mut self, enabled: bool) -> io::Result<()> {
        self.rec.record(Ioctl::Pec(enabled));
        Ok(())
    }

    fn functionality(&mut self) -> io::Result<u64> {
        self.rec.record(Ioctl::Funcs);
        Ok(0x0eff_0009)
    }

    fn close(self) -> io::Result<()> {
        self.rec.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Register memories of several devices on one bus. The first byte of a
/// write selects a register, the rest are stored from there on; reads
/// continue from the selected register.
#[derive(Default)]
pub struct Devices {
    memories: Mutex<HashMap<u16, ([u8; 256], u8)>>,
}

impl Devices {
    pub fn with(devices: &[(u16, &[(u8, u8)])]) -> Arc<Self> {
        let this = Self::default();
        {
            let mut memories = this.memories.lock().unwrap();
            for (addr, regs) in devices {
                let mut mem = [0u8; 256];
                for &(reg, value) in regs.iter() {
                    mem[reg as usize] = value;
                }
                memories.insert(*addr, (mem, 0));
            }
        }
        Arc::new(this)
    }

    pub fn register(&self, addr: u16, reg: u8) -> u8 {
        self.memories.lock().unwrap()[&addr].0[reg as usize]
    }
}

/// A handle on a [`Devices`] bus, bound to one address after setup.
pub struct BusHandle {
    pub rec: Arc<Recorder>,
    devices: Arc<Devices>,
    address: Option<u16>,
    ten_bit: bool,
}

impl BusHandle {
    pub fn new(rec: Arc<Recorder>, devices: Arc<Devices>) -> Self {
        Self {
            rec,
            devices,
            address: None,
            ten_bit: false,
        }
    }

    fn nack() -> io::Error {
        // ENXIO, what the kernel reports for an absent device.
        io::Error::from_raw_os_error(6)
    }
}

impl Transport for BusHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rec.enter();
        let addr = self.address.ok_or_else(Self::nack)?;
        let mut memories = self.devices.memories.lock().unwrap();
        let (mem, ptr) = memories.get_mut(&addr).ok_or_else(Self::nack)?;
        for b in buf.iter_mut() {
            *b = mem[*ptr as usize];
            *ptr = ptr.wrapping_add(1);
        }
        Ok(buf.len())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.rec.enter();
        let addr = self.address.ok_or_else(Self::nack)?;
        let mut memories = self.devices.memories.lock().unwrap();
        let (mem, ptr) = memories.get_mut(&addr).ok_or_else(Self::nack)?;
        if let Some((&reg, rest)) = data.split_first() {
            *ptr = reg;
            for &b in rest {
                mem[*ptr as usize] = b;
                *ptr = ptr.wrapping_add(1);
            }
        }
        Ok(data.len())
    }

    fn set_ten_bit(&mut self, enabled: bool) -> io::Result<()> {
        self.rec.record(Ioctl::TenBit(enabled));
        self.ten_bit = enabled;
        Ok(())
    }

    fn set_slave_address(&mut self, address: u16, force: bool) -> io::Result<()> {
        self.rec.record(Ioctl::Slave(address, force));
        let max = if self.ten_bit { 0x3ff } else { 0x7f };
        if address > max {
            // EINVAL, as i2c-dev answers out of range addresses.
            return Err(io::Error::from_raw_os_error(22));
        }
        self.address = Some(address);
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        self.rec.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Chips without a register pointer, like the S-35390A: each address holds
/// one data block. A write replaces the block, a read returns it from the
/// start, as far as it goes.
#[derive(Default)]
pub struct Chips {
    blocks: Mutex<HashMap<u16, Vec<u8>>>,
}

impl Chips {
    pub fn with(blocks: &[(u16, &[u8])]) -> Arc<Self> {
        let this = Self::default();
        this.blocks
            .lock()
            .unwrap()
            .extend(blocks.iter().map(|(addr, data)| (*addr, data.to_vec())));
        Arc::new(this)
    }

    pub fn block(&self, addr: u16) -> Vec<u8> {
        self.blocks.lock().unwrap()[&addr].clone()
    }
}

/// A handle on a [`Chips`] bus, bound to one address after setup.
pub struct ChipHandle {
    pub rec: Arc<Recorder>,
    chips: Arc<Chips>,
    address: Option<u16>,
}

impl ChipHandle {
    pub fn new(rec: Arc<Recorder>, chips: Arc<Chips>) -> Self {
        Self {
            rec,
            chips,
            address: None,
        }
    }
}

impl Transport for ChipHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rec.enter();
        let addr = self.address.ok_or_else(BusHandle::nack)?;
        let blocks = self.chips.blocks.lock().unwrap();
        let block = blocks.get(&addr).ok_or_else(BusHandle::nack)?;
        let n = buf.len().min(block.len());
        buf[..n].copy_from_slice(&block[..n]);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.rec.enter();
        let addr = self.address.ok_or_else(BusHandle::nack)?;
        let mut blocks = self.chips.blocks.lock().unwrap();
        let block = blocks.get_mut(&addr).ok_or_else(BusHandle::nack)?;
        *block = data.to_vec();
        Ok(data.len())
    }

    fn set_ten_bit(&mut self, enabled: bool) -> io::Result<()> {
        self.rec.record(Ioctl::TenBit(enabled));
        Ok(())
    }

    fn set_slave_address(&mut self, address: u16, force: bool) -> io::Result<()> {
        self.rec.record(Ioctl::Slave(address, force));
        self.address = Some(address);
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        self.rec.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
