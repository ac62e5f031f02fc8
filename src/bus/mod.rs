//! Register-level transport to the sensor bus.
//!
//! A [`RegisterBus`] only knows how to move single bytes to and from device
//! registers. Everything multi-byte is assembled here from those transfers,
//! low byte first, without any sensor semantics.

mod linux_i2c;
#[cfg(test)]
pub(crate) mod mock_bus;

pub use linux_i2c::LinuxI2c;

use std::fmt;

/// A failed register transfer. Never retried at this layer.
#[derive(Debug)]
pub struct BusError {
    addr: u8,
    reg: u8,
    source: std::io::Error,
}

impl BusError {
    pub fn new(addr: u8, reg: u8, source: std::io::Error) -> Self { Self { addr, reg, source } }
    pub fn addr(&self) -> u8 { self.addr }
    pub fn reg(&self) -> u8 { self.reg }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus transfer with device {:#04x}, register {:#04x} failed: {}",
            self.addr, self.reg, self.source
        )
    }
}

impl std::error::Error for BusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.source) }
}

/// Assembles `bytes` (given low to high) into one integer.
///
/// With `signed` set, the value is sign-extended as two's complement over the
/// full width of `bytes`.
pub fn combine(bytes: &[u8], signed: bool) -> i64 {
    let width = bytes.len().min(7) * 8;
    let raw = bytes
        .iter()
        .take(7)
        .enumerate()
        .fold(0i64, |acc, (i, b)| acc | (i64::from(*b) << (8 * i)));
    if signed && width > 0 && raw & (1 << (width - 1)) != 0 {
        raw - (1 << width)
    } else {
        raw
    }
}

pub trait RegisterBus: Send {
    /// Reads a single register of the device at the 7-bit address `addr`.
    fn read_register(&mut self, addr: u8, reg: u8) -> Result<u8, BusError>;

    /// Writes a single register without reading it back first.
    fn store_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError>;

    /// Writes `value` into `reg` and returns what the register held before.
    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<u8, BusError> {
        let old = self.read_register(addr, reg)?;
        self.store_register(addr, reg, value)?;
        Ok(old)
    }

    /// Reads `registers` (low to high) and combines them into one signed value.
    fn read_value(&mut self, addr: u8, registers: &[u8]) -> Result<i64, BusError> {
        let mut bytes = Vec::with_capacity(registers.len());
        for reg in registers {
            bytes.push(self.read_register(addr, *reg)?);
        }
        Ok(combine(&bytes, true))
    }

    /// Splits `registers` into `channels` equal chunks and reads one signed
    /// value per chunk. The chunks are separate transfers, not one atomic read.
    fn read_vector(&mut self, addr: u8, registers: &[u8], channels: usize) -> Result<Vec<i64>, BusError> {
        if channels == 0 {
            return Ok(Vec::new());
        }
        let per_channel = registers.len() / channels;
        registers
            .chunks_exact(per_channel.max(1))
            .take(channels)
            .map(|chunk| self.read_value(addr, chunk))
            .collect()
    }
}
