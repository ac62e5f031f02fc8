//! In-memory register map standing in for a device on the bus.

use super::{BusError, RegisterBus};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Debug, Default)]
struct Registers {
    values: HashMap<(u8, u8), u8>,
    writes: Vec<(u8, u8, u8)>,
    failing: bool,
}

/// Mock bus whose register contents can be inspected and programmed from the
/// test while a driver owns a clone of it.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    inner: Arc<Mutex<Registers>>,
}

impl MockBus {
    pub fn new() -> Self { Self::default() }

    pub fn set(&self, addr: u8, reg: u8, value: u8) {
        self.inner.lock().unwrap().values.insert((addr, reg), value);
    }

    /// Programs `bytes` into consecutive registers starting at `first`.
    pub fn set_bytes(&self, addr: u8, first: u8, bytes: &[u8]) {
        for (reg, b) in (first..).zip(bytes) {
            self.set(addr, reg, *b);
        }
    }

    pub fn get(&self, addr: u8, reg: u8) -> u8 {
        self.inner.lock().unwrap().values.get(&(addr, reg)).copied().unwrap_or(0)
    }

    /// Every `(addr, reg, value)` stored so far, in order.
    pub fn writes(&self) -> Vec<(u8, u8, u8)> { self.inner.lock().unwrap().writes.clone() }

    pub fn clear_writes(&self) { self.inner.lock().unwrap().writes.clear(); }

    pub fn set_failing(&self, failing: bool) { self.inner.lock().unwrap().failing = failing; }
}

fn io_failure() -> std::io::Error { std::io::Error::other("remote I/O error") }

impl RegisterBus for MockBus {
    fn read_register(&mut self, addr: u8, reg: u8) -> Result<u8, BusError> {
        let regs = self.inner.lock().unwrap();
        if regs.failing {
            return Err(BusError::new(addr, reg, io_failure()));
        }
        Ok(regs.values.get(&(addr, reg)).copied().unwrap_or(0))
    }

    fn store_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        let mut regs = self.inner.lock().unwrap();
        if regs.failing {
            return Err(BusError::new(addr, reg, io_failure()));
        }
        regs.values.insert((addr, reg), value);
        regs.writes.push((addr, reg, value));
        Ok(())
    }
}
