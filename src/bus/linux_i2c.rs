use super::{BusError, RegisterBus};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    os::fd::AsRawFd,
};

/// `I2C_SLAVE` request of the Linux i2c-dev interface.
const I2C_SLAVE: u16 = 0x0703;

/// Register transport over `/dev/i2c-<bus_id>`.
///
/// Each device driver opens its own handle, so the slave address only has to
/// be re-selected when a handle talks to more than one device.
pub struct LinuxI2c {
    file: File,
    bus_id: u8,
    selected: Option<u8>,
}

impl LinuxI2c {
    pub fn open(bus_id: u8) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(format!("/dev/i2c-{bus_id}"))?;
        Ok(Self { file, bus_id, selected: None })
    }

    pub fn bus_id(&self) -> u8 { self.bus_id }

    fn select(&mut self, addr: u8) -> std::io::Result<()> {
        if self.selected == Some(addr) {
            return Ok(());
        }
        let res = unsafe {
            libc::ioctl(self.file.as_raw_fd(), I2C_SLAVE as _, libc::c_ulong::from(addr))
        };
        if res < 0 {
            self.selected = None;
            return Err(std::io::Error::last_os_error());
        }
        self.selected = Some(addr);
        Ok(())
    }
}

impl RegisterBus for LinuxI2c {
    fn read_register(&mut self, addr: u8, reg: u8) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];
        self.select(addr)
            .and_then(|()| self.file.write_all(&[reg]))
            .and_then(|()| self.file.read_exact(&mut buf))
            .map_err(|e| BusError::new(addr, reg, e))?;
        Ok(buf[0])
    }

    fn store_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        self.select(addr)
            .and_then(|()| self.file.write_all(&[reg, value]))
            .map_err(|e| BusError::new(addr, reg, e))
    }
}
