use std::fmt::{Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use log::trace;
use crate::GpioResult;

/// Interrupt delivery through a Linux UIO device.
///
/// The kernel masks the interrupt line every time it fires.
/// [UioInterrupt::unmask] lets it through again and [UioInterrupt::wait] blocks until it fires.
pub struct UioInterrupt {
    path: String,
    file: File,
}

impl Debug for UioInterrupt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UioInterrupt({})", self.path)
    }
}

impl UioInterrupt {
    pub fn open(path: &str) -> GpioResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(UioInterrupt { path: path.to_string(), file })
    }

    pub fn unmask(&mut self) -> GpioResult<()> {
        self.file.write_all(&1u32.to_ne_bytes())?;
        Ok(())
    }

    /// Blocks until the interrupt fires. Returns the total number of interrupts seen so far.
    pub fn wait(&mut self) -> GpioResult<u32> {
        let mut buf = [0u8; 4];
        self.file.read_exact(&mut buf)?;
        let count = u32::from_ne_bytes(buf);
        trace!("{:?} fired, count={}", self, count);
        Ok(count)
    }
}
