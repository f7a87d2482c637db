pub mod port;
pub mod uio;

use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use crate::{GpioError, GpioResult};

/// One of the two channels of a dual-channel AXI GPIO block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AxiChannel {
    One,
    Two,
}

impl AxiChannel {
    /// Gets the bit identifying this channel in the interrupt registers.
    pub fn interrupt_mask(self) -> u32 {
        match self {
            AxiChannel::One => 0x1,
            AxiChannel::Two => 0x2,
        }
    }

    fn data_offset(self) -> usize {
        match self {
            AxiChannel::One => AxiGpio::GPIO_DATA,
            AxiChannel::Two => AxiGpio::GPIO2_DATA,
        }
    }

    fn tri_offset(self) -> usize {
        match self {
            AxiChannel::One => AxiGpio::GPIO_TRI,
            AxiChannel::Two => AxiGpio::GPIO2_TRI,
        }
    }
}

impl TryFrom<u8> for AxiChannel {
    type Error = GpioError;

    fn try_from(value: u8) -> GpioResult<Self> {
        match value {
            1 => Ok(AxiChannel::One),
            2 => Ok(AxiChannel::Two),
            _ => Err(GpioError::InvalidArgument),
        }
    }
}

/// A memory-mapped AXI GPIO register block.
pub struct AxiGpio {
    mmap: MmapRaw,
}

impl AxiGpio {
    const GPIO_DATA: usize = 0x000;
    const GPIO_TRI: usize = 0x004;
    const GPIO2_DATA: usize = 0x008;
    const GPIO2_TRI: usize = 0x00C;
    const GIER: usize = 0x11C;
    const IP_ISR: usize = 0x120;
    const IP_IER: usize = 0x128;

    const GIER_ENABLE: u32 = 1 << 31;
    const MAP_LEN: usize = 0x1000;

    /// Maps the registers exposed as the first memory map of a UIO device, e.g. `/dev/uio0`.
    pub fn open_uio(path: &str) -> GpioResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = MmapOptions::new()
            .len(Self::MAP_LEN)
            .map_raw(&file)?;

        Ok(AxiGpio { mmap })
    }

    #[cfg(test)]
    pub(crate) fn anonymous() -> GpioResult<Self> {
        let mmap = MmapOptions::new().len(Self::MAP_LEN).map_anon()?;
        Ok(AxiGpio { mmap: mmap.into() })
    }

    fn read_register(&self, offset: usize) -> u32 {
        let register_ptr = unsafe { self.mmap.as_ptr().add(offset) } as *const u32;
        unsafe { register_ptr.read_volatile() }
    }

    fn write_register(&self, offset: usize, value: u32) {
        let register_ptr = unsafe { self.mmap.as_mut_ptr().add(offset) } as *mut u32;
        unsafe { register_ptr.write_volatile(value) };
    }

    /// Sets the direction of each line of `channel`. A 1 bit makes the line an input.
    pub fn set_data_direction(&self, channel: AxiChannel, direction_mask: u32) {
        debug!("Setting {:?} direction to {:#x}", channel, direction_mask);
        self.write_register(channel.tri_offset(), direction_mask);
    }

    pub fn data_direction(&self, channel: AxiChannel) -> u32 {
        self.read_register(channel.tri_offset())
    }

    pub fn discrete_read(&self, channel: AxiChannel) -> u32 {
        self.read_register(channel.data_offset())
    }

    /// Writes the output lines of `channel`. Bits of input lines are ignored by the hardware.
    pub fn discrete_write(&self, channel: AxiChannel, value: u32) {
        self.write_register(channel.data_offset(), value);
    }

    pub fn interrupt_enable(&self, mask: u32) {
        let enabled = self.read_register(Self::IP_IER);
        self.write_register(Self::IP_IER, enabled | mask);
    }

    pub fn interrupt_disable(&self, mask: u32) {
        let enabled = self.read_register(Self::IP_IER);
        self.write_register(Self::IP_IER, enabled & !mask);
    }

    pub fn interrupt_enabled(&self) -> u32 {
        self.read_register(Self::IP_IER)
    }

    /// Acknowledges the pending interrupts in `mask`.
    pub fn interrupt_clear(&self, mask: u32) {
        // ISR bits toggle on write, so only write back those that are set.
        let status = self.read_register(Self::IP_ISR);
        self.write_register(Self::IP_ISR, status & mask);
    }

    pub fn interrupt_status(&self) -> u32 {
        self.read_register(Self::IP_ISR)
    }

    /// Lets the block drive its interrupt output.
    pub fn interrupt_global_enable(&self) {
        self.write_register(Self::GIER, Self::GIER_ENABLE);
    }

    pub fn interrupt_global_disable(&self) {
        self.write_register(Self::GIER, 0);
    }
}

impl Debug for AxiGpio {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AxiGpio({:?})", self.mmap.as_ptr().addr())
    }
}
