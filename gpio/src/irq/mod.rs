mod keypad;

use std::fmt::{Debug, Formatter};
use log::{debug, warn};
use crate::{GpioError, GpioResult};
pub use keypad::*;

/// Peripheral-level interrupt controls, scoped by a channel mask.
pub trait InterruptPort: Debug {
    fn interrupt_enable(&self, mask: u32);
    fn interrupt_disable(&self, mask: u32);
    /// Acknowledges the pending interrupt flags in `mask`.
    fn interrupt_clear(&self, mask: u32);
    /// Gets the mask of channels with a pending interrupt.
    fn interrupt_status(&self) -> u32;
}

/// Presents a value to the outside world, e.g. an LED bank.
pub trait OutputSink: Debug {
    fn write_output(&self, value: u8);
}

/// A handler the interrupt dispatch calls when its source fires.
pub trait InterruptHandler: Debug {
    fn handle(&self);
}

struct IrqEntry<'a> {
    id: u32,
    handler: &'a dyn InterruptHandler,
    enabled: bool,
}

/// Maps interrupt source identifiers to their registered handlers.
///
/// The platform calls [IrqTable::dispatch] whenever it learns that a source fired.
/// Nothing is delivered until [IrqTable::global_enable] is called.
pub struct IrqTable<'a> {
    entries: Vec<IrqEntry<'a>>,
    global_enabled: bool,
}

impl Debug for IrqTable<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrqTable")
            .field("sources", &self.entries.iter().map(|e| (e.id, e.enabled)).collect::<Vec<_>>())
            .field("global_enabled", &self.global_enabled)
            .finish()
    }
}

impl Default for IrqTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl <'a> IrqTable<'a> {
    pub fn new() -> Self {
        IrqTable {
            entries: Vec::new(),
            global_enabled: false,
        }
    }

    fn entry_mut(&mut self, id: u32) -> GpioResult<&mut IrqEntry<'a>> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(GpioError::InvalidArgument)
    }

    /// Registers `handler` for the source `id`. The source starts out disabled.
    ///
    /// # Errors
    /// - `GpioError::AlreadyInUse` if a handler is already connected to `id`.
    pub fn connect(&mut self, id: u32, handler: &'a dyn InterruptHandler) -> GpioResult<()> {
        if self.entries.iter().any(|e| e.id == id) {
            return Err(GpioError::AlreadyInUse);
        }
        debug!("Connecting IRQ {} to {:?}", id, handler);
        self.entries.push(IrqEntry { id, handler, enabled: false });
        Ok(())
    }

    pub fn disconnect(&mut self, id: u32) {
        self.entries.retain(|e| e.id != id);
    }

    /// # Errors
    /// - `GpioError::InvalidArgument` if nothing is connected to `id`.
    pub fn enable(&mut self, id: u32) -> GpioResult<()> {
        self.entry_mut(id)?.enabled = true;
        Ok(())
    }

    /// # Errors
    /// - `GpioError::InvalidArgument` if nothing is connected to `id`.
    pub fn disable(&mut self, id: u32) -> GpioResult<()> {
        self.entry_mut(id)?.enabled = false;
        Ok(())
    }

    pub fn global_enable(&mut self) {
        self.global_enabled = true;
    }

    pub fn global_disable(&mut self) {
        self.global_enabled = false;
    }

    /// Delivers an interrupt from source `id` to its handler and runs it to completion.
    ///
    /// Returns whether a handler was called.
    pub fn dispatch(&self, id: u32) -> bool {
        if !self.global_enabled {
            return false;
        }

        match self.entries.iter().find(|e| e.id == id) {
            Some(entry) if entry.enabled => {
                entry.handler.handle();
                true
            }
            Some(_) => false,
            None => {
                warn!("IRQ {} fired with no handler connected", id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Default)]
    struct CountingHandler {
        calls: Cell<usize>,
    }

    impl InterruptHandler for CountingHandler {
        fn handle(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn dispatch_requires_global_and_source_enable() {
        let handler = CountingHandler::default();
        let mut table = IrqTable::new();
        table.connect(61, &handler).unwrap();

        assert!(!table.dispatch(61));
        table.global_enable();
        assert!(!table.dispatch(61));
        table.enable(61).unwrap();
        assert!(table.dispatch(61));
        table.disable(61).unwrap();
        assert!(!table.dispatch(61));

        assert_eq!(handler.calls.get(), 1);
    }

    #[test]
    fn dispatch_ignores_unknown_sources() {
        let handler = CountingHandler::default();
        let mut table = IrqTable::new();
        table.connect(61, &handler).unwrap();
        table.enable(61).unwrap();
        table.global_enable();

        assert!(!table.dispatch(62));
        assert_eq!(handler.calls.get(), 0);
    }

    #[test]
    fn connect_twice_is_rejected() {
        let first = CountingHandler::default();
        let second = CountingHandler::default();
        let mut table = IrqTable::new();

        table.connect(61, &first).unwrap();
        assert_eq!(table.connect(61, &second), Err(GpioError::AlreadyInUse));

        table.disconnect(61);
        assert_eq!(table.connect(61, &second), Ok(()));
    }

    #[test]
    fn enabling_unconnected_source_fails() {
        let mut table = IrqTable::new();
        assert_eq!(table.enable(7), Err(GpioError::InvalidArgument));
        assert_eq!(table.disable(7), Err(GpioError::InvalidArgument));
    }
}
