//! A software keypad peripheral.
//!
//! Models a 4x4 matrix wired to one GPIO channel, an output sink and the channel's interrupt
//! registers. Every call made through the peripheral traits is logged, so tests can check what
//! was done and in which order.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use crate::irq::{InterruptPort, OutputSink};
use crate::keypad::{KeyCode, MatrixPort, COLUMN_SWEEP, ROWS_IDLE};

/// Interrupt mask of the keypad channel, unless changed with [SimKeypad::with_mask].
pub const SIM_KEYPAD_MASK: u32 = 0x2;

/// A call made on the simulated peripheral.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    WriteColumns(u8),
    ReadCombined(u8),
    WriteOutput(u8),
    InterruptEnable(u32),
    InterruptDisable(u32),
    InterruptClear(u32),
    InterruptStatus,
}

/// A logged [SimEvent] together with the state the keypad source was left in by it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SimRecord {
    pub event: SimEvent,
    pub source_enabled: bool,
}

/// How many times each peripheral operation was called.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SimCounts {
    pub write_columns: usize,
    pub read_combined: usize,
    pub write_output: usize,
    pub interrupt_enable: usize,
    pub interrupt_disable: usize,
    pub interrupt_clear: usize,
    pub interrupt_status: usize,
}

pub struct SimKeypad {
    mask: u32,
    columns: Cell<u8>,
    pressed: RefCell<Vec<KeyCode>>,
    forced_rows: RefCell<HashMap<u8, u8>>,
    enabled: Cell<u32>,
    status: Cell<u32>,
    events: RefCell<Vec<SimRecord>>,
}

impl Debug for SimKeypad {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimKeypad(mask={:#x})", self.mask)
    }
}

impl Default for SimKeypad {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKeypad {
    pub fn new() -> Self {
        SimKeypad {
            mask: SIM_KEYPAD_MASK,
            columns: Cell::new(0b1111),
            pressed: RefCell::new(Vec::new()),
            forced_rows: RefCell::new(HashMap::new()),
            enabled: Cell::new(0),
            status: Cell::new(0),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn press(&self, key: KeyCode) {
        let mut pressed = self.pressed.borrow_mut();
        if !pressed.contains(&key) {
            pressed.push(key);
        }
    }

    pub fn release(&self, key: KeyCode) {
        self.pressed.borrow_mut().retain(|&k| k != key);
    }

    pub fn release_all(&self) {
        self.pressed.borrow_mut().clear();
    }

    /// Makes every column read back `rows` regardless of pressed keys, or restores the matrix model.
    pub fn force_rows(&self, rows: Option<u8>) {
        let mut forced = self.forced_rows.borrow_mut();
        forced.clear();
        if let Some(rows) = rows {
            for cols in COLUMN_SWEEP {
                forced.insert(cols, rows & 0b1111);
            }
        }
    }

    /// Makes the column pattern `cols` read back `rows`.
    pub fn force_rows_on(&self, cols: u8, rows: u8) {
        self.forced_rows.borrow_mut().insert(cols & 0b1111, rows & 0b1111);
    }

    /// Flags a pending interrupt on the keypad channel, like an edge on a row line would.
    pub fn raise(&self) {
        self.raise_mask(self.mask);
    }

    pub fn raise_mask(&self, mask: u32) {
        self.status.set(self.status.get() | mask);
    }

    pub fn source_enabled(&self) -> bool {
        self.enabled.get() & self.mask == self.mask
    }

    pub fn enabled_mask(&self) -> u32 {
        self.enabled.get()
    }

    pub fn status_mask(&self) -> u32 {
        self.status.get()
    }

    pub fn events(&self) -> Vec<SimRecord> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn counts(&self) -> SimCounts {
        let mut counts = SimCounts::default();
        for record in self.events.borrow().iter() {
            let counter = match record.event {
                SimEvent::WriteColumns(_) => &mut counts.write_columns,
                SimEvent::ReadCombined(_) => &mut counts.read_combined,
                SimEvent::WriteOutput(_) => &mut counts.write_output,
                SimEvent::InterruptEnable(_) => &mut counts.interrupt_enable,
                SimEvent::InterruptDisable(_) => &mut counts.interrupt_disable,
                SimEvent::InterruptClear(_) => &mut counts.interrupt_clear,
                SimEvent::InterruptStatus => &mut counts.interrupt_status,
            };
            *counter += 1;
        }
        counts
    }

    /// Gets the column patterns written so far, in order.
    pub fn column_writes(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|r| match r.event {
                SimEvent::WriteColumns(cols) => Some(cols),
                _ => None,
            })
            .collect()
    }

    /// Gets the values written to the output sink so far, in order.
    pub fn outputs(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|r| match r.event {
                SimEvent::WriteOutput(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    fn log(&self, event: SimEvent) {
        let record = SimRecord {
            event,
            source_enabled: self.source_enabled(),
        };
        self.events.borrow_mut().push(record);
    }

    fn rows(&self, cols: u8) -> u8 {
        if let Some(&rows) = self.forced_rows.borrow().get(&cols) {
            return rows;
        }

        let driven_low = !cols & 0b1111;
        self.pressed
            .borrow()
            .iter()
            .map(|key| key.position())
            .filter(|&(key_cols, _)| driven_low & !key_cols & 0b1111 != 0)
            .fold(ROWS_IDLE, |rows, (_, key_rows)| rows & key_rows)
    }
}

impl MatrixPort for SimKeypad {
    fn write_columns(&self, pattern: u8) {
        self.columns.set(pattern & 0b1111);
        self.log(SimEvent::WriteColumns(pattern));
    }

    fn read_combined(&self) -> u8 {
        let cols = self.columns.get();
        let value = (self.rows(cols) << 4) | cols;
        self.log(SimEvent::ReadCombined(value));
        value
    }
}

impl OutputSink for SimKeypad {
    fn write_output(&self, value: u8) {
        self.log(SimEvent::WriteOutput(value));
    }
}

impl InterruptPort for SimKeypad {
    fn interrupt_enable(&self, mask: u32) {
        self.enabled.set(self.enabled.get() | mask);
        self.log(SimEvent::InterruptEnable(mask));
    }

    fn interrupt_disable(&self, mask: u32) {
        self.enabled.set(self.enabled.get() & !mask);
        self.log(SimEvent::InterruptDisable(mask));
    }

    fn interrupt_clear(&self, mask: u32) {
        self.status.set(self.status.get() & !mask);
        self.log(SimEvent::InterruptClear(mask));
    }

    fn interrupt_status(&self) -> u32 {
        self.log(SimEvent::InterruptStatus);
        self.status.get()
    }
}
