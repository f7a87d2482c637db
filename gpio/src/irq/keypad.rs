use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use log::{debug, warn};
use crate::irq::{InterruptHandler, InterruptPort, OutputSink};
use crate::keypad::{KeyCode, Keypad, MatrixKeypad};

/// Value written to the output sink when a sweep finds no key.
pub const NO_KEY_OUTPUT: u8 = 0x10;

const LATCH_UNWRITTEN: u8 = 0xFF;

/// What a single interrupt invocation ended up doing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandlerOutcome {
    /// The keypad was scanned, the result output and the interrupt acknowledged.
    Serviced(Option<KeyCode>),
    /// The status register did not report the keypad channel.
    /// Nothing was scanned or acknowledged.
    Spurious,
}

/// The last value the handler presented to the output sink.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Latch {
    Unwritten,
    NoKey,
    Key(KeyCode),
}

/// Services keypad interrupts: masks the source, scans the keypad, outputs the key,
/// acknowledges the interrupt and re-arms the source.
///
/// The source stays disabled for the whole time the handler runs,
/// so a new edge is never handled before the previous one is done.
///
/// If the interrupt status does not report the keypad channel, the handler returns
/// right after masking and leaves the source disabled. Call [KeypadInterruptHandler::arm]
/// to recover, or opt in to re-arming with [KeypadInterruptHandler::with_spurious_rearm].
pub struct KeypadInterruptHandler<'a> {
    keypad: MatrixKeypad<'a>,
    irq: &'a dyn InterruptPort,
    sink: &'a dyn OutputSink,
    mask: u32,
    armed: AtomicBool,
    latch: AtomicU8,
    rearm_on_spurious: bool,
}

impl Debug for KeypadInterruptHandler<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeypadInterruptHandler({:?}, mask={:#x})", self.keypad, self.mask)
    }
}

impl <'a> KeypadInterruptHandler<'a> {
    /// Creates a handler for the interrupt channel `mask`.
    ///
    /// The handler starts disarmed. The hardware source is not touched until [Self::arm].
    pub fn new(
        keypad: MatrixKeypad<'a>,
        irq: &'a dyn InterruptPort,
        sink: &'a dyn OutputSink,
        mask: u32,
    ) -> Self {
        KeypadInterruptHandler {
            keypad,
            irq,
            sink,
            mask,
            armed: AtomicBool::new(false),
            latch: AtomicU8::new(LATCH_UNWRITTEN),
            rearm_on_spurious: false,
        }
    }

    pub fn with_spurious_rearm(mut self, rearm: bool) -> Self {
        self.rearm_on_spurious = rearm;
        self
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Enables the interrupt source.
    pub fn arm(&self) {
        self.irq.interrupt_enable(self.mask);
        self.armed.store(true, Ordering::Release);
    }

    /// Gets whether the handler left the interrupt source enabled.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Gets the value presented by the most recently completed invocation.
    pub fn latched(&self) -> Latch {
        match self.latch.load(Ordering::Acquire) {
            LATCH_UNWRITTEN => Latch::Unwritten,
            value => KeyCode::new(value).map_or(Latch::NoKey, Latch::Key),
        }
    }

    /// Runs one interrupt invocation.
    pub fn service(&self) -> HandlerOutcome {
        self.irq.interrupt_disable(self.mask);
        self.armed.store(false, Ordering::Release);

        if self.irq.interrupt_status() & self.mask != self.mask {
            if self.rearm_on_spurious {
                self.arm();
            }
            return HandlerOutcome::Spurious;
        }

        let key = self.keypad.scan();
        let value = key.map_or(NO_KEY_OUTPUT, KeyCode::value);
        self.sink.write_output(value);
        self.latch.store(value, Ordering::Release);

        self.irq.interrupt_clear(self.mask);
        self.arm();

        HandlerOutcome::Serviced(key)
    }
}

impl InterruptHandler for KeypadInterruptHandler<'_> {
    fn handle(&self) {
        match self.service() {
            HandlerOutcome::Serviced(Some(key)) => debug!("Keypad interrupt: key {}", key),
            HandlerOutcome::Serviced(None) => debug!("Keypad interrupt: no key"),
            HandlerOutcome::Spurious if self.is_armed() => {
                warn!("Spurious keypad interrupt (mask {:#x}), source re-armed", self.mask);
            }
            HandlerOutcome::Spurious => {
                warn!("Spurious keypad interrupt (mask {:#x}), source left disabled", self.mask);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimKeypad};

    fn key(value: u8) -> KeyCode {
        KeyCode::new(value).unwrap()
    }

    fn handler(sim: &SimKeypad) -> KeypadInterruptHandler<'_> {
        KeypadInterruptHandler::new(MatrixKeypad::new(sim), sim, sim, sim.mask())
    }

    #[test]
    fn protocol_runs_in_order() {
        let sim = SimKeypad::new();
        let handler = handler(&sim);
        handler.arm();
        sim.press(key(0x5));
        sim.raise();
        sim.clear_events();

        assert_eq!(handler.service(), HandlerOutcome::Serviced(Some(key(0x5))));

        let events: Vec<_> = sim.events().into_iter().map(|e| e.event).collect();
        let mask = sim.mask();
        assert_eq!(events.first(), Some(&SimEvent::InterruptDisable(mask)));
        assert_eq!(events.get(1), Some(&SimEvent::InterruptStatus));
        assert_eq!(
            events[events.len() - 3..],
            [SimEvent::WriteOutput(0x5), SimEvent::InterruptClear(mask), SimEvent::InterruptEnable(mask)],
        );
        assert!(handler.is_armed());
        assert_eq!(handler.latched(), Latch::Key(key(0x5)));
        assert_eq!(sim.status_mask() & mask, 0);
    }

    #[test]
    fn source_is_disabled_while_servicing() {
        let sim = SimKeypad::new();
        let handler = handler(&sim);
        handler.arm();
        sim.press(key(0x1));
        sim.raise();
        sim.clear_events();

        handler.service();

        let events = sim.events();
        let mid_service = &events[1..events.len() - 1];
        assert!(!mid_service.is_empty());
        assert!(mid_service.iter().all(|e| !e.source_enabled), "{:?}", mid_service);
        assert!(events.last().unwrap().source_enabled);
    }

    #[test]
    fn spurious_interrupt_leaves_source_disabled() {
        let sim = SimKeypad::new();
        let handler = handler(&sim);
        handler.arm();
        sim.press(key(0x7));
        sim.clear_events();

        assert_eq!(handler.service(), HandlerOutcome::Spurious);

        let counts = sim.counts();
        assert_eq!(counts.interrupt_disable, 1);
        assert_eq!(counts.write_columns, 0);
        assert_eq!(counts.read_combined, 0);
        assert_eq!(counts.write_output, 0);
        assert_eq!(counts.interrupt_clear, 0);
        assert_eq!(counts.interrupt_enable, 0);
        assert!(!handler.is_armed());
        assert!(!sim.source_enabled());
        assert_eq!(handler.latched(), Latch::Unwritten);
    }

    #[test]
    fn spurious_rearm_can_be_opted_in() {
        let sim = SimKeypad::new();
        let handler = handler(&sim).with_spurious_rearm(true);
        handler.arm();
        sim.raise_mask(0x1);

        assert_eq!(handler.service(), HandlerOutcome::Spurious);
        assert!(handler.is_armed());
        assert!(sim.source_enabled());
        assert_eq!(sim.counts().write_output, 0);
        assert_eq!(sim.counts().interrupt_clear, 0);
    }

    #[test]
    fn only_the_handler_mask_is_touched() {
        let sim = SimKeypad::new().with_mask(0x1);
        sim.interrupt_enable(0x2);
        let handler = handler(&sim);
        handler.arm();
        assert_eq!(sim.enabled_mask(), 0x3);

        sim.press(key(0xB));
        sim.raise_mask(0x3);
        assert_eq!(handler.service(), HandlerOutcome::Serviced(Some(key(0xB))));

        assert_eq!(sim.enabled_mask(), 0x3);
        assert_eq!(sim.status_mask(), 0x2);
        assert!(sim.events().iter().any(|e| e.event == SimEvent::InterruptDisable(0x1)));
    }

    #[test]
    fn no_key_writes_sentinel() {
        let sim = SimKeypad::new();
        let handler = handler(&sim);
        handler.arm();
        sim.raise();

        assert_eq!(handler.service(), HandlerOutcome::Serviced(None));
        assert_eq!(sim.outputs(), vec![NO_KEY_OUTPUT]);
        assert_eq!(handler.latched(), Latch::NoKey);
        assert!(handler.is_armed());
    }
}
