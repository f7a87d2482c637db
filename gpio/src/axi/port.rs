use std::fmt::{Debug, Formatter};
use crate::axi::{AxiChannel, AxiGpio};
use crate::irq::{InterruptPort, OutputSink};
use crate::keypad::MatrixPort;

/// A keypad on one channel of an [AxiGpio] block, with an LED bank on another.
///
/// The keypad channel carries the rows on lines 4-7 (inputs) and the columns on lines 0-3 (outputs).
pub struct AxiKeypadPort<'a> {
    gpio: &'a AxiGpio,
    keypad: AxiChannel,
    leds: AxiChannel,
}

impl Debug for AxiKeypadPort<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[keypad={:?}, leds={:?}]", self.gpio, self.keypad, self.leds)
    }
}

impl <'a> AxiKeypadPort<'a> {
    /// Direction of the keypad channel: rows are inputs, columns are outputs.
    pub const KEYPAD_DIRECTION: u32 = 0xF0;
    /// Direction of the LED channel: everything is an output.
    pub const LEDS_DIRECTION: u32 = 0x00;

    pub fn new(gpio: &'a AxiGpio, keypad: AxiChannel, leds: AxiChannel) -> Self {
        AxiKeypadPort { gpio, keypad, leds }
    }

    /// Sets up the line directions of both channels.
    pub fn configure(&self) {
        self.gpio.set_data_direction(self.leds, Self::LEDS_DIRECTION);
        self.gpio.set_data_direction(self.keypad, Self::KEYPAD_DIRECTION);
    }

    /// Gets the interrupt mask of the keypad channel.
    pub fn keypad_mask(&self) -> u32 {
        self.keypad.interrupt_mask()
    }
}

impl MatrixPort for AxiKeypadPort<'_> {
    fn write_columns(&self, pattern: u8) {
        self.gpio.discrete_write(self.keypad, (pattern & 0b1111) as u32);
    }

    fn read_combined(&self) -> u8 {
        (self.gpio.discrete_read(self.keypad) & 0xFF) as u8
    }
}

impl OutputSink for AxiKeypadPort<'_> {
    fn write_output(&self, value: u8) {
        self.gpio.discrete_write(self.leds, value as u32);
    }
}

impl InterruptPort for AxiKeypadPort<'_> {
    fn interrupt_enable(&self, mask: u32) {
        self.gpio.interrupt_enable(mask);
    }

    fn interrupt_disable(&self, mask: u32) {
        self.gpio.interrupt_disable(mask);
    }

    fn interrupt_clear(&self, mask: u32) {
        self.gpio.interrupt_clear(mask);
    }

    fn interrupt_status(&self) -> u32 {
        self.gpio.interrupt_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(gpio: &AxiGpio) -> AxiKeypadPort<'_> {
        AxiKeypadPort::new(gpio, AxiChannel::Two, AxiChannel::One)
    }

    #[test]
    fn configure_sets_both_directions() {
        let gpio = AxiGpio::anonymous().unwrap();
        gpio.set_data_direction(AxiChannel::One, 0xFF);
        port(&gpio).configure();

        assert_eq!(gpio.data_direction(AxiChannel::Two), 0xF0);
        assert_eq!(gpio.data_direction(AxiChannel::One), 0x00);
    }

    #[test]
    fn columns_are_masked_and_land_on_keypad_channel() {
        let gpio = AxiGpio::anonymous().unwrap();
        port(&gpio).write_columns(0b1010_1101);

        assert_eq!(gpio.discrete_read(AxiChannel::Two), 0b1101);
        assert_eq!(gpio.discrete_read(AxiChannel::One), 0);
    }

    #[test]
    fn combined_read_is_truncated_to_a_byte() {
        let gpio = AxiGpio::anonymous().unwrap();
        gpio.discrete_write(AxiChannel::Two, 0x1_7E);

        assert_eq!(port(&gpio).read_combined(), 0x7E);
    }

    #[test]
    fn output_lands_on_led_channel() {
        let gpio = AxiGpio::anonymous().unwrap();
        port(&gpio).write_output(0xA);

        assert_eq!(gpio.discrete_read(AxiChannel::One), 0xA);
        assert_eq!(gpio.discrete_read(AxiChannel::Two), 0);
    }

    #[test]
    fn interrupt_controls_use_the_given_mask() {
        let gpio = AxiGpio::anonymous().unwrap();
        let port = port(&gpio);

        port.interrupt_enable(port.keypad_mask());
        assert_eq!(gpio.interrupt_enabled(), 0x2);
        port.interrupt_disable(port.keypad_mask());
        assert_eq!(gpio.interrupt_enabled(), 0x0);
    }
}
