use std::fmt::{Debug, Formatter};
use log::trace;
use crate::keypad::{column_sweep, decode, KeyCode, Keypad, MatrixPort, ROWS_IDLE};

/// The `MatrixKeypad` struct scans a 4x4 matrix keypad through a [MatrixPort].
///
/// Columns are driven low one at a time and rows read back active-low.
/// Only a single key is reported per sweep: the first column with a decodable row reading wins,
/// so column `1110` takes priority over `1101`, then `1011`, then `0111`.
pub struct MatrixKeypad<'a> {
    port: &'a dyn MatrixPort,
}

impl Debug for MatrixKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatrixKeypad({:?})", self.port)
    }
}

impl <'a> MatrixKeypad<'a> {
    pub fn new(port: &'a dyn MatrixPort) -> Self {
        MatrixKeypad { port }
    }
}

impl Keypad for MatrixKeypad<'_> {
    type Key = KeyCode;

    fn scan(&self) -> Option<KeyCode> {
        for cols in column_sweep() {
            self.port.write_columns(cols);
            let rows = (self.port.read_combined() >> 4) & 0b1111;
            trace!("Scanned cols={:04b} rows={:04b}", cols, rows);

            if rows == ROWS_IDLE {
                continue;
            }

            if let Some(key) = decode(cols, rows) {
                return Some(key);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimKeypad};

    fn key(value: u8) -> KeyCode {
        KeyCode::new(value).unwrap()
    }

    #[test]
    fn every_single_key_is_decoded() {
        for expected in KeyCode::ALL {
            let sim = SimKeypad::new();
            sim.press(expected);
            assert_eq!(MatrixKeypad::new(&sim).scan(), Some(expected));
        }
    }

    #[test]
    fn idle_rows_report_no_key_after_full_sweep() {
        let sim = SimKeypad::new();
        assert_eq!(MatrixKeypad::new(&sim).scan(), None);
        assert_eq!(sim.column_writes(), vec![0b1110, 0b1101, 0b1011, 0b0111]);
    }

    #[test]
    fn first_column_match_stops_the_sweep() {
        let sim = SimKeypad::new();
        // 'E' sits on the second column, '1' on the last one.
        sim.press(key(0xE));
        sim.press(key(0x1));

        assert_eq!(MatrixKeypad::new(&sim).scan(), Some(key(0xE)));
        assert_eq!(sim.column_writes(), vec![0b1110, 0b1101]);
    }

    #[test]
    fn multi_row_reading_advances_to_next_column() {
        let sim = SimKeypad::new();
        // 'D' and 'C' share the first column, '9' is alone on the second.
        sim.press(key(0xD));
        sim.press(key(0xC));
        sim.press(key(0x9));

        assert_eq!(MatrixKeypad::new(&sim).scan(), Some(key(0x9)));
    }

    #[test]
    fn injected_row_pattern_decodes_on_its_column() {
        let sim = SimKeypad::new();
        sim.force_rows_on(0b1101, 0b1110);

        assert_eq!(MatrixKeypad::new(&sim).scan(), Some(key(14)));
        assert!(sim.events().iter().all(|event| !matches!(event.event, SimEvent::WriteOutput(_))));
    }
}
