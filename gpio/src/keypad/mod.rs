mod matrix;

use std::fmt::{Debug, Display, Formatter};
use std::iter;
pub use matrix::*;

/// Row reading with every row line high, meaning no key is pressed in the driven column.
pub const ROWS_IDLE: u8 = 0b1111;

/// The column drive patterns, in the order they are swept.
///
/// Each pattern holds exactly one column low. The first one is `1110`, every next one is
/// the previous rotated one position to the left, wrapping the top bit back in.
pub const COLUMN_SWEEP: [u8; 4] = {
    let mut sweep = [0b1110; 4];
    let mut i = 1;
    while i < sweep.len() {
        sweep[i] = rotate_nibble_left(sweep[i - 1]);
        i += 1;
    }
    sweep
};

/// Key codes indexed by `[column line][row line]`,
/// where a line is the position of the low bit in its nibble.
const KEYMAP: [[u8; 4]; 4] = [
    [0xD, 0xC, 0xB, 0xA],
    [0xE, 0x9, 0x6, 0x3],
    [0xF, 0x8, 0x5, 0x2],
    [0x0, 0x7, 0x4, 0x1],
];

/// Rotates a 4-bit value one position to the left.
pub const fn rotate_nibble_left(value: u8) -> u8 {
    ((value << 1) | ((value >> 3) & 1)) & 0b1111
}

/// Iterates over the column drive patterns, starting at `1110`.
pub fn column_sweep() -> impl Iterator<Item = u8> {
    iter::successors(Some(COLUMN_SWEEP[0]), |&cols| Some(rotate_nibble_left(cols)))
        .take(COLUMN_SWEEP.len())
}

/// Gets the index of the single line held low in an active-low nibble.
///
/// Returns `None` if no line or more than one line is low.
fn active_line(nibble: u8) -> Option<usize> {
    let low = !nibble & 0b1111;
    if low.is_power_of_two() {
        Some(low.trailing_zeros() as usize)
    } else {
        None
    }
}

/// Looks up the key sitting at the given column drive pattern and row reading.
///
/// Both must have exactly one line low. An idle row reading (`1111`) or one with several
/// rows low decodes to nothing.
pub fn decode(column_pattern: u8, row_bits: u8) -> Option<KeyCode> {
    if column_pattern > 0b1111 || row_bits > 0b1111 {
        return None;
    }
    let col = active_line(column_pattern)?;
    let row = active_line(row_bits)?;
    Some(KeyCode(KEYMAP[col][row]))
}

/// Identifies one of the 16 keys of the 4x4 matrix.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KeyCode(u8);

impl KeyCode {
    /// Every key code, in ascending order.
    pub const ALL: [KeyCode; 16] = {
        let mut all = [KeyCode(0); 16];
        let mut i = 0;
        while i < all.len() {
            all[i] = KeyCode(i as u8);
            i += 1;
        }
        all
    };

    pub fn new(value: u8) -> Option<KeyCode> {
        if value <= 0xF {
            Some(KeyCode(value))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Gets the `(column pattern, row reading)` pair that decodes to this key.
    pub fn position(self) -> (u8, u8) {
        for (col, codes) in KEYMAP.iter().enumerate() {
            if let Some(row) = codes.iter().position(|&code| code == self.0) {
                return (!(1u8 << col) & 0b1111, !(1u8 << row) & 0b1111);
            }
        }
        unreachable!("keymap covers every key code")
    }

    /// Converts the key to the hexadecimal digit printed on it.
    pub fn to_char(self) -> char {
        char::from_digit(self.0 as u32, 16)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

impl Display for KeyCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Access to the keypad lines, packed in one 8-bit peripheral word:
/// rows in the high nibble, columns in the low nibble.
pub trait MatrixPort: Debug {
    /// Drives the four column output lines.
    fn write_columns(&self, pattern: u8);

    /// Reads back the rows (bits 4-7) and the columns (bits 0-3).
    fn read_combined(&self) -> u8;
}

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Sweeps the keypad once and reports the pressed key, if any.
    fn scan(&self) -> Option<Self::Key>;
}
