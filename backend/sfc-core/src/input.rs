//! Controller state, published by the host input source once per tick

use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct JoypadState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l: bool,
    pub r: bool,
    pub start: bool,
    pub select: bool,
}

impl JoypadState {
    /// Serialize to the order the hardware shifts out: B, Y, Select, Start,
    /// Up, Down, Left, Right, A, X, L, R, then four ID bits.
    pub(crate) fn to_register_word(self) -> u16 {
        (u16::from(self.b) << 15)
            | (u16::from(self.y) << 14)
            | (u16::from(self.select) << 13)
            | (u16::from(self.start) << 12)
            | (u16::from(self.up) << 11)
            | (u16::from(self.down) << 10)
            | (u16::from(self.left) << 9)
            | (u16::from(self.right) << 8)
            | (u16::from(self.a) << 7)
            | (u16::from(self.x) << 6)
            | (u16::from(self.l) << 5)
            | (u16::from(self.r) << 4)
    }
}

/// One snapshot of both controller ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct Inputs {
    pub p1: JoypadState,
    pub p2: JoypadState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_word_bit_order() {
        let state = JoypadState { b: true, r: true, ..JoypadState::default() };
        assert_eq!(state.to_register_word(), 0x8010);

        assert_eq!(JoypadState::default().to_register_word(), 0);
    }
}
