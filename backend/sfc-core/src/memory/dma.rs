//! General-purpose DMA
//!
//! A write to the enable register runs every selected channel to completion
//! on the spot; the CPU observes no intervening cycles. HBlank DMA is
//! accepted at the register level but never executed.

use crate::bus::Bus;
use bincode::{Decode, Encode};
use c65816::traits::BusInterface;
use sfc_common::num::{GetBit, U16Ext};

const CHANNELS: usize = 8;

// Address bus B registers appear at $2100-$21FF on bus A
const BUS_B_BASE: u32 = 0x00_2100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
enum SourceStep {
    #[default]
    Increment,
    Decrement,
    Fixed,
}

impl SourceStep {
    fn from_control(control: u8) -> Self {
        if control.bit(3) {
            Self::Fixed
        } else if control.bit(4) {
            Self::Decrement
        } else {
            Self::Increment
        }
    }

    fn apply(self, address: u16) -> u16 {
        match self {
            Self::Increment => address.wrapping_add(1),
            Self::Decrement => address.wrapping_sub(1),
            Self::Fixed => address,
        }
    }
}

/// The destination-register offset sequence for each transfer pattern.
fn transfer_pattern(control: u8) -> &'static [u8] {
    match control & 0x07 {
        0 => &[0],
        1 => &[0, 1],
        2 | 6 => &[0, 0],
        3 | 7 => &[0, 0, 1, 1],
        4 => &[0, 1, 2, 3],
        5 => &[0, 1, 0, 1],
        _ => unreachable!("control & 0x07 is always <= 7"),
    }
}

#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
pub struct DmaChannel {
    control: u8,
    b_address: u8,
    source_address: u16,
    source_bank: u8,
    size: u16,
    unused: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct DmaUnit {
    channels: [DmaChannel; CHANNELS],
    enabled: u8,
}

impl DmaUnit {
    pub fn new() -> Self {
        Self { channels: [DmaChannel::default(); CHANNELS], enabled: 0 }
    }

    /// Channel registers at $43x0-$43x7 read back what was written.
    pub fn read_register(&self, address: u32) -> Option<u8> {
        let channel = &self.channels[((address >> 4) & 0x7) as usize];

        let value = match address & 0xFF0F {
            0x4300 => channel.control,
            0x4301 => channel.b_address,
            0x4302 => channel.source_address.lo(),
            0x4303 => channel.source_address.hi(),
            0x4304 => channel.source_bank,
            0x4305 => channel.size.lo(),
            0x4306 => channel.size.hi(),
            0x4307 => channel.unused,
            _ => return None,
        };

        Some(value)
    }

    pub fn write_register(&mut self, address: u32, value: u8) {
        let channel = &mut self.channels[((address >> 4) & 0x7) as usize];

        match address & 0xFF0F {
            0x4300 => channel.control = value,
            0x4301 => channel.b_address = value,
            0x4302 => channel.source_address.set_lo(value),
            0x4303 => channel.source_address.set_hi(value),
            0x4304 => channel.source_bank = value,
            0x4305 => channel.size.set_lo(value),
            0x4306 => channel.size.set_hi(value),
            0x4307 => channel.unused = value,
            _ => {}
        }
    }

    pub fn enabled_mask(&self) -> u8 {
        self.enabled
    }
}

/// Execute every channel selected by an MDMAEN write, lowest channel first.
/// Runs synchronously inside the enabling bus write.
pub(crate) fn run_gpdma(bus: &mut Bus<'_>, mask: u8) {
    bus.dma.enabled = mask;

    for channel_idx in 0..CHANNELS {
        if !mask.bit(channel_idx as u8) {
            continue;
        }

        let channel = bus.dma.channels[channel_idx];
        run_channel(bus, channel_idx, channel);

        bus.dma.enabled &= !(1 << channel_idx);
    }
}

fn run_channel(bus: &mut Bus<'_>, channel_idx: usize, channel: DmaChannel) {
    let pattern = transfer_pattern(channel.control);
    let step = SourceStep::from_control(channel.control);
    let b_to_a = channel.control.bit(7);

    let mut remaining: u32 = match channel.size {
        0 => 0x1_0000,
        size => size.into(),
    };
    let mut source = channel.source_address;

    log::trace!(
        "GPDMA channel {channel_idx}: {remaining} bytes {:02X}:{source:04X} {} $21{:02X}, \
         pattern {pattern:?}",
        channel.source_bank,
        if b_to_a { "<-" } else { "->" },
        channel.b_address,
    );

    'transfer: loop {
        for &offset in pattern {
            let a_address = (u32::from(channel.source_bank) << 16) | u32::from(source);
            let b_address = BUS_B_BASE | u32::from(channel.b_address.wrapping_add(offset));

            if b_to_a {
                let value = bus.read(b_address);
                bus.write(a_address, value);
            } else {
                let value = bus.read(a_address);
                bus.write(b_address, value);
            }

            source = step.apply(source);
            remaining -= 1;
            if remaining == 0 {
                break 'transfer;
            }
        }
    }

    // Hardware leaves the decremented counter and advanced address behind
    let channel = &mut bus.dma.channels[channel_idx];
    channel.size = 0;
    channel.source_address = source;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_sequences() {
        assert_eq!(transfer_pattern(0x00), &[0]);
        assert_eq!(transfer_pattern(0x01), &[0, 1]);
        assert_eq!(transfer_pattern(0x02), &[0, 0]);
        assert_eq!(transfer_pattern(0x03), &[0, 0, 1, 1]);
    }

    #[test]
    fn source_step_from_control() {
        assert_eq!(SourceStep::from_control(0x00), SourceStep::Increment);
        assert_eq!(SourceStep::from_control(0x10), SourceStep::Decrement);
        assert_eq!(SourceStep::from_control(0x08), SourceStep::Fixed);
        assert_eq!(SourceStep::from_control(0x18), SourceStep::Fixed);
    }

    #[test]
    fn registers_read_back() {
        let mut unit = DmaUnit::new();
        unit.write_register(0x4310, 0x01);
        unit.write_register(0x4311, 0x18);
        unit.write_register(0x4312, 0x34);
        unit.write_register(0x4313, 0x12);
        unit.write_register(0x4314, 0x7E);
        unit.write_register(0x4315, 0x00);
        unit.write_register(0x4316, 0x08);

        assert_eq!(unit.read_register(0x4310), Some(0x01));
        assert_eq!(unit.read_register(0x4311), Some(0x18));
        assert_eq!(unit.read_register(0x4312), Some(0x34));
        assert_eq!(unit.read_register(0x4313), Some(0x12));
        assert_eq!(unit.read_register(0x4314), Some(0x7E));
        assert_eq!(unit.read_register(0x4315), Some(0x00));
        assert_eq!(unit.read_register(0x4316), Some(0x08));
    }
}
