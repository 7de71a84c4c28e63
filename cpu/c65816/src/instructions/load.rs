//! Loads, stores, register transfers, and block moves

use super::*;

pub(crate) fn lda<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
) -> u8 {
    let eight_bit = m_8bit(cpu);
    let value = read_operand(cpu, bus, mode, eight_bit);

    if eight_bit {
        cpu.registers.a.set_lo(value.lo());
    } else {
        cpu.registers.a = value;
    }
    set_nz(&mut cpu.registers.p, value, eight_bit);

    read_base_cycles(mode)
}

pub(crate) fn ldx<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
) -> u8 {
    let eight_bit = x_8bit(cpu);
    let value = read_operand(cpu, bus, mode, eight_bit);

    cpu.registers.x = value;
    set_nz(&mut cpu.registers.p, value, eight_bit);

    read_base_cycles(mode)
}

pub(crate) fn ldy<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
) -> u8 {
    let eight_bit = x_8bit(cpu);
    let value = read_operand(cpu, bus, mode, eight_bit);

    cpu.registers.y = value;
    set_nz(&mut cpu.registers.p, value, eight_bit);

    read_base_cycles(mode)
}

pub(crate) fn sta<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
) -> u8 {
    let eight_bit = m_8bit(cpu);
    let value = cpu.registers.a;
    write_operand(cpu, bus, mode, value, eight_bit);

    read_base_cycles(mode)
}

pub(crate) fn stx<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
) -> u8 {
    let eight_bit = x_8bit(cpu);
    let value = cpu.registers.x;
    write_operand(cpu, bus, mode, value, eight_bit);

    read_base_cycles(mode)
}

pub(crate) fn sty<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
) -> u8 {
    let eight_bit = x_8bit(cpu);
    let value = cpu.registers.y;
    write_operand(cpu, bus, mode, value, eight_bit);

    read_base_cycles(mode)
}

pub(crate) fn stz<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
) -> u8 {
    let eight_bit = m_8bit(cpu);
    write_operand(cpu, bus, mode, 0, eight_bit);

    read_base_cycles(mode)
}

fn transfer_to_index(cpu: &mut Cpu65816, value: u16) -> u16 {
    let eight_bit = x_8bit(cpu);
    let value = if eight_bit { value & 0x00FF } else { value };
    set_nz(&mut cpu.registers.p, value, eight_bit);
    value
}

fn transfer_to_accumulator(cpu: &mut Cpu65816, value: u16) {
    let eight_bit = m_8bit(cpu);
    if eight_bit {
        cpu.registers.a.set_lo(value.lo());
    } else {
        cpu.registers.a = value;
    }
    set_nz(&mut cpu.registers.p, value, eight_bit);
}

pub(crate) fn tax(cpu: &mut Cpu65816) -> u8 {
    let a = cpu.registers.a;
    cpu.registers.x = transfer_to_index(cpu, a);
    2
}

pub(crate) fn tay(cpu: &mut Cpu65816) -> u8 {
    let a = cpu.registers.a;
    cpu.registers.y = transfer_to_index(cpu, a);
    2
}

pub(crate) fn tsx(cpu: &mut Cpu65816) -> u8 {
    let s = cpu.registers.s;
    cpu.registers.x = transfer_to_index(cpu, s);
    2
}

pub(crate) fn txy(cpu: &mut Cpu65816) -> u8 {
    let x = cpu.registers.x;
    cpu.registers.y = transfer_to_index(cpu, x);
    2
}

pub(crate) fn tyx(cpu: &mut Cpu65816) -> u8 {
    let y = cpu.registers.y;
    cpu.registers.x = transfer_to_index(cpu, y);
    2
}

pub(crate) fn txa(cpu: &mut Cpu65816) -> u8 {
    let x = cpu.registers.x;
    transfer_to_accumulator(cpu, x);
    2
}

pub(crate) fn tya(cpu: &mut Cpu65816) -> u8 {
    let y = cpu.registers.y;
    transfer_to_accumulator(cpu, y);
    2
}

// TXS and TCS never touch flags, and the destination width follows the mode
// rather than M/X: emulation mode pins the stack high byte to $01

pub(crate) fn txs(cpu: &mut Cpu65816) -> u8 {
    cpu.registers.s = if cpu.registers.emulation_mode {
        0x0100 | (cpu.registers.x & 0x00FF)
    } else {
        cpu.registers.x
    };
    2
}

pub(crate) fn tcs(cpu: &mut Cpu65816) -> u8 {
    cpu.registers.s = if cpu.registers.emulation_mode {
        0x0100 | (cpu.registers.a & 0x00FF)
    } else {
        cpu.registers.a
    };
    2
}

// TCD/TDC/TSC are always 16-bit regardless of M

pub(crate) fn tcd(cpu: &mut Cpu65816) -> u8 {
    let value = cpu.registers.a;
    cpu.registers.d = value;
    set_nz(&mut cpu.registers.p, value, false);
    2
}

pub(crate) fn tdc(cpu: &mut Cpu65816) -> u8 {
    let value = cpu.registers.d;
    cpu.registers.a = value;
    set_nz(&mut cpu.registers.p, value, false);
    2
}

pub(crate) fn tsc(cpu: &mut Cpu65816) -> u8 {
    let value = cpu.registers.s;
    cpu.registers.a = value;
    set_nz(&mut cpu.registers.p, value, false);
    2
}

/// XBA: swap the accumulator bytes. Flags reflect the new low byte, always
/// at 8-bit width.
pub(crate) fn xba(cpu: &mut Cpu65816) -> u8 {
    cpu.registers.a = cpu.registers.a.rotate_right(8);
    set_nz(&mut cpu.registers.p, cpu.registers.a & 0x00FF, true);
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockMoveDirection {
    /// MVN: ascending addresses
    Forward,
    /// MVP: descending addresses
    Backward,
}

/// MVN/MVP move one byte per executed step and rewind PC while the 16-bit
/// count in A has not run out, so interrupts can be taken mid-move exactly
/// as on hardware.
pub(crate) fn block_move<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    direction: BlockMoveDirection,
) -> u8 {
    let dest_bank = fetch_u8(cpu, bus);
    let source_bank = fetch_u8(cpu, bus);

    let value = bus.read(make_u24(source_bank, cpu.registers.x));
    bus.write(make_u24(dest_bank, cpu.registers.y), value);

    let step = match direction {
        BlockMoveDirection::Forward => 1_u16,
        BlockMoveDirection::Backward => 0xFFFF,
    };
    cpu.registers.x = cpu.registers.x.wrapping_add(step);
    cpu.registers.y = cpu.registers.y.wrapping_add(step);
    if x_8bit(cpu) {
        cpu.registers.x &= 0x00FF;
        cpu.registers.y &= 0x00FF;
    }

    cpu.registers.dbr = dest_bank;
    cpu.registers.a = cpu.registers.a.wrapping_sub(1);

    if cpu.registers.a != 0xFFFF {
        // More bytes to move; re-execute this instruction
        cpu.registers.pc = cpu.registers.pc.wrapping_sub(3);
    }

    7
}

/// Base cycle counts for read/write operations by addressing mode, assuming
/// 8-bit registers, an aligned direct page, and no page crossings; the
/// operand helpers account for every deviation.
pub(crate) fn read_base_cycles(mode: AddressingMode) -> u8 {
    match mode {
        AddressingMode::Immediate => 2,
        AddressingMode::DirectPage => 3,
        AddressingMode::DirectPageX | AddressingMode::DirectPageY => 4,
        AddressingMode::DirectPageIndirect => 5,
        AddressingMode::DirectPageIndexedIndirect => 6,
        AddressingMode::DirectPageIndirectIndexed => 5,
        AddressingMode::DirectPageIndirectLong => 6,
        AddressingMode::DirectPageIndirectLongIndexed => 6,
        AddressingMode::Absolute => 4,
        AddressingMode::AbsoluteX | AddressingMode::AbsoluteY => 4,
        AddressingMode::AbsoluteLong => 5,
        AddressingMode::AbsoluteLongX => 5,
        AddressingMode::StackRelative => 4,
        AddressingMode::StackRelativeIndirectIndexed => 7,
    }
}
