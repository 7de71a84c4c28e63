//! Instruction decode and execution
//!
//! Decode maps each opcode to an (operation, addressing mode) pair; operand
//! width is resolved separately from the M/X flags at fetch time, so the
//! operation implementations are written once and work at either width.

pub(crate) mod alu;
pub(crate) mod flow;
pub(crate) mod load;
pub(crate) mod stack;

use crate::traits::BusInterface;
use crate::{Cpu65816, StatusRegister};
use sfc_common::num::{make_u24, SignBit, U16Ext, U24Ext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddressingMode {
    Immediate,
    DirectPage,
    DirectPageX,
    DirectPageY,
    DirectPageIndirect,
    DirectPageIndexedIndirect,
    DirectPageIndirectIndexed,
    DirectPageIndirectLong,
    DirectPageIndirectLongIndexed,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteLong,
    AbsoluteLongX,
    StackRelative,
    StackRelativeIndirectIndexed,
}

/// Whether an indexed access pays the cross-page cycle unconditionally.
/// Reads skip the penalty when the index is 8-bit and no page is crossed;
/// writes and read-modify-writes always pay it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InterruptType {
    Nmi,
    Irq,
    Break,
    Coprocessor,
}

impl InterruptType {
    const fn is_software(self) -> bool {
        matches!(self, Self::Break | Self::Coprocessor)
    }

    const fn emulation_vector(self) -> u16 {
        match self {
            Self::Coprocessor => 0xFFF4,
            Self::Nmi => 0xFFFA,
            Self::Break | Self::Irq => 0xFFFE,
        }
    }

    const fn native_vector(self) -> u16 {
        match self {
            Self::Coprocessor => 0xFFE4,
            Self::Break => 0xFFE6,
            Self::Nmi => 0xFFEA,
            Self::Irq => 0xFFEE,
        }
    }
}

pub(crate) fn fetch_u8<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let value = bus.read(make_u24(cpu.registers.pbr, cpu.registers.pc));
    cpu.registers.pc = cpu.registers.pc.wrapping_add(1);
    value
}

pub(crate) fn fetch_u16<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u16 {
    let lsb = fetch_u8(cpu, bus);
    let msb = fetch_u8(cpu, bus);
    u16::from_le_bytes([lsb, msb])
}

fn fetch_u24<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u32 {
    let offset = fetch_u16(cpu, bus);
    let bank = fetch_u8(cpu, bus);
    make_u24(bank, offset)
}

/// Read a 16-bit little-endian word that wraps within bank $00, as pointer
/// fetches through the direct page and stack do.
fn read_u16_bank0<B: BusInterface>(bus: &mut B, offset: u16) -> u16 {
    let lsb = bus.read(offset.into());
    let msb = bus.read(offset.wrapping_add(1).into());
    u16::from_le_bytes([lsb, msb])
}

#[inline]
fn m_8bit(cpu: &Cpu65816) -> bool {
    cpu.registers.p.accumulator_8bit
}

#[inline]
fn x_8bit(cpu: &Cpu65816) -> bool {
    cpu.registers.p.index_8bit
}

/// Resolve a direct page operand address. In emulation mode with the low
/// byte of D clear, indexing wraps within the 256-byte page; software
/// observes this, so it must be reproduced.
fn direct_page_address<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B, index: u16) -> u16 {
    let operand = u16::from(fetch_u8(cpu, bus));
    let d = cpu.registers.d;

    if d.lo() != 0 {
        cpu.state.extra_cycles += 1;
    }

    if cpu.registers.emulation_mode && d.lo() == 0 && index != 0 {
        (d & 0xFF00) | (operand.wrapping_add(index) & 0x00FF)
    } else {
        d.wrapping_add(operand).wrapping_add(index)
    }
}

/// Advance a direct page address by one byte, honoring the emulation-mode
/// page wrap that applies to the address it was derived from.
fn direct_page_next(cpu: &Cpu65816, address: u16) -> u16 {
    if cpu.registers.emulation_mode && cpu.registers.d.lo() == 0 {
        (address & 0xFF00) | (address.wrapping_add(1) & 0x00FF)
    } else {
        address.wrapping_add(1)
    }
}

fn indexed_24bit(
    cpu: &mut Cpu65816,
    base: u32,
    index: u16,
    kind: AccessKind,
) -> u32 {
    let address = (base + u32::from(index)) & 0xFFFFFF;
    let page_crossed = (base & 0xFFFF00) != (address & 0xFFFF00);
    if kind == AccessKind::Write || !x_8bit(cpu) || page_crossed {
        cpu.state.extra_cycles += 1;
    }
    address
}

/// Compute the 24-bit effective address for every mode except Immediate.
pub(crate) fn effective_address<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
    kind: AccessKind,
) -> u32 {
    match mode {
        AddressingMode::DirectPage => direct_page_address(cpu, bus, 0).into(),
        AddressingMode::DirectPageX => {
            let x = cpu.registers.x;
            direct_page_address(cpu, bus, x).into()
        }
        AddressingMode::DirectPageY => {
            let y = cpu.registers.y;
            direct_page_address(cpu, bus, y).into()
        }
        AddressingMode::DirectPageIndirect => {
            let pointer = direct_page_address(cpu, bus, 0);
            let offset = read_u16_bank0(bus, pointer);
            make_u24(cpu.registers.dbr, offset)
        }
        AddressingMode::DirectPageIndexedIndirect => {
            let x = cpu.registers.x;
            let pointer = direct_page_address(cpu, bus, x);
            let lsb = bus.read(pointer.into());
            let msb = bus.read(direct_page_next(cpu, pointer).into());
            make_u24(cpu.registers.dbr, u16::from_le_bytes([lsb, msb]))
        }
        AddressingMode::DirectPageIndirectIndexed => {
            let pointer = direct_page_address(cpu, bus, 0);
            let base = make_u24(cpu.registers.dbr, read_u16_bank0(bus, pointer));
            let y = cpu.registers.y;
            indexed_24bit(cpu, base, y, kind)
        }
        AddressingMode::DirectPageIndirectLong => {
            let pointer = direct_page_address(cpu, bus, 0);
            read_u24_bank0(bus, pointer)
        }
        AddressingMode::DirectPageIndirectLongIndexed => {
            let pointer = direct_page_address(cpu, bus, 0);
            let base = read_u24_bank0(bus, pointer);
            (base + u32::from(cpu.registers.y)) & 0xFFFFFF
        }
        AddressingMode::Absolute => {
            let offset = fetch_u16(cpu, bus);
            make_u24(cpu.registers.dbr, offset)
        }
        AddressingMode::AbsoluteX => {
            let base = make_u24(cpu.registers.dbr, fetch_u16(cpu, bus));
            let x = cpu.registers.x;
            indexed_24bit(cpu, base, x, kind)
        }
        AddressingMode::AbsoluteY => {
            let base = make_u24(cpu.registers.dbr, fetch_u16(cpu, bus));
            let y = cpu.registers.y;
            indexed_24bit(cpu, base, y, kind)
        }
        AddressingMode::AbsoluteLong => fetch_u24(cpu, bus),
        AddressingMode::AbsoluteLongX => {
            let base = fetch_u24(cpu, bus);
            (base + u32::from(cpu.registers.x)) & 0xFFFFFF
        }
        AddressingMode::StackRelative => {
            let operand = u16::from(fetch_u8(cpu, bus));
            cpu.registers.s.wrapping_add(operand).into()
        }
        AddressingMode::StackRelativeIndirectIndexed => {
            let operand = u16::from(fetch_u8(cpu, bus));
            let pointer = cpu.registers.s.wrapping_add(operand);
            let base = make_u24(cpu.registers.dbr, read_u16_bank0(bus, pointer));
            (base + u32::from(cpu.registers.y)) & 0xFFFFFF
        }
        AddressingMode::Immediate => panic!("immediate mode has no effective address"),
    }
}

fn read_u24_bank0<B: BusInterface>(bus: &mut B, offset: u16) -> u32 {
    let lsb = bus.read(offset.into());
    let mid = bus.read(offset.wrapping_add(1).into());
    let bank = bus.read(offset.wrapping_add(2).into());
    make_u24(bank, u16::from_le_bytes([lsb, mid]))
}

/// Whether 16-bit data accesses through this mode wrap within the bank
/// rather than carrying into the next one. True for the modes whose
/// effective address is itself a bank $00 offset.
fn wraps_within_bank(mode: AddressingMode) -> bool {
    matches!(
        mode,
        AddressingMode::DirectPage
            | AddressingMode::DirectPageX
            | AddressingMode::DirectPageY
            | AddressingMode::StackRelative
    )
}

pub(crate) fn read_data<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    address: u32,
    eight_bit: bool,
    bank_wrap: bool,
) -> u16 {
    let lsb = bus.read(address);
    if eight_bit {
        return lsb.into();
    }

    cpu.state.extra_cycles += 1;
    let msb = bus.read(next_data_address(address, bank_wrap));
    u16::from_le_bytes([lsb, msb])
}

fn next_data_address(address: u32, bank_wrap: bool) -> u32 {
    if bank_wrap {
        make_u24(address.bank(), address.offset().wrapping_add(1))
    } else {
        (address + 1) & 0xFFFFFF
    }
}

pub(crate) fn write_data<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    address: u32,
    value: u16,
    eight_bit: bool,
    bank_wrap: bool,
) {
    bus.write(address, value.lo());
    if eight_bit {
        return;
    }

    cpu.state.extra_cycles += 1;
    bus.write(next_data_address(address, bank_wrap), value.hi());
}

/// Fetch an operand at the given width (true = 8-bit).
pub(crate) fn read_operand<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
    eight_bit: bool,
) -> u16 {
    if mode == AddressingMode::Immediate {
        if eight_bit {
            fetch_u8(cpu, bus).into()
        } else {
            cpu.state.extra_cycles += 1;
            fetch_u16(cpu, bus)
        }
    } else {
        let address = effective_address(cpu, bus, mode, AccessKind::Read);
        read_data(cpu, bus, address, eight_bit, wraps_within_bank(mode))
    }
}

pub(crate) fn write_operand<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
    value: u16,
    eight_bit: bool,
) {
    let address = effective_address(cpu, bus, mode, AccessKind::Write);
    write_data(cpu, bus, address, value, eight_bit, wraps_within_bank(mode));
}

/// Read-modify-write: resolve the address once, read, transform, write back.
pub(crate) fn modify_operand<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    mode: AddressingMode,
    op: impl FnOnce(&mut StatusRegister, u16, bool) -> u16,
) {
    let eight_bit = m_8bit(cpu);
    let bank_wrap = wraps_within_bank(mode);
    let address = effective_address(cpu, bus, mode, AccessKind::Write);
    let value = read_data(cpu, bus, address, eight_bit, bank_wrap);
    let result = op(&mut cpu.registers.p, value, eight_bit);
    write_data(cpu, bus, address, result, eight_bit, bank_wrap);
}

pub(crate) fn set_nz(p: &mut StatusRegister, value: u16, eight_bit: bool) {
    if eight_bit {
        p.zero = value & 0x00FF == 0;
        p.negative = (value as u8).sign_bit();
    } else {
        p.zero = value == 0;
        p.negative = value.sign_bit();
    }
}

// --- Stack helpers ---
//
// In emulation mode the stack pointer wraps within page $01; in native mode
// the full 16-bit pointer is used.

pub(crate) fn push_u8<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B, value: u8) {
    bus.write(cpu.registers.s.into(), value);
    cpu.registers.s = if cpu.registers.emulation_mode {
        0x0100 | (cpu.registers.s.wrapping_sub(1) & 0x00FF)
    } else {
        cpu.registers.s.wrapping_sub(1)
    };
}

pub(crate) fn pull_u8<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    cpu.registers.s = if cpu.registers.emulation_mode {
        0x0100 | (cpu.registers.s.wrapping_add(1) & 0x00FF)
    } else {
        cpu.registers.s.wrapping_add(1)
    };
    bus.read(cpu.registers.s.into())
}

pub(crate) fn push_u16<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B, value: u16) {
    push_u8(cpu, bus, value.hi());
    push_u8(cpu, bus, value.lo());
}

pub(crate) fn pull_u16<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u16 {
    let lsb = pull_u8(cpu, bus);
    let msb = pull_u8(cpu, bus);
    u16::from_le_bytes([lsb, msb])
}

/// Rewrite P wholesale (REP/SEP/PLP/RTI) and re-apply the mode invariants:
/// emulation mode forces M=X=1, and an 8-bit X clears the index high bytes.
pub(crate) fn apply_status(cpu: &mut Cpu65816, value: u8) {
    cpu.registers.p = value.into();

    if cpu.registers.emulation_mode {
        cpu.registers.p.accumulator_8bit = true;
        cpu.registers.p.index_8bit = true;
    }

    if cpu.registers.p.index_8bit {
        cpu.registers.x &= 0x00FF;
        cpu.registers.y &= 0x00FF;
    }
}

pub(crate) fn service_interrupt<B: BusInterface>(
    cpu: &mut Cpu65816,
    bus: &mut B,
    interrupt: InterruptType,
) -> u8 {
    let native = !cpu.registers.emulation_mode;

    if native {
        let pbr = cpu.registers.pbr;
        push_u8(cpu, bus, pbr);
    }
    let pc = cpu.registers.pc;
    push_u16(cpu, bus, pc);

    let mut p_byte = u8::from(cpu.registers.p);
    if !native {
        // Emulation mode repurposes bit 4 as the B flag: set for BRK/COP,
        // clear for hardware interrupts
        if interrupt.is_software() {
            p_byte |= 0x10;
        } else {
            p_byte &= !0x10;
        }
    }
    push_u8(cpu, bus, p_byte);

    cpu.registers.p.irq_disabled = true;
    cpu.registers.p.decimal_mode = false;
    cpu.registers.pbr = 0;

    let vector =
        if native { interrupt.native_vector() } else { interrupt.emulation_vector() };
    cpu.registers.pc = read_u16_bank0(bus, vector);

    if native { 8 } else { 7 }
}

pub(crate) fn execute<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    use AddressingMode as AM;

    cpu.state.extra_cycles = 0;
    let opcode = fetch_u8(cpu, bus);

    let base_cycles: u8 = match opcode {
        // --- Interrupt / control ---
        0x00 => flow::brk(cpu, bus),
        0x02 => flow::cop(cpu, bus),
        0x40 => flow::rti(cpu, bus),
        0xCB => flow::wai(cpu),
        0xDB => flow::stp(cpu),
        0xEA => 2, // NOP
        0x42 => flow::wdm(cpu, bus),

        // --- ORA ---
        0x01 => alu::ora(cpu, bus, AM::DirectPageIndexedIndirect),
        0x03 => alu::ora(cpu, bus, AM::StackRelative),
        0x05 => alu::ora(cpu, bus, AM::DirectPage),
        0x07 => alu::ora(cpu, bus, AM::DirectPageIndirectLong),
        0x09 => alu::ora(cpu, bus, AM::Immediate),
        0x0D => alu::ora(cpu, bus, AM::Absolute),
        0x0F => alu::ora(cpu, bus, AM::AbsoluteLong),
        0x11 => alu::ora(cpu, bus, AM::DirectPageIndirectIndexed),
        0x12 => alu::ora(cpu, bus, AM::DirectPageIndirect),
        0x13 => alu::ora(cpu, bus, AM::StackRelativeIndirectIndexed),
        0x15 => alu::ora(cpu, bus, AM::DirectPageX),
        0x17 => alu::ora(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0x19 => alu::ora(cpu, bus, AM::AbsoluteY),
        0x1D => alu::ora(cpu, bus, AM::AbsoluteX),
        0x1F => alu::ora(cpu, bus, AM::AbsoluteLongX),

        // --- AND ---
        0x21 => alu::and(cpu, bus, AM::DirectPageIndexedIndirect),
        0x23 => alu::and(cpu, bus, AM::StackRelative),
        0x25 => alu::and(cpu, bus, AM::DirectPage),
        0x27 => alu::and(cpu, bus, AM::DirectPageIndirectLong),
        0x29 => alu::and(cpu, bus, AM::Immediate),
        0x2D => alu::and(cpu, bus, AM::Absolute),
        0x2F => alu::and(cpu, bus, AM::AbsoluteLong),
        0x31 => alu::and(cpu, bus, AM::DirectPageIndirectIndexed),
        0x32 => alu::and(cpu, bus, AM::DirectPageIndirect),
        0x33 => alu::and(cpu, bus, AM::StackRelativeIndirectIndexed),
        0x35 => alu::and(cpu, bus, AM::DirectPageX),
        0x37 => alu::and(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0x39 => alu::and(cpu, bus, AM::AbsoluteY),
        0x3D => alu::and(cpu, bus, AM::AbsoluteX),
        0x3F => alu::and(cpu, bus, AM::AbsoluteLongX),

        // --- EOR ---
        0x41 => alu::eor(cpu, bus, AM::DirectPageIndexedIndirect),
        0x43 => alu::eor(cpu, bus, AM::StackRelative),
        0x45 => alu::eor(cpu, bus, AM::DirectPage),
        0x47 => alu::eor(cpu, bus, AM::DirectPageIndirectLong),
        0x49 => alu::eor(cpu, bus, AM::Immediate),
        0x4D => alu::eor(cpu, bus, AM::Absolute),
        0x4F => alu::eor(cpu, bus, AM::AbsoluteLong),
        0x51 => alu::eor(cpu, bus, AM::DirectPageIndirectIndexed),
        0x52 => alu::eor(cpu, bus, AM::DirectPageIndirect),
        0x53 => alu::eor(cpu, bus, AM::StackRelativeIndirectIndexed),
        0x55 => alu::eor(cpu, bus, AM::DirectPageX),
        0x57 => alu::eor(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0x59 => alu::eor(cpu, bus, AM::AbsoluteY),
        0x5D => alu::eor(cpu, bus, AM::AbsoluteX),
        0x5F => alu::eor(cpu, bus, AM::AbsoluteLongX),

        // --- ADC ---
        0x61 => alu::adc(cpu, bus, AM::DirectPageIndexedIndirect),
        0x63 => alu::adc(cpu, bus, AM::StackRelative),
        0x65 => alu::adc(cpu, bus, AM::DirectPage),
        0x67 => alu::adc(cpu, bus, AM::DirectPageIndirectLong),
        0x69 => alu::adc(cpu, bus, AM::Immediate),
        0x6D => alu::adc(cpu, bus, AM::Absolute),
        0x6F => alu::adc(cpu, bus, AM::AbsoluteLong),
        0x71 => alu::adc(cpu, bus, AM::DirectPageIndirectIndexed),
        0x72 => alu::adc(cpu, bus, AM::DirectPageIndirect),
        0x73 => alu::adc(cpu, bus, AM::StackRelativeIndirectIndexed),
        0x75 => alu::adc(cpu, bus, AM::DirectPageX),
        0x77 => alu::adc(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0x79 => alu::adc(cpu, bus, AM::AbsoluteY),
        0x7D => alu::adc(cpu, bus, AM::AbsoluteX),
        0x7F => alu::adc(cpu, bus, AM::AbsoluteLongX),

        // --- SBC ---
        0xE1 => alu::sbc(cpu, bus, AM::DirectPageIndexedIndirect),
        0xE3 => alu::sbc(cpu, bus, AM::StackRelative),
        0xE5 => alu::sbc(cpu, bus, AM::DirectPage),
        0xE7 => alu::sbc(cpu, bus, AM::DirectPageIndirectLong),
        0xE9 => alu::sbc(cpu, bus, AM::Immediate),
        0xED => alu::sbc(cpu, bus, AM::Absolute),
        0xEF => alu::sbc(cpu, bus, AM::AbsoluteLong),
        0xF1 => alu::sbc(cpu, bus, AM::DirectPageIndirectIndexed),
        0xF2 => alu::sbc(cpu, bus, AM::DirectPageIndirect),
        0xF3 => alu::sbc(cpu, bus, AM::StackRelativeIndirectIndexed),
        0xF5 => alu::sbc(cpu, bus, AM::DirectPageX),
        0xF7 => alu::sbc(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0xF9 => alu::sbc(cpu, bus, AM::AbsoluteY),
        0xFD => alu::sbc(cpu, bus, AM::AbsoluteX),
        0xFF => alu::sbc(cpu, bus, AM::AbsoluteLongX),

        // --- CMP / CPX / CPY ---
        0xC1 => alu::cmp(cpu, bus, AM::DirectPageIndexedIndirect),
        0xC3 => alu::cmp(cpu, bus, AM::StackRelative),
        0xC5 => alu::cmp(cpu, bus, AM::DirectPage),
        0xC7 => alu::cmp(cpu, bus, AM::DirectPageIndirectLong),
        0xC9 => alu::cmp(cpu, bus, AM::Immediate),
        0xCD => alu::cmp(cpu, bus, AM::Absolute),
        0xCF => alu::cmp(cpu, bus, AM::AbsoluteLong),
        0xD1 => alu::cmp(cpu, bus, AM::DirectPageIndirectIndexed),
        0xD2 => alu::cmp(cpu, bus, AM::DirectPageIndirect),
        0xD3 => alu::cmp(cpu, bus, AM::StackRelativeIndirectIndexed),
        0xD5 => alu::cmp(cpu, bus, AM::DirectPageX),
        0xD7 => alu::cmp(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0xD9 => alu::cmp(cpu, bus, AM::AbsoluteY),
        0xDD => alu::cmp(cpu, bus, AM::AbsoluteX),
        0xDF => alu::cmp(cpu, bus, AM::AbsoluteLongX),
        0xE0 => alu::cpx(cpu, bus, AM::Immediate),
        0xE4 => alu::cpx(cpu, bus, AM::DirectPage),
        0xEC => alu::cpx(cpu, bus, AM::Absolute),
        0xC0 => alu::cpy(cpu, bus, AM::Immediate),
        0xC4 => alu::cpy(cpu, bus, AM::DirectPage),
        0xCC => alu::cpy(cpu, bus, AM::Absolute),

        // --- BIT / TSB / TRB ---
        0x24 => alu::bit(cpu, bus, AM::DirectPage),
        0x2C => alu::bit(cpu, bus, AM::Absolute),
        0x34 => alu::bit(cpu, bus, AM::DirectPageX),
        0x3C => alu::bit(cpu, bus, AM::AbsoluteX),
        0x89 => alu::bit_immediate(cpu, bus),
        0x04 => alu::tsb(cpu, bus, AM::DirectPage),
        0x0C => alu::tsb(cpu, bus, AM::Absolute),
        0x14 => alu::trb(cpu, bus, AM::DirectPage),
        0x1C => alu::trb(cpu, bus, AM::Absolute),

        // --- Shifts / rotates ---
        0x0A => alu::asl_accumulator(cpu),
        0x06 => alu::asl(cpu, bus, AM::DirectPage),
        0x0E => alu::asl(cpu, bus, AM::Absolute),
        0x16 => alu::asl(cpu, bus, AM::DirectPageX),
        0x1E => alu::asl(cpu, bus, AM::AbsoluteX),
        0x4A => alu::lsr_accumulator(cpu),
        0x46 => alu::lsr(cpu, bus, AM::DirectPage),
        0x4E => alu::lsr(cpu, bus, AM::Absolute),
        0x56 => alu::lsr(cpu, bus, AM::DirectPageX),
        0x5E => alu::lsr(cpu, bus, AM::AbsoluteX),
        0x2A => alu::rol_accumulator(cpu),
        0x26 => alu::rol(cpu, bus, AM::DirectPage),
        0x2E => alu::rol(cpu, bus, AM::Absolute),
        0x36 => alu::rol(cpu, bus, AM::DirectPageX),
        0x3E => alu::rol(cpu, bus, AM::AbsoluteX),
        0x6A => alu::ror_accumulator(cpu),
        0x66 => alu::ror(cpu, bus, AM::DirectPage),
        0x6E => alu::ror(cpu, bus, AM::Absolute),
        0x76 => alu::ror(cpu, bus, AM::DirectPageX),
        0x7E => alu::ror(cpu, bus, AM::AbsoluteX),

        // --- INC / DEC ---
        0x1A => alu::inc_accumulator(cpu),
        0x3A => alu::dec_accumulator(cpu),
        0xE6 => alu::inc(cpu, bus, AM::DirectPage),
        0xEE => alu::inc(cpu, bus, AM::Absolute),
        0xF6 => alu::inc(cpu, bus, AM::DirectPageX),
        0xFE => alu::inc(cpu, bus, AM::AbsoluteX),
        0xC6 => alu::dec(cpu, bus, AM::DirectPage),
        0xCE => alu::dec(cpu, bus, AM::Absolute),
        0xD6 => alu::dec(cpu, bus, AM::DirectPageX),
        0xDE => alu::dec(cpu, bus, AM::AbsoluteX),
        0xE8 => alu::inx(cpu),
        0xC8 => alu::iny(cpu),
        0xCA => alu::dex(cpu),
        0x88 => alu::dey(cpu),

        // --- LDA / LDX / LDY ---
        0xA1 => load::lda(cpu, bus, AM::DirectPageIndexedIndirect),
        0xA3 => load::lda(cpu, bus, AM::StackRelative),
        0xA5 => load::lda(cpu, bus, AM::DirectPage),
        0xA7 => load::lda(cpu, bus, AM::DirectPageIndirectLong),
        0xA9 => load::lda(cpu, bus, AM::Immediate),
        0xAD => load::lda(cpu, bus, AM::Absolute),
        0xAF => load::lda(cpu, bus, AM::AbsoluteLong),
        0xB1 => load::lda(cpu, bus, AM::DirectPageIndirectIndexed),
        0xB2 => load::lda(cpu, bus, AM::DirectPageIndirect),
        0xB3 => load::lda(cpu, bus, AM::StackRelativeIndirectIndexed),
        0xB5 => load::lda(cpu, bus, AM::DirectPageX),
        0xB7 => load::lda(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0xB9 => load::lda(cpu, bus, AM::AbsoluteY),
        0xBD => load::lda(cpu, bus, AM::AbsoluteX),
        0xBF => load::lda(cpu, bus, AM::AbsoluteLongX),
        0xA2 => load::ldx(cpu, bus, AM::Immediate),
        0xA6 => load::ldx(cpu, bus, AM::DirectPage),
        0xAE => load::ldx(cpu, bus, AM::Absolute),
        0xB6 => load::ldx(cpu, bus, AM::DirectPageY),
        0xBE => load::ldx(cpu, bus, AM::AbsoluteY),
        0xA0 => load::ldy(cpu, bus, AM::Immediate),
        0xA4 => load::ldy(cpu, bus, AM::DirectPage),
        0xAC => load::ldy(cpu, bus, AM::Absolute),
        0xB4 => load::ldy(cpu, bus, AM::DirectPageX),
        0xBC => load::ldy(cpu, bus, AM::AbsoluteX),

        // --- STA / STX / STY / STZ ---
        0x81 => load::sta(cpu, bus, AM::DirectPageIndexedIndirect),
        0x83 => load::sta(cpu, bus, AM::StackRelative),
        0x85 => load::sta(cpu, bus, AM::DirectPage),
        0x87 => load::sta(cpu, bus, AM::DirectPageIndirectLong),
        0x8D => load::sta(cpu, bus, AM::Absolute),
        0x8F => load::sta(cpu, bus, AM::AbsoluteLong),
        0x91 => load::sta(cpu, bus, AM::DirectPageIndirectIndexed),
        0x92 => load::sta(cpu, bus, AM::DirectPageIndirect),
        0x93 => load::sta(cpu, bus, AM::StackRelativeIndirectIndexed),
        0x95 => load::sta(cpu, bus, AM::DirectPageX),
        0x97 => load::sta(cpu, bus, AM::DirectPageIndirectLongIndexed),
        0x99 => load::sta(cpu, bus, AM::AbsoluteY),
        0x9D => load::sta(cpu, bus, AM::AbsoluteX),
        0x9F => load::sta(cpu, bus, AM::AbsoluteLongX),
        0x86 => load::stx(cpu, bus, AM::DirectPage),
        0x8E => load::stx(cpu, bus, AM::Absolute),
        0x96 => load::stx(cpu, bus, AM::DirectPageY),
        0x84 => load::sty(cpu, bus, AM::DirectPage),
        0x8C => load::sty(cpu, bus, AM::Absolute),
        0x94 => load::sty(cpu, bus, AM::DirectPageX),
        0x64 => load::stz(cpu, bus, AM::DirectPage),
        0x74 => load::stz(cpu, bus, AM::DirectPageX),
        0x9C => load::stz(cpu, bus, AM::Absolute),
        0x9E => load::stz(cpu, bus, AM::AbsoluteX),

        // --- Transfers ---
        0xAA => load::tax(cpu),
        0xA8 => load::tay(cpu),
        0x8A => load::txa(cpu),
        0x98 => load::tya(cpu),
        0x9A => load::txs(cpu),
        0xBA => load::tsx(cpu),
        0x9B => load::txy(cpu),
        0xBB => load::tyx(cpu),
        0x1B => load::tcs(cpu),
        0x3B => load::tsc(cpu),
        0x5B => load::tcd(cpu),
        0x7B => load::tdc(cpu),
        0xEB => load::xba(cpu),

        // --- Block moves ---
        0x44 => load::block_move(cpu, bus, load::BlockMoveDirection::Backward),
        0x54 => load::block_move(cpu, bus, load::BlockMoveDirection::Forward),

        // --- Branches / jumps / calls ---
        0x10 => flow::branch(cpu, bus, |p| !p.negative),
        0x30 => flow::branch(cpu, bus, |p| p.negative),
        0x50 => flow::branch(cpu, bus, |p| !p.overflow),
        0x70 => flow::branch(cpu, bus, |p| p.overflow),
        0x90 => flow::branch(cpu, bus, |p| !p.carry),
        0xB0 => flow::branch(cpu, bus, |p| p.carry),
        0xD0 => flow::branch(cpu, bus, |p| !p.zero),
        0xF0 => flow::branch(cpu, bus, |p| p.zero),
        0x80 => flow::branch(cpu, bus, |_| true),
        0x82 => flow::brl(cpu, bus),
        0x4C => flow::jmp_absolute(cpu, bus),
        0x5C => flow::jml_long(cpu, bus),
        0x6C => flow::jmp_indirect(cpu, bus),
        0x7C => flow::jmp_indexed_indirect(cpu, bus),
        0xDC => flow::jml_indirect(cpu, bus),
        0x20 => flow::jsr_absolute(cpu, bus),
        0xFC => flow::jsr_indexed_indirect(cpu, bus),
        0x22 => flow::jsl(cpu, bus),
        0x60 => flow::rts(cpu, bus),
        0x6B => flow::rtl(cpu, bus),

        // --- Status flag operations ---
        0x18 => flow::set_carry(cpu, false),
        0x38 => flow::set_carry(cpu, true),
        0x58 => flow::set_irq_disabled(cpu, false),
        0x78 => flow::set_irq_disabled(cpu, true),
        0xD8 => flow::set_decimal(cpu, false),
        0xF8 => flow::set_decimal(cpu, true),
        0xB8 => flow::clv(cpu),
        0xC2 => flow::rep(cpu, bus),
        0xE2 => flow::sep(cpu, bus),
        0xFB => flow::xce(cpu),

        // --- Stack operations ---
        0x48 => stack::pha(cpu, bus),
        0xDA => stack::phx(cpu, bus),
        0x5A => stack::phy(cpu, bus),
        0x08 => stack::php(cpu, bus),
        0x8B => stack::phb(cpu, bus),
        0x4B => stack::phk(cpu, bus),
        0x0B => stack::phd(cpu, bus),
        0x68 => stack::pla(cpu, bus),
        0xFA => stack::plx(cpu, bus),
        0x7A => stack::ply(cpu, bus),
        0x28 => stack::plp(cpu, bus),
        0xAB => stack::plb(cpu, bus),
        0x2B => stack::pld(cpu, bus),
        0xF4 => stack::pea(cpu, bus),
        0xD4 => stack::pei(cpu, bus),
        0x62 => stack::per(cpu, bus),
    };

    base_cycles + cpu.state.extra_cycles
}
