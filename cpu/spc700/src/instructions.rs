//! SPC700 instruction decode and execution
//!
//! The opcode map is column-structured: the low nibble mostly selects the
//! operation family and the high nibble the operand form, with bit and
//! branch instructions encoding their bit index in the top three bits.

pub(crate) mod alu;
pub(crate) mod bits;
pub(crate) mod flow;
pub(crate) mod load;

use crate::traits::BusInterface;
use crate::{Spc700, StatusRegister};
use sfc_common::num::{SignBit, U16Ext};

/// Operand forms for the accumulator-style ALU and MOV instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    Immediate,
    /// dp
    DirectPage,
    /// dp+X
    DirectPageX,
    /// dp+Y
    DirectPageY,
    /// !abs
    Absolute,
    /// !abs+X
    AbsoluteX,
    /// !abs+Y
    AbsoluteY,
    /// (X)
    IndirectX,
    /// (X) with post-increment
    IndirectXIncrement,
    /// [dp+X]
    DirectPageXIndirect,
    /// [dp]+Y
    DirectPageIndirectY,
}

pub(crate) fn fetch_u8<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let value = bus.read(cpu.registers.pc);
    cpu.registers.pc = cpu.registers.pc.wrapping_add(1);
    value
}

pub(crate) fn fetch_u16<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u16 {
    let lsb = fetch_u8(cpu, bus);
    let msb = fetch_u8(cpu, bus);
    u16::from_le_bytes([lsb, msb])
}

/// Direct page offsets wrap within the 256-byte page selected by PSW.P;
/// indexing never escapes the page.
pub(crate) fn dp_address(cpu: &Spc700, offset: u8) -> u16 {
    cpu.direct_page_base() | u16::from(offset)
}

/// Resolve the effective address for every operand form except Immediate.
pub(crate) fn resolve_address<B: BusInterface>(
    cpu: &mut Spc700,
    bus: &mut B,
    operand: Operand,
) -> u16 {
    match operand {
        Operand::DirectPage => {
            let offset = fetch_u8(cpu, bus);
            dp_address(cpu, offset)
        }
        Operand::DirectPageX => {
            let offset = fetch_u8(cpu, bus).wrapping_add(cpu.registers.x);
            dp_address(cpu, offset)
        }
        Operand::DirectPageY => {
            let offset = fetch_u8(cpu, bus).wrapping_add(cpu.registers.y);
            dp_address(cpu, offset)
        }
        Operand::Absolute => fetch_u16(cpu, bus),
        Operand::AbsoluteX => fetch_u16(cpu, bus).wrapping_add(cpu.registers.x.into()),
        Operand::AbsoluteY => fetch_u16(cpu, bus).wrapping_add(cpu.registers.y.into()),
        Operand::IndirectX => dp_address(cpu, cpu.registers.x),
        Operand::IndirectXIncrement => {
            let address = dp_address(cpu, cpu.registers.x);
            cpu.registers.x = cpu.registers.x.wrapping_add(1);
            address
        }
        Operand::DirectPageXIndirect => {
            let pointer = fetch_u8(cpu, bus).wrapping_add(cpu.registers.x);
            read_dp_word_address(cpu, bus, pointer)
        }
        Operand::DirectPageIndirectY => {
            let pointer = fetch_u8(cpu, bus);
            read_dp_word_address(cpu, bus, pointer).wrapping_add(cpu.registers.y.into())
        }
        Operand::Immediate => panic!("immediate operand has no address"),
    }
}

fn read_dp_word_address<B: BusInterface>(cpu: &Spc700, bus: &mut B, pointer: u8) -> u16 {
    let lsb = bus.read(dp_address(cpu, pointer));
    let msb = bus.read(dp_address(cpu, pointer.wrapping_add(1)));
    u16::from_le_bytes([lsb, msb])
}

pub(crate) fn read_operand<B: BusInterface>(
    cpu: &mut Spc700,
    bus: &mut B,
    operand: Operand,
) -> u8 {
    if operand == Operand::Immediate {
        fetch_u8(cpu, bus)
    } else {
        let address = resolve_address(cpu, bus, operand);
        bus.read(address)
    }
}

/// Cycle cost of an `op A, <operand>` instruction.
pub(crate) fn accumulator_op_cycles(operand: Operand) -> u8 {
    match operand {
        Operand::Immediate => 2,
        Operand::DirectPage | Operand::IndirectX => 3,
        Operand::DirectPageX | Operand::DirectPageY | Operand::Absolute => 4,
        Operand::AbsoluteX | Operand::AbsoluteY => 5,
        Operand::IndirectXIncrement => 4,
        Operand::DirectPageXIndirect | Operand::DirectPageIndirectY => 6,
    }
}

pub(crate) fn set_nz(psw: &mut StatusRegister, value: u8) {
    psw.zero = value == 0;
    psw.negative = value.sign_bit();
}

pub(crate) fn set_nz_u16(psw: &mut StatusRegister, value: u16) {
    psw.zero = value == 0;
    psw.negative = value.sign_bit();
}

pub(crate) fn push_u8<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, value: u8) {
    bus.write(cpu.stack_address(), value);
    cpu.registers.sp = cpu.registers.sp.wrapping_sub(1);
}

pub(crate) fn pull_u8<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    cpu.registers.sp = cpu.registers.sp.wrapping_add(1);
    bus.read(cpu.stack_address())
}

pub(crate) fn execute<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    use Operand as Op;

    let opcode = fetch_u8(cpu, bus);

    match opcode {
        0x00 => 2, // NOP

        // TCALL n: vector table descends from $FFDE
        0x01 | 0x11 | 0x21 | 0x31 | 0x41 | 0x51 | 0x61 | 0x71 | 0x81 | 0x91 | 0xA1 | 0xB1
        | 0xC1 | 0xD1 | 0xE1 | 0xF1 => flow::tcall(cpu, bus, opcode >> 4),

        // SET1/CLR1 dp.n
        0x02 | 0x22 | 0x42 | 0x62 | 0x82 | 0xA2 | 0xC2 | 0xE2 => {
            bits::set1(cpu, bus, opcode >> 5, true)
        }
        0x12 | 0x32 | 0x52 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
            bits::set1(cpu, bus, opcode >> 5, false)
        }

        // BBS/BBC dp.n, rel
        0x03 | 0x23 | 0x43 | 0x63 | 0x83 | 0xA3 | 0xC3 | 0xE3 => {
            bits::branch_on_bit(cpu, bus, opcode >> 5, true)
        }
        0x13 | 0x33 | 0x53 | 0x73 | 0x93 | 0xB3 | 0xD3 | 0xF3 => {
            bits::branch_on_bit(cpu, bus, opcode >> 5, false)
        }

        // --- OR ---
        0x04 => alu::or(cpu, bus, Op::DirectPage),
        0x05 => alu::or(cpu, bus, Op::Absolute),
        0x06 => alu::or(cpu, bus, Op::IndirectX),
        0x07 => alu::or(cpu, bus, Op::DirectPageXIndirect),
        0x08 => alu::or(cpu, bus, Op::Immediate),
        0x09 => alu::or_mem_mem(cpu, bus),
        0x14 => alu::or(cpu, bus, Op::DirectPageX),
        0x15 => alu::or(cpu, bus, Op::AbsoluteX),
        0x16 => alu::or(cpu, bus, Op::AbsoluteY),
        0x17 => alu::or(cpu, bus, Op::DirectPageIndirectY),
        0x18 => alu::or_mem_imm(cpu, bus),
        0x19 => alu::or_ix_iy(cpu, bus),

        // --- AND ---
        0x24 => alu::and(cpu, bus, Op::DirectPage),
        0x25 => alu::and(cpu, bus, Op::Absolute),
        0x26 => alu::and(cpu, bus, Op::IndirectX),
        0x27 => alu::and(cpu, bus, Op::DirectPageXIndirect),
        0x28 => alu::and(cpu, bus, Op::Immediate),
        0x29 => alu::and_mem_mem(cpu, bus),
        0x34 => alu::and(cpu, bus, Op::DirectPageX),
        0x35 => alu::and(cpu, bus, Op::AbsoluteX),
        0x36 => alu::and(cpu, bus, Op::AbsoluteY),
        0x37 => alu::and(cpu, bus, Op::DirectPageIndirectY),
        0x38 => alu::and_mem_imm(cpu, bus),
        0x39 => alu::and_ix_iy(cpu, bus),

        // --- EOR ---
        0x44 => alu::eor(cpu, bus, Op::DirectPage),
        0x45 => alu::eor(cpu, bus, Op::Absolute),
        0x46 => alu::eor(cpu, bus, Op::IndirectX),
        0x47 => alu::eor(cpu, bus, Op::DirectPageXIndirect),
        0x48 => alu::eor(cpu, bus, Op::Immediate),
        0x49 => alu::eor_mem_mem(cpu, bus),
        0x54 => alu::eor(cpu, bus, Op::DirectPageX),
        0x55 => alu::eor(cpu, bus, Op::AbsoluteX),
        0x56 => alu::eor(cpu, bus, Op::AbsoluteY),
        0x57 => alu::eor(cpu, bus, Op::DirectPageIndirectY),
        0x58 => alu::eor_mem_imm(cpu, bus),
        0x59 => alu::eor_ix_iy(cpu, bus),

        // --- CMP ---
        0x64 => alu::cmp_a(cpu, bus, Op::DirectPage),
        0x65 => alu::cmp_a(cpu, bus, Op::Absolute),
        0x66 => alu::cmp_a(cpu, bus, Op::IndirectX),
        0x67 => alu::cmp_a(cpu, bus, Op::DirectPageXIndirect),
        0x68 => alu::cmp_a(cpu, bus, Op::Immediate),
        0x69 => alu::cmp_mem_mem(cpu, bus),
        0x74 => alu::cmp_a(cpu, bus, Op::DirectPageX),
        0x75 => alu::cmp_a(cpu, bus, Op::AbsoluteX),
        0x76 => alu::cmp_a(cpu, bus, Op::AbsoluteY),
        0x77 => alu::cmp_a(cpu, bus, Op::DirectPageIndirectY),
        0x78 => alu::cmp_mem_imm(cpu, bus),
        0x79 => alu::cmp_ix_iy(cpu, bus),
        0x1E => alu::cmp_x(cpu, bus, Op::Absolute),
        0x3E => alu::cmp_x(cpu, bus, Op::DirectPage),
        0xC8 => alu::cmp_x(cpu, bus, Op::Immediate),
        0x5E => alu::cmp_y(cpu, bus, Op::Absolute),
        0x7E => alu::cmp_y(cpu, bus, Op::DirectPage),
        0xAD => alu::cmp_y(cpu, bus, Op::Immediate),

        // --- ADC ---
        0x84 => alu::adc(cpu, bus, Op::DirectPage),
        0x85 => alu::adc(cpu, bus, Op::Absolute),
        0x86 => alu::adc(cpu, bus, Op::IndirectX),
        0x87 => alu::adc(cpu, bus, Op::DirectPageXIndirect),
        0x88 => alu::adc(cpu, bus, Op::Immediate),
        0x89 => alu::adc_mem_mem(cpu, bus),
        0x94 => alu::adc(cpu, bus, Op::DirectPageX),
        0x95 => alu::adc(cpu, bus, Op::AbsoluteX),
        0x96 => alu::adc(cpu, bus, Op::AbsoluteY),
        0x97 => alu::adc(cpu, bus, Op::DirectPageIndirectY),
        0x98 => alu::adc_mem_imm(cpu, bus),
        0x99 => alu::adc_ix_iy(cpu, bus),

        // --- SBC ---
        0xA4 => alu::sbc(cpu, bus, Op::DirectPage),
        0xA5 => alu::sbc(cpu, bus, Op::Absolute),
        0xA6 => alu::sbc(cpu, bus, Op::IndirectX),
        0xA7 => alu::sbc(cpu, bus, Op::DirectPageXIndirect),
        0xA8 => alu::sbc(cpu, bus, Op::Immediate),
        0xA9 => alu::sbc_mem_mem(cpu, bus),
        0xB4 => alu::sbc(cpu, bus, Op::DirectPageX),
        0xB5 => alu::sbc(cpu, bus, Op::AbsoluteX),
        0xB6 => alu::sbc(cpu, bus, Op::AbsoluteY),
        0xB7 => alu::sbc(cpu, bus, Op::DirectPageIndirectY),
        0xB8 => alu::sbc_mem_imm(cpu, bus),
        0xB9 => alu::sbc_ix_iy(cpu, bus),

        // --- Bit-carry operations ---
        0x0A => bits::or1(cpu, bus, false),
        0x2A => bits::or1(cpu, bus, true),
        0x4A => bits::and1(cpu, bus, false),
        0x6A => bits::and1(cpu, bus, true),
        0x8A => bits::eor1(cpu, bus),
        0xAA => bits::mov1_to_carry(cpu, bus),
        0xCA => bits::mov1_from_carry(cpu, bus),
        0xEA => bits::not1(cpu, bus),
        0x0E => bits::tset1(cpu, bus),
        0x4E => bits::tclr1(cpu, bus),

        // --- Shifts / rotates ---
        0x1C => alu::asl_a(cpu),
        0x0B => alu::asl(cpu, bus, Op::DirectPage),
        0x1B => alu::asl(cpu, bus, Op::DirectPageX),
        0x0C => alu::asl(cpu, bus, Op::Absolute),
        0x3C => alu::rol_a(cpu),
        0x2B => alu::rol(cpu, bus, Op::DirectPage),
        0x3B => alu::rol(cpu, bus, Op::DirectPageX),
        0x2C => alu::rol(cpu, bus, Op::Absolute),
        0x5C => alu::lsr_a(cpu),
        0x4B => alu::lsr(cpu, bus, Op::DirectPage),
        0x5B => alu::lsr(cpu, bus, Op::DirectPageX),
        0x4C => alu::lsr(cpu, bus, Op::Absolute),
        0x7C => alu::ror_a(cpu),
        0x6B => alu::ror(cpu, bus, Op::DirectPage),
        0x7B => alu::ror(cpu, bus, Op::DirectPageX),
        0x6C => alu::ror(cpu, bus, Op::Absolute),

        // --- INC / DEC ---
        0xBC => alu::inc_a(cpu),
        0x3D => alu::inc_x(cpu),
        0xFC => alu::inc_y(cpu),
        0xAB => alu::inc(cpu, bus, Op::DirectPage),
        0xBB => alu::inc(cpu, bus, Op::DirectPageX),
        0xAC => alu::inc(cpu, bus, Op::Absolute),
        0x9C => alu::dec_a(cpu),
        0x1D => alu::dec_x(cpu),
        0xDC => alu::dec_y(cpu),
        0x8B => alu::dec(cpu, bus, Op::DirectPage),
        0x9B => alu::dec(cpu, bus, Op::DirectPageX),
        0x8C => alu::dec(cpu, bus, Op::Absolute),

        // --- 16-bit word operations on a direct page word ---
        0x1A => alu::decw(cpu, bus),
        0x3A => alu::incw(cpu, bus),
        0x5A => alu::cmpw(cpu, bus),
        0x7A => alu::addw(cpu, bus),
        0x9A => alu::subw(cpu, bus),
        0xBA => load::movw_ya_dp(cpu, bus),
        0xDA => load::movw_dp_ya(cpu, bus),

        // --- Multiply / divide / decimal adjust / nibble exchange ---
        0xCF => alu::mul(cpu),
        0x9E => alu::div(cpu),
        0xDF => alu::daa(cpu),
        0xBE => alu::das(cpu),
        0x9F => alu::xcn(cpu),

        // --- MOV loads ---
        0xE8 => load::mov_a(cpu, bus, Op::Immediate),
        0xE4 => load::mov_a(cpu, bus, Op::DirectPage),
        0xF4 => load::mov_a(cpu, bus, Op::DirectPageX),
        0xE5 => load::mov_a(cpu, bus, Op::Absolute),
        0xF5 => load::mov_a(cpu, bus, Op::AbsoluteX),
        0xF6 => load::mov_a(cpu, bus, Op::AbsoluteY),
        0xE6 => load::mov_a(cpu, bus, Op::IndirectX),
        0xBF => load::mov_a(cpu, bus, Op::IndirectXIncrement),
        0xE7 => load::mov_a(cpu, bus, Op::DirectPageXIndirect),
        0xF7 => load::mov_a(cpu, bus, Op::DirectPageIndirectY),
        0xCD => load::mov_x(cpu, bus, Op::Immediate),
        0xF8 => load::mov_x(cpu, bus, Op::DirectPage),
        0xF9 => load::mov_x(cpu, bus, Op::DirectPageY),
        0xE9 => load::mov_x(cpu, bus, Op::Absolute),
        0x8D => load::mov_y(cpu, bus, Op::Immediate),
        0xEB => load::mov_y(cpu, bus, Op::DirectPage),
        0xFB => load::mov_y(cpu, bus, Op::DirectPageX),
        0xEC => load::mov_y(cpu, bus, Op::Absolute),

        // --- MOV stores ---
        0xC4 => load::mov_mem_a(cpu, bus, Op::DirectPage),
        0xD4 => load::mov_mem_a(cpu, bus, Op::DirectPageX),
        0xC5 => load::mov_mem_a(cpu, bus, Op::Absolute),
        0xD5 => load::mov_mem_a(cpu, bus, Op::AbsoluteX),
        0xD6 => load::mov_mem_a(cpu, bus, Op::AbsoluteY),
        0xC6 => load::mov_mem_a(cpu, bus, Op::IndirectX),
        0xAF => load::mov_mem_a(cpu, bus, Op::IndirectXIncrement),
        0xC7 => load::mov_mem_a(cpu, bus, Op::DirectPageXIndirect),
        0xD7 => load::mov_mem_a(cpu, bus, Op::DirectPageIndirectY),
        0xD8 => load::mov_mem_x(cpu, bus, Op::DirectPage),
        0xD9 => load::mov_mem_x(cpu, bus, Op::DirectPageY),
        0xC9 => load::mov_mem_x(cpu, bus, Op::Absolute),
        0xCB => load::mov_mem_y(cpu, bus, Op::DirectPage),
        0xDB => load::mov_mem_y(cpu, bus, Op::DirectPageX),
        0xCC => load::mov_mem_y(cpu, bus, Op::Absolute),

        // --- MOV register-to-register and memory-to-memory ---
        0x7D => load::mov_a_x(cpu),
        0xDD => load::mov_a_y(cpu),
        0x5D => load::mov_x_a(cpu),
        0xFD => load::mov_y_a(cpu),
        0x9D => load::mov_x_sp(cpu),
        0xBD => load::mov_sp_x(cpu),
        0xFA => load::mov_dp_dp(cpu, bus),
        0x8F => load::mov_dp_imm(cpu, bus),

        // --- Stack ---
        0x2D => flow::push(cpu, bus, |cpu| cpu.registers.a),
        0x4D => flow::push(cpu, bus, |cpu| cpu.registers.x),
        0x6D => flow::push(cpu, bus, |cpu| cpu.registers.y),
        0x0D => flow::push(cpu, bus, |cpu| cpu.registers.psw.into()),
        0xAE => flow::pop_a(cpu, bus),
        0xCE => flow::pop_x(cpu, bus),
        0xEE => flow::pop_y(cpu, bus),
        0x8E => flow::pop_psw(cpu, bus),

        // --- Branches ---
        0x2F => flow::branch(cpu, bus, |_| true),
        0x10 => flow::branch(cpu, bus, |psw| !psw.negative),
        0x30 => flow::branch(cpu, bus, |psw| psw.negative),
        0x50 => flow::branch(cpu, bus, |psw| !psw.overflow),
        0x70 => flow::branch(cpu, bus, |psw| psw.overflow),
        0x90 => flow::branch(cpu, bus, |psw| !psw.carry),
        0xB0 => flow::branch(cpu, bus, |psw| psw.carry),
        0xD0 => flow::branch(cpu, bus, |psw| !psw.zero),
        0xF0 => flow::branch(cpu, bus, |psw| psw.zero),
        0x2E => flow::cbne(cpu, bus, Op::DirectPage),
        0xDE => flow::cbne(cpu, bus, Op::DirectPageX),
        0x6E => flow::dbnz_dp(cpu, bus),
        0xFE => flow::dbnz_y(cpu, bus),

        // --- Jumps / calls ---
        0x5F => flow::jmp_absolute(cpu, bus),
        0x1F => flow::jmp_indexed_indirect(cpu, bus),
        0x3F => flow::call(cpu, bus),
        0x4F => flow::pcall(cpu, bus),
        0x6F => flow::ret(cpu, bus),
        0x7F => flow::reti(cpu, bus),
        0x0F => flow::brk(cpu, bus),

        // --- PSW operations ---
        0x60 => flow::set_carry(cpu, false),
        0x80 => flow::set_carry(cpu, true),
        0xED => flow::notc(cpu),
        0x20 => flow::set_direct_page(cpu, false),
        0x40 => flow::set_direct_page(cpu, true),
        0xE0 => flow::clrv(cpu),
        0xA0 => flow::set_interrupt_enabled(cpu, true),
        0xC0 => flow::set_interrupt_enabled(cpu, false),

        // --- Halt ---
        0xEF => flow::sleep(cpu),
        0xFF => flow::stop(cpu),
    }
}
