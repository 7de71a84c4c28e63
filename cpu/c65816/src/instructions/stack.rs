//! Push/pull operations, including the push-effective-address trio

use super::*;

pub(crate) fn pha<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let value = cpu.registers.a;
    if m_8bit(cpu) {
        push_u8(cpu, bus, value.lo());
    } else {
        cpu.state.extra_cycles += 1;
        push_u16(cpu, bus, value);
    }
    3
}

pub(crate) fn phx<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let value = cpu.registers.x;
    if x_8bit(cpu) {
        push_u8(cpu, bus, value.lo());
    } else {
        cpu.state.extra_cycles += 1;
        push_u16(cpu, bus, value);
    }
    3
}

pub(crate) fn phy<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let value = cpu.registers.y;
    if x_8bit(cpu) {
        push_u8(cpu, bus, value.lo());
    } else {
        cpu.state.extra_cycles += 1;
        push_u16(cpu, bus, value);
    }
    3
}

pub(crate) fn php<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let p = u8::from(cpu.registers.p);
    push_u8(cpu, bus, p);
    3
}

pub(crate) fn phb<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let dbr = cpu.registers.dbr;
    push_u8(cpu, bus, dbr);
    3
}

pub(crate) fn phk<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let pbr = cpu.registers.pbr;
    push_u8(cpu, bus, pbr);
    3
}

pub(crate) fn phd<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let d = cpu.registers.d;
    push_u16(cpu, bus, d);
    4
}

pub(crate) fn pla<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let eight_bit = m_8bit(cpu);
    let value = if eight_bit {
        u16::from(pull_u8(cpu, bus))
    } else {
        cpu.state.extra_cycles += 1;
        pull_u16(cpu, bus)
    };

    if eight_bit {
        cpu.registers.a.set_lo(value.lo());
    } else {
        cpu.registers.a = value;
    }
    set_nz(&mut cpu.registers.p, value, eight_bit);
    4
}

pub(crate) fn plx<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let eight_bit = x_8bit(cpu);
    let value = if eight_bit {
        u16::from(pull_u8(cpu, bus))
    } else {
        cpu.state.extra_cycles += 1;
        pull_u16(cpu, bus)
    };

    cpu.registers.x = value;
    set_nz(&mut cpu.registers.p, value, eight_bit);
    4
}

pub(crate) fn ply<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let eight_bit = x_8bit(cpu);
    let value = if eight_bit {
        u16::from(pull_u8(cpu, bus))
    } else {
        cpu.state.extra_cycles += 1;
        pull_u16(cpu, bus)
    };

    cpu.registers.y = value;
    set_nz(&mut cpu.registers.p, value, eight_bit);
    4
}

/// PLP re-applies the M/X width invariants immediately, exactly like REP/SEP.
pub(crate) fn plp<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let p = pull_u8(cpu, bus);
    apply_status(cpu, p);
    4
}

pub(crate) fn plb<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let value = pull_u8(cpu, bus);
    cpu.registers.dbr = value;
    set_nz(&mut cpu.registers.p, value.into(), true);
    4
}

pub(crate) fn pld<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let value = pull_u16(cpu, bus);
    cpu.registers.d = value;
    set_nz(&mut cpu.registers.p, value, false);
    5
}

/// PEA: push an immediate 16-bit value.
pub(crate) fn pea<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let value = fetch_u16(cpu, bus);
    push_u16(cpu, bus, value);
    5
}

/// PEI: push the 16-bit word at a direct page address.
pub(crate) fn pei<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let address = effective_address(cpu, bus, AddressingMode::DirectPage, AccessKind::Read);
    let value = read_data(cpu, bus, address, false, true);
    // The 16-bit read helper charged a width cycle that PEI's base already
    // includes
    cpu.state.extra_cycles -= 1;
    push_u16(cpu, bus, value);
    6
}

/// PER: push PC plus a 16-bit displacement (position-independent data).
pub(crate) fn per<B: BusInterface>(cpu: &mut Cpu65816, bus: &mut B) -> u8 {
    let displacement = fetch_u16(cpu, bus);
    let value = cpu.registers.pc.wrapping_add(displacement);
    push_u16(cpu, bus, value);
    6
}
