//! Arithmetic, logical, shift, and 16-bit word operations

use super::*;

fn adc_values(psw: &mut StatusRegister, a: u8, operand: u8) -> u8 {
    let carry_in = u8::from(psw.carry);
    let sum = u16::from(a) + u16::from(operand) + u16::from(carry_in);
    let result = sum as u8;

    psw.carry = sum > 0xFF;
    psw.half_carry = (a & 0x0F) + (operand & 0x0F) + carry_in > 0x0F;
    psw.overflow = (!(a ^ operand) & (a ^ result) & 0x80) != 0;
    set_nz(psw, result);

    result
}

fn sbc_values(psw: &mut StatusRegister, a: u8, operand: u8) -> u8 {
    // Subtraction is addition of the complement, including the H flag
    adc_values(psw, a, !operand)
}

fn compare_values(psw: &mut StatusRegister, register: u8, operand: u8) {
    psw.carry = register >= operand;
    set_nz(psw, register.wrapping_sub(operand));
}

macro_rules! impl_accumulator_op {
    ($name:ident, $value_fn:expr) => {
        pub(crate) fn $name<B: BusInterface>(
            cpu: &mut Spc700,
            bus: &mut B,
            operand: Operand,
        ) -> u8 {
            let value = read_operand(cpu, bus, operand);
            let a = cpu.registers.a;
            cpu.registers.a = $value_fn(&mut cpu.registers.psw, a, value);

            accumulator_op_cycles(operand)
        }
    };
}

fn or_values(psw: &mut StatusRegister, a: u8, operand: u8) -> u8 {
    let result = a | operand;
    set_nz(psw, result);
    result
}

fn and_values(psw: &mut StatusRegister, a: u8, operand: u8) -> u8 {
    let result = a & operand;
    set_nz(psw, result);
    result
}

fn eor_values(psw: &mut StatusRegister, a: u8, operand: u8) -> u8 {
    let result = a ^ operand;
    set_nz(psw, result);
    result
}

impl_accumulator_op!(or, or_values);
impl_accumulator_op!(and, and_values);
impl_accumulator_op!(eor, eor_values);
impl_accumulator_op!(adc, adc_values);
impl_accumulator_op!(sbc, sbc_values);

pub(crate) fn cmp_a<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, operand: Operand) -> u8 {
    let value = read_operand(cpu, bus, operand);
    compare_values(&mut cpu.registers.psw, cpu.registers.a, value);

    accumulator_op_cycles(operand)
}

pub(crate) fn cmp_x<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, operand: Operand) -> u8 {
    let value = read_operand(cpu, bus, operand);
    compare_values(&mut cpu.registers.psw, cpu.registers.x, value);

    accumulator_op_cycles(operand)
}

pub(crate) fn cmp_y<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, operand: Operand) -> u8 {
    let value = read_operand(cpu, bus, operand);
    compare_values(&mut cpu.registers.psw, cpu.registers.y, value);

    accumulator_op_cycles(operand)
}

// The two-memory-operand forms: `op dp, dp` (6 cycles), `op dp, #imm`
// (5 cycles), and `op (X), (Y)` (5 cycles). The source operand is fetched
// before the destination address.

macro_rules! impl_mem_mem_ops {
    ($dp_dp:ident, $dp_imm:ident, $ix_iy:ident, $value_fn:expr) => {
        pub(crate) fn $dp_dp<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
            let source = read_operand(cpu, bus, Operand::DirectPage);
            let dest = resolve_address(cpu, bus, Operand::DirectPage);
            let value = bus.read(dest);
            let result = $value_fn(&mut cpu.registers.psw, value, source);
            bus.write(dest, result);
            6
        }

        pub(crate) fn $dp_imm<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
            let source = fetch_u8(cpu, bus);
            let dest = resolve_address(cpu, bus, Operand::DirectPage);
            let value = bus.read(dest);
            let result = $value_fn(&mut cpu.registers.psw, value, source);
            bus.write(dest, result);
            5
        }

        pub(crate) fn $ix_iy<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
            let source = bus.read(dp_address(cpu, cpu.registers.y));
            let dest = dp_address(cpu, cpu.registers.x);
            let value = bus.read(dest);
            let result = $value_fn(&mut cpu.registers.psw, value, source);
            bus.write(dest, result);
            5
        }
    };
}

impl_mem_mem_ops!(or_mem_mem, or_mem_imm, or_ix_iy, or_values);
impl_mem_mem_ops!(and_mem_mem, and_mem_imm, and_ix_iy, and_values);
impl_mem_mem_ops!(eor_mem_mem, eor_mem_imm, eor_ix_iy, eor_values);
impl_mem_mem_ops!(adc_mem_mem, adc_mem_imm, adc_ix_iy, adc_values);
impl_mem_mem_ops!(sbc_mem_mem, sbc_mem_imm, sbc_ix_iy, sbc_values);

pub(crate) fn cmp_mem_mem<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let source = read_operand(cpu, bus, Operand::DirectPage);
    let dest = read_operand(cpu, bus, Operand::DirectPage);
    compare_values(&mut cpu.registers.psw, dest, source);
    6
}

pub(crate) fn cmp_mem_imm<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let source = fetch_u8(cpu, bus);
    let dest = read_operand(cpu, bus, Operand::DirectPage);
    compare_values(&mut cpu.registers.psw, dest, source);
    5
}

pub(crate) fn cmp_ix_iy<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let source = bus.read(dp_address(cpu, cpu.registers.y));
    let dest = bus.read(dp_address(cpu, cpu.registers.x));
    compare_values(&mut cpu.registers.psw, dest, source);
    5
}

// --- Shifts and rotates ---

fn asl_value(psw: &mut StatusRegister, value: u8) -> u8 {
    psw.carry = value & 0x80 != 0;
    let result = value << 1;
    set_nz(psw, result);
    result
}

fn lsr_value(psw: &mut StatusRegister, value: u8) -> u8 {
    psw.carry = value & 0x01 != 0;
    let result = value >> 1;
    set_nz(psw, result);
    result
}

fn rol_value(psw: &mut StatusRegister, value: u8) -> u8 {
    let carry_in = u8::from(psw.carry);
    psw.carry = value & 0x80 != 0;
    let result = (value << 1) | carry_in;
    set_nz(psw, result);
    result
}

fn ror_value(psw: &mut StatusRegister, value: u8) -> u8 {
    let carry_in = u8::from(psw.carry) << 7;
    psw.carry = value & 0x01 != 0;
    let result = (value >> 1) | carry_in;
    set_nz(psw, result);
    result
}

fn inc_value(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = value.wrapping_add(1);
    set_nz(psw, result);
    result
}

fn dec_value(psw: &mut StatusRegister, value: u8) -> u8 {
    let result = value.wrapping_sub(1);
    set_nz(psw, result);
    result
}

fn rmw_cycles(operand: Operand) -> u8 {
    match operand {
        Operand::DirectPage => 4,
        Operand::DirectPageX | Operand::Absolute => 5,
        _ => panic!("operand form not used by read-modify-write ops: {operand:?}"),
    }
}

macro_rules! impl_rmw_op {
    ($mem_name:ident, $a_name:ident, $value_fn:ident) => {
        pub(crate) fn $mem_name<B: BusInterface>(
            cpu: &mut Spc700,
            bus: &mut B,
            operand: Operand,
        ) -> u8 {
            let address = resolve_address(cpu, bus, operand);
            let value = bus.read(address);
            let result = $value_fn(&mut cpu.registers.psw, value);
            bus.write(address, result);

            rmw_cycles(operand)
        }

        pub(crate) fn $a_name(cpu: &mut Spc700) -> u8 {
            let value = cpu.registers.a;
            cpu.registers.a = $value_fn(&mut cpu.registers.psw, value);
            2
        }
    };
}

impl_rmw_op!(asl, asl_a, asl_value);
impl_rmw_op!(lsr, lsr_a, lsr_value);
impl_rmw_op!(rol, rol_a, rol_value);
impl_rmw_op!(ror, ror_a, ror_value);
impl_rmw_op!(inc, inc_a, inc_value);
impl_rmw_op!(dec, dec_a, dec_value);

macro_rules! impl_index_step_op {
    ($name:ident, $register:ident, $value_fn:ident) => {
        pub(crate) fn $name(cpu: &mut Spc700) -> u8 {
            let value = cpu.registers.$register;
            cpu.registers.$register = $value_fn(&mut cpu.registers.psw, value);
            2
        }
    };
}

impl_index_step_op!(inc_x, x, inc_value);
impl_index_step_op!(inc_y, y, inc_value);
impl_index_step_op!(dec_x, x, dec_value);
impl_index_step_op!(dec_y, y, dec_value);

// --- 16-bit operations on a direct page word ---
//
// The high byte lives at the next direct page offset, wrapping within the
// page like every other direct page access.

fn read_dp_word<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> (u8, u16) {
    let offset = fetch_u8(cpu, bus);
    let lsb = bus.read(dp_address(cpu, offset));
    let msb = bus.read(dp_address(cpu, offset.wrapping_add(1)));
    (offset, u16::from_le_bytes([lsb, msb]))
}

fn write_dp_word<B: BusInterface>(cpu: &mut Spc700, bus: &mut B, offset: u8, value: u16) {
    bus.write(dp_address(cpu, offset), value.lo());
    bus.write(dp_address(cpu, offset.wrapping_add(1)), value.hi());
}

pub(crate) fn incw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let (offset, value) = read_dp_word(cpu, bus);
    let result = value.wrapping_add(1);
    write_dp_word(cpu, bus, offset, result);
    set_nz_u16(&mut cpu.registers.psw, result);
    6
}

pub(crate) fn decw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let (offset, value) = read_dp_word(cpu, bus);
    let result = value.wrapping_sub(1);
    write_dp_word(cpu, bus, offset, result);
    set_nz_u16(&mut cpu.registers.psw, result);
    6
}

pub(crate) fn addw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let (_, operand) = read_dp_word(cpu, bus);
    let ya = cpu.registers.ya();

    let sum = u32::from(ya) + u32::from(operand);
    let result = sum as u16;

    // H reflects the carry out of bit 11, i.e. the low nibble of the
    // high-byte addition
    let low_carry = u16::from((ya & 0x00FF) + (operand & 0x00FF) > 0x00FF);
    cpu.registers.psw.half_carry =
        ((ya >> 8) & 0x0F) + ((operand >> 8) & 0x0F) + low_carry > 0x0F;
    cpu.registers.psw.carry = sum > 0xFFFF;
    cpu.registers.psw.overflow = (!(ya ^ operand) & (ya ^ result) & 0x8000) != 0;
    set_nz_u16(&mut cpu.registers.psw, result);

    cpu.registers.set_ya(result);
    5
}

pub(crate) fn subw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let (_, operand) = read_dp_word(cpu, bus);
    let ya = cpu.registers.ya();

    let diff = i32::from(ya) - i32::from(operand);
    let result = diff as u16;

    let low_borrow = u16::from(ya & 0x00FF < operand & 0x00FF);
    cpu.registers.psw.half_carry =
        ((ya >> 8) & 0x0F) >= ((operand >> 8) & 0x0F) + low_borrow;
    cpu.registers.psw.carry = diff >= 0;
    cpu.registers.psw.overflow = ((ya ^ operand) & (ya ^ result) & 0x8000) != 0;
    set_nz_u16(&mut cpu.registers.psw, result);

    cpu.registers.set_ya(result);
    5
}

pub(crate) fn cmpw<B: BusInterface>(cpu: &mut Spc700, bus: &mut B) -> u8 {
    let (_, operand) = read_dp_word(cpu, bus);
    let ya = cpu.registers.ya();

    cpu.registers.psw.carry = ya >= operand;
    set_nz_u16(&mut cpu.registers.psw, ya.wrapping_sub(operand));
    4
}

// --- Multiply / divide / decimal adjust ---

/// MUL YA: YA = Y * A, flags from the high byte.
pub(crate) fn mul(cpu: &mut Spc700) -> u8 {
    let product = u16::from(cpu.registers.y) * u16::from(cpu.registers.a);
    cpu.registers.set_ya(product);
    set_nz(&mut cpu.registers.psw, cpu.registers.y);
    9
}

/// DIV YA, X: quotient to A, remainder to Y. Quotients that do not fit in
/// 8 bits set V and produce the hardware's wrapped results.
pub(crate) fn div(cpu: &mut Spc700) -> u8 {
    let ya = u32::from(cpu.registers.ya());
    let x = u32::from(cpu.registers.x);
    let y = u32::from(cpu.registers.y);

    cpu.registers.psw.overflow = y >= x;
    cpu.registers.psw.half_carry = (y & 0x0F) >= (x & 0x0F);

    if y < (x << 1) {
        cpu.registers.a = (ya / x) as u8;
        cpu.registers.y = (ya % x) as u8;
    } else {
        cpu.registers.a = (255 - (ya - (x << 9)) / (256 - x)) as u8;
        cpu.registers.y = (x + (ya - (x << 9)) % (256 - x)) as u8;
    }

    set_nz(&mut cpu.registers.psw, cpu.registers.a);
    12
}

pub(crate) fn daa(cpu: &mut Spc700) -> u8 {
    let psw = &mut cpu.registers.psw;
    let mut a = cpu.registers.a;

    if psw.carry || a > 0x99 {
        a = a.wrapping_add(0x60);
        psw.carry = true;
    }
    if psw.half_carry || a & 0x0F > 0x09 {
        a = a.wrapping_add(0x06);
    }

    cpu.registers.a = a;
    set_nz(&mut cpu.registers.psw, a);
    3
}

pub(crate) fn das(cpu: &mut Spc700) -> u8 {
    let psw = &mut cpu.registers.psw;
    let mut a = cpu.registers.a;

    if !psw.carry || a > 0x99 {
        a = a.wrapping_sub(0x60);
        psw.carry = false;
    }
    if !psw.half_carry || a & 0x0F > 0x09 {
        a = a.wrapping_sub(0x06);
    }

    cpu.registers.a = a;
    set_nz(&mut cpu.registers.psw, a);
    3
}

/// XCN: exchange the accumulator's nibbles.
pub(crate) fn xcn(cpu: &mut Spc700) -> u8 {
    cpu.registers.a = cpu.registers.a.rotate_right(4);
    set_nz(&mut cpu.registers.psw, cpu.registers.a);
    5
}
