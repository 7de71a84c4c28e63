//! Internal memory and on-chip CPU I/O registers

pub(crate) mod cartridge;
pub(crate) mod dma;

use crate::api::LoadResult;
use crate::input::JoypadState;
use crate::memory::cartridge::Cartridge;
use bincode::{Decode, Encode};
use sfc_common::num::GetBit;

const WRAM_LEN: usize = 128 * 1024;

type Wram = [u8; WRAM_LEN];

#[derive(Debug, Clone, Encode, Decode)]
pub struct Memory {
    cartridge: Cartridge,
    wram: Box<Wram>,
    wram_port_address: u32,
    open_bus: u8,
}

impl Memory {
    pub fn create(rom: Vec<u8>, initial_sram: Option<Vec<u8>>) -> LoadResult<Self> {
        let cartridge = Cartridge::create(rom, initial_sram)?;

        Ok(Self {
            cartridge,
            wram: vec![0; WRAM_LEN].into_boxed_slice().try_into().unwrap(),
            wram_port_address: 0,
            open_bus: 0,
        })
    }

    pub fn read_cartridge(&mut self, address: u32) -> Option<u8> {
        let value = self.cartridge.read(address);
        if let Some(value) = value {
            self.open_bus = value;
        }
        value
    }

    pub fn write_cartridge(&mut self, address: u32, value: u8) {
        self.cartridge.write(address, value);
    }

    pub fn cartridge_title(&self) -> String {
        self.cartridge.title()
    }

    pub fn sram(&self) -> Option<&[u8]> {
        self.cartridge.sram()
    }

    pub fn read_wram(&self, address: u32) -> u8 {
        self.wram[(address as usize) & (WRAM_LEN - 1)]
    }

    pub fn write_wram(&mut self, address: u32, value: u8) {
        self.wram[(address as usize) & (WRAM_LEN - 1)] = value;
    }

    // $2180-$2183: WRAM access port in address bus B

    pub fn read_wram_port(&mut self) -> u8 {
        let value = self.wram[self.wram_port_address as usize];
        self.increment_wram_port_address();
        value
    }

    pub fn write_wram_port(&mut self, value: u8) {
        self.wram[self.wram_port_address as usize] = value;
        self.increment_wram_port_address();
    }

    fn increment_wram_port_address(&mut self) {
        self.wram_port_address = (self.wram_port_address + 1) & ((WRAM_LEN - 1) as u32);
    }

    pub fn write_wram_port_address_low(&mut self, value: u8) {
        self.wram_port_address = (self.wram_port_address & 0xFFFF00) | u32::from(value);
    }

    pub fn write_wram_port_address_mid(&mut self, value: u8) {
        self.wram_port_address = (self.wram_port_address & 0xFF00FF) | (u32::from(value) << 8);
    }

    pub fn write_wram_port_address_high(&mut self, value: u8) {
        // Only the lowest bit of the high byte is meaningful
        self.wram_port_address =
            (self.wram_port_address & 0x00FFFF) | (u32::from(value & 0x01) << 16);
    }

    pub fn open_bus(&self) -> u8 {
        self.open_bus
    }

    pub fn set_open_bus(&mut self, value: u8) {
        self.open_bus = value;
    }
}

/// Manual controller port state: strobing latches the buttons, serial reads
/// then drain one bit per read, refilling with 1s the way the hardware's
/// shift registers do.
#[derive(Debug, Clone, Encode, Decode)]
struct InputPorts {
    strobe: bool,
    shift_p1: u16,
    shift_p2: u16,
    auto_read_p1: u16,
    auto_read_p2: u16,
}

impl InputPorts {
    fn new() -> Self {
        Self { strobe: false, shift_p1: !0, shift_p2: !0, auto_read_p1: 0, auto_read_p2: 0 }
    }

    fn write_strobe(&mut self, value: bool, p1: JoypadState, p2: JoypadState) {
        if self.strobe && !value {
            // Falling edge latches current button state
            self.shift_p1 = p1.to_register_word();
            self.shift_p2 = p2.to_register_word();
        }
        self.strobe = value;
    }

    fn next_bit_p1(&mut self, p1: JoypadState) -> bool {
        if self.strobe {
            return p1.b;
        }
        let bit = self.shift_p1.bit(15);
        self.shift_p1 = (self.shift_p1 << 1) | 0x0001;
        bit
    }

    fn next_bit_p2(&mut self, p2: JoypadState) -> bool {
        if self.strobe {
            return p2.b;
        }
        let bit = self.shift_p2.bit(15);
        self.shift_p2 = (self.shift_p2 << 1) | 0x0001;
        bit
    }
}

/// Registers on the CPU die that are not part of the 65C816 itself: NMI
/// control, the hardware multiplier/divider, and the controller ports.
#[derive(Debug, Clone, Encode, Decode)]
pub struct CpuInternalRegisters {
    nmi_enabled: bool,
    nmi_pending: bool,
    vblank_nmi_flag: bool,
    vblank_flag: bool,
    auto_joypad_read_enabled: bool,
    hdma_enable: u8,
    multiply_operand_l: u8,
    multiply_operand_r: u8,
    multiply_product: u16,
    division_dividend: u16,
    division_divisor: u8,
    division_quotient: u16,
    input_ports: InputPorts,
    inputs: [JoypadState; 2],
}

impl CpuInternalRegisters {
    pub fn new() -> Self {
        Self {
            nmi_enabled: false,
            nmi_pending: false,
            vblank_nmi_flag: false,
            vblank_flag: false,
            auto_joypad_read_enabled: false,
            hdma_enable: 0,
            multiply_operand_l: 0xFF,
            multiply_operand_r: 0xFF,
            multiply_product: 0,
            division_dividend: 0xFFFF,
            division_divisor: 0xFF,
            division_quotient: 0,
            input_ports: InputPorts::new(),
            inputs: [JoypadState::default(); 2],
        }
    }

    /// Latest controller snapshot from the host input source.
    pub fn set_inputs(&mut self, p1: JoypadState, p2: JoypadState) {
        self.inputs = [p1, p2];
    }

    /// Called when the PPU crosses into V-Blank. The NMI flag latches
    /// unconditionally; the interrupt line only asserts if enabled.
    pub fn vblank_start(&mut self) {
        self.vblank_flag = true;
        self.vblank_nmi_flag = true;
        if self.nmi_enabled {
            self.nmi_pending = true;
        }

        if self.auto_joypad_read_enabled {
            self.input_ports.auto_read_p1 = self.inputs[0].to_register_word();
            self.input_ports.auto_read_p2 = self.inputs[1].to_register_word();
            // Auto read drains the manual shift registers
            self.input_ports.shift_p1 = !0;
            self.input_ports.shift_p2 = !0;
        }
    }

    /// Called when the PPU wraps to scanline 0.
    pub fn vblank_end(&mut self) {
        self.vblank_flag = false;
        self.vblank_nmi_flag = false;
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    pub fn acknowledge_nmi(&mut self) {
        self.nmi_pending = false;
    }

    pub fn read_register(&mut self, address: u32, open_bus: u8) -> Option<u8> {
        log::trace!("CPU I/O register read: {address:06X}");

        let value = match address & 0xFFFF {
            0x4016 => {
                // JOYA: manual controller port 1; bits 7-2 are open bus
                let p1 = self.inputs[0];
                u8::from(self.input_ports.next_bit_p1(p1)) | (open_bus & 0xFC)
            }
            0x4017 => {
                // JOYB: manual controller port 2; bits 2-4 always set
                let p2 = self.inputs[1];
                0x1C | u8::from(self.input_ports.next_bit_p2(p2)) | (open_bus & 0xE0)
            }
            0x4210 => {
                // RDNMI: latched NMI flag (cleared on read) + CPU version 2
                let nmi_flag = self.vblank_nmi_flag;
                self.vblank_nmi_flag = false;
                (u8::from(nmi_flag) << 7) | 0x02 | (open_bus & 0x70)
            }
            0x4212 => {
                // HVBJOY: V-Blank flag in bit 7
                (u8::from(self.vblank_flag) << 7) | (open_bus & 0x3E)
            }
            0x4214 => self.division_quotient as u8,
            0x4215 => (self.division_quotient >> 8) as u8,
            0x4216 => self.multiply_product as u8,
            0x4217 => (self.multiply_product >> 8) as u8,
            0x4218 => self.input_ports.auto_read_p1 as u8,
            0x4219 => (self.input_ports.auto_read_p1 >> 8) as u8,
            0x421A => self.input_ports.auto_read_p2 as u8,
            0x421B => (self.input_ports.auto_read_p2 >> 8) as u8,
            0x421C..=0x421F => {
                // Controllers 3/4 are not connected
                0x00
            }
            _ => return None,
        };

        Some(value)
    }

    pub fn write_register(&mut self, address: u32, value: u8) {
        log::trace!("CPU I/O register write: {address:06X} {value:02X}");

        match address & 0xFFFF {
            0x4016 => {
                let strobe = value.bit(0);
                self.input_ports.write_strobe(strobe, self.inputs[0], self.inputs[1]);
            }
            0x4200 => {
                // NMITIMEN: NMI enable and auto joypad read enable
                self.auto_joypad_read_enabled = value.bit(0);

                let nmi_enabled = value.bit(7);
                if !self.nmi_enabled && nmi_enabled && self.vblank_nmi_flag {
                    // Enabling NMIs mid-VBlank fires one immediately
                    self.nmi_pending = true;
                }
                self.nmi_enabled = nmi_enabled;
            }
            0x4202 => {
                // WRMPYA: multiplicand
                self.multiply_operand_l = value;
            }
            0x4203 => {
                // WRMPYB: multiplier; starts the multiply
                self.multiply_operand_r = value;
                self.multiply_product = u16::from(self.multiply_operand_l) * u16::from(value);
                // The multiplier also lands in the quotient register
                self.division_quotient = value.into();
            }
            0x4204 => {
                self.division_dividend = (self.division_dividend & 0xFF00) | u16::from(value);
            }
            0x4205 => {
                self.division_dividend =
                    (self.division_dividend & 0x00FF) | (u16::from(value) << 8);
            }
            0x4206 => {
                // WRDIVB: divisor; starts the division
                self.division_divisor = value;
                if value != 0 {
                    self.division_quotient = self.division_dividend / u16::from(value);
                    self.multiply_product = self.division_dividend % u16::from(value);
                } else {
                    // Divide by zero: quotient saturates, remainder = dividend
                    self.division_quotient = 0xFFFF;
                    self.multiply_product = self.division_dividend;
                }
            }
            0x420C => {
                // HDMAEN: accepted and stored; HBlank DMA is not executed
                if value != 0 {
                    log::debug!("HDMA enable written ({value:02X}); HDMA is not implemented");
                }
                self.hdma_enable = value;
            }
            _ => {
                // Unmapped or handled elsewhere (DMA registers, $420B)
            }
        }
    }

    pub fn reset(&mut self) {
        self.nmi_enabled = false;
        self.nmi_pending = false;
        self.vblank_nmi_flag = false;
        self.auto_joypad_read_enabled = false;
        self.hdma_enable = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rdnmi_read_clears_flag() {
        let mut registers = CpuInternalRegisters::new();
        registers.vblank_start();

        let first = registers.read_register(0x4210, 0).unwrap();
        assert_eq!(first & 0x80, 0x80);
        assert_eq!(first & 0x0F, 0x02);

        let second = registers.read_register(0x4210, 0).unwrap();
        assert_eq!(second & 0x80, 0x00);
    }

    #[test]
    fn nmi_line_asserts_only_when_enabled() {
        let mut registers = CpuInternalRegisters::new();
        registers.vblank_start();
        assert!(!registers.nmi_pending());

        // Enabling NMI while the flag is latched fires immediately
        registers.write_register(0x4200, 0x80);
        assert!(registers.nmi_pending());
    }

    #[test]
    fn multiply_and_divide() {
        let mut registers = CpuInternalRegisters::new();

        registers.write_register(0x4202, 12);
        registers.write_register(0x4203, 34);
        assert_eq!(registers.read_register(0x4216, 0).unwrap(), (408 & 0xFF) as u8);
        assert_eq!(registers.read_register(0x4217, 0).unwrap(), (408 >> 8) as u8);

        registers.write_register(0x4204, 0x39); // 1337 = $0539
        registers.write_register(0x4205, 0x05);
        registers.write_register(0x4206, 10);
        assert_eq!(registers.read_register(0x4214, 0).unwrap(), 133);
        assert_eq!(registers.read_register(0x4216, 0).unwrap(), 7);
    }

    #[test]
    fn divide_by_zero() {
        let mut registers = CpuInternalRegisters::new();
        registers.write_register(0x4204, 0x34);
        registers.write_register(0x4205, 0x12);
        registers.write_register(0x4206, 0);

        assert_eq!(registers.read_register(0x4214, 0).unwrap(), 0xFF);
        assert_eq!(registers.read_register(0x4215, 0).unwrap(), 0xFF);
        assert_eq!(registers.read_register(0x4216, 0).unwrap(), 0x34);
        assert_eq!(registers.read_register(0x4217, 0).unwrap(), 0x12);
    }

    #[test]
    fn manual_joypad_serial_read() {
        let mut registers = CpuInternalRegisters::new();
        let p1 = JoypadState { b: true, start: true, ..JoypadState::default() };
        registers.set_inputs(p1, JoypadState::default());

        // Strobe high then low to latch
        registers.write_register(0x4016, 0x01);
        registers.write_register(0x4016, 0x00);

        let mut bits = Vec::new();
        for _ in 0..16 {
            bits.push(registers.read_register(0x4016, 0).unwrap() & 0x01);
        }
        // Order: B, Y, Select, Start, Up, Down, Left, Right, A, X, L, R,
        // then four ID bits that read 0 on a standard pad
        assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        // A fully drained register reads 1
        for _ in 0..8 {
            assert_eq!(registers.read_register(0x4016, 0).unwrap() & 0x01, 1);
        }
    }
}
