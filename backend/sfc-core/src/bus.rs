//! The 24-bit address bus: routes every CPU access to WRAM, the cartridge,
//! PPU/APU ports, CPU I/O, or DMA registers.
//!
//! Reads never fail; addresses that map to nothing return the last value
//! seen on the bus (open bus). Writes to ROM drop silently inside the
//! cartridge.

use crate::apu::Apu;
use crate::memory::dma::{self, DmaUnit};
use crate::memory::{CpuInternalRegisters, Memory};
use crate::ppu::Ppu;
use c65816::traits::BusInterface;

pub struct Bus<'a> {
    pub memory: &'a mut Memory,
    pub cpu_registers: &'a mut CpuInternalRegisters,
    pub ppu: &'a mut Ppu,
    pub apu: &'a mut Apu,
    pub dma: &'a mut DmaUnit,
}

impl Bus<'_> {
    /// System area: the lower half of banks $00-$3F and $80-$BF.
    fn read_system_area(&mut self, address: u32) -> u8 {
        let open_bus = self.memory.open_bus();
        let offset = address & 0x7FFF;

        match offset {
            0x0000..=0x1FFF => {
                // Low WRAM mirror
                self.memory.read_wram(offset)
            }
            0x2140..=0x217F => {
                // APU mailbox ports, mirrored through $217F
                self.apu.read_port(offset)
            }
            0x2180 => self.memory.read_wram_port(),
            0x2100..=0x21FF => {
                // PPU ports
                self.ppu.read_port(offset).unwrap_or(open_bus)
            }
            0x4300..=0x437F => self.dma.read_register(offset).unwrap_or(open_bus),
            0x4000..=0x42FF | 0x4380..=0x5FFF => self
                .cpu_registers
                .read_register(offset, open_bus)
                .or_else(|| self.memory.read_cartridge(address))
                .unwrap_or(open_bus),
            0x2000..=0x20FF | 0x2200..=0x3FFF | 0x6000..=0x7FFF => {
                // Cartridge expansion regions; open bus when nothing answers
                self.memory.read_cartridge(address).unwrap_or(open_bus)
            }
            _ => unreachable!("address & 0x7FFF is always <= 0x7FFF"),
        }
    }

    fn write_system_area(&mut self, address: u32, value: u8) {
        let offset = address & 0x7FFF;

        match offset {
            0x0000..=0x1FFF => self.memory.write_wram(offset, value),
            0x2140..=0x217F => self.apu.write_port(offset, value),
            0x2180 => self.memory.write_wram_port(value),
            0x2181 => self.memory.write_wram_port_address_low(value),
            0x2182 => self.memory.write_wram_port_address_mid(value),
            0x2183 => self.memory.write_wram_port_address_high(value),
            0x2100..=0x213F => self.ppu.write_port(offset, value),
            0x2184..=0x21FF => {
                // Open bus in address bus B
            }
            0x420B => {
                // MDMAEN: run the selected general purpose DMA channels to
                // completion inside this write
                dma::run_gpdma(self, value);
            }
            0x4300..=0x437F => self.dma.write_register(offset, value),
            0x4000..=0x42FF | 0x4380..=0x5FFF => self.cpu_registers.write_register(offset, value),
            0x2200..=0x3FFF | 0x6000..=0x7FFF => self.memory.write_cartridge(address, value),
            0x2000..=0x20FF => {
                // Open bus
            }
            _ => unreachable!("address & 0x7FFF is always <= 0x7FFF"),
        }
    }
}

impl BusInterface for Bus<'_> {
    #[inline]
    fn read(&mut self, address: u32) -> u8 {
        let address = address & 0xFFFFFF;
        let bank = (address >> 16) as u8;
        let offset = address as u16;

        let value = match (bank, offset) {
            (0x7E..=0x7F, _) => self.memory.read_wram(address - 0x7E_0000),
            (0x00..=0x3F | 0x80..=0xBF, 0x0000..=0x7FFF) => self.read_system_area(address),
            _ => {
                // Everything else belongs to the cartridge mapping
                self.memory.read_cartridge(address).unwrap_or(self.memory.open_bus())
            }
        };

        self.memory.set_open_bus(value);
        value
    }

    #[inline]
    fn write(&mut self, address: u32, value: u8) {
        let address = address & 0xFFFFFF;
        let bank = (address >> 16) as u8;
        let offset = address as u16;

        match (bank, offset) {
            (0x7E..=0x7F, _) => self.memory.write_wram(address - 0x7E_0000, value),
            (0x00..=0x3F | 0x80..=0xBF, 0x0000..=0x7FFF) => {
                self.write_system_area(address, value);
            }
            _ => self.memory.write_cartridge(address, value),
        }
    }

    #[inline]
    fn nmi_pending(&self) -> bool {
        self.cpu_registers.nmi_pending()
    }

    #[inline]
    fn acknowledge_nmi(&mut self) {
        self.cpu_registers.acknowledge_nmi();
    }

    #[inline]
    fn irq_pending(&self) -> bool {
        // H/V timer IRQs are not generated by this core
        false
    }
}
