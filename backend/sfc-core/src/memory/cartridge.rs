//! Cartridge image loading and address mapping
//!
//! Mapping detection follows a deterministic order: a checksum-validated
//! HiROM header wins, then checksum-validated LoROM, then checksum-validated
//! ExHiROM, then whatever the header's map byte claims, and finally LoROM as
//! the fallback of last resort.

use crate::api::{LoadError, LoadResult};
use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use crc::Crc;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

const LOROM_HEADER_ADDR: usize = 0x007FC0;
const HIROM_HEADER_ADDR: usize = 0x00FFC0;
const EXHIROM_HEADER_ADDR: usize = 0x40FFC0;

const HEADER_TITLE_LEN: usize = 21;
const HEADER_MAP_OFFSET: usize = 0x15;
const HEADER_RAM_SIZE_OFFSET: usize = 0x18;
const HEADER_COMPLEMENT_OFFSET: usize = 0x1C;
const HEADER_CHECKSUM_OFFSET: usize = 0x1E;

const SRAM_MAX_LEN: usize = 128 * 1024;

const CRC32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// ROM bytes, excluded from state serialization: a snapshot of emulation
/// state never needs to carry the (immutable) cartridge image along.
#[derive(Debug, Clone, Default)]
pub struct Rom(pub Box<[u8]>);

impl Deref for Rom {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Encode for Rom {
    fn encode<E: Encoder>(&self, _encoder: &mut E) -> Result<(), EncodeError> {
        Ok(())
    }
}

impl<Context> Decode<Context> for Rom {
    fn decode<D: Decoder<Context = Context>>(_decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Self::default())
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for Rom {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        _decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Ok(Self::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Mapper {
    LoRom,
    HiRom,
    ExLoRom,
    ExHiRom,
}

impl Display for Mapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoRom => write!(f, "LoROM"),
            Self::HiRom => write!(f, "HiROM"),
            Self::ExLoRom => write!(f, "ExLoROM"),
            Self::ExHiRom => write!(f, "ExHiROM"),
        }
    }
}

impl Mapper {
    fn header_addr(self) -> usize {
        match self {
            Self::LoRom | Self::ExLoRom => LOROM_HEADER_ADDR,
            Self::HiRom => HIROM_HEADER_ADDR,
            Self::ExHiRom => EXHIROM_HEADER_ADDR,
        }
    }

    /// Project a 24-bit bus address onto a ROM offset, or None for
    /// addresses the mapping does not cover.
    fn rom_offset(self, address: u32) -> Option<u32> {
        let bank = address >> 16;
        let offset = address & 0xFFFF;

        match self {
            Self::LoRom => {
                // ROM appears in the upper half of every bank
                (offset >= 0x8000).then(|| ((bank & 0x7F) * 0x8000) + (offset - 0x8000))
            }
            Self::ExLoRom => {
                // Second 4MB image half appears in the banks with A23 clear
                (offset >= 0x8000).then(|| {
                    let base = ((bank & 0x7F) * 0x8000) + (offset - 0x8000);
                    if bank & 0x80 == 0 { base + 0x40_0000 } else { base }
                })
            }
            Self::HiRom => {
                if offset >= 0x8000 || matches!(bank & 0x7F, 0x40..=0x7F) {
                    Some(((bank & 0x3F) * 0x1_0000) + offset)
                } else {
                    None
                }
            }
            Self::ExHiRom => {
                if offset >= 0x8000 || matches!(bank & 0x7F, 0x40..=0x7F) {
                    let base = ((bank & 0x3F) * 0x1_0000) + offset;
                    Some(if bank & 0x80 == 0 { base + 0x40_0000 } else { base })
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Cartridge {
    rom: Rom,
    sram: Box<[u8]>,
    mapper: Mapper,
}

impl Cartridge {
    pub fn create(rom: Vec<u8>, initial_sram: Option<Vec<u8>>) -> LoadResult<Self> {
        // Strip the 512-byte copier header some dump formats prepend
        let rom = if rom.len() % 1024 == 512 {
            log::debug!("Stripping 512-byte copier header");
            rom[512..].to_vec()
        } else {
            rom
        };

        if rom.len() < 0x8000 {
            return Err(LoadError::NoHeader { len: rom.len() });
        }

        let rom = rom.into_boxed_slice();
        let mapper = detect_mapper(&rom);

        let header_addr = mapper.header_addr().min(rom.len() - 0x40);
        let sram_size_byte = rom[header_addr + HEADER_RAM_SIZE_OFFSET];
        let sram_len = match sram_size_byte {
            0 => 0,
            n => (1_usize << (10 + u32::from(n))).min(SRAM_MAX_LEN),
        };

        let sram = match initial_sram {
            Some(sram) if sram.len() == sram_len => sram.into_boxed_slice(),
            _ => vec![0; sram_len].into_boxed_slice(),
        };

        log::info!(
            "Loaded {} cartridge '{}', {} bytes ROM (CRC32 {:08X}), {} bytes SRAM",
            mapper,
            parse_title(&rom, header_addr),
            rom.len(),
            CRC32.checksum(&rom),
            sram_len
        );

        Ok(Self { rom: Rom(rom), sram, mapper })
    }

    pub fn read(&self, address: u32) -> Option<u8> {
        if !self.sram.is_empty() {
            if let Some(sram_addr) = sram_window_offset(address) {
                return Some(self.sram[sram_addr & (self.sram.len() - 1)]);
            }
        }

        let rom_offset = self.mapper.rom_offset(address)?;
        Some(self.rom[(rom_offset as usize) % self.rom.len()])
    }

    pub fn write(&mut self, address: u32, value: u8) {
        if self.sram.is_empty() {
            // ROM writes drop silently
            return;
        }

        if let Some(sram_addr) = sram_window_offset(address) {
            let sram_len = self.sram.len();
            self.sram[sram_addr & (sram_len - 1)] = value;
        }
    }

    pub fn title(&self) -> String {
        let header_addr = self.mapper.header_addr().min(self.rom.len() - 0x40);
        parse_title(&self.rom, header_addr)
    }

    pub fn sram(&self) -> Option<&[u8]> {
        (!self.sram.is_empty()).then_some(&*self.sram)
    }
}

/// Battery RAM occupies $6000-$7FFF in banks $70-$7F and $F0-$FF,
/// regardless of mapper: 8KB pages indexed by the low nibble of the bank.
fn sram_window_offset(address: u32) -> Option<usize> {
    let bank = (address >> 16) & 0xFF;
    let offset = address & 0xFFFF;

    match (bank, offset) {
        (0x70..=0x7F | 0xF0..=0xFF, 0x6000..=0x7FFF) => {
            Some(((bank & 0x0F) * 0x2000 + (offset - 0x6000)) as usize)
        }
        _ => None,
    }
}

fn parse_title(rom: &[u8], header_addr: usize) -> String {
    rom[header_addr..header_addr + HEADER_TITLE_LEN]
        .iter()
        .filter(|byte| byte.is_ascii() && !byte.is_ascii_control())
        .map(|&byte| byte as char)
        .collect::<String>()
        .trim_end()
        .into()
}

/// A header is checksum-valid when the checksum and complement words are
/// exact complements (and not both zero, which blank ROM regions produce).
fn header_checksum_valid(rom: &[u8], header_addr: usize) -> bool {
    if header_addr + 0x20 > rom.len() {
        return false;
    }

    let complement = u16::from_le_bytes([
        rom[header_addr + HEADER_COMPLEMENT_OFFSET],
        rom[header_addr + HEADER_COMPLEMENT_OFFSET + 1],
    ]);
    let checksum = u16::from_le_bytes([
        rom[header_addr + HEADER_CHECKSUM_OFFSET],
        rom[header_addr + HEADER_CHECKSUM_OFFSET + 1],
    ]);

    checksum != 0 && checksum ^ complement == 0xFFFF
}

fn detect_mapper(rom: &[u8]) -> Mapper {
    if header_checksum_valid(rom, HIROM_HEADER_ADDR) {
        return Mapper::HiRom;
    }
    if header_checksum_valid(rom, LOROM_HEADER_ADDR) {
        // A LoROM image larger than 4MB is the extended variant
        return if rom.len() > 0x40_0000 { Mapper::ExLoRom } else { Mapper::LoRom };
    }
    if header_checksum_valid(rom, EXHIROM_HEADER_ADDR) {
        return Mapper::ExHiRom;
    }

    // No checksum validated; fall back to the map byte in the LoROM header
    // position, which exists on every image large enough to load
    let map_byte = rom[LOROM_HEADER_ADDR + HEADER_MAP_OFFSET];
    match map_byte & 0x0F {
        0x00 => Mapper::LoRom,
        0x01 => Mapper::HiRom,
        0x05 => Mapper::ExHiRom,
        _ => {
            log::error!(
                "Could not determine mapping from header (map byte {map_byte:02X}); \
                 defaulting to LoROM"
            );
            Mapper::LoRom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_header(len: usize, header_addr: usize, map_byte: u8) -> Vec<u8> {
        let mut rom = vec![0; len];
        rom[header_addr + HEADER_MAP_OFFSET] = map_byte;
        // Valid checksum/complement pair
        rom[header_addr + HEADER_CHECKSUM_OFFSET] = 0x34;
        rom[header_addr + HEADER_CHECKSUM_OFFSET + 1] = 0x12;
        rom[header_addr + HEADER_COMPLEMENT_OFFSET] = !0x34;
        rom[header_addr + HEADER_COMPLEMENT_OFFSET + 1] = !0x12;
        rom
    }

    #[test]
    fn detects_lorom_from_checksum() {
        let rom = rom_with_header(0x10000, LOROM_HEADER_ADDR, 0x20);
        let cartridge = Cartridge::create(rom, None).unwrap();
        assert_eq!(cartridge.mapper, Mapper::LoRom);
    }

    #[test]
    fn detects_hirom_from_checksum() {
        let rom = rom_with_header(0x20000, HIROM_HEADER_ADDR, 0x21);
        let cartridge = Cartridge::create(rom, None).unwrap();
        assert_eq!(cartridge.mapper, Mapper::HiRom);
    }

    #[test]
    fn hirom_checksum_wins_over_lorom() {
        let mut rom = rom_with_header(0x20000, HIROM_HEADER_ADDR, 0x21);
        let lorom = rom_with_header(0x20000, LOROM_HEADER_ADDR, 0x20);
        rom[LOROM_HEADER_ADDR..LOROM_HEADER_ADDR + 0x20]
            .copy_from_slice(&lorom[LOROM_HEADER_ADDR..LOROM_HEADER_ADDR + 0x20]);

        let cartridge = Cartridge::create(rom, None).unwrap();
        assert_eq!(cartridge.mapper, Mapper::HiRom);
    }

    #[test]
    fn falls_back_to_map_byte() {
        let mut rom = vec![0; 0x20000];
        rom[LOROM_HEADER_ADDR + HEADER_MAP_OFFSET] = 0x01;
        let cartridge = Cartridge::create(rom, None).unwrap();
        assert_eq!(cartridge.mapper, Mapper::HiRom);
    }

    #[test]
    fn strips_copier_header() {
        let mut rom = vec![0; 0x10000 + 512];
        // Marker byte after the copier header
        rom[512] = 0xAB;
        rom[512 + LOROM_HEADER_ADDR + HEADER_MAP_OFFSET] = 0x20;

        let cartridge = Cartridge::create(rom, None).unwrap();
        assert_eq!(cartridge.rom[0], 0xAB);
        assert_eq!(cartridge.rom.len(), 0x10000);
    }

    #[test]
    fn rejects_tiny_image() {
        assert!(matches!(
            Cartridge::create(vec![0; 0x1000], None),
            Err(LoadError::NoHeader { .. })
        ));
    }

    #[test]
    fn lorom_mapping_formula() {
        let mut rom = rom_with_header(0x20000, LOROM_HEADER_ADDR, 0x20);
        rom[0x0000] = 0x11; // bank $00, $8000
        rom[0x8000] = 0x22; // bank $01, $8000
        let cartridge = Cartridge::create(rom, None).unwrap();

        assert_eq!(cartridge.read(0x00_8000), Some(0x11));
        assert_eq!(cartridge.read(0x01_8000), Some(0x22));
        // Mirror in the upper banks
        assert_eq!(cartridge.read(0x80_8000), Some(0x11));
        // Lower half of the bank is unmapped
        assert_eq!(cartridge.read(0x00_2000), None);
    }

    #[test]
    fn hirom_mapping_formula() {
        let mut rom = rom_with_header(0x20000, HIROM_HEADER_ADDR, 0x21);
        rom[0x01234] = 0x5A;
        let cartridge = Cartridge::create(rom, None).unwrap();

        // Bank $40 exposes a full 64KB window
        assert_eq!(cartridge.read(0x40_1234), Some(0x5A));
        assert_eq!(cartridge.read(0xC0_1234), Some(0x5A));
        // The lower half of the system banks is not ROM
        assert_eq!(cartridge.read(0x00_1234), None);
    }

    #[test]
    fn exlorom_mapping_formula() {
        let mut rom = rom_with_header(0x41_0000, LOROM_HEADER_ADDR, 0x20);
        rom[0x00_0000] = 0x11;
        rom[0x40_0000] = 0x22;
        let cartridge = Cartridge::create(rom, None).unwrap();
        assert_eq!(cartridge.mapper, Mapper::ExLoRom);

        // Banks with A23 set map the first 4MB image half
        assert_eq!(cartridge.read(0x80_8000), Some(0x11));
        // Banks with A23 clear map the second half
        assert_eq!(cartridge.read(0x00_8000), Some(0x22));
    }

    #[test]
    fn exhirom_mapping_formula() {
        let mut rom = rom_with_header(0x41_0000, EXHIROM_HEADER_ADDR, 0x25);
        rom[0x00_1234] = 0x33;
        rom[0x40_1234] = 0x44;
        let cartridge = Cartridge::create(rom, None).unwrap();
        assert_eq!(cartridge.mapper, Mapper::ExHiRom);

        // Banks with A23 set map the first 4MB image half
        assert_eq!(cartridge.read(0xC0_1234), Some(0x33));
        // Banks with A23 clear map the second half
        assert_eq!(cartridge.read(0x40_1234), Some(0x44));
    }

    #[test]
    fn sram_window_location() {
        let mut rom = rom_with_header(0x10000, LOROM_HEADER_ADDR, 0x20);
        rom[LOROM_HEADER_ADDR + HEADER_RAM_SIZE_OFFSET] = 0x03; // 8KB
        let mut cartridge = Cartridge::create(rom, None).unwrap();

        cartridge.write(0x70_6123, 0x99);
        assert_eq!(cartridge.read(0x70_6123), Some(0x99));
        // The $Fx banks mirror the same pages
        assert_eq!(cartridge.read(0xF0_6123), Some(0x99));
        assert_eq!(cartridge.sram().unwrap().len(), 8 * 1024);

        // Below $6000 the bank is unmapped, not SRAM
        cartridge.write(0x70_0123, 0x42);
        assert_eq!(cartridge.read(0x70_0123), None);
    }

    #[test]
    fn sram_window_is_mapper_independent() {
        let mut rom = rom_with_header(0x20000, HIROM_HEADER_ADDR, 0x21);
        rom[HIROM_HEADER_ADDR + HEADER_RAM_SIZE_OFFSET] = 0x03; // 8KB
        let mut cartridge = Cartridge::create(rom, None).unwrap();

        // HiROM carts use the same $70-$7F/$F0-$FF window; SRAM shadows
        // the ROM bytes those banks would otherwise map
        cartridge.write(0x70_6000, 0x5A);
        assert_eq!(cartridge.read(0x70_6000), Some(0x5A));

        // No SRAM in the system banks
        cartridge.write(0x20_6000, 0x42);
        assert_eq!(cartridge.read(0x20_6000), None);
    }
}
