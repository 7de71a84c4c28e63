//! PPU register file and the enums decoded from register writes

use bincode::{Decode, Encode};
use sfc_common::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitsPerPixel {
    Two,
    Four,
}

impl BitsPerPixel {
    pub const OBJ: Self = Self::Four;

    pub const fn tile_size_words(self) -> u16 {
        match self {
            Self::Two => 8,
            Self::Four => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum BgMode {
    #[default]
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
}

impl BgMode {
    fn from_byte(byte: u8) -> Self {
        match byte & 0x07 {
            0x00 => Self::Zero,
            0x01 => Self::One,
            0x02 => Self::Two,
            0x03 => Self::Three,
            0x04 => Self::Four,
            0x05 => Self::Five,
            0x06 => Self::Six,
            0x07 => Self::Seven,
            _ => unreachable!("value & 0x07 is always <= 0x07"),
        }
    }

    /// Modes 0 and 1 render; the rest fall back to the backdrop color.
    pub fn is_rendered(self) -> bool {
        matches!(self, Self::Zero | Self::One)
    }

    pub fn bg_enabled(self, bg: usize) -> bool {
        match self {
            Self::Zero => bg < 4,
            Self::One => bg < 3,
            _ => false,
        }
    }

    pub fn bg_bpp(self, bg: usize) -> BitsPerPixel {
        match (self, bg) {
            (Self::One, 0 | 1) => BitsPerPixel::Four,
            _ => BitsPerPixel::Two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum TileSize {
    // 8x8
    #[default]
    Small,
    // 16x16
    Large,
}

impl TileSize {
    fn from_bit(bit: bool) -> Self {
        if bit { Self::Large } else { Self::Small }
    }

    pub fn pixels(self) -> u16 {
        match self {
            Self::Small => 8,
            Self::Large => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum ScreenSize {
    #[default]
    OneScreen,
    VerticalMirror,
    HorizontalMirror,
    FourScreen,
}

impl ScreenSize {
    fn from_byte(byte: u8) -> Self {
        match byte & 0x03 {
            0x00 => Self::OneScreen,
            0x01 => Self::VerticalMirror,
            0x02 => Self::HorizontalMirror,
            0x03 => Self::FourScreen,
            _ => unreachable!("value & 0x03 is always <= 0x03"),
        }
    }

    pub fn width_tiles(self) -> u16 {
        match self {
            Self::OneScreen | Self::HorizontalMirror => 32,
            Self::VerticalMirror | Self::FourScreen => 64,
        }
    }

    pub fn height_tiles(self) -> u16 {
        match self {
            Self::OneScreen | Self::VerticalMirror => 32,
            Self::HorizontalMirror | Self::FourScreen => 64,
        }
    }
}

/// OBSEL sprite size pairs; each sprite picks small or large through its
/// high-table size bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum ObjSizeSelect {
    #[default]
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
}

impl ObjSizeSelect {
    fn from_byte(byte: u8) -> Self {
        match byte & 0xE0 {
            0x00 => Self::Zero,
            0x20 => Self::One,
            0x40 => Self::Two,
            0x60 => Self::Three,
            0x80 => Self::Four,
            0xA0 => Self::Five,
            0xC0 => Self::Six,
            0xE0 => Self::Seven,
            _ => unreachable!("value & 0xE0 is always one of the above values"),
        }
    }

    pub fn small_size(self) -> (u16, u16) {
        match self {
            Self::Zero | Self::One | Self::Two => (8, 8),
            Self::Three | Self::Four => (16, 16),
            Self::Five => (32, 32),
            Self::Six | Self::Seven => (16, 32),
        }
    }

    pub fn large_size(self) -> (u16, u16) {
        match self {
            Self::Zero => (16, 16),
            Self::One | Self::Three | Self::Seven => (32, 32),
            Self::Two | Self::Four | Self::Five => (64, 64),
            Self::Six => (32, 64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VramIncrementMode {
    #[default]
    AfterLow,
    AfterHigh,
}

impl VramIncrementMode {
    fn from_byte(byte: u8) -> Self {
        if byte.bit(7) { Self::AfterHigh } else { Self::AfterLow }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum AccessFlipflop {
    #[default]
    First,
    Second,
}

impl AccessFlipflop {
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Registers {
    // INIDISP
    pub forced_blanking: bool,
    pub brightness: u8,
    // OBSEL
    pub obj_tile_base: u16,
    pub obj_tile_gap: u16,
    pub obj_size_select: ObjSizeSelect,
    // OAMADDL/OAMADDH
    pub oam_address: u16,
    pub oam_write_latch: u8,
    // BGMODE
    pub bg_mode: BgMode,
    pub bg3_high_priority: bool,
    pub bg_tile_size: [TileSize; 4],
    // BG1SC-BG4SC
    pub bg_map_base: [u16; 4],
    pub bg_screen_size: [ScreenSize; 4],
    // BG12NBA/BG34NBA
    pub bg_tile_base: [u16; 4],
    // BG1HOFS-BG4VOFS: one shared latch per axis, written twice
    pub bg_h_scroll: [u16; 4],
    pub bg_v_scroll: [u16; 4],
    pub h_scroll_latch: u8,
    pub v_scroll_latch: u8,
    // VMAIN/VMADD
    pub vram_address: u16,
    pub vram_increment_step: u16,
    pub vram_increment_mode: VramIncrementMode,
    pub vram_prefetch: u16,
    // CGADD
    pub cgram_address: u8,
    pub cgram_flipflop: AccessFlipflop,
    pub cgram_write_latch: u8,
    // TM/TS
    pub main_bg_enabled: [bool; 4],
    pub main_obj_enabled: bool,
    pub sub_bg_enabled: [bool; 4],
    pub sub_obj_enabled: bool,
    // Registers accepted and stored with no rendered effect (windows,
    // color math, mosaic, Mode 7)
    pub stored: [u8; 0x40],
    warned_stored: u64,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            // Power-on: forced blank asserted, brightness zero
            forced_blanking: true,
            brightness: 0,
            obj_tile_base: 0,
            obj_tile_gap: 0,
            obj_size_select: ObjSizeSelect::default(),
            oam_address: 0,
            oam_write_latch: 0,
            bg_mode: BgMode::default(),
            bg3_high_priority: false,
            bg_tile_size: [TileSize::default(); 4],
            bg_map_base: [0; 4],
            bg_screen_size: [ScreenSize::default(); 4],
            bg_tile_base: [0; 4],
            bg_h_scroll: [0; 4],
            bg_v_scroll: [0; 4],
            h_scroll_latch: 0,
            v_scroll_latch: 0,
            vram_address: 0,
            vram_increment_step: 1,
            vram_increment_mode: VramIncrementMode::default(),
            vram_prefetch: 0,
            cgram_address: 0,
            cgram_flipflop: AccessFlipflop::default(),
            cgram_write_latch: 0,
            main_bg_enabled: [false; 4],
            main_obj_enabled: false,
            sub_bg_enabled: [false; 4],
            sub_obj_enabled: false,
            stored: [0; 0x40],
            warned_stored: 0,
        }
    }

    pub fn write_inidisp(&mut self, value: u8) {
        self.forced_blanking = value.bit(7);
        self.brightness = value & 0x0F;

        log::trace!(
            "INIDISP: forced blank {}, brightness {}",
            self.forced_blanking,
            self.brightness
        );
    }

    pub fn write_obsel(&mut self, value: u8) {
        // Name base in 8K-word steps, gap between the two tile tables in
        // 4K-word steps
        self.obj_tile_base = u16::from(value & 0x07) << 13;
        self.obj_tile_gap = (u16::from(value >> 3) & 0x03) << 12;
        self.obj_size_select = ObjSizeSelect::from_byte(value);

        log::trace!("OBSEL: tile base {:04X}, size select {:?}", self.obj_tile_base, self.obj_size_select);
    }

    pub fn write_oamaddl(&mut self, value: u8) {
        self.oam_address = (self.oam_address & 0x0200) | (u16::from(value) << 1);
    }

    pub fn write_oamaddh(&mut self, value: u8) {
        self.oam_address =
            (u16::from(value & 0x01) << 9) | (self.oam_address & 0x01FF);
    }

    pub fn write_bgmode(&mut self, value: u8) {
        self.bg_mode = BgMode::from_byte(value);
        self.bg3_high_priority = value.bit(3);
        for bg in 0..4 {
            self.bg_tile_size[bg] = TileSize::from_bit(value.bit(4 + bg as u8));
        }

        if !self.bg_mode.is_rendered() {
            log::debug!("BG mode {:?} selected; rendered as backdrop only", self.bg_mode);
        }
    }

    pub fn write_bg_sc(&mut self, bg: usize, value: u8) {
        // Tilemap base in 1K-word steps
        self.bg_map_base[bg] = u16::from(value & 0xFC) << 8;
        self.bg_screen_size[bg] = ScreenSize::from_byte(value);
    }

    /// BG12NBA/BG34NBA pack two 4K-word tile bases per register.
    pub fn write_bg_nba(&mut self, first_bg: usize, value: u8) {
        self.bg_tile_base[first_bg] = u16::from(value & 0x0F) << 12;
        self.bg_tile_base[first_bg + 1] = u16::from(value >> 4) << 12;
    }

    pub fn write_bg_h_scroll(&mut self, bg: usize, value: u8) {
        // Write-twice: the previous byte becomes the low half
        self.bg_h_scroll[bg] = u16::from(self.h_scroll_latch) | (u16::from(value) << 8);
        self.h_scroll_latch = value;
    }

    pub fn write_bg_v_scroll(&mut self, bg: usize, value: u8) {
        self.bg_v_scroll[bg] = u16::from(self.v_scroll_latch) | (u16::from(value) << 8);
        self.v_scroll_latch = value;
    }

    pub fn write_vmain(&mut self, value: u8) {
        self.vram_increment_mode = VramIncrementMode::from_byte(value);
        self.vram_increment_step = match value & 0x03 {
            0x00 => 1,
            0x01 => 32,
            0x02 | 0x03 => 128,
            _ => unreachable!("value & 0x03 is always <= 0x03"),
        };
    }

    pub fn write_tm(&mut self, value: u8) {
        for bg in 0..4 {
            self.main_bg_enabled[bg] = value.bit(bg as u8);
        }
        self.main_obj_enabled = value.bit(4);
    }

    pub fn write_ts(&mut self, value: u8) {
        for bg in 0..4 {
            self.sub_bg_enabled[bg] = value.bit(bg as u8);
        }
        self.sub_obj_enabled = value.bit(4);
    }

    /// Catch-all for registers the core accepts but does not render
    /// (windowing, color math, mosaic, Mode 7 matrix).
    pub fn write_stored(&mut self, address: u32, value: u8) {
        let index = (address & 0x3F) as usize;
        self.stored[index] = value;

        if self.warned_stored & (1 << index) == 0 {
            self.warned_stored |= 1 << index;
            log::debug!("PPU register {address:04X} stored with no rendered effect");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_write_twice_latch() {
        let mut registers = Registers::new();

        registers.write_bg_h_scroll(0, 0x34);
        registers.write_bg_h_scroll(0, 0x01);
        assert_eq!(registers.bg_h_scroll[0], 0x0134);

        // The latch is shared across backgrounds
        registers.write_bg_h_scroll(1, 0xFF);
        assert_eq!(registers.bg_h_scroll[1] & 0x00FF, 0x01);
    }

    #[test]
    fn bg_sc_unpacks_base_and_size() {
        let mut registers = Registers::new();
        registers.write_bg_sc(0, 0x7D);

        assert_eq!(registers.bg_map_base[0], 0x7C00);
        assert_eq!(registers.bg_screen_size[0], ScreenSize::VerticalMirror);
    }

    #[test]
    fn bg_nba_packs_two_bases() {
        let mut registers = Registers::new();
        registers.write_bg_nba(0, 0x31);

        assert_eq!(registers.bg_tile_base[0], 0x1000);
        assert_eq!(registers.bg_tile_base[1], 0x3000);
    }

    #[test]
    fn vmain_increment_steps() {
        let mut registers = Registers::new();

        registers.write_vmain(0x00);
        assert_eq!(registers.vram_increment_step, 1);
        assert_eq!(registers.vram_increment_mode, VramIncrementMode::AfterLow);

        registers.write_vmain(0x81);
        assert_eq!(registers.vram_increment_step, 32);
        assert_eq!(registers.vram_increment_mode, VramIncrementMode::AfterHigh);

        registers.write_vmain(0x02);
        assert_eq!(registers.vram_increment_step, 128);
    }
}
