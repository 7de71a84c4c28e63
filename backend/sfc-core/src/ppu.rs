//! Picture processing unit
//!
//! Scanline-based renderer driven at dot granularity: 262 scanlines of 341
//! dots per frame, lines 0-223 visible, V-Blank from line 225. Each visible
//! line is composited into the frame buffer at the line's first dot, so
//! mid-frame register writes affect the lines that follow them.

mod registers;

use crate::ppu::registers::{
    AccessFlipflop, BgMode, BitsPerPixel, Registers, VramIncrementMode,
};
use bincode::{Decode, Encode};
use sfc_common::frontend::{Color, FrameSize};
use sfc_common::num::{GetBit, U16Ext};

const DOTS_PER_LINE: u16 = 341;
const SCANLINES_PER_FRAME: u16 = 262;
const VISIBLE_LINES: u16 = 224;
const VBLANK_START_LINE: u16 = 225;

pub const FRAME_WIDTH: u32 = 256;
pub const FRAME_HEIGHT: u32 = 224;
const FRAME_BUFFER_LEN: usize = (FRAME_WIDTH * FRAME_HEIGHT) as usize;

const VRAM_LEN_WORDS: usize = 32 * 1024;
const CGRAM_LEN_WORDS: usize = 256;
const OAM_LEN: usize = 544;
const OAM_HIGH_TABLE_ADDR: usize = 512;

const SPRITES: usize = 128;
const MAX_SPRITES_PER_LINE: usize = 32;

type Vram = [u16; VRAM_LEN_WORDS];
type Cgram = [u16; CGRAM_LEN_WORDS];
type Oam = [u8; OAM_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuTickEffect {
    None,
    /// Crossed into scanline 225; the NMI flag should latch now.
    EnteredVblank,
    /// Wrapped from scanline 261 back to 0; the frame buffer holds a
    /// complete, consistent frame.
    FrameComplete,
}

/// Layer identifiers in front-to-back compositing order per BG mode.
#[derive(Debug, Clone, Copy)]
enum Layer {
    Obj(u8),
    Bg { bg: usize, high_priority: bool },
}

const MODE_0_ORDER: &[Layer] = &[
    Layer::Obj(3),
    Layer::Bg { bg: 0, high_priority: true },
    Layer::Bg { bg: 1, high_priority: true },
    Layer::Obj(2),
    Layer::Bg { bg: 0, high_priority: false },
    Layer::Bg { bg: 1, high_priority: false },
    Layer::Obj(1),
    Layer::Bg { bg: 2, high_priority: true },
    Layer::Bg { bg: 3, high_priority: true },
    Layer::Obj(0),
    Layer::Bg { bg: 2, high_priority: false },
    Layer::Bg { bg: 3, high_priority: false },
];

const MODE_1_ORDER: &[Layer] = &[
    Layer::Obj(3),
    Layer::Bg { bg: 0, high_priority: true },
    Layer::Bg { bg: 1, high_priority: true },
    Layer::Obj(2),
    Layer::Bg { bg: 0, high_priority: false },
    Layer::Bg { bg: 1, high_priority: false },
    Layer::Obj(1),
    Layer::Bg { bg: 2, high_priority: true },
    Layer::Obj(0),
    Layer::Bg { bg: 2, high_priority: false },
];

/// Mode 1 with the BGMODE priority bit set hoists high-priority BG3 tiles
/// in front of everything (the classic HUD arrangement).
const MODE_1_ORDER_BG3_PRIORITY: &[Layer] = &[
    Layer::Bg { bg: 2, high_priority: true },
    Layer::Obj(3),
    Layer::Bg { bg: 0, high_priority: true },
    Layer::Bg { bg: 1, high_priority: true },
    Layer::Obj(2),
    Layer::Bg { bg: 0, high_priority: false },
    Layer::Bg { bg: 1, high_priority: false },
    Layer::Obj(1),
    Layer::Obj(0),
    Layer::Bg { bg: 2, high_priority: false },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
struct BgPixel {
    color: u8,
    cgram_index: u8,
    high_priority: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
struct SpritePixel {
    color: u8,
    palette: u8,
    priority: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
struct SpriteLineBuffer {
    pixels: [SpritePixel; FRAME_WIDTH as usize],
}

impl SpriteLineBuffer {
    fn new() -> Self {
        Self { pixels: [SpritePixel::default(); FRAME_WIDTH as usize] }
    }

    fn clear(&mut self) {
        self.pixels.fill(SpritePixel::default());
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ppu {
    registers: Registers,
    vram: Box<Vram>,
    cgram: Box<Cgram>,
    oam: Box<Oam>,
    scanline: u16,
    dot: u16,
    frame_buffer: Box<[Color; FRAME_BUFFER_LEN]>,
    sprite_line: SpriteLineBuffer,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            registers: Registers::new(),
            vram: vec![0; VRAM_LEN_WORDS].into_boxed_slice().try_into().unwrap(),
            cgram: vec![0; CGRAM_LEN_WORDS].into_boxed_slice().try_into().unwrap(),
            oam: vec![0; OAM_LEN].into_boxed_slice().try_into().unwrap(),
            scanline: 0,
            dot: 0,
            frame_buffer: vec![Color::BLACK; FRAME_BUFFER_LEN]
                .into_boxed_slice()
                .try_into()
                .unwrap(),
            sprite_line: SpriteLineBuffer::new(),
        }
    }

    /// Advance one dot. Rendering happens at the first dot of each visible
    /// line, so the frame buffer is stable from the FrameComplete effect
    /// until the following step call.
    pub fn step(&mut self) -> PpuTickEffect {
        if self.dot == 0 && self.scanline < VISIBLE_LINES {
            self.render_scanline(self.scanline);
        }

        self.dot += 1;
        if self.dot < DOTS_PER_LINE {
            return PpuTickEffect::None;
        }

        self.dot = 0;
        self.scanline += 1;
        match self.scanline {
            VBLANK_START_LINE => PpuTickEffect::EnteredVblank,
            SCANLINES_PER_FRAME => {
                self.scanline = 0;
                PpuTickEffect::FrameComplete
            }
            _ => PpuTickEffect::None,
        }
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn frame_buffer(&self) -> &[Color] {
        self.frame_buffer.as_slice()
    }

    pub fn frame_size(&self) -> FrameSize {
        FrameSize { width: FRAME_WIDTH, height: FRAME_HEIGHT }
    }

    pub fn reset(&mut self) {
        self.registers.write_inidisp(0x80);
        self.scanline = 0;
        self.dot = 0;
    }

    // --- Rendering ---

    fn render_scanline(&mut self, line: u16) {
        if self.registers.forced_blanking {
            // Leave the previous frame's line in place; forced blank is
            // normally transient and repainting black would flicker
            return;
        }

        self.populate_sprite_line(line);

        let backdrop = self.cgram[0];
        let brightness = self.registers.brightness;

        for x in 0..FRAME_WIDTH as u16 {
            let raw_color = self.resolve_pixel(x, line).unwrap_or(backdrop);
            let index = u32::from(line) * FRAME_WIDTH + u32::from(x);
            self.frame_buffer[index as usize] = convert_color(raw_color, brightness);
        }
    }

    /// Walk the mode's layer order front to back; the first opaque pixel
    /// wins. Palette index 0 is transparent in every layer.
    fn resolve_pixel(&self, x: u16, y: u16) -> Option<u16> {
        let mode = self.registers.bg_mode;
        let order = match mode {
            BgMode::Zero => MODE_0_ORDER,
            BgMode::One if self.registers.bg3_high_priority => MODE_1_ORDER_BG3_PRIORITY,
            BgMode::One => MODE_1_ORDER,
            // Unsupported modes show the backdrop
            _ => return None,
        };

        let mut bg_cache: [Option<Option<BgPixel>>; 4] = [None; 4];

        for &layer in order {
            match layer {
                Layer::Obj(priority) => {
                    if !self.registers.main_obj_enabled {
                        continue;
                    }
                    let sprite = self.sprite_line.pixels[x as usize];
                    if sprite.color != 0 && sprite.priority == priority {
                        let cgram_index = 128 + sprite.palette * 16 + sprite.color;
                        return Some(self.cgram[cgram_index as usize]);
                    }
                }
                Layer::Bg { bg, high_priority } => {
                    if !mode.bg_enabled(bg) || !self.registers.main_bg_enabled[bg] {
                        continue;
                    }
                    let pixel = *bg_cache[bg].get_or_insert_with(|| self.bg_pixel(bg, x, y));
                    if let Some(pixel) = pixel {
                        if pixel.high_priority == high_priority {
                            return Some(self.cgram[pixel.cgram_index as usize]);
                        }
                    }
                }
            }
        }

        None
    }

    fn bg_pixel(&self, bg: usize, x: u16, y: u16) -> Option<BgPixel> {
        let mode = self.registers.bg_mode;
        let bpp = mode.bg_bpp(bg);
        let tile_px = self.registers.bg_tile_size[bg].pixels();

        let sx = x.wrapping_add(self.registers.bg_h_scroll[bg]) & 0x3FF;
        let sy = y.wrapping_add(self.registers.bg_v_scroll[bg]) & 0x3FF;

        // Tilemap entry lookup, including the screen-quadrant layout for
        // 64-tile-wide/tall arrangements
        let screen = self.registers.bg_screen_size[bg];
        let map_x = (sx / tile_px) & (screen.width_tiles() - 1);
        let map_y = (sy / tile_px) & (screen.height_tiles() - 1);

        let mut map_addr =
            self.registers.bg_map_base[bg] + ((map_y & 31) << 5) + (map_x & 31);
        if map_x >= 32 {
            map_addr += 0x400;
        }
        if map_y >= 32 {
            map_addr += if screen.width_tiles() == 64 { 0x800 } else { 0x400 };
        }

        let entry = self.vram[(map_addr as usize) & (VRAM_LEN_WORDS - 1)];
        let mut tile = entry & 0x03FF;
        let palette = ((entry >> 10) & 0x07) as u8;
        let high_priority = entry.bit(13);
        let h_flip = entry.bit(14);
        let v_flip = entry.bit(15);

        let mut fine_x = sx % tile_px;
        let mut fine_y = sy % tile_px;
        if h_flip {
            fine_x = tile_px - 1 - fine_x;
        }
        if v_flip {
            fine_y = tile_px - 1 - fine_y;
        }

        // 16x16 tiles are 2x2 blocks of consecutive 8x8 tiles; the next
        // row of tiles is 16 entries later
        if tile_px == 16 {
            tile = tile.wrapping_add(fine_x / 8).wrapping_add((fine_y / 8) * 16) & 0x03FF;
            fine_x %= 8;
            fine_y %= 8;
        }

        let color = self.decode_tile_pixel(
            self.registers.bg_tile_base[bg],
            tile,
            bpp,
            fine_x as u8,
            fine_y,
        );
        if color == 0 {
            return None;
        }

        let cgram_index = match (mode, bpp) {
            // Mode 0 gives each background its own 32-color palette block
            (BgMode::Zero, _) => (bg as u8) * 32 + palette * 4 + color,
            (_, BitsPerPixel::Two) => palette * 4 + color,
            (_, BitsPerPixel::Four) => palette * 16 + color,
        };

        Some(BgPixel { color, cgram_index, high_priority })
    }

    /// Read one pixel's palette index out of planar tile data.
    fn decode_tile_pixel(
        &self,
        tile_base: u16,
        tile: u16,
        bpp: BitsPerPixel,
        fine_x: u8,
        fine_y: u16,
    ) -> u8 {
        let tile_addr = tile_base.wrapping_add(tile.wrapping_mul(bpp.tile_size_words()));
        let bit = 7 - fine_x;

        let plane01 = self.vram[(tile_addr.wrapping_add(fine_y) as usize) & (VRAM_LEN_WORDS - 1)];
        let mut color = u8::from(plane01.lo().bit(bit)) | (u8::from(plane01.hi().bit(bit)) << 1);

        if bpp == BitsPerPixel::Four {
            let plane23 =
                self.vram[(tile_addr.wrapping_add(8 + fine_y) as usize) & (VRAM_LEN_WORDS - 1)];
            color |= (u8::from(plane23.lo().bit(bit)) << 2)
                | (u8::from(plane23.hi().bit(bit)) << 3);
        }

        color
    }

    /// Scan OAM for sprites covering this line, lowest index first, up to
    /// the 32-per-line hardware limit. Lower-index sprites also win pixel
    /// overlaps, which the fill-if-empty loop preserves.
    fn populate_sprite_line(&mut self, line: u16) {
        self.sprite_line.clear();

        let mut sprites_on_line = 0;

        for sprite in 0..SPRITES {
            let x_low = self.oam[sprite * 4];
            let y = u16::from(self.oam[sprite * 4 + 1]);
            let tile = self.oam[sprite * 4 + 2];
            let attributes = self.oam[sprite * 4 + 3];

            let high_entry = self.oam[OAM_HIGH_TABLE_ADDR + sprite / 4];
            let high_shift = ((sprite & 3) * 2) as u8;
            let x_high = high_entry.bit(high_shift);
            let large = high_entry.bit(high_shift + 1);

            let (width, height) = if large {
                self.registers.obj_size_select.large_size()
            } else {
                self.registers.obj_size_select.small_size()
            };

            // Sprites become visible on the line after their Y coordinate
            let first_line = y.wrapping_add(1) & 0xFF;
            let row = line.wrapping_sub(first_line) & 0xFF;
            if row >= height {
                continue;
            }

            if sprites_on_line == MAX_SPRITES_PER_LINE {
                break;
            }
            sprites_on_line += 1;

            // 9-bit signed X position
            let x = i32::from(x_low) + (i32::from(x_high) << 8);
            let x = if x >= 256 { x - 512 } else { x };

            let v_flip = attributes.bit(7);
            let h_flip = attributes.bit(6);
            let priority = (attributes >> 4) & 0x03;
            let palette = (attributes >> 1) & 0x07;
            let table_select = attributes.bit(0);

            let table_base = if table_select {
                self.registers
                    .obj_tile_base
                    .wrapping_add(0x1000)
                    .wrapping_add(self.registers.obj_tile_gap)
            } else {
                self.registers.obj_tile_base
            };

            let sprite_row = if v_flip { height - 1 - row } else { row };

            for pixel in 0..width {
                let screen_x = x + i32::from(pixel);
                if !(0..i32::from(FRAME_WIDTH as u16)).contains(&screen_x) {
                    continue;
                }
                if self.sprite_line.pixels[screen_x as usize].color != 0 {
                    continue;
                }

                let sprite_x = if h_flip { width - 1 - pixel } else { pixel };

                // Sprite tiles live in a 16-wide grid; columns wrap within
                // the row and rows advance by 16 tiles
                let tile_col = (u16::from(tile & 0x0F) + sprite_x / 8) & 0x0F;
                let tile_row = (u16::from(tile >> 4) + sprite_row / 8) & 0x0F;
                let tile_index = (tile_row << 4) | tile_col;

                let color = self.decode_tile_pixel(
                    table_base,
                    tile_index,
                    BitsPerPixel::OBJ,
                    (sprite_x % 8) as u8,
                    sprite_row % 8,
                );
                if color != 0 {
                    self.sprite_line.pixels[screen_x as usize] =
                        SpritePixel { color, palette, priority };
                }
            }
        }
    }

    // --- Register ports ($2100-$213F) ---

    pub fn write_port(&mut self, address: u32, value: u8) {
        log::trace!("PPU register write: 21{:02X} {value:02X}", address & 0xFF);

        match address & 0xFF {
            0x00 => self.registers.write_inidisp(value),
            0x01 => self.registers.write_obsel(value),
            0x02 => self.registers.write_oamaddl(value),
            0x03 => self.registers.write_oamaddh(value),
            0x04 => self.write_oam_data_port(value),
            0x05 => self.registers.write_bgmode(value),
            0x07..=0x0A => {
                let bg = ((address & 0xFF) - 0x07) as usize;
                self.registers.write_bg_sc(bg, value);
            }
            0x0B => self.registers.write_bg_nba(0, value),
            0x0C => self.registers.write_bg_nba(2, value),
            address_lsb @ (0x0D | 0x0F | 0x11 | 0x13) => {
                let bg = ((address_lsb - 0x0D) / 2) as usize;
                self.registers.write_bg_h_scroll(bg, value);
            }
            address_lsb @ (0x0E | 0x10 | 0x12 | 0x14) => {
                let bg = ((address_lsb - 0x0E) / 2) as usize;
                self.registers.write_bg_v_scroll(bg, value);
            }
            0x15 => self.registers.write_vmain(value),
            0x16 => {
                self.registers.vram_address.set_lo(value);
                self.fill_vram_prefetch();
            }
            0x17 => {
                self.registers.vram_address.set_hi(value);
                self.fill_vram_prefetch();
            }
            0x18 => self.write_vram_data_low(value),
            0x19 => self.write_vram_data_high(value),
            0x21 => {
                self.registers.cgram_address = value;
                self.registers.cgram_flipflop = AccessFlipflop::First;
            }
            0x22 => self.write_cgram_data_port(value),
            0x2C => self.registers.write_tm(value),
            0x2D => self.registers.write_ts(value),
            _ => self.registers.write_stored(address, value),
        }
    }

    pub fn read_port(&mut self, address: u32) -> Option<u8> {
        let value = match address & 0xFF {
            0x38 => self.read_oam_data_port(),
            0x39 => self.read_vram_data_low(),
            0x3A => self.read_vram_data_high(),
            0x3B => self.read_cgram_data_port(),
            0x3E => {
                // STAT77: PPU1 version number
                0x01
            }
            0x3F => {
                // STAT78: PPU2 version number
                0x01
            }
            _ => return None,
        };

        Some(value)
    }

    // --- VRAM data port ---
    //
    // Reads go through a prefetch buffer: the value returned is whatever
    // was fetched when the address was last set or incremented past, and
    // the buffer refills before the increment applies.

    fn vram_index(&self) -> usize {
        (self.registers.vram_address as usize) & (VRAM_LEN_WORDS - 1)
    }

    fn write_vram_data_low(&mut self, value: u8) {
        self.vram[self.vram_index()].set_lo(value);
        if self.registers.vram_increment_mode == VramIncrementMode::AfterLow {
            self.increment_vram_address();
        }
    }

    fn write_vram_data_high(&mut self, value: u8) {
        self.vram[self.vram_index()].set_hi(value);
        if self.registers.vram_increment_mode == VramIncrementMode::AfterHigh {
            self.increment_vram_address();
        }
    }

    fn read_vram_data_low(&mut self) -> u8 {
        let value = self.registers.vram_prefetch.lo();
        if self.registers.vram_increment_mode == VramIncrementMode::AfterLow {
            self.fill_vram_prefetch();
            self.increment_vram_address();
        }
        value
    }

    fn read_vram_data_high(&mut self) -> u8 {
        let value = self.registers.vram_prefetch.hi();
        if self.registers.vram_increment_mode == VramIncrementMode::AfterHigh {
            self.fill_vram_prefetch();
            self.increment_vram_address();
        }
        value
    }

    fn increment_vram_address(&mut self) {
        self.registers.vram_address =
            self.registers.vram_address.wrapping_add(self.registers.vram_increment_step);
    }

    fn fill_vram_prefetch(&mut self) {
        self.registers.vram_prefetch = self.vram[self.vram_index()];
    }

    // --- OAM data port ---

    fn write_oam_data_port(&mut self, value: u8) {
        let oam_addr = self.registers.oam_address & 0x03FF;

        if oam_addr >= 0x200 {
            // High table writes go through immediately; $220-$3FF mirror
            // $200-$21F
            self.oam[(0x200 | (oam_addr & 0x1F)) as usize] = value;
        } else if oam_addr & 1 == 0 {
            // Even low-table address: latch the first byte of the pair
            self.registers.oam_write_latch = value;
        } else {
            self.oam[(oam_addr & !1) as usize] = self.registers.oam_write_latch;
            self.oam[oam_addr as usize] = value;
        }

        self.registers.oam_address = (oam_addr + 1) & 0x03FF;
    }

    fn read_oam_data_port(&mut self) -> u8 {
        let oam_addr = self.registers.oam_address & 0x03FF;
        let value = if oam_addr >= 0x200 {
            self.oam[(0x200 | (oam_addr & 0x1F)) as usize]
        } else {
            self.oam[oam_addr as usize]
        };

        self.registers.oam_address = (oam_addr + 1) & 0x03FF;
        value
    }

    // --- CGRAM data port ---

    fn write_cgram_data_port(&mut self, value: u8) {
        match self.registers.cgram_flipflop {
            AccessFlipflop::First => {
                self.registers.cgram_write_latch = value;
                self.registers.cgram_flipflop = AccessFlipflop::Second;
            }
            AccessFlipflop::Second => {
                // Bit 15 is stored but has no color meaning
                self.cgram[self.registers.cgram_address as usize] =
                    u16::from_le_bytes([self.registers.cgram_write_latch, value]);
                self.registers.cgram_address = self.registers.cgram_address.wrapping_add(1);
                self.registers.cgram_flipflop = AccessFlipflop::First;
            }
        }
    }

    fn read_cgram_data_port(&mut self) -> u8 {
        let word = self.cgram[self.registers.cgram_address as usize];
        match self.registers.cgram_flipflop {
            AccessFlipflop::First => {
                self.registers.cgram_flipflop = AccessFlipflop::Second;
                word.lo()
            }
            AccessFlipflop::Second => {
                self.registers.cgram_flipflop = AccessFlipflop::First;
                self.registers.cgram_address = self.registers.cgram_address.wrapping_add(1);
                word.hi()
            }
        }
    }
}

/// Expand 15-bit BGR to RGBA8888 and apply master brightness.
fn convert_color(bgr: u16, brightness: u8) -> Color {
    let scale = |component: u16| -> u8 {
        let component = (component & 0x1F) as u8;
        let expanded = (component << 3) | (component >> 2);
        ((u16::from(expanded) * u16::from(brightness)) / 15) as u8
    };

    if brightness == 0 {
        return Color::BLACK;
    }

    Color::rgb(scale(bgr), scale(bgr >> 5), scale(bgr >> 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_frame(ppu: &mut Ppu) {
        loop {
            if ppu.step() == PpuTickEffect::FrameComplete {
                // One more step renders line 0 of the next frame
                break;
            }
        }
    }

    fn write_cgram_entry(ppu: &mut Ppu, index: u8, color: u16) {
        ppu.write_port(0x2121, index);
        ppu.write_port(0x2122, color as u8);
        ppu.write_port(0x2122, (color >> 8) as u8);
    }

    fn write_vram_word(ppu: &mut Ppu, address: u16, value: u16) {
        ppu.write_port(0x2115, 0x80);
        ppu.write_port(0x2116, address as u8);
        ppu.write_port(0x2117, (address >> 8) as u8);
        ppu.write_port(0x2118, value as u8);
        ppu.write_port(0x2119, (value >> 8) as u8);
    }

    #[test]
    fn frame_timing_effects() {
        let mut ppu = Ppu::new();

        let mut entered_vblank = 0;
        let mut frames = 0;
        for _ in 0..(u32::from(DOTS_PER_LINE) * u32::from(SCANLINES_PER_FRAME) * 2) {
            match ppu.step() {
                PpuTickEffect::EnteredVblank => entered_vblank += 1,
                PpuTickEffect::FrameComplete => frames += 1,
                PpuTickEffect::None => {}
            }
        }

        assert_eq!(entered_vblank, 2);
        assert_eq!(frames, 2);
    }

    #[test]
    fn vram_data_port_round_trip() {
        let mut ppu = Ppu::new();

        write_vram_word(&mut ppu, 0x1000, 0xBEEF);

        // Reload the address; the prefetch buffer fills from it
        ppu.write_port(0x2116, 0x00);
        ppu.write_port(0x2117, 0x10);
        assert_eq!(ppu.read_port(0x2139), Some(0xEF));
        assert_eq!(ppu.read_port(0x213A), Some(0xBE));
    }

    #[test]
    fn vram_prefetch_is_pipelined() {
        let mut ppu = Ppu::new();
        write_vram_word(&mut ppu, 0x0000, 0x1111);
        write_vram_word(&mut ppu, 0x0001, 0x2222);

        // Increment-after-low, step 1: each low read returns the prefetch
        // and then advances
        ppu.write_port(0x2115, 0x00);
        ppu.write_port(0x2116, 0x00);
        ppu.write_port(0x2117, 0x00);

        // The buffer refills from the pre-increment address, so word 0
        // comes back twice before word 1 appears
        assert_eq!(ppu.read_port(0x2139), Some(0x11));
        assert_eq!(ppu.read_port(0x2139), Some(0x11));
        assert_eq!(ppu.read_port(0x2139), Some(0x22));
    }

    #[test]
    fn cgram_round_trip() {
        let mut ppu = Ppu::new();
        write_cgram_entry(&mut ppu, 0x10, 0x7FFF);

        ppu.write_port(0x2121, 0x10);
        assert_eq!(ppu.read_port(0x213B), Some(0xFF));
        assert_eq!(ppu.read_port(0x213B), Some(0x7F));
    }

    #[test]
    fn oam_data_port_pairs_writes() {
        let mut ppu = Ppu::new();

        ppu.write_port(0x2102, 0x00);
        ppu.write_port(0x2103, 0x00);
        ppu.write_port(0x2104, 0x12); // latched
        ppu.write_port(0x2104, 0x34); // commits the pair

        assert_eq!(ppu.oam[0], 0x12);
        assert_eq!(ppu.oam[1], 0x34);
    }

    /// Mode 1 BG1 tile render producing a white pixel at (0, 0).
    #[test]
    fn bg1_tile_renders_white_pixel() {
        let mut ppu = Ppu::new();

        // Mode 1, BG1 map base $0000, BG1 tile base $1000
        ppu.write_port(0x2105, 0x01);
        ppu.write_port(0x2107, 0x00);
        ppu.write_port(0x210B, 0x01);

        // Tilemap entry 0: tile 0, palette 0
        write_vram_word(&mut ppu, 0x0000, 0x0000);

        // Tile 0 row 0: planes 0+1 set for pixel 0 -> color index 3
        write_vram_word(&mut ppu, 0x1000, 0x8080);

        // Palette 0 entry 3 = white
        write_cgram_entry(&mut ppu, 3, 0x7FFF);

        // Full brightness, BG1 on main screen, forced blank off
        ppu.write_port(0x212C, 0x01);
        ppu.write_port(0x2100, 0x0F);

        run_frame(&mut ppu);
        ppu.step();

        let white = Color::rgb(255, 255, 255);
        assert_eq!(ppu.frame_buffer()[0], white);
        // Pixel (1, 0) has color index 0 -> backdrop (black)
        assert_eq!(ppu.frame_buffer()[1], Color::rgb(0, 0, 0));
    }

    #[test]
    fn forced_blank_preserves_previous_frame() {
        let mut ppu = Ppu::new();

        write_cgram_entry(&mut ppu, 0, 0x001F); // red backdrop
        ppu.write_port(0x2100, 0x0F);
        run_frame(&mut ppu);
        ppu.step();
        let red = ppu.frame_buffer()[0];
        assert_ne!(red, Color::BLACK);

        // Change the backdrop but assert forced blank; the old pixels stay
        write_cgram_entry(&mut ppu, 0, 0x03E0);
        ppu.write_port(0x2100, 0x80);
        run_frame(&mut ppu);
        ppu.step();
        assert_eq!(ppu.frame_buffer()[0], red);
    }

    #[test]
    fn sprite_renders_above_backdrop() {
        let mut ppu = Ppu::new();

        // Sprite 0 at (4, 9) -> first visible line is 10
        ppu.write_port(0x2102, 0x00);
        ppu.write_port(0x2103, 0x00);
        ppu.write_port(0x2104, 0x04); // x
        ppu.write_port(0x2104, 0x09); // y
        ppu.write_port(0x2104, 0x00); // tile 0
        ppu.write_port(0x2104, 0x30); // priority 3, palette 0

        // OBJ tile 0 row 0: color index 1 for pixel 0
        write_vram_word(&mut ppu, 0x0000, 0x0080);

        // Sprite palette 0 entry 1 = white
        write_cgram_entry(&mut ppu, 129, 0x7FFF);

        ppu.write_port(0x212C, 0x10); // OBJ on main screen
        ppu.write_port(0x2100, 0x0F);

        run_frame(&mut ppu);
        ppu.step();

        let index = 10 * FRAME_WIDTH as usize + 4;
        assert_eq!(ppu.frame_buffer()[index], Color::rgb(255, 255, 255));
    }
}
