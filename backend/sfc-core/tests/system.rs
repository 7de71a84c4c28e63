//! End-to-end tests driving the assembled core through its public API

use sfc_common::frontend::{AudioSink, Color, FrameSink, FrameSize, NullSink, TickEffect};
use sfc_core::{EmulatorConfig, Inputs, SfcEmulator};

const LOROM_HEADER: usize = 0x7FC0;

/// A 64KB LoROM image with a valid header, the given program at $00:8000,
/// and the emulation-mode reset vector pointing at it.
fn build_rom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0; 0x10000];
    rom[..program.len()].copy_from_slice(program);

    rom[LOROM_HEADER + 0x15] = 0x20; // LoROM map byte
    rom[LOROM_HEADER + 0x1C] = 0xCB; // checksum complement
    rom[LOROM_HEADER + 0x1D] = 0xED;
    rom[LOROM_HEADER + 0x1E] = 0x34; // checksum
    rom[LOROM_HEADER + 0x1F] = 0x12;

    // Emulation-mode reset vector: $8000
    rom[0x7FFC] = 0x00;
    rom[0x7FFD] = 0x80;

    rom
}

fn spin_program() -> Vec<u8> {
    // BRA to self
    vec![0x80, 0xFE]
}

fn no_trap_config() -> EmulatorConfig {
    EmulatorConfig { loop_trap_threshold: None }
}

fn tick(emulator: &mut SfcEmulator) -> TickEffect {
    emulator.tick(Inputs::default(), &mut NullSink, &mut NullSink)
}

fn run_until_pc(emulator: &mut SfcEmulator, target: u16, limit: u32) {
    for _ in 0..limit {
        if emulator.cpu().registers().pc == target {
            return;
        }
        tick(emulator);
    }
    panic!("PC never reached {target:04X} (at {:04X})", emulator.cpu().registers().pc);
}

struct CollectingSink {
    frames: u32,
    last_frame: Vec<Color>,
    samples: usize,
}

impl CollectingSink {
    fn new() -> Self {
        Self { frames: 0, last_frame: Vec::new(), samples: 0 }
    }
}

impl FrameSink for CollectingSink {
    fn accept_frame(&mut self, frame_buffer: &[Color], frame_size: FrameSize) {
        assert_eq!(frame_size, FrameSize { width: 256, height: 224 });
        self.frames += 1;
        self.last_frame = frame_buffer.to_vec();
    }
}

impl AudioSink for CollectingSink {
    fn accept_samples(&mut self, samples: &[(i16, i16)]) {
        self.samples += samples.len();
    }
}

#[test]
fn reset_follows_emulation_vector() {
    let emulator =
        SfcEmulator::create(build_rom(&spin_program()), EmulatorConfig::default()).unwrap();

    let registers = emulator.cpu().registers();
    assert_eq!(registers.pc, 0x8000);
    assert_eq!(registers.pbr, 0x00);
    assert!(registers.emulation_mode);
    assert_eq!(u8::from(registers.p), 0x34);
}

#[test]
fn lda_immediate_in_both_widths() {
    // CLC / XCE / REP #$20 / LDA #$1234 / SEP #$20 / LDA #$FF / BRA self
    let program = [
        0x18, 0xFB, 0xC2, 0x20, 0xA9, 0x34, 0x12, 0xE2, 0x20, 0xA9, 0xFF, 0x80, 0xFE,
    ];
    let mut emulator = SfcEmulator::create(build_rom(&program), no_trap_config()).unwrap();

    run_until_pc(&mut emulator, 0x8007, 10_000);
    assert_eq!(emulator.cpu().registers().a, 0x1234);

    run_until_pc(&mut emulator, 0x800B, 10_000);
    let registers = emulator.cpu().registers();
    // 8-bit load replaces only the low byte
    assert_eq!(registers.a, 0x12FF);
    assert!(registers.p.negative);
    assert!(!registers.p.zero);
}

#[test]
fn nmi_delivery_into_vblank() {
    // CLC / XCE / LDA #$80 / STA $4200 / BRA self
    let program = [0x18, 0xFB, 0xA9, 0x80, 0x8D, 0x00, 0x42, 0x80, 0xFE];
    let mut rom = build_rom(&program);
    // Native-mode NMI vector -> $9000, where the handler spins
    rom[0x7FEA] = 0x00;
    rom[0x7FEB] = 0x90;
    rom[0x1000] = 0x80;
    rom[0x1001] = 0xFE;

    let mut emulator = SfcEmulator::create(rom, no_trap_config()).unwrap();

    // Run a frame; the NMI must move execution into the handler
    let mut sink = CollectingSink::new();
    emulator.run_frame(Inputs::default(), &mut sink, &mut NullSink);
    run_until_pc(&mut emulator, 0x9000, 100_000);

    let registers = emulator.cpu().registers().clone();
    assert_eq!(registers.pbr, 0x00);
    assert!(registers.p.irq_disabled);

    // Native-mode NMI pushed PBR, PC high, PC low, P starting at $01FF;
    // the interrupted spin loop lives at $8007
    assert_eq!(emulator.debug_read(0x00_01FF), 0x00);
    assert_eq!(emulator.debug_read(0x00_01FE), 0x80);
    assert_eq!(emulator.debug_read(0x00_01FD), 0x07);
    assert_eq!(registers.s, 0x01FB);
}

#[test]
fn dma_pattern_0_to_cgram() {
    let mut rom = build_rom(&spin_program());
    // Pattern data at $00:8000-$81FF; the spin loop occupies the first two
    // bytes and is part of the expected copy
    for (i, byte) in rom[..0x200].iter_mut().enumerate() {
        if i >= 2 {
            *byte = ((i * 7) + 3) as u8;
        }
    }
    let expected: Vec<u8> = rom[..0x200].to_vec();

    let mut emulator = SfcEmulator::create(rom, no_trap_config()).unwrap();

    // Channel 0: pattern 0, destination $2122 (CGDATA), source $00:8000,
    // size $0200
    emulator.debug_write(0x4300, 0x00);
    emulator.debug_write(0x4301, 0x22);
    emulator.debug_write(0x4302, 0x00);
    emulator.debug_write(0x4303, 0x80);
    emulator.debug_write(0x4304, 0x00);
    emulator.debug_write(0x4305, 0x00);
    emulator.debug_write(0x4306, 0x02);

    emulator.debug_write(0x2121, 0x00);
    emulator.debug_write(0x420B, 0x01);

    assert_eq!(emulator.dma_enabled_mask(), 0);

    // Read CGRAM back through its data port
    emulator.debug_write(0x2121, 0x00);
    for (i, &expected_byte) in expected.iter().enumerate() {
        let value = emulator.debug_read(0x213B);
        assert_eq!(value, expected_byte, "CGRAM byte {i}");
    }
}

#[test]
fn dma_full_vram_round_trip() {
    let mut emulator =
        SfcEmulator::create(build_rom(&spin_program()), no_trap_config()).unwrap();

    // Fill WRAM $7E:0000-$FFFF with a pattern
    for i in 0..0x10000_u32 {
        emulator.debug_write(0x7E_0000 + i, (i * 31 + 7) as u8);
    }

    // VMAIN: increment after high byte, step 1; VMADD = 0
    emulator.debug_write(0x2115, 0x80);
    emulator.debug_write(0x2116, 0x00);
    emulator.debug_write(0x2117, 0x00);

    // Channel 0: pattern 1 ($2118 then $2119), source $7E:0000, 65536 bytes
    emulator.debug_write(0x4300, 0x01);
    emulator.debug_write(0x4301, 0x18);
    emulator.debug_write(0x4302, 0x00);
    emulator.debug_write(0x4303, 0x00);
    emulator.debug_write(0x4304, 0x7E);
    emulator.debug_write(0x4305, 0x00);
    emulator.debug_write(0x4306, 0x00);
    emulator.debug_write(0x420B, 0x01);

    // Read all of VRAM back through the prefetched data port: reload the
    // address, discard one word (the prefetch pipeline's latency), then
    // every word comes back in order
    emulator.debug_write(0x2116, 0x00);
    emulator.debug_write(0x2117, 0x00);
    emulator.debug_read(0x2139);
    emulator.debug_read(0x213A);

    for i in 0..0x10000_u32 {
        let expected = (i * 31 + 7) as u8;
        let value = if i % 2 == 0 {
            emulator.debug_read(0x2139)
        } else {
            emulator.debug_read(0x213A)
        };
        assert_eq!(value, expected, "VRAM byte {i}");
    }
}

#[test]
fn apu_ipl_handshake_over_mailbox_ports() {
    let mut emulator =
        SfcEmulator::create(build_rom(&spin_program()), no_trap_config()).unwrap();

    let wait_for_port0 = |emulator: &mut SfcEmulator, value: u8| {
        for _ in 0..100_000 {
            if emulator.debug_read(0x2140) == value {
                return;
            }
            tick(emulator);
        }
        panic!("APU port 0 never became {value:02X}");
    };

    // Ready signature
    wait_for_port0(&mut emulator, 0xAA);
    for _ in 0..100_000 {
        if emulator.debug_read(0x2141) == 0xBB {
            break;
        }
        tick(&mut emulator);
    }
    assert_eq!(emulator.debug_read(0x2141), 0xBB);

    // Upload 16 bytes to $0200
    emulator.debug_write(0x2142, 0x00);
    emulator.debug_write(0x2143, 0x02);
    emulator.debug_write(0x2141, 0x01);
    emulator.debug_write(0x2140, 0xCC);
    wait_for_port0(&mut emulator, 0xCC);

    for i in 0..16_u8 {
        emulator.debug_write(0x2141, 0xA0 | i);
        emulator.debug_write(0x2140, i);
        wait_for_port0(&mut emulator, i);
    }

    // Execute at $0200
    emulator.debug_write(0x2141, 0x00);
    emulator.debug_write(0x2142, 0x00);
    emulator.debug_write(0x2143, 0x02);
    emulator.debug_write(0x2140, 18);
    wait_for_port0(&mut emulator, 18);
}

#[test]
fn bg1_tile_render_end_to_end() {
    let mut emulator =
        SfcEmulator::create(build_rom(&spin_program()), no_trap_config()).unwrap();

    // Mode 1, BG1 map base $0000, BG1 tile base $1000
    emulator.debug_write(0x2105, 0x01);
    emulator.debug_write(0x2107, 0x00);
    emulator.debug_write(0x210B, 0x01);

    // VRAM: tilemap entry 0 -> tile 0 palette 0; tile 0 pixel (0,0) has
    // color index 3 (bit 7 of planes 0 and 1)
    emulator.debug_write(0x2115, 0x80);
    emulator.debug_write(0x2116, 0x00);
    emulator.debug_write(0x2117, 0x00);
    emulator.debug_write(0x2118, 0x00);
    emulator.debug_write(0x2119, 0x00);
    emulator.debug_write(0x2116, 0x00);
    emulator.debug_write(0x2117, 0x10);
    emulator.debug_write(0x2118, 0x80);
    emulator.debug_write(0x2119, 0x80);

    // Palette 0 entry 3 = white
    emulator.debug_write(0x2121, 0x03);
    emulator.debug_write(0x2122, 0xFF);
    emulator.debug_write(0x2122, 0x7F);

    // BG1 on the main screen, full brightness, forced blank off
    emulator.debug_write(0x212C, 0x01);
    emulator.debug_write(0x2100, 0x0F);

    let mut sink = CollectingSink::new();
    emulator.run_frame(Inputs::default(), &mut sink, &mut NullSink);

    assert_eq!(sink.frames, 1);
    assert_eq!(sink.last_frame[0], Color::rgb(255, 255, 255));
    // Neighboring transparent pixel falls through to the black backdrop
    assert_eq!(sink.last_frame[1], Color::rgb(0, 0, 0));
}

#[test]
fn audio_sink_receives_roughly_a_frame_of_samples() {
    let mut emulator =
        SfcEmulator::create(build_rom(&spin_program()), no_trap_config()).unwrap();

    let mut sink = CollectingSink::new();
    emulator.run_frame(Inputs::default(), &mut NullSink, &mut sink);
    emulator.run_frame(Inputs::default(), &mut NullSink, &mut sink);

    // ~532 stereo pairs per frame at 32 kHz
    let pairs_per_frame = sink.samples / 2;
    assert!((500..=580).contains(&pairs_per_frame), "pairs per frame: {pairs_per_frame}");
}

#[test]
fn loop_trap_stops_a_hung_program() {
    let config = EmulatorConfig { loop_trap_threshold: Some(1_000) };
    let mut emulator = SfcEmulator::create(build_rom(&spin_program()), config).unwrap();

    for _ in 0..100_000 {
        if emulator.is_stopped() {
            return;
        }
        tick(&mut emulator);
    }
    panic!("loop trap never fired");
}

#[test]
fn open_bus_returns_last_bus_value() {
    let mut emulator =
        SfcEmulator::create(build_rom(&spin_program()), no_trap_config()).unwrap();

    emulator.debug_write(0x7E_0000, 0x5A);
    let seeded = emulator.debug_read(0x7E_0000);
    assert_eq!(seeded, 0x5A);

    // $00:5000 maps to nothing in LoROM; the read floats to the last value
    assert_eq!(emulator.debug_read(0x00_5000), 0x5A);
}

#[test]
fn controller_auto_read_reflects_input_source() {
    let mut emulator =
        SfcEmulator::create(build_rom(&spin_program()), no_trap_config()).unwrap();

    // Enable auto joypad read
    emulator.debug_write(0x4200, 0x01);

    let inputs = Inputs {
        p1: sfc_core::JoypadState { b: true, start: true, ..Default::default() },
        p2: sfc_core::JoypadState::default(),
    };

    // Run past V-Blank so the auto-read registers latch
    loop {
        if emulator.tick(inputs, &mut NullSink, &mut NullSink) == TickEffect::FrameRendered {
            break;
        }
    }

    let low = emulator.debug_read(0x4218);
    let high = emulator.debug_read(0x4219);
    let word = u16::from_le_bytes([low, high]);
    assert_eq!(word, 0x9000); // B and Start
}
