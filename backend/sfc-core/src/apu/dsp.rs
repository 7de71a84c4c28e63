//! S-DSP: eight BRR sample voices with ADSR/gain envelopes, a noise
//! generator, and stereo mixing. Echo registers are accepted and stored but
//! the echo filter itself is not processed.

use crate::apu::AudioRam;
use bincode::{Decode, Encode};
use sfc_common::num::{GetBit, U16Ext};

const VOICES: usize = 8;
const BRR_BLOCK_LEN: u16 = 9;

/// Envelope divider periods in output samples, indexed by the 5-bit rate.
/// Rate 0 never steps.
const RATE_PERIODS: [u16; 32] = [
    0, 2048, 1536, 1280, 1024, 768, 640, 512, 384, 320, 256, 192, 160, 128, 96, 80, 64, 48, 40,
    32, 24, 20, 16, 12, 10, 8, 6, 5, 4, 3, 2, 1,
];

const ENVELOPE_MAX: u16 = 0x7FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
enum EnvelopePhase {
    Attack,
    Decay,
    Sustain,
    #[default]
    Release,
}

/// Streaming BRR decoder: one nibble at a time, preserving the previous two
/// output samples across block boundaries because the reconstruction filter
/// is IIR.
#[derive(Debug, Clone, Default, Encode, Decode)]
struct BrrDecoder {
    block_address: u16,
    nibble_index: u8,
    prev1: i16,
    prev2: i16,
    end_reached: bool,
    loop_flagged: bool,
}

impl BrrDecoder {
    /// Start decoding at a sample's start block. The filter history is
    /// cleared on key-on but deliberately NOT on loop.
    fn restart(&mut self, start_address: u16) {
        self.block_address = start_address;
        self.nibble_index = 0;
        self.prev1 = 0;
        self.prev2 = 0;
        self.end_reached = false;
        self.loop_flagged = false;
    }

    fn decode_next(&mut self, aram: &AudioRam, loop_address: u16) -> i16 {
        if self.nibble_index == 16 {
            let header = aram[self.block_address as usize];
            if header.bit(0) {
                self.end_reached = true;
                self.loop_flagged = header.bit(1);
                self.block_address = loop_address;
            } else {
                self.block_address = self.block_address.wrapping_add(BRR_BLOCK_LEN);
            }
            self.nibble_index = 0;
        }

        let header = aram[self.block_address as usize];
        let shift = header >> 4;
        let filter = (header >> 2) & 0x03;

        let byte_addr =
            self.block_address.wrapping_add(1 + u16::from(self.nibble_index >> 1)) as usize;
        let byte = aram[byte_addr];
        let nibble = if self.nibble_index & 1 == 0 {
            (byte as i8) >> 4
        } else {
            ((byte as i8) << 4) >> 4
        };
        self.nibble_index += 1;

        let shifted: i32 = match shift {
            0..=12 => (i32::from(nibble) << shift) >> 1,
            // Invalid ranges collapse to 0 or -2048
            _ => {
                if nibble < 0 {
                    -2048
                } else {
                    0
                }
            }
        };

        let prev1 = i32::from(self.prev1);
        let prev2 = i32::from(self.prev2);
        let filtered = match filter {
            0 => shifted,
            1 => shifted + prev1 * 15 / 16,
            2 => shifted + prev1 * 61 / 32 - prev2 * 15 / 16,
            3 => shifted + prev1 * 115 / 64 - prev2 * 13 / 16,
            _ => unreachable!("filter is a 2-bit field"),
        };

        // Clamp to 16 bits, then clip to the DSP's 15-bit signed range
        let clamped = filtered.clamp(i16::MIN.into(), i16::MAX.into()) as i16;
        let sample = (clamped << 1) >> 1;

        self.prev2 = self.prev1;
        self.prev1 = sample;
        sample
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
struct Voice {
    // Registers
    volume_l: i8,
    volume_r: i8,
    pitch: u16,
    source_number: u8,
    adsr1: u8,
    adsr2: u8,
    gain: u8,
    keyed_on: bool,
    keyed_off: bool,
    output_noise: bool,
    // Decode state
    decoder: BrrDecoder,
    /// 16.16 fixed-point position; the fractional part interpolates between
    /// `older` and `latest`
    position: u32,
    older: i16,
    latest: i16,
    // Envelope
    phase: EnvelopePhase,
    envelope_level: u16,
    rate_counter: u16,
    current_sample: i16,
    end_flag: bool,
}

impl Voice {
    fn key_on(&mut self, aram: &AudioRam, directory: u16) {
        let (start, _) = self.directory_entry(aram, directory);
        self.decoder.restart(start);
        self.position = 0;
        self.older = 0;
        self.latest = 0;
        self.phase = EnvelopePhase::Attack;
        self.envelope_level = 0;
        self.rate_counter = 0;
        self.end_flag = false;
    }

    fn key_off(&mut self) {
        self.phase = EnvelopePhase::Release;
    }

    fn directory_entry(&self, aram: &AudioRam, directory: u16) -> (u16, u16) {
        let entry = directory.wrapping_add(u16::from(self.source_number) << 2) as usize;
        let start = u16::from_le_bytes([aram[entry], aram[(entry + 1) & 0xFFFF]]);
        let loop_addr = u16::from_le_bytes([aram[(entry + 2) & 0xFFFF], aram[(entry + 3) & 0xFFFF]]);
        (start, loop_addr)
    }

    /// Produce this voice's next sample (before stereo volumes).
    fn clock(&mut self, aram: &AudioRam, directory: u16, noise_output: i16) -> i16 {
        let (_, loop_address) = self.directory_entry(aram, directory);

        // Advance by pitch/$1000 samples, decoding as needed
        self.position += u32::from(self.pitch & 0x3FFF) << 4;
        while self.position >= 0x1_0000 {
            self.position -= 0x1_0000;
            self.older = self.latest;
            self.latest = self.decoder.decode_next(aram, loop_address);

            if self.decoder.end_reached {
                self.end_flag = true;
                if self.decoder.loop_flagged {
                    // Keep playing from the loop point; filter history is
                    // carried across the jump
                    self.decoder.end_reached = false;
                } else {
                    self.key_off();
                    self.envelope_level = 0;
                }
            }
        }

        let raw = if self.output_noise {
            noise_output
        } else {
            // Linear interpolation between the two most recent samples
            let fraction = i32::from((self.position >> 8) as u8);
            let older = i32::from(self.older);
            let latest = i32::from(self.latest);
            (older + ((latest - older) * fraction / 256)) as i16
        };

        self.clock_envelope();

        let sample = ((i32::from(raw) * i32::from(self.envelope_level)) >> 11) as i16;
        self.current_sample = sample;
        sample
    }

    fn clock_envelope(&mut self) {
        if self.phase == EnvelopePhase::Release {
            self.envelope_level = self.envelope_level.saturating_sub(8);
            return;
        }

        let adsr_mode = self.adsr1.bit(7);
        let level = i32::from(self.envelope_level);

        let (rate, step) = if adsr_mode {
            match self.phase {
                EnvelopePhase::Attack => {
                    let rate = ((self.adsr1 & 0x0F) << 1) | 0x01;
                    let step = if rate == 31 { 1024 } else { 32 };
                    (rate, step)
                }
                EnvelopePhase::Decay => {
                    let rate = 0x10 | ((self.adsr1 >> 4) & 0x07) << 1;
                    (rate, exponential_decay_step(level))
                }
                EnvelopePhase::Sustain => (self.adsr2 & 0x1F, exponential_decay_step(level)),
                EnvelopePhase::Release => unreachable!("handled above"),
            }
        } else if !self.gain.bit(7) {
            // Direct gain: snap to 16*N
            let target = i32::from(self.gain & 0x7F) << 4;
            self.envelope_level = target as u16;
            self.advance_phase_boundaries();
            return;
        } else {
            let rate = self.gain & 0x1F;
            let step = match self.gain & 0x60 {
                0x00 => -32,
                0x20 => exponential_decay_step(level),
                0x40 => 32,
                0x60 => {
                    // Bent increase: fast up to 3/4 of full scale
                    if level < 0x600 {
                        32
                    } else {
                        8
                    }
                }
                _ => unreachable!("gain & 0x60 is always one of the above values"),
            };
            (rate, step)
        };

        if rate == 0 {
            return;
        }

        self.rate_counter += 1;
        if self.rate_counter < RATE_PERIODS[rate as usize] {
            return;
        }
        self.rate_counter = 0;

        let new_level = (level + step).clamp(0, ENVELOPE_MAX.into());
        self.envelope_level = new_level as u16;

        self.advance_phase_boundaries();
    }

    fn advance_phase_boundaries(&mut self) {
        if self.phase == EnvelopePhase::Attack && self.envelope_level >= ENVELOPE_MAX {
            self.phase = EnvelopePhase::Decay;
        }

        if self.phase == EnvelopePhase::Decay {
            let sustain_level = (u16::from((self.adsr2 >> 5) & 0x07) + 1) << 8;
            if self.envelope_level <= sustain_level {
                self.phase = EnvelopePhase::Sustain;
            }
        }
    }

    fn read_envelope(&self) -> u8 {
        (self.envelope_level >> 4) as u8
    }

    fn read_output(&self) -> u8 {
        (self.current_sample >> 7) as u8
    }
}

fn exponential_decay_step(level: i32) -> i32 {
    -(((level - 1) >> 8) + 1)
}

#[derive(Debug, Clone, Encode, Decode)]
struct NoiseGenerator {
    output: i16,
    rate_counter: u16,
}

impl NoiseGenerator {
    fn new() -> Self {
        Self { output: i16::MIN >> 1, rate_counter: 0 }
    }

    fn clock(&mut self, rate: u8) {
        if rate == 0 {
            return;
        }

        self.rate_counter += 1;
        if self.rate_counter < RATE_PERIODS[rate as usize] {
            return;
        }
        self.rate_counter = 0;

        let feedback = self.output.bit(0) ^ self.output.bit(1);
        self.output = ((self.output >> 1) & 0x3FFF) | (i16::from(feedback) << 14);
        // Clip to 15 bits signed
        self.output = (self.output << 1) >> 1;
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Dsp {
    voices: [Voice; VOICES],
    register_address: u8,
    sample_directory: u16,
    master_volume_l: i8,
    master_volume_r: i8,
    noise_rate: u8,
    mute: bool,
    soft_reset: bool,
    noise: NoiseGenerator,
    /// Echo and other registers with no processed effect, plus unused slots
    stored: [u8; 128],
}

impl Dsp {
    pub fn new() -> Self {
        Self {
            voices: Default::default(),
            register_address: 0,
            sample_directory: 0,
            master_volume_l: 0,
            master_volume_r: 0,
            noise_rate: 0,
            mute: true,
            soft_reset: true,
            noise: NoiseGenerator::new(),
            stored: [0; 128],
        }
    }

    pub fn read_address(&self) -> u8 {
        self.register_address
    }

    pub fn write_address(&mut self, address: u8) {
        self.register_address = address;
    }

    pub fn read_register(&self) -> u8 {
        // $80-$FF mirror $00-$7F
        let address = self.register_address & 0x7F;
        let voice = (address >> 4) as usize;

        match address & 0x0F {
            0x00 => self.voices[voice].volume_l as u8,
            0x01 => self.voices[voice].volume_r as u8,
            0x02 => self.voices[voice].pitch.lo(),
            0x03 => self.voices[voice].pitch.hi(),
            0x04 => self.voices[voice].source_number,
            0x05 => self.voices[voice].adsr1,
            0x06 => self.voices[voice].adsr2,
            0x07 => self.voices[voice].gain,
            0x08 => self.voices[voice].read_envelope(),
            0x09 => self.voices[voice].read_output(),
            0x0C | 0x0D => match address {
                0x0C => self.master_volume_l as u8,
                0x1C => self.master_volume_r as u8,
                0x4C => self.collect_flags(|voice| voice.keyed_on),
                0x5C => self.collect_flags(|voice| voice.keyed_off),
                0x6C => {
                    self.noise_rate
                        | (u8::from(self.mute) << 6)
                        | (u8::from(self.soft_reset) << 7)
                        | (self.stored[0x6C] & 0x20)
                }
                0x7C => self.collect_flags(|voice| voice.end_flag),
                0x3D => self.collect_flags(|voice| voice.output_noise),
                0x5D => (self.sample_directory >> 8) as u8,
                _ => self.stored[address as usize],
            },
            _ => self.stored[address as usize],
        }
    }

    fn collect_flags(&self, flag: impl Fn(&Voice) -> bool) -> u8 {
        self.voices
            .iter()
            .enumerate()
            .map(|(i, voice)| u8::from(flag(voice)) << i)
            .fold(0, |acc, bit| acc | bit)
    }

    pub fn write_register(&mut self, value: u8, aram: &AudioRam) {
        // $80-$FF are read-only mirrors
        if self.register_address >= 0x80 {
            return;
        }

        let address = self.register_address;
        let voice = (address >> 4) as usize;
        self.stored[address as usize] = value;

        log::trace!("DSP register write: {address:02X} {value:02X}");

        match address & 0x0F {
            0x00 => self.voices[voice].volume_l = value as i8,
            0x01 => self.voices[voice].volume_r = value as i8,
            0x02 => self.voices[voice].pitch.set_lo(value),
            0x03 => self.voices[voice].pitch.set_hi(value & 0x3F),
            0x04 => self.voices[voice].source_number = value,
            0x05 => self.voices[voice].adsr1 = value,
            0x06 => self.voices[voice].adsr2 = value,
            0x07 => self.voices[voice].gain = value,
            0x08 | 0x09 => {
                // ENVX/OUTX are overwritten by the DSP every sample
            }
            0x0C | 0x0D => match address {
                0x0C => self.master_volume_l = value as i8,
                0x1C => self.master_volume_r = value as i8,
                0x4C => {
                    // KON: restart the selected voices
                    for (i, voice) in self.voices.iter_mut().enumerate() {
                        let on = value.bit(i as u8);
                        voice.keyed_on = on;
                        if on {
                            voice.key_on(aram, self.sample_directory);
                        }
                    }
                }
                0x5C => {
                    // KOF: move the selected voices to release
                    for (i, voice) in self.voices.iter_mut().enumerate() {
                        let off = value.bit(i as u8);
                        voice.keyed_off = off;
                        if off {
                            voice.key_off();
                        }
                    }
                }
                0x6C => {
                    // FLG
                    self.noise_rate = value & 0x1F;
                    self.mute = value.bit(6);
                    self.soft_reset = value.bit(7);
                    if self.soft_reset {
                        for voice in &mut self.voices {
                            voice.key_off();
                            voice.envelope_level = 0;
                        }
                    }
                }
                0x7C => {
                    // ENDX: any write clears all end flags
                    for voice in &mut self.voices {
                        voice.end_flag = false;
                    }
                }
                0x3D => {
                    for (i, voice) in self.voices.iter_mut().enumerate() {
                        voice.output_noise = value.bit(i as u8);
                    }
                }
                0x5D => {
                    // DIR: sample directory in 256-byte steps
                    self.sample_directory = u16::from(value) << 8;
                }
                _ => {
                    // Echo registers (EVOL/EFB/EON/ESA/EDL/FIR) and unused
                    // slots: stored above, no processed effect
                }
            },
            _ => {}
        }
    }

    /// Generate one stereo output sample.
    pub fn clock(&mut self, aram: &AudioRam) -> (i16, i16) {
        self.noise.clock(self.noise_rate);

        let mut sum_l = 0_i32;
        let mut sum_r = 0_i32;

        for voice in &mut self.voices {
            let sample = voice.clock(aram, self.sample_directory, self.noise.output);

            sum_l += (i32::from(sample) * i32::from(voice.volume_l)) >> 6;
            sum_r += (i32::from(sample) * i32::from(voice.volume_r)) >> 6;
            sum_l = sum_l.clamp(i16::MIN.into(), i16::MAX.into());
            sum_r = sum_r.clamp(i16::MIN.into(), i16::MAX.into());
        }

        sum_l = ((sum_l * i32::from(self.master_volume_l)) >> 7)
            .clamp(i16::MIN.into(), i16::MAX.into());
        sum_r = ((sum_r * i32::from(self.master_volume_r)) >> 7)
            .clamp(i16::MIN.into(), i16::MAX.into());

        if self.mute {
            (0, 0)
        } else {
            (sum_l as i16, sum_r as i16)
        }
    }

    pub fn reset(&mut self) {
        self.mute = true;
        self.soft_reset = true;
        for voice in &mut self.voices {
            voice.key_off();
            voice.envelope_level = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aram_with_sample(blocks: &[[u8; 9]]) -> Box<AudioRam> {
        let mut aram: Box<AudioRam> = vec![0; 64 * 1024].into_boxed_slice().try_into().unwrap();

        // Directory at $0200, sample 0 start $0300, loop $0300
        aram[0x200] = 0x00;
        aram[0x201] = 0x03;
        aram[0x202] = 0x00;
        aram[0x203] = 0x03;

        for (i, block) in blocks.iter().enumerate() {
            aram[0x300 + i * 9..0x300 + (i + 1) * 9].copy_from_slice(block);
        }

        aram
    }

    fn setup_voice(dsp: &mut Dsp, aram: &AudioRam) {
        // DIR = $0200
        dsp.write_address(0x5D);
        dsp.write_register(0x02, aram);
        // Pitch = $1000 (1.0 samples per output sample)
        dsp.write_address(0x02);
        dsp.write_register(0x00, aram);
        dsp.write_address(0x03);
        dsp.write_register(0x10, aram);
        // Direct gain at maximum so the envelope is flat
        dsp.write_address(0x05);
        dsp.write_register(0x00, aram);
        dsp.write_address(0x07);
        dsp.write_register(0x7F, aram);
        // Key on voice 0
        dsp.write_address(0x4C);
        dsp.write_register(0x01, aram);
    }

    #[test]
    fn brr_filter_0_decodes_shifted_nibbles() {
        // One block, shift 12 produces clipped 15-bit full-scale steps
        let mut decoder = BrrDecoder::default();
        let aram = aram_with_sample(&[[
            0xC1, // shift 12, filter 0, end+loop
            0x70, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]]);
        decoder.restart(0x300);

        let first = decoder.decode_next(&aram, 0x300);
        // 7 << 12 >> 1 = 14336, within 15-bit range
        assert_eq!(first, 14336);
        let second = decoder.decode_next(&aram, 0x300);
        assert_eq!(second, 0);
    }

    #[test]
    fn brr_filter_1_uses_previous_sample() {
        let mut decoder = BrrDecoder::default();
        let aram = aram_with_sample(&[[
            0x45, // shift 4, filter 1, end+loop
            0x77, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]]);
        decoder.restart(0x300);

        let first = decoder.decode_next(&aram, 0x300);
        assert_eq!(first, 7 << 3);
        let second = decoder.decode_next(&aram, 0x300);
        // x + prev * 15/16
        assert_eq!(second, (7 << 3) + (7 << 3) * 15 / 16);
    }

    #[test]
    fn end_without_loop_keys_off() {
        let mut dsp = Dsp::new();
        let aram = aram_with_sample(&[[
            0xC1, // end + loop clear would be 0xC1&...: shift 12, filter 0, end=1, loop=0
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]]);

        // FLG: clear mute/reset
        dsp.write_address(0x6C);
        dsp.write_register(0x00, &aram);
        setup_voice(&mut dsp, &aram);

        // 16 samples to consume the block, one more to cross into the end
        for _ in 0..20 {
            dsp.clock(&aram);
        }

        assert_eq!(dsp.voices[0].phase, EnvelopePhase::Release);
        assert_eq!(dsp.voices[0].envelope_level, 0);
        // ENDX reports the voice
        dsp.write_address(0x7C);
        assert_eq!(dsp.read_register() & 0x01, 0x01);
    }

    #[test]
    fn end_with_loop_restarts_at_loop_address() {
        let mut dsp = Dsp::new();
        let aram = aram_with_sample(&[[
            0xC3, // shift 12, filter 0, end=1, loop=1
            0x70, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]]);

        dsp.write_address(0x6C);
        dsp.write_register(0x00, &aram);
        setup_voice(&mut dsp, &aram);

        for _ in 0..40 {
            dsp.clock(&aram);
        }

        // Still keyed on and decoding (the loop block is itself)
        assert_ne!(dsp.voices[0].phase, EnvelopePhase::Release);
        assert_eq!(dsp.voices[0].decoder.block_address, 0x300);
    }

    #[test]
    fn endx_write_clears_flags() {
        let mut dsp = Dsp::new();
        let aram = aram_with_sample(&[[0xC3, 0, 0, 0, 0, 0, 0, 0, 0]]);

        dsp.write_address(0x6C);
        dsp.write_register(0x00, &aram);
        setup_voice(&mut dsp, &aram);
        for _ in 0..20 {
            dsp.clock(&aram);
        }

        dsp.write_address(0x7C);
        assert_ne!(dsp.read_register(), 0);
        dsp.write_register(0x00, &aram);
        assert_eq!(dsp.read_register(), 0);
    }
}
