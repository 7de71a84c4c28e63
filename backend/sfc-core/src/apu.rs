//! Audio processing unit: SPC700 + 64KB ARAM + DSP
//!
//! The APU runs autonomously; the main CPU sees nothing but the four
//! mailbox ports at $2140-$2143. Out of reset the SPC700 executes the
//! embedded IPL boot ROM, which speaks the standard upload handshake over
//! those ports.

mod bootrom;
mod dsp;
mod timer;

use crate::apu::dsp::Dsp;
use crate::apu::timer::Timer;
use bincode::{Decode, Encode};
use sfc_common::num::GetBit;
use spc700::traits::BusInterface;
use spc700::Spc700;

const AUDIO_RAM_LEN: usize = 64 * 1024;

pub type AudioRam = [u8; AUDIO_RAM_LEN];

// One DSP output sample per this many SPC clocks at the scheduler's
// APU step rate (master clock / 8), keeping the long-run output at 32 kHz
const MASTER_CLOCK_FREQUENCY: u64 = 21_477_272;
const OUTPUT_FREQUENCY: u64 = 32_000;

// Timers 0/1 divide the SPC clock by 128, timer 2 by 16
const SLOW_TIMER_PERIOD: u16 = 128;
const FAST_TIMER_PERIOD: u16 = 16;

#[derive(Debug, Clone, Encode, Decode)]
struct ApuRegisters {
    boot_rom_mapped: bool,
    /// $2140-$2143 as written by the main CPU, read at $F4-$F7
    cpu_to_apu: [u8; 4],
    /// $F4-$F7 as written by the SPC700, read at $2140-$2143
    apu_to_cpu: [u8; 4],
    timers: [Timer; 3],
}

impl ApuRegisters {
    fn new() -> Self {
        Self {
            boot_rom_mapped: true,
            cpu_to_apu: [0; 4],
            apu_to_cpu: [0; 4],
            timers: [
                Timer::new(SLOW_TIMER_PERIOD),
                Timer::new(SLOW_TIMER_PERIOD),
                Timer::new(FAST_TIMER_PERIOD),
            ],
        }
    }

    fn read(&mut self, register: u16, dsp: &Dsp) -> u8 {
        match register {
            0x0 => 0x00,
            0x1 => {
                // CONTROL reads back the timer enables and ROM mapping
                u8::from(self.timers[0].enabled())
                    | (u8::from(self.timers[1].enabled()) << 1)
                    | (u8::from(self.timers[2].enabled()) << 2)
                    | (u8::from(self.boot_rom_mapped) << 7)
            }
            0x2 => dsp.read_address(),
            0x3 => dsp.read_register(),
            0x4..=0x7 => self.cpu_to_apu[(register - 4) as usize],
            0x8 | 0x9 => 0x00,
            0xA..=0xC => self.timers[(register - 0xA) as usize].target(),
            0xD..=0xF => self.timers[(register - 0xD) as usize].read_output(),
            _ => unreachable!("register index is always masked to 4 bits"),
        }
    }

    fn write(&mut self, register: u16, value: u8, dsp: &mut Dsp, aram: &AudioRam) {
        match register {
            0x0 => {
                log::debug!("APU test register written: {value:02X}");
            }
            0x1 => {
                // CONTROL
                self.timers[0].set_enabled(value.bit(0));
                self.timers[1].set_enabled(value.bit(1));
                self.timers[2].set_enabled(value.bit(2));

                if value.bit(4) {
                    self.cpu_to_apu[0] = 0;
                    self.cpu_to_apu[1] = 0;
                }
                if value.bit(5) {
                    self.cpu_to_apu[2] = 0;
                    self.cpu_to_apu[3] = 0;
                }

                self.boot_rom_mapped = value.bit(7);
            }
            0x2 => dsp.write_address(value),
            0x3 => dsp.write_register(value, aram),
            0x4..=0x7 => self.apu_to_cpu[(register - 4) as usize] = value,
            0x8 | 0x9 => {
                // AUXIO: plain R/W bytes on hardware, backed by ARAM here
            }
            0xA..=0xC => self.timers[(register - 0xA) as usize].set_target(value),
            0xD..=0xF => {
                // Timer outputs are read-only
            }
            _ => unreachable!("register index is always masked to 4 bits"),
        }
    }
}

/// The SPC700's view of its 64KB address space: ARAM with the I/O window
/// at $F0-$FF and the IPL ROM overlay at $FFC0-$FFFF while mapped.
struct Spc700Bus<'a> {
    aram: &'a mut Box<AudioRam>,
    registers: &'a mut ApuRegisters,
    dsp: &'a mut Dsp,
}

impl BusInterface for Spc700Bus<'_> {
    #[inline]
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x00F0..=0x00FF => self.registers.read(address & 0xF, self.dsp),
            0xFFC0..=0xFFFF if self.registers.boot_rom_mapped => {
                bootrom::IPL_ROM[(address & 0x3F) as usize]
            }
            _ => self.aram[address as usize],
        }
    }

    #[inline]
    fn write(&mut self, address: u16, value: u8) {
        if (0x00F0..=0x00FF).contains(&address) {
            self.registers.write(address & 0xF, value, self.dsp, self.aram);
        }
        // Writes land in ARAM underneath the I/O window and the ROM overlay
        self.aram[address as usize] = value;
    }
}

macro_rules! spc700_bus {
    ($self:expr) => {
        Spc700Bus {
            aram: &mut $self.aram,
            registers: &mut $self.registers,
            dsp: &mut $self.dsp,
        }
    };
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Apu {
    spc700: Spc700,
    dsp: Dsp,
    aram: Box<AudioRam>,
    registers: ApuRegisters,
    /// Cycles left before the SPC700 may execute its next instruction
    spc_stall: u8,
    sample_counter: u64,
    sample_buffer: Vec<(i16, i16)>,
}

impl Apu {
    pub fn new() -> Self {
        let mut apu = Self {
            spc700: Spc700::new(),
            dsp: Dsp::new(),
            aram: vec![0; AUDIO_RAM_LEN].into_boxed_slice().try_into().unwrap(),
            registers: ApuRegisters::new(),
            spc_stall: 0,
            sample_counter: 0,
            sample_buffer: Vec::with_capacity(1024),
        };

        apu.spc700.reset(&mut spc700_bus!(apu));

        apu
    }

    /// One APU step = one SPC clock; the scheduler calls this every 8
    /// master cycles. Multi-cycle instructions stall subsequent steps so
    /// the SPC700 paces correctly against its clock.
    pub fn step(&mut self) {
        if self.spc_stall > 0 {
            self.spc_stall -= 1;
        } else {
            let cycles = self.spc700.step(&mut spc700_bus!(self));
            self.spc_stall = cycles.saturating_sub(1);
        }

        for timer in &mut self.registers.timers {
            timer.tick();
        }

        // 32 kHz sample pacing against the master clock via a fractional
        // accumulator: steps arrive at master/8
        self.sample_counter += OUTPUT_FREQUENCY * 8;
        if self.sample_counter >= MASTER_CLOCK_FREQUENCY {
            self.sample_counter -= MASTER_CLOCK_FREQUENCY;
            let sample = self.dsp.clock(&self.aram);
            self.sample_buffer.push(sample);
        }
    }

    /// Main CPU reads of $2140-$2143.
    pub fn read_port(&mut self, address: u32) -> u8 {
        self.registers.apu_to_cpu[(address & 0x3) as usize]
    }

    /// Main CPU writes of $2140-$2143.
    pub fn write_port(&mut self, address: u32, value: u8) {
        self.registers.cpu_to_apu[(address & 0x3) as usize] = value;
    }

    /// Drain the samples generated since the last call.
    pub fn take_samples(&mut self) -> Vec<(i16, i16)> {
        std::mem::take(&mut self.sample_buffer)
    }

    pub fn reset(&mut self) {
        self.registers.boot_rom_mapped = true;
        self.registers.cpu_to_apu = [0; 4];
        self.registers.apu_to_cpu = [0; 4];
        self.spc_stall = 0;
        self.dsp.reset();
        self.spc700.reset(&mut spc700_bus!(self));
    }

    #[cfg(test)]
    pub(crate) fn spc700(&self) -> &Spc700 {
        &self.spc700
    }

    #[cfg(test)]
    pub(crate) fn aram(&self) -> &AudioRam {
        &self.aram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_until<F: Fn(&mut Apu) -> bool>(apu: &mut Apu, limit: u32, condition: F) -> bool {
        for _ in 0..limit {
            if condition(apu) {
                return true;
            }
            apu.step();
        }
        false
    }

    #[test]
    fn ipl_announces_ready_signature() {
        let mut apu = Apu::new();

        let ready = step_until(&mut apu, 10_000, |apu| {
            apu.read_port(0x2140) == 0xAA && apu.read_port(0x2141) == 0xBB
        });
        assert!(ready, "IPL never published $BBAA on the ports");
    }

    #[test]
    fn ipl_uploads_block_and_jumps() {
        let mut apu = Apu::new();

        assert!(step_until(&mut apu, 10_000, |apu| {
            apu.read_port(0x2140) == 0xAA && apu.read_port(0x2141) == 0xBB
        }));

        // Begin a transfer to $0200
        apu.write_port(0x2142, 0x00);
        apu.write_port(0x2143, 0x02);
        apu.write_port(0x2141, 0x01);
        apu.write_port(0x2140, 0xCC);

        assert!(
            step_until(&mut apu, 10_000, |apu| apu.read_port(0x2140) == 0xCC),
            "IPL never acknowledged the transfer command"
        );

        // An infinite BRA-to-self loop so the uploaded program stays put
        let mut block = vec![0x00; 16];
        block[0] = 0x2F;
        block[1] = 0xFE;
        for (i, &byte) in block.iter().enumerate() {
            apu.write_port(0x2141, byte);
            apu.write_port(0x2140, i as u8);

            assert!(
                step_until(&mut apu, 10_000, |apu| apu.read_port(0x2140) == i as u8),
                "IPL never acknowledged byte {i}"
            );
        }

        // Command execution at $0200: counter jumps by 2, port 1 zero
        apu.write_port(0x2141, 0x00);
        apu.write_port(0x2142, 0x00);
        apu.write_port(0x2143, 0x02);
        apu.write_port(0x2140, 16 + 2);

        assert!(
            step_until(&mut apu, 10_000, |apu| apu.read_port(0x2140) == 18),
            "IPL never acknowledged the execute command"
        );

        assert_eq!(&apu.aram()[0x0200..0x0210], &block[..]);

        // Give the SPC700 a moment to jump into the uploaded code
        for _ in 0..64 {
            apu.step();
        }
        let pc = apu.spc700().registers().pc;
        assert!(
            (0x0200..0x0300).contains(&pc),
            "SPC700 executing at {pc:04X}, expected the uploaded block"
        );
    }

    #[test]
    fn control_register_unmaps_boot_rom() {
        let mut apu = Apu::new();
        let mut bus = spc700_bus!(apu);

        // With the ROM mapped, $FFC0 reads the IPL
        assert_eq!(bus.read(0xFFC0), bootrom::IPL_ROM[0]);

        // Writes land in the ARAM underneath
        bus.write(0xFFC0, 0x42);
        assert_eq!(bus.read(0xFFC0), bootrom::IPL_ROM[0]);

        bus.write(0x00F1, 0x00);
        let mut bus = spc700_bus!(apu);
        assert_eq!(bus.read(0xFFC0), 0x42);
    }

    #[test]
    fn mailbox_ports_are_independent_directions() {
        let mut apu = Apu::new();

        apu.write_port(0x2140, 0x12);
        let mut bus = spc700_bus!(apu);
        assert_eq!(bus.read(0x00F4), 0x12);

        bus.write(0x00F4, 0x34);
        assert_eq!(apu.read_port(0x2140), 0x34);
        // The CPU-side write is still visible to the SPC700
        let mut bus = spc700_bus!(apu);
        assert_eq!(bus.read(0x00F4), 0x12);
    }
}
