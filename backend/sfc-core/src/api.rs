//! Public interface and the master-clock scheduler
//!
//! The scheduler interleaves the three processors on a shared master
//! clock: the CPU gets a slot every 6 master cycles, the PPU every 4, and
//! the APU every 8, which coalesces into a repeating 24-cycle pattern.
//! Multi-cycle instructions stall their processor's subsequent slots so
//! each core paces correctly.

use crate::apu::Apu;
use crate::bus::Bus;
use crate::input::Inputs;
use crate::memory::dma::DmaUnit;
use crate::memory::{CpuInternalRegisters, Memory};
use crate::ppu::{Ppu, PpuTickEffect};
use bincode::{Decode, Encode};
use c65816::Cpu65816;
use sfc_common::frontend::{AudioSink, FrameSink, TickEffect};
use thiserror::Error;

const SCHEDULER_PERIOD: u64 = 24;
const CPU_DIVIDER: u64 = 6;
const PPU_DIVIDER: u64 = 4;
const APU_DIVIDER: u64 = 8;

const DEFAULT_LOOP_TRAP_THRESHOLD: u64 = 4_000_000;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ROM image too small to contain a header ({len} bytes)")]
    NoHeader { len: usize },
}

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Clone, Copy, Encode, Decode)]
pub struct EmulatorConfig {
    /// Stop the core once the CPU repeats the same one- or two-instruction
    /// loop this many times. Purely diagnostic; None disables the trap
    /// without changing machine behavior.
    pub loop_trap_threshold: Option<u64>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self { loop_trap_threshold: Some(DEFAULT_LOOP_TRAP_THRESHOLD) }
    }
}

/// Detects the CPU spinning on the same PC (or ping-ponging between two)
/// with no exit, which on this hardware almost always means the program
/// has hung waiting on something that will never arrive.
#[derive(Debug, Clone, Default, Encode, Decode)]
struct LoopTrap {
    last_pc: u32,
    second_last_pc: u32,
    repeat_count: u64,
}

impl LoopTrap {
    /// Returns true once the repeat count crosses the threshold.
    fn observe(&mut self, pc: u32, threshold: u64) -> bool {
        if pc == self.last_pc || pc == self.second_last_pc {
            self.repeat_count += 1;
        } else {
            self.repeat_count = 0;
        }

        self.second_last_pc = self.last_pc;
        self.last_pc = pc;

        self.repeat_count == threshold
    }
}

macro_rules! new_bus {
    ($self:expr) => {
        Bus {
            memory: &mut $self.memory,
            cpu_registers: &mut $self.cpu_registers,
            ppu: &mut $self.ppu,
            apu: &mut $self.apu,
            dma: &mut $self.dma,
        }
    };
}

#[derive(Debug, Encode, Decode)]
pub struct SfcEmulator {
    cpu: Cpu65816,
    cpu_registers: CpuInternalRegisters,
    memory: Memory,
    ppu: Ppu,
    apu: Apu,
    dma: DmaUnit,
    master_cycle: u64,
    cpu_stall: u8,
    loop_trap: LoopTrap,
    stopped: bool,
    config: EmulatorConfig,
}

impl SfcEmulator {
    /// Build a core around a cartridge image and reset it. The only
    /// failure mode is a structurally invalid ROM.
    pub fn create(rom: Vec<u8>, config: EmulatorConfig) -> LoadResult<Self> {
        Self::create_with_sram(rom, None, config)
    }

    pub fn create_with_sram(
        rom: Vec<u8>,
        initial_sram: Option<Vec<u8>>,
        config: EmulatorConfig,
    ) -> LoadResult<Self> {
        let memory = Memory::create(rom, initial_sram)?;

        let mut emulator = Self {
            cpu: Cpu65816::new(),
            cpu_registers: CpuInternalRegisters::new(),
            memory,
            ppu: Ppu::new(),
            apu: Apu::new(),
            dma: DmaUnit::new(),
            master_cycle: 0,
            cpu_stall: 0,
            loop_trap: LoopTrap::default(),
            stopped: false,
            config,
        };

        log::info!("Loaded '{}'", emulator.memory.cartridge_title());

        emulator.cpu.reset(&mut new_bus!(emulator));

        Ok(emulator)
    }

    /// Advance one 24-master-cycle scheduler round. Returns FrameRendered
    /// when the PPU finished a frame during the round, after the frame and
    /// pending audio have been handed to the sinks.
    pub fn tick<F, A>(
        &mut self,
        inputs: Inputs,
        frame_sink: &mut F,
        audio_sink: &mut A,
    ) -> TickEffect
    where
        F: FrameSink,
        A: AudioSink,
    {
        self.cpu_registers.set_inputs(inputs.p1, inputs.p2);

        let mut tick_effect = TickEffect::None;

        for _ in 0..SCHEDULER_PERIOD {
            if self.master_cycle % CPU_DIVIDER == 0 {
                self.cpu_slot();
            }
            if self.master_cycle % PPU_DIVIDER == 0 {
                match self.ppu.step() {
                    PpuTickEffect::None => {}
                    PpuTickEffect::EnteredVblank => {
                        self.cpu_registers.vblank_start();
                    }
                    PpuTickEffect::FrameComplete => {
                        self.cpu_registers.vblank_end();

                        frame_sink.accept_frame(self.ppu.frame_buffer(), self.ppu.frame_size());
                        let samples = self.apu.take_samples();
                        audio_sink.accept_samples(&samples);

                        tick_effect = TickEffect::FrameRendered;
                    }
                }
            }
            if self.master_cycle % APU_DIVIDER == 0 {
                self.apu.step();
            }

            self.master_cycle += 1;
        }

        tick_effect
    }

    fn cpu_slot(&mut self) {
        if self.cpu_stall > 0 {
            self.cpu_stall -= 1;
            return;
        }

        let cycles = self.cpu.step(&mut new_bus!(self));
        self.cpu_stall = cycles.saturating_sub(1);

        if let Some(threshold) = self.config.loop_trap_threshold {
            let registers = self.cpu.registers();
            let pc = (u32::from(registers.pbr) << 16) | u32::from(registers.pc);
            if self.loop_trap.observe(pc, threshold) {
                log::warn!("CPU stuck at {pc:06X} for {threshold} iterations; stopping");
                self.stopped = true;
            }
        }
    }

    /// Run until the next completed frame (or until the loop trap fires).
    pub fn run_frame<F, A>(
        &mut self,
        inputs: Inputs,
        frame_sink: &mut F,
        audio_sink: &mut A,
    ) where
        F: FrameSink,
        A: AudioSink,
    {
        while !self.stopped {
            if self.tick(inputs, frame_sink, audio_sink) == TickEffect::FrameRendered {
                break;
            }
        }
    }

    /// Whether a diagnostic detector has stopped execution.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn reset(&mut self) {
        log::info!("Resetting");

        self.cpu_registers.reset();
        self.ppu.reset();
        self.apu.reset();
        self.cpu.reset(&mut new_bus!(self));

        self.cpu_stall = 0;
        self.loop_trap = LoopTrap::default();
        self.stopped = false;
    }

    #[must_use]
    pub fn cartridge_title(&self) -> String {
        self.memory.cartridge_title()
    }

    /// Battery-backed SRAM contents, for hosts that persist them.
    #[must_use]
    pub fn sram(&self) -> Option<&[u8]> {
        self.memory.sram()
    }

    #[must_use]
    pub fn cpu(&self) -> &Cpu65816 {
        &self.cpu
    }

    #[must_use]
    pub fn frame_buffer(&self) -> &[sfc_common::frontend::Color] {
        self.ppu.frame_buffer()
    }

    /// Bitmask of general purpose DMA channels currently enabled; always
    /// zero outside of a transfer because GPDMA runs to completion.
    #[must_use]
    pub fn dma_enabled_mask(&self) -> u8 {
        self.dma.enabled_mask()
    }

    /// Read through the bus exactly as the CPU would, including register
    /// side effects. Intended for tests and debugging front-ends.
    pub fn debug_read(&mut self, address: u32) -> u8 {
        use c65816::traits::BusInterface;
        new_bus!(self).read(address)
    }

    /// Write through the bus exactly as the CPU would.
    pub fn debug_write(&mut self, address: u32, value: u8) {
        use c65816::traits::BusInterface;
        new_bus!(self).write(address, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_trap_counts_single_pc_spin() {
        let mut trap = LoopTrap::default();

        assert!(!trap.observe(0x8000, 10));
        for _ in 0..9 {
            assert!(!trap.observe(0x8000, 10));
        }
        assert!(trap.observe(0x8000, 10));
    }

    #[test]
    fn loop_trap_counts_two_instruction_cycle() {
        let mut trap = LoopTrap::default();

        trap.observe(0x8000, 10);
        trap.observe(0x8003, 10);
        let mut fired = false;
        for _ in 0..12 {
            fired |= trap.observe(0x8000, 10);
            fired |= trap.observe(0x8003, 10);
        }
        assert!(fired);
    }

    #[test]
    fn loop_trap_resets_on_progress() {
        let mut trap = LoopTrap::default();

        for pc in (0x8000..0x9000).step_by(2) {
            assert!(!trap.observe(pc, 4));
        }
    }
}
