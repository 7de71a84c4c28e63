//! SNES emulation core: 65C816 CPU, PPU, APU, and the memory/DMA fabric
//! that binds them together.
//!
//! Host integration happens through the narrow interfaces in
//! `sfc_common::frontend`; the core never touches a window, an audio
//! device, or the filesystem.

mod apu;
mod bus;
mod memory;
mod ppu;

pub mod api;
pub mod input;

pub use api::{EmulatorConfig, LoadError, LoadResult, SfcEmulator};
pub use input::{Inputs, JoypadState};
