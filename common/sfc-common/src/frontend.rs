//! Interfaces binding the emulation core to a host frontend
//!
//! The core never talks to a window or an audio device directly; it hands
//! completed frames and sample batches to whatever sink the host provides.

use bincode::{Decode, Encode};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable, Encode, Decode)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    #[must_use]
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

impl Default for Color {
    #[inline]
    fn default() -> Self {
        Self::BLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    None,
    FrameRendered,
}

/// Receives completed video frames.
///
/// The frame buffer is only guaranteed consistent until the next frame
/// boundary; a sink that wants to keep the pixels must copy them.
pub trait FrameSink {
    /// Consume a completed frame. `frame_buffer` holds at least
    /// `frame_size.width * frame_size.height` pixels in row-major order.
    fn accept_frame(&mut self, frame_buffer: &[Color], frame_size: FrameSize);
}

/// Receives generated audio.
///
/// Samples are signed 16-bit stereo pairs at 32 kHz, interleaved L,R.
/// The sink must not block; masking underruns is its responsibility.
pub trait AudioSink {
    fn accept_samples(&mut self, samples: &[(i16, i16)]);
}

/// A sink that drops everything; useful for tests and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn accept_frame(&mut self, _frame_buffer: &[Color], _frame_size: FrameSize) {}
}

impl AudioSink for NullSink {
    fn accept_samples(&mut self, _samples: &[(i16, i16)]) {}
}
