//! Audio pipeline for the Bluetooth audio I/O engine
//!
//! Provides lock-free ring buffers, a monotonic-clock rate pacer, and
//! per-channel volume scaling for streaming PCM between named pipes and
//! the codec workers.

mod pacer;
mod ring_buffer;
mod volume;

pub use pacer::{micros_for_frames, Pacer};
pub use ring_buffer::RingBuffer;
pub use volume::{ChannelVolume, Volume, VolumeScale};

/// Audio format description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u8,
    /// Bits per sample (typically 16)
    pub bits_per_sample: u8,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    /// Calculate bytes per sample (all channels)
    pub const fn bytes_per_sample(&self) -> usize {
        (self.channels as usize) * (self.bits_per_sample as usize / 8)
    }

    /// Calculate bytes per second
    pub const fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_sample()
    }
}
