//! Soundcard presets.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// PCM sample encoding of the exchanged buffers.
///
/// Determines the word size used for all buffer arithmetic. 24-bit
/// samples are carried in 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    Int8,
    Int16,
    Int24,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl SampleFormat {
    /// Bytes per sample as stored in a buffer slot.
    pub fn word_size(&self) -> usize {
        match self {
            SampleFormat::Int8 => 1,
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 => 4,
            SampleFormat::Int32 => 4,
            SampleFormat::Int64 => 8,
            SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 8,
        }
    }
}

impl core::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SampleFormat::Int8 => "int8",
            SampleFormat::Int16 => "int16",
            SampleFormat::Int24 => "int24",
            SampleFormat::Int32 => "int32",
            SampleFormat::Int64 => "int64",
            SampleFormat::Float32 => "float32",
            SampleFormat::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Stream configuration shared by the buffer ring and the timing tables.
///
/// Mutated only through [`Soundcard`](crate::Soundcard) setters; any
/// mutation reallocates the ring and recomputes the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presets {
    pub channels: usize,
    pub samplerate: u32,
    pub buffer_size: usize,
    pub format: SampleFormat,
}

impl Default for Presets {
    fn default() -> Self {
        Self {
            channels: 2,
            samplerate: 48000,
            buffer_size: 1024,
            format: SampleFormat::Int16,
        }
    }
}

impl Presets {
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::InvalidPresets("channels must be > 0".into()));
        }
        if self.samplerate == 0 {
            return Err(Error::InvalidPresets("samplerate must be > 0".into()));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidPresets("buffer_size must be > 0".into()));
        }
        Ok(())
    }

    /// Byte size of one buffer slot.
    pub fn slot_bytes(&self) -> usize {
        self.channels * self.buffer_size * self.format.word_size()
    }
}
