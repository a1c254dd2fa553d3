//! Delay/attack timing tables.
//!
//! A 16th tick spans `absolute_delay` hardware buffer periods:
//!
//! ```text
//! absolute_delay = 60 * ((samplerate / buffer_size) / bpm) * (1/16) * (1/delay_factor)
//! ```
//!
//! Since `absolute_delay` is fractional, tick boundaries drift through the
//! buffer. The schedule pins them down over one bar of [`DEFAULT_PERIOD`]
//! ticks: `attack[i]` is the frame offset of boundary `i` inside whichever
//! buffer it occupies, and `delay[i]` encodes the number of whole periods
//! between boundary `i` and boundary `i+1` in its integer part. A finer set
//! of rotating tables does the same for 256th sub-ticks.

use serde::{Deserialize, Serialize};

use crate::config::Presets;
use crate::{Error, Result};

/// Ticks per table, one bar at 16th resolution.
pub const DEFAULT_PERIOD: usize = 64;

/// Rotating 256th-note attack tables.
pub const NOTE_256TH_TABLE_COUNT: usize = 32;

const BPM_MIN: f64 = 1.0;
const BPM_MAX: f64 = 999.0;

/// Immutable timing snapshot.
///
/// Recomputed whenever bpm, delay_factor, samplerate, or buffer_size
/// changes, then published atomically; readers always observe a complete
/// table set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSchedule {
    samplerate: u32,
    buffer_size: usize,
    bpm: f64,
    delay_factor: f64,

    absolute_delay: f64,
    tact_frames: f64,

    delay: Vec<f64>,
    attack: Vec<usize>,

    note_256th_delay: f64,
    note_256th_attack: Vec<Vec<usize>>,
}

impl TimingSchedule {
    /// Computes the full table set. Pure and deterministic.
    pub fn compute(presets: &Presets, bpm: f64, delay_factor: f64) -> Result<Self> {
        presets.validate()?;
        if !bpm.is_finite() || !(BPM_MIN..=BPM_MAX).contains(&bpm) {
            return Err(Error::InvalidBpm(bpm));
        }
        if !delay_factor.is_finite() || delay_factor <= 0.0 {
            return Err(Error::InvalidDelayFactor(delay_factor));
        }

        let samplerate = presets.samplerate;
        let buffer_size = presets.buffer_size;

        let absolute_delay = 60.0 * ((samplerate as f64 / buffer_size as f64) / bpm)
            * (1.0 / 16.0)
            * (1.0 / delay_factor);
        let tact_frames = absolute_delay * buffer_size as f64;

        let mut delay = Vec::with_capacity(DEFAULT_PERIOD);
        let mut attack = Vec::with_capacity(DEFAULT_PERIOD);

        for i in 0..DEFAULT_PERIOD {
            let start = (i as f64 * tact_frames).floor() as u64;
            let end = ((i + 1) as f64 * tact_frames).floor() as u64;
            let frames = end - start;
            let offset = (start % buffer_size as u64) as usize;

            attack.push(offset);
            // integer part = whole periods between boundary i and i+1
            delay.push((offset as u64 + frames) as f64 / buffer_size as f64);
        }

        let note_256th_delay = absolute_delay / 16.0;
        let note_256th_frames = tact_frames / 16.0;

        let mut note_256th_attack = Vec::with_capacity(NOTE_256TH_TABLE_COUNT);
        for table in 0..NOTE_256TH_TABLE_COUNT {
            let mut entries = Vec::with_capacity(DEFAULT_PERIOD);
            for j in 0..DEFAULT_PERIOD {
                let sub_tick = (table * DEFAULT_PERIOD + j) as f64;
                let frame = (sub_tick * note_256th_frames).floor() as u64;
                entries.push((frame % buffer_size as u64) as usize);
            }
            note_256th_attack.push(entries);
        }

        Ok(Self {
            samplerate,
            buffer_size,
            bpm,
            delay_factor,
            absolute_delay,
            tact_frames,
            delay,
            attack,
            note_256th_delay,
            note_256th_attack,
        })
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn delay_factor(&self) -> f64 {
        self.delay_factor
    }

    /// Buffer periods per 16th tick.
    pub fn absolute_delay(&self) -> f64 {
        self.absolute_delay
    }

    /// Frames per 16th tick.
    pub fn tact_frames(&self) -> f64 {
        self.tact_frames
    }

    /// Buffer periods per 256th sub-tick.
    pub fn note_256th_delay(&self) -> f64 {
        self.note_256th_delay
    }

    /// Frames per 256th sub-tick.
    pub fn note_256th_frames(&self) -> f64 {
        self.tact_frames / 16.0
    }

    pub fn delay(&self, tic: usize) -> f64 {
        self.delay[tic % DEFAULT_PERIOD]
    }

    pub fn attack(&self, tic: usize) -> usize {
        self.attack[tic % DEFAULT_PERIOD]
    }

    /// Whole hardware periods between boundary `tic` and the next one.
    pub fn period_span(&self, tic: usize) -> u64 {
        self.delay[tic % DEFAULT_PERIOD].floor() as u64
    }

    /// Attack offset of an absolute 256th sub-tick, resolved through the
    /// rotating tables.
    pub fn note_256th_attack_at(&self, sub_tick: u64) -> usize {
        let table = (sub_tick as usize / DEFAULT_PERIOD) % NOTE_256TH_TABLE_COUNT;
        let entry = sub_tick as usize % DEFAULT_PERIOD;
        self.note_256th_attack[table][entry]
    }

    /// Attack offset of the 256th sub-tick opening 16th tick `note_offset`.
    pub fn note_256th_attack_of_16th(&self, note_offset: u64) -> usize {
        self.note_256th_attack_at(16 * note_offset)
    }
}
