//! Shared fixtures for the integration suite.
#![allow(dead_code)]

use std::sync::Arc;

use tactus::prelude::*;

/// 44.1 kHz / 1024 frames / 120 bpm. One 16th tick spans 1.345825
/// periods, so a 64-tick bar covers 86 callback periods.
pub const BAR_PERIODS: usize = 86;

pub fn test_presets() -> Presets {
    Presets {
        channels: 2,
        samplerate: 44100,
        buffer_size: 1024,
        format: SampleFormat::Int16,
    }
}

pub fn test_engine() -> Arc<SoundcardEngine> {
    Arc::new(SoundcardEngine::new(test_presets(), Capability::Playback).unwrap())
}
