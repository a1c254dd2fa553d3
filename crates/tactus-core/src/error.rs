//! Error types for tactus-core.

use thiserror::Error;

/// Error type for tactus-core operations.
///
/// Only configuration-time failures are represented here. Runtime
/// conditions the engine tolerates (tic before init, inactive backend
/// client, foreign buffer handles) are deliberately not errors; they
/// degrade to no-ops or `false` returns instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid presets: {0}")]
    InvalidPresets(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid bpm: {0}. Must be between 1.0 and 999.0")]
    InvalidBpm(f64),

    #[error("Invalid delay factor: {0}. Must be positive")]
    InvalidDelayFactor(f64),

    #[error("Invalid loop region: left={left}, right={right}")]
    InvalidLoopRegion { left: u64, right: u64 },

    #[cfg(feature = "cpal")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "cpal")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "cpal")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "cpal")]
    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
