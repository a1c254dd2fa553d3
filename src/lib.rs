//! # Tactus - tick-accurate soundcard scheduling
//!
//! Umbrella crate over the engine that sits between a musical sequencer
//! clock and a hardware audio callback:
//!
//! - **tactus-core** - timing tables, buffer ring, tick state machine,
//!   callback handshake, and the `Soundcard` contract
//!
//! ## Quick Start
//!
//! ```
//! use tactus::prelude::*;
//!
//! let engine = SoundcardEngine::new(Presets::default(), Capability::Playback)?;
//! engine.set_loop(16, 32, true)?;
//! engine.start()?;
//!
//! // the backend drives the transport once per hardware period
//! engine.tic();
//! # Ok::<(), tactus::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - cpal reference output backend
//! - `cpal` - the reference output backend

/// Re-export of tactus-core for direct access
pub use tactus_core as core;

pub use tactus_core::{
    // Lock-free primitives
    AtomicCounter,
    AtomicDouble,
    AtomicFlag,

    // Buffer ring
    BufferRing,
    // Contract
    Capability,
    // Callback handshake
    CallbackSync,

    // Error
    Error,
    OffsetObserver,
    // Transport
    PlaybackCursor,
    // Configuration
    Presets,

    Result,
    SampleFormat,
    SessionPhase,
    SlotGuard,
    SlotHandle,
    Soundcard,
    SoundcardEngine,
    SubBlockGuard,
    TicOutcome,
    TicStateMachine,

    // Timing tables
    TimingSchedule,
    DEFAULT_BPM,
    DEFAULT_DELAY_FACTOR,
    DEFAULT_PERIOD,
    DEFAULT_SUB_BLOCK_COUNT,
    NOTE_256TH_TABLE_COUNT,
    RING_SLOT_COUNT,
};

#[cfg(feature = "cpal")]
pub use tactus_core::CpalBackend;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        Capability, Presets, SampleFormat, SlotHandle, Soundcard, SoundcardEngine, TicOutcome,
    };

    #[cfg(feature = "cpal")]
    pub use crate::CpalBackend;
}
