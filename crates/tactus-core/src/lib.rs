//! Real-time audio output scheduling and buffer-exchange engine.
//!
//! Sits between a musical tick clock and a hardware audio callback:
//! it reconciles wall-clock buffer periods with 16th-note ticks at
//! arbitrary bpm, rotates an 8-slot buffer ring between producers and
//! the driver, and synchronizes the fill thread with the callback
//! thread around each period.
//!
//! # Primary API
//!
//! - [`SoundcardEngine`]: one engine per device, implementing the
//!   [`Soundcard`] contract backends and observers program against
//! - [`TimingSchedule`]: delay/attack tables plus 256th sub-tick tables
//! - [`BufferRing`] / [`SlotHandle`] / [`SlotGuard`]: the slot pipeline
//! - [`TicStateMachine`] / [`PlaybackCursor`]: the transport
//! - [`CallbackSync`]: fill/callback handshake
//!
//! # Feature-gated APIs
//!
//! - `"cpal"`: [`CpalBackend`], a reference output driver (enabled by
//!   default)
//!
//! # Example
//!
//! ```
//! use tactus_core::{Presets, SoundcardEngine, Soundcard, Capability};
//!
//! let engine = SoundcardEngine::new(Presets::default(), Capability::Playback)?;
//! engine.set_bpm(140.0)?;
//! engine.start()?;
//!
//! // driven once per hardware period by the backend
//! engine.tic();
//! # Ok::<(), tactus_core::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::{Presets, SampleFormat};

pub(crate) mod lockfree;
pub use lockfree::{AtomicCounter, AtomicDouble, AtomicFlag};

mod schedule;
pub use schedule::{TimingSchedule, DEFAULT_PERIOD, NOTE_256TH_TABLE_COUNT};

mod ring;
pub use ring::{
    BufferRing, SlotGuard, SlotHandle, SubBlockGuard, DEFAULT_SUB_BLOCK_COUNT, RING_SLOT_COUNT,
};

pub(crate) mod transport;
pub use transport::{PlaybackCursor, TicOutcome, TicStateMachine};

mod sync;
pub use sync::{CallbackSync, SessionPhase};

mod soundcard;
pub use soundcard::{Capability, Soundcard};

mod engine;
pub use engine::{OffsetObserver, SoundcardEngine, DEFAULT_BPM, DEFAULT_DELAY_FACTOR};

#[cfg(feature = "cpal")]
mod output;

#[cfg(feature = "cpal")]
pub use output::CpalBackend;
