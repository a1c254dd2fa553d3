//! The capability contract hardware backends program against.

use crate::config::Presets;
use crate::ring::{SlotGuard, SlotHandle, SubBlockGuard};
use crate::Result;

/// Stream directions a device can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Playback,
    Capture,
    Duplex,
}

/// The stable interface between the engine, backend drivers, and the
/// read-only observers (sequencer graph, GUI, OSC).
///
/// A backend calls [`tic`](Soundcard::tic) once per hardware period and
/// brackets the slot it transmits with the lock family; the sequencer
/// graph reads the note-offset families to decide what to render into
/// the writable slot. Setters that take a `Result` reject invalid input
/// and leave the previous configuration observable.
pub trait Soundcard: Send + Sync {
    fn set_presets(&self, presets: Presets) -> Result<()>;
    fn presets(&self) -> Presets;
    fn capability(&self) -> Capability;

    fn start(&self) -> Result<()>;
    fn stop(&self);
    fn is_starting(&self) -> bool;
    fn is_playing(&self) -> bool;

    /// Advances the transport by one hardware period. A no-op before
    /// `start`.
    fn tic(&self);

    fn get_buffer(&self) -> SlotHandle;
    fn get_next_buffer(&self) -> SlotHandle;
    fn get_prev_buffer(&self) -> SlotHandle;
    fn switch_buffer(&self);
    fn clear_buffer(&self, handle: SlotHandle);
    fn lock_buffer(&self, handle: SlotHandle) -> Option<SlotGuard>;
    fn lock_sub_block(&self, handle: SlotHandle, sub_block: usize) -> Option<SubBlockGuard>;
    fn trylock_sub_block(&self, handle: SlotHandle, sub_block: usize) -> bool;
    fn unlock_sub_block(&self, handle: SlotHandle, sub_block: usize);
    fn sub_block_count(&self) -> usize;
    fn set_sub_block_count(&self, count: usize) -> Result<()>;

    fn set_bpm(&self, bpm: f64) -> Result<()>;
    fn bpm(&self) -> f64;
    fn set_delay_factor(&self, delay_factor: f64) -> Result<()>;
    fn delay_factor(&self) -> f64;

    /// Buffer periods per 16th tick.
    fn absolute_delay(&self) -> f64;
    /// Period span of the current tick.
    fn delay(&self) -> f64;
    /// Attack frame offset of the current tick.
    fn attack(&self) -> usize;
    fn delay_counter(&self) -> f64;

    fn set_note_offset(&self, offset: u64);
    fn note_offset(&self) -> u64;
    fn set_note_offset_absolute(&self, offset: u64);
    fn note_offset_absolute(&self) -> u64;
    fn set_start_note_offset(&self, offset: u64);
    fn start_note_offset(&self) -> u64;

    fn set_loop(&self, left: u64, right: u64, do_loop: bool) -> Result<()>;
    fn loop_region(&self) -> (u64, u64, bool);
    fn loop_offset(&self) -> u64;

    fn note_256th_offset(&self) -> u64;
    fn note_256th_offset_last(&self) -> u64;
    fn note_256th_delay(&self) -> f64;
    /// Attack of the current sub-tick.
    fn note_256th_attack(&self) -> usize;
    /// Attack of an arbitrary absolute sub-tick.
    fn note_256th_attack_at_position(&self, position: u64) -> usize;

    /// Wall-clock position of the transport, `MMMM:SS.mmm`.
    fn uptime(&self) -> String;
}
