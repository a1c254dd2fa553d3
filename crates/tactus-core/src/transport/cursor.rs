//! Playback cursor.

use crate::lockfree::{AtomicCounter, AtomicDouble, AtomicFlag};

/// Transport position of the engine, one field per concern.
///
/// Every field is an individually-readable atomic so the callback
/// thread, the fill thread, and read-only observers (GUI, OSC) never
/// contend on a struct-wide lock. Mutation is owned by the tic state
/// machine and by the explicit seek operations.
#[derive(Debug, Default)]
pub struct PlaybackCursor {
    note_offset: AtomicCounter,
    note_offset_absolute: AtomicCounter,
    start_note_offset: AtomicCounter,

    delay_counter: AtomicDouble,
    tact_counter: AtomicDouble,
    tic_counter: AtomicCounter,

    note_256th_offset: AtomicCounter,
    note_256th_offset_last: AtomicCounter,
    note_256th_delay_counter: AtomicDouble,
    note_256th_attack_of_16th: AtomicCounter,

    loop_left: AtomicCounter,
    loop_right: AtomicCounter,
    do_loop: AtomicFlag,
    loop_offset: AtomicCounter,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loop-relative tick position.
    pub fn note_offset(&self) -> u64 {
        self.note_offset.get()
    }

    pub fn set_note_offset(&self, offset: u64) {
        self.note_offset.set(offset);
        self.note_256th_offset.set(16 * offset);
        self.note_256th_offset_last.set(16 * offset);
    }

    /// Monotonic transport clock, unaffected by looping.
    pub fn note_offset_absolute(&self) -> u64 {
        self.note_offset_absolute.get()
    }

    /// Explicit absolute seek; the only non-monotonic mutation.
    pub fn set_note_offset_absolute(&self, offset: u64) {
        self.note_offset_absolute.set(offset);
    }

    pub fn start_note_offset(&self) -> u64 {
        self.start_note_offset.get()
    }

    pub fn set_start_note_offset(&self, offset: u64) {
        self.start_note_offset.set(offset);
    }

    pub fn delay_counter(&self) -> f64 {
        self.delay_counter.get()
    }

    pub fn tact_counter(&self) -> f64 {
        self.tact_counter.get()
    }

    pub fn tic_counter(&self) -> u64 {
        self.tic_counter.get()
    }

    /// Lower bound of the current 256th sub-tick window.
    pub fn note_256th_offset(&self) -> u64 {
        self.note_256th_offset.get()
    }

    /// Upper bound of the current 256th sub-tick window.
    pub fn note_256th_offset_last(&self) -> u64 {
        self.note_256th_offset_last.get()
    }

    pub fn note_256th_delay_counter(&self) -> f64 {
        self.note_256th_delay_counter.get()
    }

    /// Precomputed attack of the next 16th pulse's sub-tick.
    pub fn note_256th_attack_of_16th(&self) -> usize {
        self.note_256th_attack_of_16th.get() as usize
    }

    pub fn loop_region(&self) -> (u64, u64, bool) {
        (
            self.loop_left.get(),
            self.loop_right.get(),
            self.do_loop.get(),
        )
    }

    pub fn set_loop_region(&self, left: u64, right: u64, do_loop: bool) {
        self.loop_left.set(left);
        self.loop_right.set(right);
        self.do_loop.set(do_loop);
    }

    /// Accumulated ticks skipped by loop wraps, mapping the absolute
    /// clock back onto the loop-relative one.
    pub fn loop_offset(&self) -> u64 {
        self.loop_offset.get()
    }

    pub(crate) fn commit_boundary(&self, period: usize) {
        self.note_offset.increment();
        self.note_offset_absolute.increment();
        let tic = self.tic_counter.get();
        self.tic_counter.set((tic + 1) % period as u64);
        self.delay_counter.set(0.0);
        self.tact_counter.set(self.tact_counter.get() + 1.0);
        self.note_256th_delay_counter.set(0.0);
    }

    pub(crate) fn commit_loop_wrap(&self) {
        let left = self.loop_left.get();
        let right = self.loop_right.get();
        self.loop_offset.add(right - left + 1);
        self.note_offset.set(left);
        self.note_offset_absolute.increment();
        self.tic_counter.set(0);
        self.delay_counter.set(0.0);
        self.tact_counter.set(0.0);
        self.note_256th_delay_counter.set(0.0);
    }

    pub(crate) fn commit_within_tick(&self) {
        self.delay_counter.set(self.delay_counter.get() + 1.0);
        self.note_256th_delay_counter
            .set(self.note_256th_delay_counter.get() + 1.0);
    }

    pub(crate) fn publish_note_256th_window(&self, lower: u64, upper: u64) {
        self.note_256th_offset.set(lower);
        self.note_256th_offset_last.set(upper);
    }

    pub(crate) fn publish_note_256th_attack_of_16th(&self, attack: usize) {
        self.note_256th_attack_of_16th.set(attack as u64);
    }

    pub(crate) fn reset_for_start(&self, period: usize) {
        let start = self.start_note_offset.get();
        self.note_offset.set(start);
        self.note_offset_absolute.set(start);
        self.tic_counter.set(start % period as u64);
        self.delay_counter.set(0.0);
        self.tact_counter.set(0.0);
        self.note_256th_delay_counter.set(0.0);
        self.loop_offset.set(0);
    }
}
