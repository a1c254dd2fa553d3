//! The soundcard engine: composition of schedule, ring, transport, and
//! callback sync behind the [`Soundcard`] contract.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::config::Presets;
use crate::lockfree::{AtomicDouble, AtomicFlag};
use crate::ring::{BufferRing, SlotGuard, SlotHandle, SubBlockGuard, DEFAULT_SUB_BLOCK_COUNT};
use crate::schedule::TimingSchedule;
use crate::soundcard::{Capability, Soundcard};
use crate::sync::CallbackSync;
use crate::transport::{PlaybackCursor, TicOutcome, TicStateMachine};
use crate::{Error, Result};

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_DELAY_FACTOR: f64 = 1.0;

/// Invoked on every tick boundary with the new note offset.
pub type OffsetObserver = Box<dyn Fn(u64) + Send + Sync>;

struct EngineConfig {
    presets: Presets,
    sub_block_count: usize,
}

/// One engine per device, constructed with explicit collaborators; no
/// process-wide state.
///
/// Timing tables and the ring are published through `ArcSwap`, so the
/// per-period path never observes a half-reconfigured schedule and a
/// presets change atomically invalidates all outstanding slot handles.
pub struct SoundcardEngine {
    capability: Capability,
    config: Mutex<EngineConfig>,

    schedule: ArcSwap<TimingSchedule>,
    ring: ArcSwap<BufferRing>,

    cursor: Arc<PlaybackCursor>,
    machine: Mutex<TicStateMachine>,
    sync: CallbackSync,

    bpm: AtomicDouble,
    delay_factor: AtomicDouble,
    starting: AtomicFlag,
    playing: AtomicFlag,

    offset_observer: Mutex<Option<OffsetObserver>>,
}

impl SoundcardEngine {
    pub fn new(presets: Presets, capability: Capability) -> Result<Self> {
        let schedule = TimingSchedule::compute(&presets, DEFAULT_BPM, DEFAULT_DELAY_FACTOR)?;
        let ring = BufferRing::new(&presets, DEFAULT_SUB_BLOCK_COUNT);

        let cursor = Arc::new(PlaybackCursor::new());
        let machine = TicStateMachine::new(Arc::clone(&cursor));

        Ok(Self {
            capability,
            config: Mutex::new(EngineConfig {
                presets,
                sub_block_count: DEFAULT_SUB_BLOCK_COUNT,
            }),
            schedule: ArcSwap::from_pointee(schedule),
            ring: ArcSwap::from_pointee(ring),
            cursor,
            machine: Mutex::new(machine),
            sync: CallbackSync::new(),
            bpm: AtomicDouble::new(DEFAULT_BPM),
            delay_factor: AtomicDouble::new(DEFAULT_DELAY_FACTOR),
            starting: AtomicFlag::new(false),
            playing: AtomicFlag::new(false),
            offset_observer: Mutex::new(None),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(Presets::default(), Capability::Playback)
    }

    /// The session handshake, exposed to the backend driver.
    pub fn sync(&self) -> &CallbackSync {
        &self.sync
    }

    pub fn cursor(&self) -> &Arc<PlaybackCursor> {
        &self.cursor
    }

    pub fn schedule(&self) -> Arc<TimingSchedule> {
        self.schedule.load_full()
    }

    /// Registers the sequencer-graph observer for tick boundaries.
    pub fn connect_offset_changed(&self, observer: OffsetObserver) {
        *self.offset_observer.lock() = Some(observer);
    }
}

impl Soundcard for SoundcardEngine {
    fn set_presets(&self, presets: Presets) -> Result<()> {
        let mut config = self.config.lock();
        // everything is computed before any state is replaced, so a
        // rejected change leaves the previous configuration intact
        let schedule =
            match TimingSchedule::compute(&presets, self.bpm.get(), self.delay_factor.get()) {
                Ok(schedule) => schedule,
                Err(err) => {
                    log::warn!("rejecting presets change: {err}");
                    return Err(err);
                }
            };
        let ring = BufferRing::new(&presets, config.sub_block_count);

        config.presets = presets;
        self.schedule.store(Arc::new(schedule));
        self.ring.store(Arc::new(ring));
        Ok(())
    }

    fn presets(&self) -> Presets {
        self.config.lock().presets.clone()
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn start(&self) -> Result<()> {
        if self.playing.get() {
            return Ok(());
        }
        self.starting.set(true);

        let schedule = self.schedule.load();
        self.machine.lock().reset(&schedule);
        self.sync.start_session();

        self.playing.set(true);
        self.starting.set(false);
        log::debug!(
            "playback started at note offset {}",
            self.cursor.note_offset()
        );
        Ok(())
    }

    fn stop(&self) {
        if !self.playing.swap(false) {
            return;
        }
        self.sync.stop_session();
        log::debug!(
            "playback stopped at note offset {}",
            self.cursor.note_offset()
        );
    }

    fn is_starting(&self) -> bool {
        self.starting.get()
    }

    fn is_playing(&self) -> bool {
        self.playing.get()
    }

    fn tic(&self) {
        if !self.playing.get() {
            // not an error: tic before start is ignored
            return;
        }
        let schedule = self.schedule.load();
        let outcome = self.machine.lock().tic(&schedule);

        if outcome != TicOutcome::WithinTick {
            if let Some(observer) = self.offset_observer.lock().as_ref() {
                observer(self.cursor.note_offset());
            }
        }
    }

    fn get_buffer(&self) -> SlotHandle {
        self.ring.load().get_buffer()
    }

    fn get_next_buffer(&self) -> SlotHandle {
        self.ring.load().get_next_buffer()
    }

    fn get_prev_buffer(&self) -> SlotHandle {
        self.ring.load().get_prev_buffer()
    }

    fn switch_buffer(&self) {
        self.ring.load().switch_buffer();
    }

    fn clear_buffer(&self, handle: SlotHandle) {
        self.ring.load().clear_buffer(handle);
    }

    fn lock_buffer(&self, handle: SlotHandle) -> Option<SlotGuard> {
        self.ring.load_full().lock_buffer(handle)
    }

    fn lock_sub_block(&self, handle: SlotHandle, sub_block: usize) -> Option<SubBlockGuard> {
        self.ring.load_full().lock_sub_block(handle, sub_block)
    }

    fn trylock_sub_block(&self, handle: SlotHandle, sub_block: usize) -> bool {
        self.ring.load().trylock_sub_block(handle, sub_block)
    }

    fn unlock_sub_block(&self, handle: SlotHandle, sub_block: usize) {
        self.ring.load().unlock_sub_block(handle, sub_block);
    }

    fn sub_block_count(&self) -> usize {
        self.config.lock().sub_block_count
    }

    fn set_sub_block_count(&self, count: usize) -> Result<()> {
        if count == 0 {
            let err = Error::InvalidPresets("sub_block_count must be > 0".into());
            log::warn!("rejecting sub_block_count change: {err}");
            return Err(err);
        }
        let mut config = self.config.lock();
        config.sub_block_count = count;
        self.ring
            .store(Arc::new(BufferRing::new(&config.presets, count)));
        Ok(())
    }

    fn set_bpm(&self, bpm: f64) -> Result<()> {
        let config = self.config.lock();
        let schedule = match TimingSchedule::compute(&config.presets, bpm, self.delay_factor.get())
        {
            Ok(schedule) => schedule,
            Err(err) => {
                log::warn!("rejecting bpm change: {err}");
                return Err(err);
            }
        };
        self.bpm.set(bpm);
        self.schedule.store(Arc::new(schedule));
        Ok(())
    }

    fn bpm(&self) -> f64 {
        self.bpm.get()
    }

    fn set_delay_factor(&self, delay_factor: f64) -> Result<()> {
        let config = self.config.lock();
        let schedule = match TimingSchedule::compute(&config.presets, self.bpm.get(), delay_factor)
        {
            Ok(schedule) => schedule,
            Err(err) => {
                log::warn!("rejecting delay_factor change: {err}");
                return Err(err);
            }
        };
        self.delay_factor.set(delay_factor);
        self.schedule.store(Arc::new(schedule));
        Ok(())
    }

    fn delay_factor(&self) -> f64 {
        self.delay_factor.get()
    }

    fn absolute_delay(&self) -> f64 {
        self.schedule.load().absolute_delay()
    }

    fn delay(&self) -> f64 {
        self.schedule.load().delay(self.cursor.tic_counter() as usize)
    }

    fn attack(&self) -> usize {
        self.schedule.load().attack(self.cursor.tic_counter() as usize)
    }

    fn delay_counter(&self) -> f64 {
        self.cursor.delay_counter()
    }

    fn set_note_offset(&self, offset: u64) {
        self.cursor.set_note_offset(offset);
    }

    fn note_offset(&self) -> u64 {
        self.cursor.note_offset()
    }

    fn set_note_offset_absolute(&self, offset: u64) {
        self.cursor.set_note_offset_absolute(offset);
    }

    fn note_offset_absolute(&self) -> u64 {
        self.cursor.note_offset_absolute()
    }

    fn set_start_note_offset(&self, offset: u64) {
        self.cursor.set_start_note_offset(offset);
    }

    fn start_note_offset(&self) -> u64 {
        self.cursor.start_note_offset()
    }

    fn set_loop(&self, left: u64, right: u64, do_loop: bool) -> Result<()> {
        if left > right {
            let err = Error::InvalidLoopRegion { left, right };
            log::warn!("rejecting loop region: {err}");
            return Err(err);
        }
        self.cursor.set_loop_region(left, right, do_loop);
        Ok(())
    }

    fn loop_region(&self) -> (u64, u64, bool) {
        self.cursor.loop_region()
    }

    fn loop_offset(&self) -> u64 {
        self.cursor.loop_offset()
    }

    fn note_256th_offset(&self) -> u64 {
        self.cursor.note_256th_offset()
    }

    fn note_256th_offset_last(&self) -> u64 {
        self.cursor.note_256th_offset_last()
    }

    fn note_256th_delay(&self) -> f64 {
        self.schedule.load().note_256th_delay()
    }

    fn note_256th_attack(&self) -> usize {
        let schedule = self.schedule.load();
        schedule.note_256th_attack_at(self.cursor.note_256th_offset())
    }

    fn note_256th_attack_at_position(&self, position: u64) -> usize {
        self.schedule.load().note_256th_attack_at(position)
    }

    fn uptime(&self) -> String {
        let schedule = self.schedule.load();
        let tick_seconds = schedule.absolute_delay() * schedule.buffer_size() as f64
            / schedule.samplerate() as f64;
        let seconds = self.cursor.note_offset_absolute() as f64 * tick_seconds;

        let minutes = (seconds / 60.0).floor() as u64;
        let remainder = seconds - minutes as f64 * 60.0;
        let whole = remainder.floor();
        let millis = ((remainder - whole) * 1000.0).round() as u64;
        format!("{:04}:{:02}.{:03}", minutes, whole as u64, millis.min(999))
    }
}

impl Drop for SoundcardEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
