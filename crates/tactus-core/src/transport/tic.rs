//! Tick-advance state machine.
//!
//! One transition is evaluated per hardware period, before that period
//! is rendered. A tick boundary fires during the period that contains
//! its attack frame: the integer part of `delay[tic_counter]` is the
//! number of periods the current tick spans, and `delay_counter` counts
//! the periods consumed so far.

use std::sync::Arc;

use crate::schedule::{TimingSchedule, DEFAULT_PERIOD};
use crate::transport::PlaybackCursor;

/// Result of one per-period evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicOutcome {
    /// No boundary this period; only the fine counters advanced.
    WithinTick,
    /// The musical tick advanced by one.
    TickBoundary,
    /// The tick advanced and wrapped back to the loop start.
    LoopWrap,
}

/// Drives [`PlaybackCursor`] from the per-period cadence.
pub struct TicStateMachine {
    cursor: Arc<PlaybackCursor>,
    // musical frame at which the period just evaluated begins
    frame_counter: u64,
}

impl TicStateMachine {
    pub fn new(cursor: Arc<PlaybackCursor>) -> Self {
        Self {
            cursor,
            frame_counter: 0,
        }
    }

    pub fn cursor(&self) -> &Arc<PlaybackCursor> {
        &self.cursor
    }

    /// Rewinds to the configured start offset and publishes the first
    /// period's sub-tick window.
    pub fn reset(&mut self, schedule: &TimingSchedule) {
        self.cursor.reset_for_start(DEFAULT_PERIOD);
        let start = self.cursor.note_offset();
        self.frame_counter = (start as f64 * schedule.tact_frames()).floor() as u64;

        let (lower, upper) = self.window(schedule, self.frame_counter);
        self.cursor.publish_note_256th_window(lower, upper);
        self.publish_lookahead(schedule);
    }

    /// Evaluates one hardware period.
    pub fn tic(&mut self, schedule: &TimingSchedule) -> TicOutcome {
        let tic = self.cursor.tic_counter() as usize;
        let span = schedule.delay(tic).floor();

        let outcome = if self.cursor.delay_counter() + 1.0 >= span {
            let (left, right, do_loop) = self.cursor.loop_region();
            // an inverted region never wraps; the transport plays through
            if do_loop && left <= right && self.cursor.note_offset() + 1 > right {
                self.cursor.commit_loop_wrap();
                // re-anchor the frame tiling at the loop start; the period
                // just entered begins on the wrapped pulse
                self.frame_counter = (self.cursor.note_offset() as f64
                    * schedule.tact_frames())
                .floor() as u64;
                TicOutcome::LoopWrap
            } else {
                self.cursor.commit_boundary(DEFAULT_PERIOD);
                self.frame_counter += schedule.buffer_size() as u64;
                TicOutcome::TickBoundary
            }
        } else {
            self.cursor.commit_within_tick();
            self.frame_counter += schedule.buffer_size() as u64;
            TicOutcome::WithinTick
        };

        if outcome != TicOutcome::WithinTick {
            self.publish_lookahead(schedule);
        }

        // sub-tick window of the period the caller is about to render
        let (lower, upper) = self.window(schedule, self.frame_counter);
        self.cursor.publish_note_256th_window(lower, upper);

        outcome
    }

    // Sub-ticks whose attack frame falls inside [frame, frame + buffer_size).
    // An empty window leaves the published bounds where they are.
    fn window(&self, schedule: &TimingSchedule, frame: u64) -> (u64, u64) {
        let step = schedule.note_256th_frames();
        let buffer_size = schedule.buffer_size() as u64;

        let lower = (frame as f64 / step).ceil() as u64;
        let upper_excl = ((frame + buffer_size) as f64 / step).ceil() as u64;
        if upper_excl > lower {
            (lower, upper_excl - 1)
        } else {
            (
                self.cursor.note_256th_offset(),
                self.cursor.note_256th_offset_last(),
            )
        }
    }

    // Walks sub-tick increments from the current attack to the next 16th
    // pulse. Deliberately accumulates from the rounded attack value, the
    // way the lookahead has always been produced, so its output can sit
    // one frame below the exact table position.
    fn publish_lookahead(&self, schedule: &TimingSchedule) {
        let step = schedule.note_256th_frames();
        let mut position = schedule.attack(self.cursor.tic_counter() as usize) as f64;
        for _ in 0..16 {
            position += step;
        }
        let attack = (position.floor() as usize) % schedule.buffer_size();
        self.cursor.publish_note_256th_attack_of_16th(attack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Presets, SampleFormat};

    fn presets() -> Presets {
        Presets {
            channels: 2,
            samplerate: 44100,
            buffer_size: 1024,
            format: SampleFormat::Int16,
        }
    }

    fn machine(bpm: f64) -> (TicStateMachine, TimingSchedule) {
        let schedule = TimingSchedule::compute(&presets(), bpm, 1.0).unwrap();
        let mut machine = TicStateMachine::new(Arc::new(PlaybackCursor::new()));
        machine.reset(&schedule);
        (machine, schedule)
    }

    #[test]
    fn test_first_boundary_fires_on_second_period() {
        // 44100/1024 at 120 bpm: absolute_delay ~= 1.3458, so the first
        // boundary lands in hardware period index 1
        let (mut machine, schedule) = machine(120.0);
        assert_eq!(machine.tic(&schedule), TicOutcome::TickBoundary);
        assert_eq!(machine.cursor().note_offset(), 1);
    }

    #[test]
    fn test_boundary_cadence_matches_frame_positions() {
        let (mut machine, schedule) = machine(120.0);
        let tact = schedule.tact_frames();
        let buffer_size = schedule.buffer_size() as f64;

        // boundary k sits at frame floor(k * tact) and must fire at the
        // evaluation of the period containing it; checked across the
        // first bar, after which the table re-anchors
        let mut fired_at = Vec::new();
        for call in 1u64..=86 {
            if machine.tic(&schedule) != TicOutcome::WithinTick {
                fired_at.push(call);
            }
        }

        assert_eq!(machine.cursor().note_offset(), 64);
        for k in 1u64..=64 {
            let expected = ((k as f64 * tact) / buffer_size).floor() as u64;
            assert_eq!(fired_at[(k - 1) as usize], expected, "boundary {k}");
        }
    }

    #[test]
    fn test_full_bar_consumes_exact_period_count() {
        let (mut machine, schedule) = machine(120.0);
        // 64 ticks x 1378.125 frames = 88200 frames = 86.13 periods
        let calls = (64.0 * schedule.tact_frames() / 1024.0).floor() as u64;
        assert_eq!(calls, 86);

        for _ in 0..calls {
            machine.tic(&schedule);
        }
        assert_eq!(machine.cursor().note_offset(), 64);
    }

    #[test]
    fn test_within_tick_advances_only_counters() {
        // delay ~= 2.69 periods per tick at 60 bpm, so within-ticks occur
        let schedule = TimingSchedule::compute(&presets(), 60.0, 1.0).unwrap();
        let mut machine = TicStateMachine::new(Arc::new(PlaybackCursor::new()));
        machine.reset(&schedule);

        let mut saw_within = false;
        let mut prev_offset = machine.cursor().note_offset();
        for _ in 0..50 {
            let counter_before = machine.cursor().delay_counter();
            match machine.tic(&schedule) {
                TicOutcome::WithinTick => {
                    saw_within = true;
                    assert_eq!(machine.cursor().note_offset(), prev_offset);
                    assert_eq!(machine.cursor().delay_counter(), counter_before + 1.0);
                }
                _ => {
                    assert_eq!(machine.cursor().delay_counter(), 0.0);
                    prev_offset = machine.cursor().note_offset();
                }
            }
        }
        assert!(saw_within);
    }

    #[test]
    fn test_loop_wrap() {
        let (mut machine, schedule) = machine(120.0);
        machine.cursor().set_loop_region(16, 32, true);

        let mut wrapped = false;
        for _ in 0..100 {
            let before = machine.cursor().note_offset();
            if machine.tic(&schedule) == TicOutcome::LoopWrap {
                assert_eq!(before, 32, "wrap fires when 33 would be next");
                wrapped = true;
                break;
            }
        }
        assert!(wrapped);

        let cursor = machine.cursor();
        assert_eq!(cursor.note_offset(), 16);
        assert_eq!(cursor.tic_counter(), 0);
        assert_eq!(cursor.delay_counter(), 0.0);
        assert_eq!(cursor.tact_counter(), 0.0);
        assert_eq!(cursor.note_256th_delay_counter(), 0.0);
    }

    #[test]
    fn test_inverted_loop_region_never_wraps() {
        let (mut machine, schedule) = machine(120.0);
        // bypasses the contract-level validation on purpose
        machine.cursor().set_loop_region(32, 16, true);

        for _ in 0..200 {
            assert_ne!(machine.tic(&schedule), TicOutcome::LoopWrap);
        }
        assert!(machine.cursor().note_offset() > 32);
        assert_eq!(machine.cursor().loop_offset(), 0);
    }

    #[test]
    fn test_absolute_clock_monotonic_across_wraps() {
        let (mut machine, schedule) = machine(120.0);
        machine.cursor().set_loop_region(2, 5, true);

        let mut prev_absolute = machine.cursor().note_offset_absolute();
        let mut wraps = 0;
        for _ in 0..200 {
            let outcome = machine.tic(&schedule);
            let absolute = machine.cursor().note_offset_absolute();
            match outcome {
                TicOutcome::WithinTick => assert_eq!(absolute, prev_absolute),
                TicOutcome::TickBoundary => assert_eq!(absolute, prev_absolute + 1),
                TicOutcome::LoopWrap => {
                    assert_eq!(absolute, prev_absolute + 1);
                    wraps += 1;
                }
            }
            prev_absolute = absolute;
        }
        assert!(wraps > 1);
    }

    #[test]
    fn test_sub_tick_window_contains_fired_pulse() {
        let (mut machine, schedule) = machine(120.0);

        // within the first bar, the window published for the period being
        // rendered always contains the pulse of the tick that fired
        for _ in 0..86 {
            if machine.tic(&schedule) == TicOutcome::TickBoundary {
                let pulse = 16 * machine.cursor().note_offset();
                let lower = machine.cursor().note_256th_offset();
                let upper = machine.cursor().note_256th_offset_last();
                assert!(
                    lower <= pulse && pulse <= upper,
                    "pulse {} outside window {}..={}",
                    pulse,
                    lower,
                    upper
                );
            }
        }
    }

    #[test]
    fn test_lookahead_within_one_frame_of_table() {
        let (mut machine, schedule) = machine(120.0);
        let buffer_size = schedule.buffer_size();

        for _ in 0..200 {
            if machine.tic(&schedule) == TicOutcome::TickBoundary {
                let lookahead = machine.cursor().note_256th_attack_of_16th();
                let next_tic = (machine.cursor().tic_counter() as usize + 1) % DEFAULT_PERIOD;
                if next_tic == 0 {
                    // bar wrap re-anchors the table
                    continue;
                }
                let table = schedule.attack(next_tic);
                // accumulated walk may round one frame below the table
                let diff = (table + buffer_size - lookahead) % buffer_size;
                assert!(diff <= 1, "lookahead {} vs table {}", lookahead, table);
            }
        }
    }

    #[test]
    fn test_deterministic_replay() {
        let schedule = TimingSchedule::compute(&presets(), 133.7, 0.5).unwrap();

        let mut a = TicStateMachine::new(Arc::new(PlaybackCursor::new()));
        let mut b = TicStateMachine::new(Arc::new(PlaybackCursor::new()));
        a.reset(&schedule);
        b.reset(&schedule);

        for _ in 0..500 {
            assert_eq!(a.tic(&schedule), b.tic(&schedule));
            assert_eq!(a.cursor().note_offset(), b.cursor().note_offset());
            assert_eq!(
                a.cursor().note_256th_offset(),
                b.cursor().note_256th_offset()
            );
        }
    }

    #[test]
    fn test_start_note_offset_honored() {
        let (mut machine, schedule) = machine(120.0);
        machine.cursor().set_start_note_offset(130);
        machine.reset(&schedule);
        assert_eq!(machine.cursor().note_offset(), 130);
        assert_eq!(machine.cursor().note_256th_offset(), 16 * 130);

        machine.tic(&schedule);
        assert!(machine.cursor().note_offset() >= 130);
    }
}
