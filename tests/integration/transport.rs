//! Transport integration tests.
//!
//! Drives the tick state machine through the `Soundcard` contract, one
//! call per simulated hardware period.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use tactus::prelude::*;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

#[test]
fn test_bar_advances_note_offset() {
    let engine = test_engine();
    engine.start().unwrap();

    for _ in 0..BAR_PERIODS {
        engine.tic();
    }

    assert_eq!(engine.note_offset(), 64);
    assert_eq!(engine.note_offset_absolute(), 64);
    // 64 ticks at 120 bpm is exactly two seconds
    assert_eq!(engine.uptime(), "0000:02.000");
}

#[test]
fn test_every_tick_boundary_is_observed() {
    let engine = test_engine();
    let fired = Arc::new(AtomicU64::new(0));
    let last_offset = Arc::new(AtomicU64::new(0));
    {
        let fired = Arc::clone(&fired);
        let last_offset = Arc::clone(&last_offset);
        engine.connect_offset_changed(Box::new(move |offset| {
            fired.fetch_add(1, Ordering::SeqCst);
            last_offset.store(offset, Ordering::SeqCst);
        }));
    }

    engine.start().unwrap();
    for _ in 0..BAR_PERIODS {
        engine.tic();
    }

    assert_eq!(fired.load(Ordering::SeqCst), 64);
    assert_eq!(last_offset.load(Ordering::SeqCst), 64);
}

#[test]
fn test_loop_wraps_keep_absolute_offset_monotonic() {
    let engine = test_engine();
    engine.set_loop(2, 5, true).unwrap();
    engine.start().unwrap();

    let mut previous_absolute = engine.note_offset_absolute();
    for _ in 0..400 {
        engine.tic();
        let absolute = engine.note_offset_absolute();
        assert!(absolute >= previous_absolute);
        previous_absolute = absolute;
        assert!(engine.note_offset() <= 5);
    }

    // several wraps happened, each adds the region length
    let loop_offset = engine.loop_offset();
    assert!(loop_offset > 0);
    assert_eq!(loop_offset % 4, 0);
}

#[test]
fn test_tempo_change_mid_session() {
    let engine = test_engine();
    engine.start().unwrap();
    for _ in 0..10 {
        engine.tic();
    }

    let before = engine.absolute_delay();
    engine.set_bpm(240.0).unwrap();
    assert_relative_eq!(engine.absolute_delay(), before / 2.0, epsilon = 1e-9);

    // the transport keeps running against the new tables
    let offset = engine.note_offset();
    for _ in 0..BAR_PERIODS {
        engine.tic();
    }
    assert!(engine.note_offset() > offset);
    assert!(engine.attack() < engine.presets().buffer_size);
}

#[test]
fn test_sub_tick_families_stay_consistent() {
    let engine = test_engine();
    engine.start().unwrap();

    assert_relative_eq!(
        engine.note_256th_delay(),
        engine.absolute_delay() / 16.0,
        epsilon = 1e-12
    );
    assert_eq!(engine.note_256th_attack_at_position(0), 0);

    for _ in 0..BAR_PERIODS {
        engine.tic();
        assert!(engine.note_256th_offset() <= engine.note_256th_offset_last());
        assert!(engine.note_256th_attack() < engine.presets().buffer_size);
    }
}

#[test]
fn test_restart_rewinds_to_start_offset() {
    let engine = test_engine();
    engine.start().unwrap();
    for _ in 0..BAR_PERIODS {
        engine.tic();
    }
    assert_eq!(engine.note_offset(), 64);

    engine.stop();
    engine.start().unwrap();
    assert_eq!(engine.note_offset(), 0);
    assert_eq!(engine.note_offset_absolute(), 0);
}
