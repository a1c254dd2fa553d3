//! Session handshake integration tests.
//!
//! Runs the fill side and a fake driver callback on real threads, the
//! way a backend would bracket each hardware period.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tactus::prelude::*;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

const PERIODS: usize = 16;

#[test]
fn test_fill_and_callback_exchange_one_generation_per_period() {
    let engine = test_engine();
    engine.sync().set_client_active(true);
    engine.start().unwrap();

    let callback_side = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut consumed = 0;
            for _ in 0..PERIODS {
                engine.tic();
                if !engine.sync().callback_begin() {
                    continue;
                }
                let handle = engine.get_prev_buffer();
                if let Some(guard) = engine.lock_buffer(handle) {
                    // transmit: every byte of the generation is readable
                    assert_eq!(guard.bytes().len(), engine.presets().slot_bytes());
                }
                engine.sync().callback_finished();
                consumed += 1;
            }
            consumed
        })
    };

    for _ in 0..PERIODS {
        let handle = engine.get_next_buffer();
        if let Some(guard) = engine.lock_buffer(handle) {
            unsafe { guard.bytes_mut()[0] = 0x2a };
        }
        engine.switch_buffer();
        engine.sync().fill_complete();
    }

    assert_eq!(callback_side.join().unwrap(), PERIODS);
    assert!(engine.note_offset_absolute() > 0 || engine.delay_counter() > 0.0);

    engine.stop();
    engine.sync().set_client_active(false);
}

#[test]
fn test_stop_releases_blocked_callback() {
    let engine = test_engine();
    engine.sync().set_client_active(true);
    engine.start().unwrap();

    let callback_side = {
        let engine = Arc::clone(&engine);
        // no fill thread ever arrives, so this blocks in the rendezvous
        thread::spawn(move || engine.sync().callback_begin())
    };

    thread::sleep(Duration::from_millis(50));
    engine.stop();

    assert!(!callback_side.join().unwrap());
}

#[test]
fn test_fill_free_runs_without_a_client() {
    let engine = test_engine();
    engine.start().unwrap();

    // no backend ever activates: every handshake call returns at once
    for _ in 0..PERIODS {
        engine.tic();
        engine.switch_buffer();
        engine.sync().fill_complete();
    }

    assert!(!engine.sync().callback_begin());
    assert!(engine.note_offset_absolute() > 0 || engine.delay_counter() > 0.0);
}
