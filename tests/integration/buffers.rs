//! Buffer ring integration tests.
//!
//! Producer and consumer on separate threads, exchanging slot handles
//! across the rotation the way the fill thread and a driver would.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tactus::prelude::*;
use tactus::RING_SLOT_COUNT;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

#[test]
fn test_handle_written_on_one_thread_reads_back_on_another() {
    let engine = test_engine();

    let handle = engine.get_next_buffer();
    {
        let guard = engine.lock_buffer(handle).unwrap();
        let bytes = unsafe { guard.bytes_mut() };
        bytes[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    }
    engine.switch_buffer();
    assert_eq!(engine.get_buffer(), handle);

    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let guard = engine.lock_buffer(handle).unwrap();
            guard.bytes()[..4].to_vec()
        })
    };
    assert_eq!(reader.join().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_sub_block_contention_between_threads() {
    let engine = test_engine();
    let handle = engine.get_buffer();
    assert!(engine.trylock_sub_block(handle, 0));

    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();

    let contender = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            // sub-block 0 is held by the main thread, 1 is free
            let blocked = !engine.trylock_sub_block(handle, 0);
            let free = engine.trylock_sub_block(handle, 1);
            if free {
                engine.unlock_sub_block(handle, 1);
            }
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            let reacquired = engine.trylock_sub_block(handle, 0);
            if reacquired {
                engine.unlock_sub_block(handle, 0);
            }
            (blocked, free, reacquired)
        })
    };

    held_rx.recv().unwrap();
    engine.unlock_sub_block(handle, 0);
    release_tx.send(()).unwrap();

    let (blocked, free, reacquired) = contender.join().unwrap();
    assert!(blocked);
    assert!(free);
    assert!(reacquired);
}

#[test]
fn test_channels_fill_in_parallel_through_sub_blocks() {
    let engine = test_engine();
    let handle = engine.get_buffer();
    let per_channel = engine.sub_block_count();

    let writers: Vec<_> = (0..2usize)
        .map(|channel| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for block in 0..per_channel {
                    let guard = engine
                        .lock_sub_block(handle, channel * per_channel + block)
                        .unwrap();
                    unsafe { guard.bytes_mut() }.fill(channel as u8 + 1);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    // channel-major layout: each writer covered exactly its half
    let guard = engine.lock_buffer(handle).unwrap();
    let half = guard.bytes().len() / 2;
    assert!(guard.bytes()[..half].iter().all(|&b| b == 1));
    assert!(guard.bytes()[half..].iter().all(|&b| b == 2));
}

#[test]
fn test_rotation_is_cyclic_over_all_slots() {
    let engine = test_engine();
    let first = engine.get_buffer();

    let mut seen = vec![first];
    for _ in 0..RING_SLOT_COUNT - 1 {
        engine.switch_buffer();
        let handle = engine.get_buffer();
        assert!(!seen.contains(&handle));
        seen.push(handle);
    }
    engine.switch_buffer();
    assert_eq!(engine.get_buffer(), first);
}

#[test]
fn test_presets_change_invalidates_outstanding_handles() {
    let engine: Arc<dyn Soundcard> = test_engine();
    let stale = engine.get_buffer();

    let mut presets = engine.presets();
    presets.buffer_size = 512;
    engine.set_presets(presets).unwrap();

    assert!(engine.lock_buffer(stale).is_none());
    assert!(!engine.trylock_sub_block(stale, 0));

    let fresh = engine.get_buffer();
    let guard = engine.lock_buffer(fresh).unwrap();
    assert_eq!(guard.bytes().len(), engine.presets().slot_bytes());
}

#[test]
fn test_clear_buffer_silences_a_written_slot() {
    let engine = test_engine();
    let handle = engine.get_buffer();

    {
        let guard = engine.lock_buffer(handle).unwrap();
        unsafe { guard.bytes_mut() }.fill(0x55);
    }
    engine.clear_buffer(handle);

    let guard = engine.lock_buffer(handle).unwrap();
    assert!(guard.bytes().iter().all(|&byte| byte == 0));
}
