//! Handshake between the fill thread and the driver callback thread.
//!
//! Exactly one buffer generation is handed off per hardware period. The
//! first period of a session goes through a rendezvous so both sides
//! agree on frame zero; afterwards the fill thread publishes each
//! generation and blocks until the callback has consumed it. `stop` and
//! an inactive backend client short-circuit every wait, so the protocol
//! degrades to free-running production instead of erroring.

use parking_lot::{Condvar, Mutex};

/// Lifecycle phase of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Resting state; no handshake is attempted.
    PassThrough,
    /// Session started, frame-zero rendezvous still pending.
    InitialCallback,
    /// Rendezvous done, one generation per period.
    Steady,
}

#[derive(Debug)]
struct SyncCore {
    phase: SessionPhase,
    client_active: bool,
    fill_arrived: bool,
    callback_arrived: bool,
    generation_ready: bool,
    generation_consumed: bool,
    callback_waiting: bool,
}

impl SyncCore {
    fn engaged(&self) -> bool {
        self.phase != SessionPhase::PassThrough && self.client_active
    }
}

/// The session-scoped synchronization state.
pub struct CallbackSync {
    core: Mutex<SyncCore>,
    callback_cv: Condvar,
    finish_cv: Condvar,
    presync_cv: Condvar,
}

impl Default for CallbackSync {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackSync {
    pub fn new() -> Self {
        Self {
            core: Mutex::new(SyncCore {
                phase: SessionPhase::PassThrough,
                client_active: false,
                fill_arrived: false,
                callback_arrived: false,
                generation_ready: false,
                generation_consumed: false,
                callback_waiting: false,
            }),
            callback_cv: Condvar::new(),
            finish_cv: Condvar::new(),
            presync_cv: Condvar::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.core.lock().phase
    }

    /// Arms the handshake for a new session.
    pub fn start_session(&self) {
        let mut core = self.core.lock();
        core.phase = SessionPhase::InitialCallback;
        core.fill_arrived = false;
        core.callback_arrived = false;
        core.generation_ready = false;
        core.generation_consumed = false;
        core.callback_waiting = false;
    }

    /// Enters pass-through and wakes every waiter. The only legal
    /// teardown of a running session.
    pub fn stop_session(&self) {
        let mut core = self.core.lock();
        core.phase = SessionPhase::PassThrough;
        drop(core);
        self.presync_cv.notify_all();
        self.callback_cv.notify_all();
        self.finish_cv.notify_all();
    }

    /// Marks the backend client connected or gone. While inactive the
    /// fill thread free-runs.
    pub fn set_client_active(&self, active: bool) {
        let mut core = self.core.lock();
        core.client_active = active;
        if !active {
            drop(core);
            self.presync_cv.notify_all();
            self.callback_cv.notify_all();
            self.finish_cv.notify_all();
        }
    }

    pub fn is_client_active(&self) -> bool {
        self.core.lock().client_active
    }

    /// Fill-thread side: publishes one finished generation, then blocks
    /// until the callback consumed it. Returns immediately in
    /// pass-through or without an active client.
    pub fn fill_complete(&self) {
        let mut core = self.core.lock();
        if !core.engaged() {
            return;
        }

        if core.phase == SessionPhase::InitialCallback {
            core.fill_arrived = true;
            if core.callback_arrived {
                core.phase = SessionPhase::Steady;
                self.presync_cv.notify_all();
            } else {
                while core.phase == SessionPhase::InitialCallback && core.client_active {
                    self.presync_cv.wait(&mut core);
                }
            }
            if !core.engaged() {
                return;
            }
        }

        core.generation_ready = true;
        if core.callback_waiting {
            self.callback_cv.notify_one();
        }

        while !core.generation_consumed && core.engaged() {
            self.finish_cv.wait(&mut core);
        }
        core.generation_consumed = false;
    }

    /// Callback side: blocks until a generation is available. `false`
    /// means no session is running and the callback should emit silence.
    pub fn callback_begin(&self) -> bool {
        let mut core = self.core.lock();
        if !core.engaged() {
            return false;
        }

        if core.phase == SessionPhase::InitialCallback {
            core.callback_arrived = true;
            if core.fill_arrived {
                core.phase = SessionPhase::Steady;
                self.presync_cv.notify_all();
            } else {
                while core.phase == SessionPhase::InitialCallback && core.client_active {
                    self.presync_cv.wait(&mut core);
                }
            }
            if !core.engaged() {
                return false;
            }
        }

        while !core.generation_ready && core.phase == SessionPhase::Steady && core.client_active {
            core.callback_waiting = true;
            self.callback_cv.wait(&mut core);
        }
        core.callback_waiting = false;

        // stop or client loss while waiting: no generation to transmit
        if !core.engaged() {
            return false;
        }
        core.generation_ready = false;
        true
    }

    /// Callback side: acknowledges the generation it just transmitted,
    /// releasing the fill thread.
    pub fn callback_finished(&self) {
        let mut core = self.core.lock();
        core.generation_consumed = true;
        drop(core);
        self.finish_cv.notify_one();
    }
}
