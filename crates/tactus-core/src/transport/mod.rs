//! Transport position and the per-period tick advance.

mod cursor;
mod tic;

pub use cursor::PlaybackCursor;
pub use tic::{TicOutcome, TicStateMachine};
