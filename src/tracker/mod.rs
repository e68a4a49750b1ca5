//! Key state tracking
//!
//! Holds the physical and virtual down sets, per-key state versions, the
//! transition history and the reference-counted input locks. Only the input
//! funnel mutates this state.

mod history;
mod locks;
mod state;

pub use history::{History, KeyState};
pub use locks::{InputLocks, LockKind};
pub use state::KeyTracker;
