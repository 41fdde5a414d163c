//! Cooperative cancellation flags.
//!
//! A [`RunFlag`] is set while an activity runs and cleared either when it
//! finishes or when someone asks it to stop. The running side only looks at
//! the flag at its own checkpoints, so a stop request takes effect at the next
//! checkpoint, not immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "in progress" flag that doubles as a stop request.
#[derive(Debug, Clone, Default)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
}

impl RunFlag {
    /// New flag in the stopped state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the activity as running.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Mark the activity as stopped, or ask a running one to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// True while running and no stop was requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the flag and stop it again when the guard drops.
    pub fn run(&self) -> RunGuard<'_> {
        self.start();
        RunGuard { flag: self }
    }
}

/// Clears its [`RunFlag`] on drop, including on early returns and errors.
#[derive(Debug)]
pub struct RunGuard<'a> {
    flag: &'a RunFlag,
}

impl RunGuard<'_> {
    /// True while no stop was requested.
    pub fn is_running(&self) -> bool {
        self.flag.is_running()
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = RunFlag::new();
        let other = flag.clone();
        assert!(!other.is_running());

        flag.start();
        assert!(other.is_running());

        other.stop();
        assert!(!flag.is_running());
    }

    #[test]
    fn test_guard_clears_on_drop() {
        let flag = RunFlag::new();
        {
            let guard = flag.run();
            assert!(guard.is_running());
            assert!(flag.is_running());
        }
        assert!(!flag.is_running());
    }
}
