//! # Reentrancy Guards
//!
//! Scoped counters that keep the two synchronization directions from
//! feeding back into each other.
//!
//! ```text
//! UI edit ──> [ui_to_engine entered] ──> push to engine
//!                                        (engine→UI pull skipped)
//!
//! engine poll ──> [engine_to_ui entered] ──> write node fields
//!                                            (UI→engine writeback skipped)
//! ```
//!
//! A [`GuardToken`] decrements on drop, so the counter is restored on every
//! exit path including unwinding.

use std::cell::Cell;
use std::rc::Rc;

/// A single nesting counter.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    depth: Cell<u32>,
}

impl ReentrancyGuard {
    /// Creates a guard that is not entered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: Cell::new(0),
        }
    }

    /// Increments the counter until the returned token is dropped.
    #[must_use = "the guard is released as soon as the token is dropped"]
    pub fn enter(&self) -> GuardToken<'_> {
        self.depth.set(self.depth.get() + 1);
        GuardToken { guard: self }
    }

    /// Returns true while at least one token is alive.
    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.depth.get() > 0
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }
}

/// Scope token returned by [`ReentrancyGuard::enter`].
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        let depth = self.guard.depth.get();
        self.guard.depth.set(depth.saturating_sub(1));
    }
}

/// The two direction guards shared by every handler of one coordinator.
#[derive(Debug, Default, Clone)]
pub struct SyncGuards {
    /// Entered while a UI edit is being pushed to the engine.
    pub ui_to_engine: Rc<ReentrancyGuard>,
    /// Entered while engine state is being written into the UI model.
    pub engine_to_ui: Rc<ReentrancyGuard>,
}

impl SyncGuards {
    /// Creates both guards, not entered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a UI→engine handler may act now.
    #[must_use]
    pub fn may_push(&self) -> bool {
        !self.engine_to_ui.is_entered() && !self.ui_to_engine.is_entered()
    }

    /// True if an engine→UI handler may act now.
    #[must_use]
    pub fn may_pull(&self) -> bool {
        !self.ui_to_engine.is_entered() && !self.engine_to_ui.is_entered()
    }
}
