//! Countable wake primitive used to hand work from interrupt handlers to threads.
//!
//! The scheduler owns the real implementation on target; this module fixes the
//! contract it must honour and ships [`CountingSignal`], a critical-section
//! version that spins in [`Signal::wait`]. It is good enough for host testing
//! and for bare-metal builds without a scheduler.

use core::cell::RefCell;

use critical_section::Mutex;

/// Create/signal/wait contract between an interrupt source and its worker thread.
///
/// - `signal` never blocks and is callable from interrupt context. It wakes the
///   oldest blocked waiter, or increments the count if nobody is waiting.
/// - `wait` blocks until the count is non-zero, then decrements it.
/// - One `signal` releases at most one `wait`.
pub trait Signal {
    /// Releases one waiter or banks one unit for the next `wait`.
    fn signal(&self);

    /// Blocks until a unit is available and consumes it.
    fn wait(&self);

    /// Consumes a unit if one is available without blocking.
    ///
    /// Returns false when the count is zero or when an earlier waiter is
    /// still queued ahead of the caller.
    fn try_wait(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct State {
    count: u32,
    next_ticket: u32,
    serving: u32,
}

/// Counting semaphore built on `critical-section`.
///
/// Waiters draw a ticket on entry and are released strictly in ticket order,
/// so a `signal` always goes to the oldest waiter.
pub struct CountingSignal {
    state: Mutex<RefCell<State>>,
}

impl CountingSignal {
    /// Creates a signal holding `initial` banked units. Usable in a `static`.
    pub const fn new(initial: u32) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                count: initial,
                next_ticket: 0,
                serving: 0,
            })),
        }
    }

    /// Units banked by `signal` and not yet consumed.
    pub fn count(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).count)
    }

    /// Number of threads currently blocked in `wait`.
    pub fn waiting(&self) -> u32 {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            state.next_ticket.wrapping_sub(state.serving)
        })
    }
}

impl Default for CountingSignal {
    fn default() -> Self {
        Self::new(0)
    }
}

impl core::fmt::Debug for CountingSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CountingSignal")
            .field("count", &self.count())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl Signal for CountingSignal {
    fn signal(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.count = state.count.saturating_add(1);
        });
    }

    fn wait(&self) {
        let ticket = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let ticket = state.next_ticket;
            state.next_ticket = state.next_ticket.wrapping_add(1);
            ticket
        });

        loop {
            let acquired = critical_section::with(|cs| {
                let mut state = self.state.borrow_ref_mut(cs);
                if state.serving == ticket && state.count > 0 {
                    state.count -= 1;
                    state.serving = state.serving.wrapping_add(1);
                    true
                } else {
                    false
                }
            });

            if acquired {
                return;
            }
            core::hint::spin_loop();
        }
    }

    fn try_wait(&self) -> bool {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.next_ticket == state.serving && state.count > 0 {
                state.count -= 1;
                true
            } else {
                false
            }
        })
    }
}

impl<S: Signal + ?Sized> Signal for &S {
    fn signal(&self) {
        (**self).signal()
    }

    fn wait(&self) {
        (**self).wait()
    }

    fn try_wait(&self) -> bool {
        (**self).try_wait()
    }
}
