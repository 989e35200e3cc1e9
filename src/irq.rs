use crate::signal::Signal;

/// One interrupt source paired with the signal its worker thread waits on.
///
/// Handlers go through [`InterruptSource::raise`], which fixes the order of
/// the handler body: clear the latched hardware condition, do the minimal
/// transfer that has to happen in interrupt context, then signal. Worker
/// threads go through [`InterruptSource::serve_once`] in their loop and do the
/// real work (filtering, packet emission, flash access) outside the handler.
#[derive(Debug)]
pub struct InterruptSource<'a, S: Signal> {
    signal: &'a S,
}

impl<'a, S: Signal> InterruptSource<'a, S> {
    pub const fn new(signal: &'a S) -> Self {
        Self { signal }
    }

    pub fn signal(&self) -> &'a S {
        self.signal
    }

    /// Handler body.
    ///
    /// `clear` acknowledges the hardware latch. `transfer` moves whatever data
    /// cannot wait for the thread and returns true when the worker should be
    /// woken. Both run against `ctx`, usually the peripheral's registers.
    /// Returns what `transfer` returned.
    pub fn raise<T: ?Sized>(
        &self,
        ctx: &mut T,
        clear: impl FnOnce(&mut T),
        transfer: impl FnOnce(&mut T) -> bool,
    ) -> bool {
        clear(ctx);
        let wake = transfer(ctx);
        if wake {
            self.signal.signal();
        }
        wake
    }

    /// One iteration of the worker loop: block until the handler signals, then run `work`.
    pub fn serve_once<R>(&self, work: impl FnOnce() -> R) -> R {
        self.signal.wait();
        work()
    }

    /// Runs `work` if the handler has already signalled, without blocking.
    pub fn poll<R>(&self, work: impl FnOnce() -> R) -> Option<R> {
        if self.signal.try_wait() {
            Some(work())
        } else {
            None
        }
    }
}

impl<S: Signal> Clone for InterruptSource<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Signal> Copy for InterruptSource<'_, S> {}
