#![allow(unsafe_code)]

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};

use crate::{
    bus::{BusController, BusDriver},
    error::BusError,
    signal::Signal,
};

/// A [`BusDriver`] shared between thread code and the bus interrupt handler.
///
/// Thread code goes through [`SharedBus::lock`], which runs the closure inside
/// a critical section so the handler cannot observe a half-issued phase. The
/// handler itself calls [`SharedBus::on_interrupt`]. The driver is borrowed
/// for the length of the closure; a second borrow while the first is live is
/// refused.
pub struct SharedBus<'a, R: BusController, S: Signal, const N: usize> {
    driver: Mutex<RefCell<BusDriver<'a, R, S, N>>>,
}

impl<'a, R: BusController, S: Signal, const N: usize> SharedBus<'a, R, S, N> {
    pub const fn new(driver: BusDriver<'a, R, S, N>) -> Self {
        Self {
            driver: Mutex::new(RefCell::new(driver)),
        }
    }

    /// Runs `f` with exclusive access to the driver.
    ///
    /// # Panics
    /// If called again from inside `f`. Use [`Self::try_lock`] where nesting
    /// is possible.
    pub fn lock<T>(&self, f: impl FnOnce(&mut BusDriver<'a, R, S, N>) -> T) -> T {
        critical_section::with(|cs| f(&mut *self.driver.borrow_ref_mut(cs)))
    }

    /// Like [`Self::lock`], but returns [`BusError::Busy`] instead of
    /// panicking when the driver is already borrowed.
    pub fn try_lock<T>(
        &self,
        f: impl FnOnce(&mut BusDriver<'a, R, S, N>) -> T,
    ) -> Result<T, BusError> {
        critical_section::with(|cs| {
            let mut driver = self
                .driver
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| BusError::Busy)?;
            Ok(f(&mut *driver))
        })
    }

    /// Runs `f` on the driver without entering a critical section.
    ///
    /// # Safety
    /// Nothing else may run code touching this bus until `f` returns. Inside
    /// the bus interrupt handler this holds as long as no higher-priority
    /// handler touches the same bus.
    ///
    /// # Panics
    /// If the driver is already borrowed.
    pub unsafe fn lock_unchecked<T>(&self, f: impl FnOnce(&mut BusDriver<'a, R, S, N>) -> T) -> T {
        // SAFETY: the caller guarantees exclusive execution, which is what the
        // token stands for.
        let cs = unsafe { CriticalSection::new() };
        f(&mut *self.driver.borrow_ref_mut(cs))
    }

    /// Transfer-complete interrupt entry point.
    pub fn on_interrupt(&self) -> bool {
        self.lock(|driver| driver.on_interrupt())
    }

    pub fn into_inner(self) -> BusDriver<'a, R, S, N> {
        self.driver.into_inner().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        signal::CountingSignal,
        test_support::{ScriptedBus, test_driver},
    };

    #[test]
    fn interrupt_read_completes_across_threads() {
        let signal = CountingSignal::new(0);
        let mut driver = test_driver(&signal);
        driver.regs_mut().respond(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        let bus = SharedBus::new(driver);

        bus.lock(|bus| bus.read_register_async(0x01, 6)).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                // Stand-in for six transfer-complete interrupts.
                while !bus.on_interrupt() {
                    std::thread::yield_now();
                }
            });

            signal.wait();
        });

        let bytes = bus.lock(|bus| bus.take_read()).unwrap();
        assert_eq!(bytes.as_slice(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn nested_access_is_refused() {
        let signal = CountingSignal::new(0);
        let bus = SharedBus::new(test_driver(&signal));

        let (inner, pending) = bus.lock(|outer| {
            let inner = bus.try_lock(|inner| inner.read_register_async(0x01, 2));
            (inner, outer.is_read_pending())
        });

        assert_eq!(inner, Err(BusError::Busy));
        assert!(!pending);
        assert!(bus.lock(|bus| bus.regs().trace().is_empty()));
    }

    #[test]
    fn try_lock_runs_when_free() {
        let signal = CountingSignal::new(0);
        let bus = SharedBus::new(test_driver(&signal));

        assert_eq!(bus.try_lock(|bus| bus.write_register(0x2A, 0x01)), Ok(Ok(())));
    }

    #[test]
    fn unchecked_access_reaches_driver() {
        let signal = CountingSignal::new(0);
        let bus = SharedBus::new(test_driver(&signal));

        // Single-threaded test, nothing else touches the bus.
        let pending = unsafe { bus.lock_unchecked(|bus| bus.is_read_pending()) };
        assert!(!pending);
    }

    #[test]
    fn into_inner_returns_driver() {
        let signal = CountingSignal::new(0);
        let bus = SharedBus::new(test_driver(&signal));

        bus.lock(|bus| bus.write_register(0x2A, 0x01)).unwrap();
        let driver = bus.into_inner();

        let regs: &ScriptedBus = driver.regs();
        assert_eq!(regs.trace().len(), 8);
    }
}
