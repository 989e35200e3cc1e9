use core::marker::PhantomData;

use crate::{
    bus::{BusConfig, BusController, BusDriver},
    signal::Signal,
};

// Builder states
pub struct NeedRegisters;
pub struct NeedCompletion;
pub struct Ready;

/// Type-state builder for [`BusDriver`].
///
/// Configuration setters are available in every state; the controller
/// registers and the completion signal must be supplied, in that order,
/// before `build` exists.
pub struct BusBuilder<'a, R, S, State> {
    config: BusConfig,
    regs: R,
    completion: &'a S,
    _state: PhantomData<State>,
}

// Start the builder
impl BusBuilder<'static, (), (), NeedRegisters> {
    pub fn new() -> Self {
        BusBuilder {
            config: BusConfig::default(),
            regs: (),
            completion: &(),
            _state: PhantomData,
        }
    }
}

impl Default for BusBuilder<'static, (), (), NeedRegisters> {
    fn default() -> Self {
        Self::new()
    }
}

// Configuration, available in every state
impl<'a, R, S, State> BusBuilder<'a, R, S, State> {
    /// 7-bit address of the peripheral selected at init.
    pub fn address(mut self, address: u8) -> Self {
        self.config.address = address;
        self
    }

    pub fn baud_rate(mut self, hz: u32) -> Self {
        self.config.baud_rate = hz;
        self
    }

    pub fn module_clock(mut self, hz: u32) -> Self {
        self.config.module_clock = hz;
        self
    }

    /// Bounds every status poll to `limit` iterations.
    pub fn poll_limit(mut self, limit: u32) -> Self {
        self.config.poll_limit = Some(limit);
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }
}

// Set controller registers
impl BusBuilder<'static, (), (), NeedRegisters> {
    pub fn registers<R: BusController>(self, regs: R) -> BusBuilder<'static, R, (), NeedCompletion> {
        BusBuilder {
            config: self.config,
            regs,
            completion: &(),
            _state: PhantomData,
        }
    }
}

// Set completion signal
impl<R: BusController> BusBuilder<'static, R, (), NeedCompletion> {
    /// Signal raised when an interrupt-mode read has collected its last byte.
    pub fn completion<'a, S: Signal>(self, signal: &'a S) -> BusBuilder<'a, R, S, Ready> {
        BusBuilder {
            config: self.config,
            regs: self.regs,
            completion: signal,
            _state: PhantomData,
        }
    }
}

// Build the driver
impl<'a, R: BusController, S: Signal> BusBuilder<'a, R, S, Ready> {
    /// Builds the driver and programs the configured baud rate.
    ///
    /// `N` is the largest interrupt-mode read the driver accepts.
    pub fn build<const N: usize>(self) -> BusDriver<'a, R, S, N> {
        let mut driver = BusDriver::new(self.regs, self.completion, self.config);
        // Nothing is pending on a fresh driver, so init is never refused.
        let _ = driver.init();
        driver
    }
}
