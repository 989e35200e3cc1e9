use heapless::Vec;

use crate::{
    bus::{
        BaudSetting, BusConfig, BusController, DeviceAddress, Phase,
        baud::select_baud,
        interrupt::{AsyncRead, Progress},
        transaction::{Transaction, apply_control},
    },
    error::BusError,
    irq::InterruptSource,
    signal::Signal,
};

/// Longest read the blocking path accepts; byte indices are tracked as `u8`.
const MAX_BLOCKING_READ: usize = u8::MAX as usize;

/// Driver for one bus controller.
///
/// Owns the controller registers, the cached addresses of the selected
/// peripheral and the state of an interrupt-mode read between interrupts.
/// Every transaction runs inside a [`Transaction`] guard, so the bus is
/// released on every exit path and a new transaction is refused while an
/// interrupt-mode read is still collecting bytes.
///
/// `N` is the largest interrupt-mode read.
pub struct BusDriver<'a, R: BusController, S: Signal, const N: usize> {
    regs: R,
    device: DeviceAddress,
    config: BusConfig,
    completion: InterruptSource<'a, S>,
    pending: Option<AsyncRead<N>>,
    completed: Option<Vec<u8, N>>,
}

impl<'a, R: BusController, S: Signal, const N: usize> core::fmt::Debug for BusDriver<'a, R, S, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusDriver")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<'a, R: BusController, S: Signal, const N: usize> BusDriver<'a, R, S, N> {
    /// Creates a driver without touching the hardware; call [`Self::init`]
    /// before the first transaction.
    pub fn new(regs: R, completion: &'a S, config: BusConfig) -> Self {
        Self {
            regs,
            device: DeviceAddress::new(config.address),
            config,
            completion: InterruptSource::new(completion),
            pending: None,
            completed: None,
        }
    }

    /// Programs the baud rate from the configuration and leaves the transfer
    /// interrupt disabled.
    ///
    /// Refused with [`BusError::Busy`] while an interrupt-mode read is pending.
    pub fn init(&mut self) -> Result<Option<BaudSetting>, BusError> {
        self.ensure_idle()?;
        self.regs.set_interrupt_enabled(false);
        self.configure_baud(self.config.baud_rate, self.config.module_clock)
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Targets every following transaction at the peripheral with 7-bit
    /// `address`.
    pub fn select_device(&mut self, address: u8) -> Result<(), BusError> {
        self.ensure_idle()?;
        self.device = DeviceAddress::new(address);
        self.config.address = self.device.primary();
        Ok(())
    }

    pub fn device(&self) -> DeviceAddress {
        self.device
    }

    /// Programs the divider closest to `target` Hz.
    ///
    /// Returns the setting written, or `None` when no divider improves on
    /// leaving the register alone. The divider is left untouched while an
    /// interrupt-mode read is pending.
    pub fn configure_baud(
        &mut self,
        target: u32,
        module_clock: u32,
    ) -> Result<Option<BaudSetting>, BusError> {
        self.ensure_idle()?;
        let setting = select_baud(target, module_clock);
        match setting {
            Some(setting) => {
                self.regs.set_divider(setting.mult, setting.icr);
                self.config.baud_rate = target;
                self.config.module_clock = module_clock;
                info!(
                    "bus baud {} Hz (mult {}, icr {})",
                    setting.actual, setting.mult, setting.icr
                );
            }
            None => warn!("no divider reaches {} Hz, baud unchanged", target),
        }
        Ok(setting)
    }

    /// Writes `value` into register `register` of the selected peripheral.
    ///
    /// A missing acknowledge aborts the remaining phases and releases the
    /// bus. The error is returned for callers that care; nothing is retried.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.ensure_idle()?;

        let mut txn = Transaction::begin(&mut self.regs, self.config.poll_limit)?;
        txn.send(Phase::AddressWrite, self.device.write())?;
        txn.send(Phase::RegisterAddress, register)?;
        txn.send(Phase::WriteData, value)?;
        txn.finish();
        Ok(())
    }

    /// Reads `buf.len()` consecutive registers starting at `register`,
    /// polling the controller until the last byte is in.
    pub fn read_register_blocking(&mut self, register: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.ensure_idle()?;
        let len = buf.len();
        if len == 0 || len > MAX_BLOCKING_READ {
            return Err(BusError::InvalidLength);
        }

        let mut txn = Transaction::begin(&mut self.regs, self.config.poll_limit)?;
        address_for_read(&mut txn, self.device, register)?;
        txn.begin_receive();

        for (index, slot) in buf.iter_mut().enumerate() {
            *slot = txn.receive(index, len)?;
        }
        Ok(())
    }

    /// Starts reading `len` consecutive registers from `register` and returns
    /// once the first byte is being clocked.
    ///
    /// The remaining work happens in [`Self::on_interrupt`]; the completion
    /// signal is raised after the last byte, and the bytes are then available
    /// from [`Self::take_read`].
    pub fn read_register_async(&mut self, register: u8, len: usize) -> Result<(), BusError> {
        self.ensure_idle()?;
        if len == 0 || len > N {
            return Err(BusError::InvalidLength);
        }

        let mut txn = Transaction::begin(&mut self.regs, self.config.poll_limit)?;
        address_for_read(&mut txn, self.device, register)?;

        self.pending = Some(AsyncRead::new(register, len));
        txn.regs().set_interrupt_enabled(true);
        txn.begin_receive();
        txn.hand_off();
        Ok(())
    }

    /// Transfer-complete interrupt body.
    ///
    /// Collects one byte of the pending interrupt-mode read. Returns true when
    /// that byte was the last one and the completion signal was raised. An
    /// interrupt with no read pending only clears the flag.
    pub fn on_interrupt(&mut self) -> bool {
        if self.pending.is_none() {
            self.regs.clear_transfer_complete();
            return false;
        }

        let pending = &mut self.pending;
        let completed = &mut self.completed;
        self.completion.raise(
            &mut self.regs,
            |regs| regs.clear_transfer_complete(),
            |regs| {
                let Some(read) = pending.as_mut() else {
                    return false;
                };

                match read.feed(|control| apply_control(regs, control)) {
                    Progress::Pending => false,
                    Progress::Complete => {
                        regs.set_interrupt_enabled(false);
                        if let Some(read) = pending.take() {
                            debug!(
                                "interrupt read of {} bytes from {} complete",
                                read.requested(),
                                read.register()
                            );
                            *completed = Some(read.into_bytes());
                        }
                        true
                    }
                }
            },
        )
    }

    /// Whether an interrupt-mode read is still collecting bytes.
    pub fn is_read_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Bytes of the last finished interrupt-mode read, if not already taken.
    pub fn take_read(&mut self) -> Option<Vec<u8, N>> {
        self.completed.take()
    }

    pub fn completion(&self) -> &'a S {
        self.completion.signal()
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    fn ensure_idle(&self) -> Result<(), BusError> {
        if self.pending.is_some() {
            warn!("bus busy with an interrupt read");
            return Err(BusError::Busy);
        }
        Ok(())
    }
}

/// Address-write, register-address, repeated-start and address-read phases
/// shared by both read paths.
fn address_for_read<R: BusController>(
    txn: &mut Transaction<'_, R>,
    device: DeviceAddress,
    register: u8,
) -> Result<(), BusError> {
    txn.send(Phase::AddressWrite, device.write())?;
    txn.send(Phase::RegisterAddress, register)?;
    txn.repeated_start();
    txn.send(Phase::AddressRead, device.read())
}
