use crate::{
    bus::{BusController, Phase},
    error::BusError,
};

/// What the controller should do with the acknowledge bit around one received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteControl {
    /// Keep acknowledging; more bytes follow.
    Ack,
    /// Do not acknowledge the next byte so the peripheral stops sending after it.
    Nak,
    /// Release the bus; this is the final byte.
    Stop,
}

/// Control applied before reading byte `index` of an `len`-byte read.
///
/// Reading a byte starts clocking the next one, so the no-acknowledge for
/// the last byte has to be in place before the second-to-last byte is read.
/// A single-byte read goes straight to stop.
pub const fn byte_control(index: usize, len: usize) -> ByteControl {
    if index + 1 == len {
        ByteControl::Stop
    } else if index + 2 == len {
        ByteControl::Nak
    } else {
        ByteControl::Ack
    }
}

/// Exclusive hold on the bus for one transaction.
///
/// Phases are issued through this guard in order. If the guard is dropped
/// before the transaction reached `Stop` (a missing acknowledge, a poll
/// timeout, an early return) it issues STOP itself, so the bus is released
/// on every exit path.
pub(crate) struct Transaction<'r, R: BusController> {
    regs: &'r mut R,
    phase: Phase,
    poll_limit: Option<u32>,
    released: bool,
}

impl<'r, R: BusController> Transaction<'r, R> {
    /// Waits for the bus to go idle, then takes it with START.
    pub(crate) fn begin(regs: &'r mut R, poll_limit: Option<u32>) -> Result<Self, BusError> {
        poll(poll_limit, || !regs.is_busy()).inspect_err(|_| {
            warn!("bus stuck busy before start");
        })?;

        regs.start();
        Ok(Self {
            regs,
            phase: Phase::Start,
            poll_limit,
            released: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn regs(&mut self) -> &mut R {
        &mut *self.regs
    }

    /// Transmits `byte` as `phase` and checks the peripheral acknowledged it.
    pub(crate) fn send(&mut self, phase: Phase, byte: u8) -> Result<(), BusError> {
        self.advance(phase);
        self.regs.write_data(byte);
        self.wait_complete()?;

        if !self.regs.acknowledged() {
            warn!("no acknowledge during {}", phase);
            return Err(BusError::NoAcknowledge(phase));
        }
        Ok(())
    }

    pub(crate) fn repeated_start(&mut self) {
        self.advance(Phase::RepeatedStart);
        self.regs.repeated_start();
    }

    /// Switches to receive mode and issues the dummy read that starts
    /// clocking the first byte.
    pub(crate) fn begin_receive(&mut self) {
        self.regs.set_receive();
        self.regs.set_acknowledge(true);
        let _ = self.regs.read_data();
    }

    /// Collects byte `index` of a `len`-byte read once its transfer completed.
    ///
    /// The last byte issues STOP, after which the guard has nothing left to
    /// release.
    pub(crate) fn receive(&mut self, index: usize, len: usize) -> Result<u8, BusError> {
        self.wait_complete()?;
        self.advance(Phase::ReadByte(index as u8));

        let control = byte_control(index, len);
        if control == ByteControl::Stop {
            self.released = true;
            self.phase = Phase::Stop;
        }
        Ok(apply_control(&mut *self.regs, control))
    }

    /// Issues STOP and ends the transaction.
    pub(crate) fn finish(mut self) {
        self.release();
    }

    /// Ends the guard without releasing the bus; the interrupt handler owns
    /// the rest of the transaction.
    pub(crate) fn hand_off(mut self) {
        self.released = true;
    }

    /// Waits for the byte in flight to complete and clears the flag.
    fn wait_complete(&mut self) -> Result<(), BusError> {
        let regs = &*self.regs;
        poll(self.poll_limit, || regs.transfer_complete()).inspect_err(|_| {
            warn!("bus transfer did not complete during {}", self.phase);
        })?;
        self.regs.clear_transfer_complete();
        Ok(())
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "bus phase moved backwards");
        self.phase = next;
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.phase = Phase::Stop;
            self.regs.stop();
        }
    }
}

impl<R: BusController> Drop for Transaction<'_, R> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Applies `control` for the byte currently held by the controller and reads it.
///
/// STOP is issued before the read so no further byte is clocked.
pub(crate) fn apply_control<R: BusController>(regs: &mut R, control: ByteControl) -> u8 {
    match control {
        ByteControl::Ack => regs.set_acknowledge(true),
        ByteControl::Nak => regs.set_acknowledge(false),
        ByteControl::Stop => regs.stop(),
    }
    regs.read_data()
}

fn poll(limit: Option<u32>, mut ready: impl FnMut() -> bool) -> Result<(), BusError> {
    let mut polls = 0u32;
    while !ready() {
        if let Some(limit) = limit {
            polls += 1;
            if polls >= limit {
                return Err(BusError::Timeout);
            }
        }
        core::hint::spin_loop();
    }
    Ok(())
}
