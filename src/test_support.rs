//! Test support utilities - only compiled in test builds.

use std::vec::Vec;

use crate::{
    bus::{BusConfig, BusController, BusDriver},
    error::FlashFault,
    flash::{ERASED_BYTE, FLASH_DATA_START, FlashCommand, FlashController, PHRASE_SIZE, SECTOR_SIZE},
    signal::CountingSignal,
    store::PhraseStore,
};

/// In-RAM model of the data flash sector holding the configuration phrase.
///
/// Erase sets the sector to all ones. Programming a phrase that is not erased
/// is an access error, as on the real sequencer, so a missing erase shows up
/// in tests. Only commands that succeeded are logged.
pub struct RamFlash {
    sector: [u8; SECTOR_SIZE],
    log: Vec<FlashCommand>,
    fault: Option<(usize, FlashFault)>,
}

impl RamFlash {
    pub fn new() -> Self {
        Self {
            sector: [ERASED_BYTE; SECTOR_SIZE],
            log: Vec::new(),
            fault: None,
        }
    }

    /// Commands that completed, oldest first.
    pub fn commands(&self) -> &[FlashCommand] {
        &self.log
    }

    /// Makes the next command fail with `fault`.
    pub fn fail_next(&mut self, fault: FlashFault) {
        self.fail_after(0, fault);
    }

    /// Lets `successes` commands through, then fails the one after with `fault`.
    pub fn fail_after(&mut self, successes: usize, fault: FlashFault) {
        self.fault = Some((successes, fault));
    }

    fn offset(address: u32) -> Option<usize> {
        address
            .checked_sub(FLASH_DATA_START)
            .map(|offset| offset as usize)
            .filter(|&offset| offset < SECTOR_SIZE)
    }

    fn take_fault(&mut self) -> Option<FlashFault> {
        match self.fault {
            Some((0, fault)) => {
                self.fault = None;
                Some(fault)
            }
            Some((remaining, fault)) => {
                self.fault = Some((remaining - 1, fault));
                None
            }
            None => None,
        }
    }
}

impl FlashController for RamFlash {
    fn read(&self, address: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = Self::offset(address + i as u32)
                .map(|offset| self.sector[offset])
                .unwrap_or(ERASED_BYTE);
        }
    }

    fn launch(&mut self, command: FlashCommand) -> Result<(), FlashFault> {
        if let Some(fault) = self.take_fault() {
            return Err(fault);
        }

        let offset = Self::offset(command.address()).ok_or(FlashFault::AccessError)?;
        match command {
            FlashCommand::EraseSector { .. } => self.sector = [ERASED_BYTE; SECTOR_SIZE],
            FlashCommand::ProgramPhrase { data, .. } => {
                if offset % PHRASE_SIZE != 0 {
                    return Err(FlashFault::AccessError);
                }
                let phrase = &mut self.sector[offset..offset + PHRASE_SIZE];
                if phrase.iter().any(|&byte| byte != ERASED_BYTE) {
                    return Err(FlashFault::AccessError);
                }
                phrase.copy_from_slice(&data);
            }
        }

        self.log.push(command);
        Ok(())
    }
}

/// Helper to create a store over a blank flash.
pub fn test_store() -> PhraseStore<RamFlash> {
    PhraseStore::new(RamFlash::new())
}

/// Register-level operations recorded by [`ScriptedBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Start,
    RepeatedStart,
    Receive,
    Write(u8),
    Read(u8),
    Ack,
    Nak,
    Stop,
    IrqOn,
    IrqOff,
    ClearFlag,
    Divider(u8, u8),
}

/// Scripted bus peripheral.
///
/// Records every register operation. Reads in receive mode replay the
/// scripted response bytes, except the dummy read right after switching to
/// receive, which returns whatever was last written (as the data register
/// does). Writes are acknowledged unless scripted to fail.
pub struct ScriptedBus {
    trace: heapless::Vec<BusOp, 128>,
    response: heapless::Vec<u8, 16>,
    next_response: usize,
    last_written: u8,
    dummy_pending: bool,
    writes: usize,
    nak_on: Option<usize>,
    acked: bool,
    busy: bool,
    stalled: bool,
    irq_enabled: bool,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self {
            trace: heapless::Vec::new(),
            response: heapless::Vec::new(),
            next_response: 0,
            last_written: 0,
            dummy_pending: false,
            writes: 0,
            nak_on: None,
            acked: true,
            busy: false,
            stalled: false,
            irq_enabled: false,
        }
    }

    pub fn trace(&self) -> &[BusOp] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Bytes the peripheral sends back, in order.
    pub fn respond(&mut self, bytes: &[u8]) {
        self.response.clear();
        self.response.extend_from_slice(bytes).unwrap();
        self.next_response = 0;
    }

    /// The `index`-th write (counting from 0) is not acknowledged.
    pub fn nak_write(&mut self, index: usize) {
        self.nak_on = Some(index);
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Transfers never complete.
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.irq_enabled
    }

    fn record(&mut self, op: BusOp) {
        self.trace.push(op).expect("bus trace full");
    }
}

impl BusController for ScriptedBus {
    fn is_busy(&self) -> bool {
        self.busy
    }

    fn start(&mut self) {
        self.record(BusOp::Start);
    }

    fn repeated_start(&mut self) {
        self.record(BusOp::RepeatedStart);
    }

    fn set_receive(&mut self) {
        self.dummy_pending = true;
        self.record(BusOp::Receive);
    }

    fn write_data(&mut self, byte: u8) {
        self.acked = self.nak_on != Some(self.writes);
        self.writes += 1;
        self.last_written = byte;
        self.record(BusOp::Write(byte));
    }

    fn read_data(&mut self) -> u8 {
        let byte = if self.dummy_pending {
            self.dummy_pending = false;
            self.last_written
        } else {
            let byte = self.response.get(self.next_response).copied().unwrap_or(0xFF);
            self.next_response += 1;
            byte
        };
        self.record(BusOp::Read(byte));
        byte
    }

    fn set_acknowledge(&mut self, ack: bool) {
        self.record(if ack { BusOp::Ack } else { BusOp::Nak });
    }

    fn stop(&mut self) {
        self.record(BusOp::Stop);
    }

    fn transfer_complete(&self) -> bool {
        !self.stalled
    }

    fn clear_transfer_complete(&mut self) {
        self.record(BusOp::ClearFlag);
    }

    fn acknowledged(&self) -> bool {
        self.acked
    }

    fn set_interrupt_enabled(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
        self.record(if enabled { BusOp::IrqOn } else { BusOp::IrqOff });
    }

    fn set_divider(&mut self, mult: u8, icr: u8) {
        self.record(BusOp::Divider(mult, icr));
    }
}

/// Standard test driver: scripted bus, counting signal, reads up to 6 bytes.
pub type TestDriver<'a> = BusDriver<'a, ScriptedBus, CountingSignal, 6>;

/// Helper to create a driver with default configuration and an empty trace.
pub fn test_driver(signal: &CountingSignal) -> TestDriver<'_> {
    BusDriver::new(ScriptedBus::new(), signal, BusConfig::default())
}

/// Starts an interrupt-mode read and services interrupts until it completes.
pub fn run_async_read(driver: &mut TestDriver<'_>, register: u8, len: usize) -> heapless::Vec<u8, 6> {
    driver.read_register_async(register, len).unwrap();
    for _ in 0..len {
        if driver.on_interrupt() {
            break;
        }
    }
    driver.take_read().expect("interrupt read did not complete")
}

/// Number of times `op` appears in the bus trace.
pub fn count_op(bus: &ScriptedBus, op: BusOp) -> usize {
    bus.trace().iter().filter(|&&recorded| recorded == op).count()
}
