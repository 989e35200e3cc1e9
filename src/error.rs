use crate::bus::Phase;

/// Errors reported by the flash command sequencer for a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashFault {
    /// The command targeted a protected region (FPVIOL).
    ProtectionViolation,
    /// The command was malformed or issued out of sequence (ACCERR).
    AccessError,
    /// The previous command has not completed (CCIF clear).
    Busy,
}

impl core::fmt::Display for FlashFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FlashFault::ProtectionViolation => write!(f, "flash protection violation"),
            FlashFault::AccessError => write!(f, "flash access error"),
            FlashFault::Busy => write!(f, "flash command still in progress"),
        }
    }
}

/// Errors that can occur during phrase store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// No aligned run of free slots is left in the phrase.
    StoreFull,
    /// Allocation size other than 1, 2 or 4 bytes.
    InvalidSize,
    /// Address lies outside the phrase.
    OutOfRange,
    /// Address is not aligned to the width of the value.
    Misaligned,
    /// The sequencer rejected a command on a protected region.
    ProtectionViolation,
    /// The sequencer rejected a command as malformed or out of sequence.
    AccessError,
    /// The sequencer was still busy with a previous command.
    Busy,
}

impl From<FlashFault> for StoreError {
    fn from(fault: FlashFault) -> Self {
        match fault {
            FlashFault::ProtectionViolation => StoreError::ProtectionViolation,
            FlashFault::AccessError => StoreError::AccessError,
            FlashFault::Busy => StoreError::Busy,
        }
    }
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StoreError::StoreFull => write!(f, "no free slot of the requested size"),
            StoreError::InvalidSize => write!(f, "allocation size must be 1, 2 or 4 bytes"),
            StoreError::OutOfRange => write!(f, "address outside the phrase"),
            StoreError::Misaligned => write!(f, "address not aligned to value width"),
            StoreError::ProtectionViolation => write!(f, "flash protection violation"),
            StoreError::AccessError => write!(f, "flash access error"),
            StoreError::Busy => write!(f, "flash command still in progress"),
        }
    }
}

/// Errors that can occur during a bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The peripheral did not acknowledge the byte sent in this phase.
    ///
    /// The bus has already been released when this is returned. A missing
    /// device and a transient failure look the same from here.
    NoAcknowledge(Phase),
    /// An interrupt-driven read is still outstanding.
    Busy,
    /// Read length of zero or larger than the driver's buffer.
    InvalidLength,
    /// A status poll exceeded the configured poll limit.
    Timeout,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BusError::NoAcknowledge(phase) => write!(f, "no acknowledge during {}", phase),
            BusError::Busy => write!(f, "bus transaction already in progress"),
            BusError::InvalidLength => write!(f, "read length out of range"),
            BusError::Timeout => write!(f, "bus status poll timed out"),
        }
    }
}
