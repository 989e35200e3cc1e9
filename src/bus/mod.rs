//! Two-wire (I2C) bus controller driver.
//!
//! One controller talks to one addressed peripheral at a time. Transactions
//! follow a fixed phase sequence:
//!
//! ```text
//! Idle -> Start -> AddressWrite -> RegisterAddress -> WriteData ---------------------------> Stop
//!                                                  \-> RepeatedStart -> AddressRead -> ReadByte(0..n) -> Stop
//! ```
//!
//! Register writes and blocking reads run the whole sequence in one call,
//! polling the controller's transfer-complete flag between phases. An
//! interrupt-mode read runs the sequence up to `AddressRead` and returns; the
//! bytes are then collected one per interrupt by [`BusDriver::on_interrupt`],
//! which signals the completion [`Signal`](crate::signal::Signal) after the
//! last one.

mod baud;
mod builder;
mod driver;
mod interrupt;
mod shared;
mod transaction;

pub use baud::{BaudSetting, SCL_DIVIDER, select_baud};
pub use builder::{BusBuilder, NeedCompletion, NeedRegisters, Ready};
pub use driver::BusDriver;
pub use interrupt::{AsyncRead, Progress};
pub use shared::SharedBus;
pub use transaction::{ByteControl, byte_control};

/// Register-level access to the bus controller.
///
/// Each method maps onto one register operation of the controller; the
/// driver owns all sequencing. Board crates implement this over the
/// peripheral's registers, host tests over a scripted peripheral.
pub trait BusController {
    /// Bus busy flag: another transfer still holds the bus.
    fn is_busy(&self) -> bool;

    /// Takes the bus as master in transmit mode (START).
    fn start(&mut self);

    /// Issues a repeated START without releasing the bus.
    fn repeated_start(&mut self);

    /// Switches the controller to receive mode.
    fn set_receive(&mut self);

    /// Loads a byte for transmission.
    fn write_data(&mut self, byte: u8);

    /// Reads the data register. In receive mode this also starts clocking the
    /// next byte unless STOP has been issued.
    fn read_data(&mut self) -> u8;

    /// Selects whether the next received byte is acknowledged.
    fn set_acknowledge(&mut self, ack: bool);

    /// Releases the bus (STOP).
    fn stop(&mut self);

    /// Transfer-complete flag for the byte in flight.
    fn transfer_complete(&self) -> bool;

    /// Clears the latched transfer-complete flag (write-one-to-clear).
    fn clear_transfer_complete(&mut self);

    /// Whether the peripheral acknowledged the last transmitted byte.
    fn acknowledged(&self) -> bool;

    /// Enables or disables the per-byte transfer interrupt.
    fn set_interrupt_enabled(&mut self, enabled: bool);

    /// Programs the clock multiplier register value and SCL divider index.
    fn set_divider(&mut self, mult: u8, icr: u8);
}

/// Position of a transaction in the phase sequence.
///
/// Phases only ever move forward within one transaction; the derived
/// ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Idle,
    Start,
    AddressWrite,
    RegisterAddress,
    WriteData,
    RepeatedStart,
    AddressRead,
    ReadByte(u8),
    Stop,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Start => write!(f, "start"),
            Phase::AddressWrite => write!(f, "address write"),
            Phase::RegisterAddress => write!(f, "register address"),
            Phase::WriteData => write!(f, "write data"),
            Phase::RepeatedStart => write!(f, "repeated start"),
            Phase::AddressRead => write!(f, "address read"),
            Phase::ReadByte(index) => write!(f, "read byte {}", index),
            Phase::Stop => write!(f, "stop"),
        }
    }
}

/// Bus addresses of the selected peripheral, derived once per selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress {
    primary: u8,
    write: u8,
    read: u8,
}

impl DeviceAddress {
    /// Derives the write (R/W bit clear) and read (R/W bit set) addresses
    /// from a 7-bit address. Bit 7 of `address` is ignored.
    pub const fn new(address: u8) -> Self {
        let primary = address & 0x7F;
        Self {
            primary,
            write: primary << 1,
            read: (primary << 1) | 0x01,
        }
    }

    pub const fn primary(&self) -> u8 {
        self.primary
    }

    pub const fn write(&self) -> u8 {
        self.write
    }

    pub const fn read(&self) -> u8 {
        self.read
    }
}

/// Runtime bus configuration.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// 7-bit address of the peripheral selected at init.
    pub address: u8,
    /// Requested SCL frequency in Hz.
    pub baud_rate: u32,
    /// Clock feeding the bus controller in Hz.
    pub module_clock: u32,
    /// Upper bound on iterations of any status poll. `None` polls forever.
    pub poll_limit: Option<u32>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: 0x1D,
            baud_rate: 100_000,
            module_clock: 50_000_000,
            poll_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_address_sets_read_write_bit() {
        let device = DeviceAddress::new(0x1D);

        assert_eq!(device.primary(), 0x1D);
        assert_eq!(device.write(), 0x3A);
        assert_eq!(device.read(), 0x3B);
    }

    #[test]
    fn device_address_ignores_high_bit() {
        assert_eq!(DeviceAddress::new(0x9D), DeviceAddress::new(0x1D));
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Idle < Phase::Start);
        assert!(Phase::RegisterAddress < Phase::WriteData);
        assert!(Phase::RegisterAddress < Phase::RepeatedStart);
        assert!(Phase::AddressRead < Phase::ReadByte(0));
        assert!(Phase::ReadByte(0) < Phase::ReadByte(1));
        assert!(Phase::ReadByte(255) < Phase::Stop);
    }
}
