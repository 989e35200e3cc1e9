//! Interrupt-safe peripheral core for the K70 tower unit.
//!
//! This crate holds the parts of the tower firmware where interrupt handlers
//! and worker threads meet shared hardware state:
//!
//! - **[`ByteQueue`]** - fixed-capacity FIFO between a UART interrupt and its thread
//! - **[`PhraseStore`]** - per-variable persistence over one erase-before-write flash phrase
//! - **[`BusDriver`]** - I2C register writes and reads, blocking or resumed per interrupt
//! - **[`Signal`]** / **[`InterruptSource`]** - the wake contract between handlers and threads
//!
//! On top of those sit the persisted [`TowerSettings`] and the
//! [`Accelerometer`] session.
//!
//! # Concurrency model
//!
//! ```text
//! ┌──────────────────┐  signal()  ┌──────────────────────────┐
//! │  Interrupt       │───────────▶│  Worker thread           │
//! │                  │            │                          │
//! │  clear latch     │            │  wait()                  │
//! │  move one byte   │            │  filter / packetize      │
//! │  signal          │            │  flash / mode changes    │
//! └──────────────────┘            └──────────────────────────┘
//! ```
//!
//! Handlers never block and never touch flash. Everything shared with a
//! handler goes through `critical-section`.
//!
//! # Example
//!
//! ```rust,no_run
//! use tower_periph::prelude::*;
//! # struct Regs;
//! # impl BusController for Regs {
//! #     fn is_busy(&self) -> bool { false }
//! #     fn start(&mut self) {}
//! #     fn repeated_start(&mut self) {}
//! #     fn set_receive(&mut self) {}
//! #     fn write_data(&mut self, _: u8) {}
//! #     fn read_data(&mut self) -> u8 { 0 }
//! #     fn set_acknowledge(&mut self, _: bool) {}
//! #     fn stop(&mut self) {}
//! #     fn transfer_complete(&self) -> bool { true }
//! #     fn clear_transfer_complete(&mut self) {}
//! #     fn acknowledged(&self) -> bool { true }
//! #     fn set_interrupt_enabled(&mut self, _: bool) {}
//! #     fn set_divider(&mut self, _: u8, _: u8) {}
//! # }
//!
//! static READ_COMPLETE: CountingSignal = CountingSignal::new(0);
//!
//! let mut bus = BusBuilder::new()
//!     .address(0x1D)
//!     .baud_rate(100_000)
//!     .module_clock(50_000_000)
//!     .registers(Regs)
//!     .completion(&READ_COMPLETE)
//!     .build::<6>();
//!
//! // Thread context: kick off a 3-byte read and let the interrupt finish it.
//! bus.read_register_async(0x01, 3).unwrap();
//!
//! // Bus interrupt handler, once per byte.
//! while !bus.on_interrupt() {}
//!
//! // Worker thread.
//! READ_COMPLETE.wait();
//! let xyz = bus.take_read().unwrap();
//! # let _ = xyz;
//! ```

#![deny(unsafe_code)]
#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod accel;
pub mod bus;
pub mod error;
pub mod flash;
pub mod irq;
pub mod median;
pub mod queue;
pub mod settings;
pub mod signal;
pub mod store;
pub(crate) mod table;

#[cfg(test)]
mod test_support;

pub use accel::{AccelMode, Accelerometer};
pub use bus::{BusBuilder, BusConfig, BusController, BusDriver, DeviceAddress, Phase, SharedBus};
pub use error::{BusError, FlashFault, StoreError};
pub use flash::{FlashCommand, FlashController};
pub use irq::InterruptSource;
pub use median::median3;
pub use queue::ByteQueue;
pub use settings::{TowerDefaults, TowerSettings};
pub use signal::{CountingSignal, Signal};
pub use store::{PhraseStore, PhraseValue, Slot};
pub use table::Width;

pub mod prelude {
    pub use super::{
        AccelMode, Accelerometer, BusBuilder, BusConfig, BusController, BusDriver, BusError,
        ByteQueue, CountingSignal, FlashCommand, FlashController, FlashFault, InterruptSource,
        PhraseStore, PhraseValue, SharedBus, Signal, Slot, StoreError, TowerDefaults,
        TowerSettings, Width,
    };
}
