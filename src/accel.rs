//! MMA8451Q motion sensor session.
//!
//! The sensor sits on the shared bus at address 0x1D and raises a data-ready
//! line on its INT1 pin. In poll mode a worker reads the three axis registers
//! with a blocking read; in interrupt mode the data-ready worker starts an
//! interrupt-mode read and a second worker finishes it once the bus driver
//! signals completion. Either way each sample is median-filtered against the
//! two before it.

use crate::{
    bus::{BusController, SharedBus},
    error::BusError,
    irq::InterruptSource,
    median::median3,
    signal::Signal,
};

/// 7-bit bus address with SA0 tied high.
pub const ACCEL_ADDRESS: u8 = 0x1D;

pub const OUT_X_MSB: u8 = 0x01;
pub const CTRL_REG1: u8 = 0x2A;
pub const CTRL_REG4: u8 = 0x2D;
pub const CTRL_REG5: u8 = 0x2E;

/// Fast read, 1.56 Hz output data rate, standby.
const CTRL_REG1_STANDBY: u8 = 0x3A;
/// Same as standby with ACTIVE set.
const CTRL_REG1_ACTIVE: u8 = 0x3B;
const INT_EN_DRDY: u8 = 0x01;
/// Route data-ready to INT1.
const INT_CFG_DRDY: u8 = 0x01;

const AXES: usize = 3;

/// One sample per axis (X, Y, Z), most significant byte only.
pub type Xyz = [u8; AXES];

/// How new samples are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelMode {
    /// Blocking reads; the data-ready interrupt is disabled on the sensor.
    Poll,
    /// Data-ready interrupt drives interrupt-mode reads.
    Interrupt,
}

/// Session with the sensor over a [`SharedBus`].
pub struct Accelerometer<'b, 'a, R, S, D, const N: usize>
where
    R: BusController,
    S: Signal,
    D: Signal,
{
    bus: &'b SharedBus<'a, R, S, N>,
    data_ready: InterruptSource<'b, D>,
    mode: AccelMode,
    // Newest sample first.
    history: [Xyz; 3],
}

impl<'b, 'a, R, S, D, const N: usize> Accelerometer<'b, 'a, R, S, D, N>
where
    R: BusController,
    S: Signal,
    D: Signal,
{
    /// `data_ready` is signalled by [`Self::on_data_ready`]. The bus's own
    /// completion signal tells when an interrupt-mode read can be collected
    /// with [`Self::complete_read`].
    pub fn new(bus: &'b SharedBus<'a, R, S, N>, data_ready: &'b D) -> Self {
        Self {
            bus,
            data_ready: InterruptSource::new(data_ready),
            mode: AccelMode::Poll,
            history: [[0; AXES]; 3],
        }
    }

    /// Selects the sensor on the bus and brings it up active with the
    /// data-ready interrupt routed to INT1.
    pub fn init(&mut self) -> Result<(), BusError> {
        self.bus.lock(|bus| {
            bus.select_device(ACCEL_ADDRESS)?;
            bus.write_register(CTRL_REG1, CTRL_REG1_STANDBY)?;
            bus.write_register(CTRL_REG4, INT_EN_DRDY)?;
            bus.write_register(CTRL_REG5, INT_CFG_DRDY)?;
            bus.write_register(CTRL_REG1, CTRL_REG1_ACTIVE)
        })
    }

    pub fn mode(&self) -> AccelMode {
        self.mode
    }

    /// Switches between poll and interrupt mode.
    ///
    /// The sensor is put in standby, its data-ready interrupt enabled or
    /// disabled, and made active again, all in one critical section so a
    /// timer-driven read cannot land in between.
    pub fn set_mode(&mut self, mode: AccelMode) -> Result<(), BusError> {
        let int_enable = match mode {
            AccelMode::Poll => 0x00,
            AccelMode::Interrupt => INT_EN_DRDY,
        };

        self.bus.lock(|bus| {
            bus.write_register(CTRL_REG1, CTRL_REG1_STANDBY)?;
            bus.write_register(CTRL_REG4, int_enable)?;
            bus.write_register(CTRL_REG1, CTRL_REG1_ACTIVE)
        })?;

        info!("accelerometer now in {} mode", mode);
        self.mode = mode;
        Ok(())
    }

    /// Reads the axes.
    ///
    /// In poll mode this blocks for the read and returns the filtered sample.
    /// In interrupt mode it only starts the read and returns `None`; the
    /// sample comes out of [`Self::complete_read`].
    pub fn read_xyz(&mut self) -> Result<Option<Xyz>, BusError> {
        match self.mode {
            AccelMode::Poll => {
                let mut raw = [0u8; AXES];
                self.bus
                    .lock(|bus| bus.read_register_blocking(OUT_X_MSB, &mut raw))?;
                Ok(Some(self.filter(raw)))
            }
            AccelMode::Interrupt => {
                self.bus
                    .lock(|bus| bus.read_register_async(OUT_X_MSB, AXES))?;
                Ok(None)
            }
        }
    }

    /// Collects a finished interrupt-mode read and returns the filtered sample.
    ///
    /// Call after the bus completion signal fired. Returns `None` if no read
    /// has finished since the last call.
    pub fn complete_read(&mut self) -> Option<Xyz> {
        let bytes = self.bus.lock(|bus| bus.take_read())?;
        let raw: Xyz = bytes.as_slice().try_into().ok()?;
        Some(self.filter(raw))
    }

    /// Data-ready interrupt body: clears the port flag through `clear`, then
    /// wakes the data-ready worker.
    pub fn on_data_ready<P: ?Sized>(&self, port: &mut P, clear: impl FnOnce(&mut P)) {
        self.data_ready.raise(port, clear, |_| true);
    }

    /// The data-ready source, for the worker loop.
    pub fn data_ready(&self) -> &InterruptSource<'b, D> {
        &self.data_ready
    }

    fn filter(&mut self, raw: Xyz) -> Xyz {
        self.history = [raw, self.history[0], self.history[1]];
        let [newest, middle, oldest] = self.history;
        core::array::from_fn(|axis| median3(newest[axis], middle[axis], oldest[axis]))
    }
}
