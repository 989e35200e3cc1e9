use heapless::Vec;

use crate::bus::transaction::{ByteControl, byte_control};

/// State of an interrupt-driven read after one byte was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// More bytes are still to come.
    Pending,
    /// The last byte was stored and STOP was issued.
    Complete,
}

/// An interrupt-driven read in flight.
///
/// Holds the destination buffer and the index of the next byte. Each transfer
/// interrupt feeds exactly one byte; the control applied before reading it is
/// the same one the blocking path uses, so both paths put identical
/// sequences on the bus.
#[derive(Debug)]
pub struct AsyncRead<const N: usize> {
    register: u8,
    len: usize,
    buf: Vec<u8, N>,
}

impl<const N: usize> AsyncRead<N> {
    /// `len` must already be checked against `1..=N`.
    pub(crate) fn new(register: u8, len: usize) -> Self {
        debug_assert!(len > 0 && len <= N);
        Self {
            register,
            len,
            buf: Vec::new(),
        }
    }

    /// Register the read started at.
    pub fn register(&self) -> u8 {
        self.register
    }

    /// Total number of bytes requested.
    pub fn requested(&self) -> usize {
        self.len
    }

    /// Index of the next byte to be collected.
    pub fn index(&self) -> usize {
        self.buf.len()
    }

    /// Collects the byte the controller is holding.
    ///
    /// `read` applies the given control to the controller and returns the data
    /// register.
    pub(crate) fn feed(&mut self, read: impl FnOnce(ByteControl) -> u8) -> Progress {
        let index = self.buf.len();
        let byte = read(byte_control(index, self.len));
        // Capacity is N and len <= N, so this cannot overflow.
        let _ = self.buf.push(byte);

        if self.buf.len() == self.len {
            Progress::Complete
        } else {
            Progress::Pending
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8, N> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feeds_controls_in_order() {
        let mut read = AsyncRead::<6>::new(0x01, 4);
        let mut controls = std::vec::Vec::new();

        for byte in 0..3u8 {
            let progress = read.feed(|control| {
                controls.push(control);
                byte
            });
            assert_eq!(progress, Progress::Pending);
        }
        let progress = read.feed(|control| {
            controls.push(control);
            3
        });

        assert_eq!(progress, Progress::Complete);
        assert_eq!(
            controls,
            [ByteControl::Ack, ByteControl::Ack, ByteControl::Nak, ByteControl::Stop]
        );
        assert_eq!(read.into_bytes().as_slice(), &[0, 1, 2, 3]);
    }

    #[test]
    fn single_byte_read_stops_immediately() {
        let mut read = AsyncRead::<6>::new(0x0D, 1);

        let progress = read.feed(|control| {
            assert_eq!(control, ByteControl::Stop);
            0x1A
        });

        assert_eq!(progress, Progress::Complete);
        assert_eq!(read.register(), 0x0D);
        assert_eq!(read.into_bytes().as_slice(), &[0x1A]);
    }

    #[test]
    fn index_tracks_collected_bytes() {
        let mut read = AsyncRead::<4>::new(0x01, 3);

        assert_eq!(read.index(), 0);
        read.feed(|_| 0xAA);
        assert_eq!(read.index(), 1);
        assert_eq!(read.requested(), 3);
    }
}
