//! Flash memory module command interface.
//!
//! The FTFE sequencer accepts one command at a time through the FCCOB
//! registers. [`FlashCommand`] describes the two commands the phrase store
//! needs and renders their register image; [`FlashController`] is the seam a
//! board crate implements on top of the real registers (or a RAM model for
//! host tests).

use crate::error::FlashFault;

/// Smallest programmable unit of the flash, in bytes.
pub const PHRASE_SIZE: usize = 8;

/// Smallest erasable unit of the flash, in bytes.
pub const SECTOR_SIZE: usize = 4096;

/// Start of the phrase reserved for configuration data (block 2, sector 0).
pub const FLASH_DATA_START: u32 = 0x0008_0000;

/// Last byte of the configuration phrase.
pub const FLASH_DATA_END: u32 = FLASH_DATA_START + PHRASE_SIZE as u32 - 1;

/// Value every byte reads as after an erase.
pub const ERASED_BYTE: u8 = 0xFF;

const CMD_PROGRAM_PHRASE: u8 = 0x07;
const CMD_ERASE_SECTOR: u8 = 0x09;

/// A single sequencer command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashCommand {
    /// Sets every bit of the sector containing `address` to 1.
    EraseSector { address: u32 },
    /// Programs the 8-byte phrase at `address`. Bits can only go 1 -> 0.
    ProgramPhrase {
        address: u32,
        data: [u8; PHRASE_SIZE],
    },
}

impl FlashCommand {
    /// FCCOB command code.
    pub const fn code(&self) -> u8 {
        match self {
            FlashCommand::EraseSector { .. } => CMD_ERASE_SECTOR,
            FlashCommand::ProgramPhrase { .. } => CMD_PROGRAM_PHRASE,
        }
    }

    pub const fn address(&self) -> u32 {
        match self {
            FlashCommand::EraseSector { address } | FlashCommand::ProgramPhrase { address, .. } => {
                *address
            }
        }
    }

    /// Register image for FCCOB0..FCCOBB.
    ///
    /// The address is 24-bit big-endian. Phrase data is loaded one aligned
    /// longword at a time with the byte order of each longword reversed.
    pub fn fccob(&self) -> [u8; 12] {
        let address = self.address();
        let mut regs = [0u8; 12];
        regs[0] = self.code();
        regs[1] = ((address >> 16) & 0xFF) as u8;
        regs[2] = ((address >> 8) & 0xFF) as u8;
        regs[3] = (address & 0xFF) as u8;

        if let FlashCommand::ProgramPhrase { data, .. } = self {
            for (word, chunk) in data.chunks_exact(4).enumerate() {
                for (i, byte) in chunk.iter().rev().enumerate() {
                    regs[4 + word * 4 + i] = *byte;
                }
            }
        }

        regs
    }
}

/// Access to the flash array and its command sequencer.
///
/// Implementations must not be driven from interrupt context: the
/// sequencer is not reentrant.
pub trait FlashController {
    /// Copies bytes starting at `address` out of the flash array.
    fn read(&self, address: u32, buf: &mut [u8]);

    /// Launches `command` and waits for it to complete.
    ///
    /// Fails with [`FlashFault::Busy`] if the previous command has not
    /// finished, or with the violation the sequencer latched.
    fn launch(&mut self, command: FlashCommand) -> Result<(), FlashFault>;
}

impl<T: FlashController + ?Sized> FlashController for &mut T {
    fn read(&self, address: u32, buf: &mut [u8]) {
        (**self).read(address, buf)
    }

    fn launch(&mut self, command: FlashCommand) -> Result<(), FlashFault> {
        (**self).launch(command)
    }
}

/// Start of the sector containing `address`.
pub const fn sector_base(address: u32) -> u32 {
    address & !(SECTOR_SIZE as u32 - 1)
}

/// Start of the phrase containing `address`.
pub const fn phrase_base(address: u32) -> u32 {
    address & !(PHRASE_SIZE as u32 - 1)
}
