//! Per-variable persistence on top of erase-before-write flash.
//!
//! One phrase of flash is carved into byte slots. Callers [`allocate`] a slot
//! of 1, 2 or 4 bytes at boot and then read and write it through the store.
//! Every write rebuilds the whole phrase: the new value is laid over the old
//! phrase contents, the sector is erased, and the merged phrase is
//! programmed back.
//!
//! [`allocate`]: PhraseStore::allocate

use crate::{
    error::StoreError,
    flash::{
        ERASED_BYTE, FLASH_DATA_START, FlashCommand, FlashController, PHRASE_SIZE, phrase_base,
        sector_base,
    },
    table::{SlotTable, Width},
};

/// A value to persist, tagged with its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhraseValue {
    Byte(u8),
    Word(u16),
    DWord(u32),
}

impl PhraseValue {
    pub const fn width(&self) -> Width {
        match self {
            PhraseValue::Byte(_) => Width::Byte,
            PhraseValue::Word(_) => Width::Word,
            PhraseValue::DWord(_) => Width::DWord,
        }
    }

    fn to_le_bytes(self) -> [u8; 4] {
        match self {
            PhraseValue::Byte(v) => [v, 0, 0, 0],
            PhraseValue::Word(v) => {
                let [lo, hi] = v.to_le_bytes();
                [lo, hi, 0, 0]
            }
            PhraseValue::DWord(v) => v.to_le_bytes(),
        }
    }

    fn from_le_bytes(width: Width, bytes: &[u8]) -> Self {
        match width {
            Width::Byte => PhraseValue::Byte(bytes[0]),
            Width::Word => PhraseValue::Word(u16::from_le_bytes([bytes[0], bytes[1]])),
            Width::DWord => {
                PhraseValue::DWord(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
        }
    }
}

/// An allocated run of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slot {
    address: u32,
    width: Width,
}

impl Slot {
    /// Flash address of the first byte of the slot.
    pub const fn address(&self) -> u32 {
        self.address
    }

    pub const fn width(&self) -> Width {
        self.width
    }
}

/// Generates width-typed read/write accessors over [`PhraseStore::read`] and
/// [`PhraseStore::write`].
macro_rules! impl_typed_access {
    ($($type:ty => $variant:ident),* $(,)?) => {
        paste::paste! {
            $(
                #[doc = "Reads the little-endian `" $type "` stored at `address`."]
                pub fn [<read_ $type>](&self, address: u32) -> Result<$type, StoreError> {
                    let mut bytes = [0u8; core::mem::size_of::<$type>()];
                    self.read_bytes(address, &mut bytes)?;
                    Ok(<$type>::from_le_bytes(bytes))
                }

                #[doc = "Persists a `" $type "` at `address`. See [`Self::write`]."]
                pub fn [<write_ $type>](&mut self, address: u32, value: $type) -> Result<(), StoreError> {
                    self.write(address, PhraseValue::$variant(value))
                }
            )*
        }
    };
}

/// Slot allocator and read-erase-merge-write engine over one flash phrase.
///
/// Must only be used from thread context, and from one thread at a time.
pub struct PhraseStore<F: FlashController> {
    flash: F,
    base: u32,
    table: SlotTable,
}

impl<F: FlashController> PhraseStore<F> {
    /// Store over the phrase at [`FLASH_DATA_START`].
    pub fn new(flash: F) -> Self {
        Self::with_base(flash, FLASH_DATA_START)
    }

    /// Store over the phrase at `base`, which must be phrase-aligned.
    pub fn with_base(flash: F, base: u32) -> Self {
        debug_assert_eq!(phrase_base(base), base, "store base must be phrase aligned");
        Self {
            flash,
            base,
            table: SlotTable::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_flash(self) -> F {
        self.flash
    }

    /// Claims `size` bytes (1, 2 or 4) of the phrase.
    ///
    /// The slot starts at the first free offset that is a multiple of `size`.
    /// Slots are never given back within a boot.
    pub fn allocate(&mut self, size: usize) -> Result<Slot, StoreError> {
        self.allocate_width(Width::from_size(size)?)
    }

    pub fn allocate_width(&mut self, width: Width) -> Result<Slot, StoreError> {
        let offset = self.table.allocate(width).inspect_err(|_| {
            warn!("phrase store full, cannot allocate {} bytes", width.bytes());
        })?;
        debug!("allocated {} bytes at offset {}", width.bytes(), offset);

        Ok(Slot {
            address: self.base + offset as u32,
            width,
        })
    }

    /// Whether the byte at `offset` within the phrase has been allocated this boot.
    pub fn is_allocated(&self, offset: usize) -> bool {
        self.table.is_taken(offset)
    }

    /// Number of byte slots allocated this boot.
    pub fn allocated(&self) -> usize {
        self.table.used()
    }

    /// Persists `value` at `address`.
    ///
    /// The value's bytes are placed little-endian at the address's offset in
    /// an otherwise all-ones phrase image. If the phrase is currently erased
    /// that image is programmed as is; otherwise it is ANDed with the current
    /// contents, so between erases a bit that reads 0 stays 0 and the other
    /// slots keep their values. The sector is erased before the merged phrase
    /// is programmed.
    pub fn write(&mut self, address: u32, value: PhraseValue) -> Result<(), StoreError> {
        let width = value.width();
        let offset = self.offset_of(address, width)?;

        let current = self.read_phrase();
        let image = overlay([ERASED_BYTE; PHRASE_SIZE], offset, value);

        let merged = if current == [ERASED_BYTE; PHRASE_SIZE] {
            image
        } else {
            let mut merged = current;
            for (byte, new) in merged.iter_mut().zip(image) {
                *byte &= new;
            }
            merged
        };

        self.commit(merged)
    }

    /// Overwrites the value at `address` with exactly `value`.
    ///
    /// Unlike [`Self::write`] bits may go back to 1: the rest of the phrase is
    /// carried over unchanged and only the slot at `address` is replaced.
    pub fn replace(&mut self, address: u32, value: PhraseValue) -> Result<(), StoreError> {
        let offset = self.offset_of(address, value.width())?;
        let phrase = overlay(self.read_phrase(), offset, value);
        self.commit(phrase)
    }

    /// Loads the value of the given width at `address`. No flash command is issued.
    pub fn read(&self, address: u32, width: Width) -> Result<PhraseValue, StoreError> {
        let mut bytes = [0u8; 4];
        let bytes = &mut bytes[..width.bytes()];
        self.read_bytes(address, bytes)?;
        Ok(PhraseValue::from_le_bytes(width, bytes))
    }

    /// Reads the value held in `slot`.
    pub fn read_slot(&self, slot: Slot) -> Result<PhraseValue, StoreError> {
        self.read(slot.address, slot.width)
    }

    /// The whole phrase as currently stored.
    pub fn read_phrase(&self) -> [u8; PHRASE_SIZE] {
        let mut phrase = [0u8; PHRASE_SIZE];
        self.flash.read(self.base, &mut phrase);
        phrase
    }

    /// Erases the sector holding the phrase.
    ///
    /// The allocation table is left as is: slots allocated before the erase
    /// stay allocated and now read as all ones.
    pub fn erase_all(&mut self) -> Result<(), StoreError> {
        self.launch(FlashCommand::EraseSector {
            address: sector_base(self.base),
        })
    }

    impl_typed_access!(u8 => Byte, u16 => Word, u32 => DWord);

    fn read_bytes(&self, address: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        let width = Width::from_size(buf.len())?;
        self.offset_of(address, width)?;
        self.flash.read(address, buf);
        Ok(())
    }

    fn offset_of(&self, address: u32, width: Width) -> Result<usize, StoreError> {
        let offset = address
            .checked_sub(self.base)
            .map(|offset| offset as usize)
            .filter(|&offset| offset < PHRASE_SIZE)
            .ok_or(StoreError::OutOfRange)?;

        if offset % width.bytes() != 0 {
            return Err(StoreError::Misaligned);
        }
        Ok(offset)
    }

    /// Erases the sector and programs `phrase`.
    fn commit(&mut self, phrase: [u8; PHRASE_SIZE]) -> Result<(), StoreError> {
        self.launch(FlashCommand::EraseSector {
            address: sector_base(self.base),
        })?;
        self.launch(FlashCommand::ProgramPhrase {
            address: self.base,
            data: phrase,
        })
    }

    fn launch(&mut self, command: FlashCommand) -> Result<(), StoreError> {
        self.flash.launch(command).map_err(|fault| {
            warn!("flash command {} at {} failed: {}", command.code(), command.address(), fault);
            StoreError::from(fault)
        })
    }
}

/// `phrase` with the little-endian bytes of `value` placed at `offset`.
fn overlay(mut phrase: [u8; PHRASE_SIZE], offset: usize, value: PhraseValue) -> [u8; PHRASE_SIZE] {
    let len = value.width().bytes();
    phrase[offset..offset + len].copy_from_slice(&value.to_le_bytes()[..len]);
    phrase
}

impl<F: FlashController> core::fmt::Debug for PhraseStore<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhraseStore")
            .field("base", &self.base)
            .field("allocated", &self.table.used())
            .finish_non_exhaustive()
    }
}
