//! Persisted tower configuration.
//!
//! The tower keeps two 16-bit words in the configuration phrase: its number
//! and its mode. They are allocated in that order on every boot, so they
//! always land at offsets 0 and 2.

use crate::{
    error::StoreError,
    flash::{FlashController, PHRASE_SIZE},
    store::{PhraseStore, PhraseValue, Slot},
};

/// Offset that makes [`TowerSettings::program_byte`] erase the phrase.
pub const ERASE_OFFSET: u8 = PHRASE_SIZE as u8;

const ERASED_WORD: u16 = 0xFFFF;

/// Values written on boot for words that read back as erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TowerDefaults {
    pub number: u16,
    pub mode: u16,
}

impl Default for TowerDefaults {
    fn default() -> Self {
        Self {
            number: 5696,
            mode: 1,
        }
    }
}

/// Tower number and mode backed by a [`PhraseStore`].
pub struct TowerSettings<F: FlashController> {
    store: PhraseStore<F>,
    number: Slot,
    mode: Slot,
}

impl<F: FlashController> TowerSettings<F> {
    /// Allocates both words and writes the defaults into any that are blank.
    ///
    /// `store` should be fresh from boot: the words only land at their fixed
    /// offsets if nothing was allocated before.
    pub fn load(mut store: PhraseStore<F>, defaults: TowerDefaults) -> Result<Self, StoreError> {
        let number = store.allocate(2)?;
        let mode = store.allocate(2)?;
        debug_assert_eq!(number.address(), store.base());

        let mut settings = Self {
            store,
            number,
            mode,
        };

        if settings.number()? == ERASED_WORD {
            info!("tower number blank, writing default {}", defaults.number);
            settings.set_number(defaults.number)?;
        }
        if settings.mode()? == ERASED_WORD {
            info!("tower mode blank, writing default {}", defaults.mode);
            settings.set_mode(defaults.mode)?;
        }

        Ok(settings)
    }

    pub fn number(&self) -> Result<u16, StoreError> {
        self.store.read_u16(self.number.address())
    }

    pub fn set_number(&mut self, number: u16) -> Result<(), StoreError> {
        self.store.replace(self.number.address(), PhraseValue::Word(number))
    }

    pub fn mode(&self) -> Result<u16, StoreError> {
        self.store.read_u16(self.mode.address())
    }

    pub fn set_mode(&mut self, mode: u16) -> Result<(), StoreError> {
        self.store.replace(self.mode.address(), PhraseValue::Word(mode))
    }

    /// Raw byte write into the phrase.
    ///
    /// Offsets 0 to 7 go through [`PhraseStore::write`], so bits can only be
    /// cleared. Offset [`ERASE_OFFSET`] erases the whole phrase instead.
    pub fn program_byte(&mut self, offset: u8, value: u8) -> Result<(), StoreError> {
        match offset {
            ERASE_OFFSET => self.store.erase_all(),
            offset if offset < ERASE_OFFSET => self.store.write_u8(self.address(offset), value),
            _ => Err(StoreError::OutOfRange),
        }
    }

    /// Raw byte read from the phrase, offsets 0 to 7.
    pub fn read_byte(&self, offset: u8) -> Result<u8, StoreError> {
        if offset >= ERASE_OFFSET {
            return Err(StoreError::OutOfRange);
        }
        self.store.read_u8(self.address(offset))
    }

    pub fn store(&self) -> &PhraseStore<F> {
        &self.store
    }

    pub fn into_store(self) -> PhraseStore<F> {
        self.store
    }

    fn address(&self, offset: u8) -> u32 {
        self.store.base() + offset as u32
    }
}
