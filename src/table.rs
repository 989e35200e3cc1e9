use bitmaps::Bitmap;

use crate::{error::StoreError, flash::PHRASE_SIZE};

/// Width of a persisted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Width {
    Byte = 1,
    Word = 2,
    DWord = 4,
}

impl Width {
    /// Maps a byte count onto a width; anything but 1, 2 or 4 is rejected.
    pub const fn from_size(size: usize) -> Result<Self, StoreError> {
        match size {
            1 => Ok(Width::Byte),
            2 => Ok(Width::Word),
            4 => Ok(Width::DWord),
            _ => Err(StoreError::InvalidSize),
        }
    }

    pub const fn bytes(self) -> usize {
        self as usize
    }
}

/// Allocation map for the byte slots of one phrase.
///
/// Lives in RAM only: every boot starts from an all-free table while the
/// flash keeps its contents, so slot identity comes purely from the order in
/// which callers allocate.
pub(crate) struct SlotTable {
    taken: Bitmap<PHRASE_SIZE>,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self {
            taken: Bitmap::new(),
        }
    }

    /// Claims the first free run of `width` slots that starts on a multiple of
    /// `width`, returning its offset within the phrase.
    pub(crate) fn allocate(&mut self, width: Width) -> Result<usize, StoreError> {
        let size = width.bytes();
        let offset = (0..PHRASE_SIZE)
            .step_by(size)
            .find(|&start| (start..start + size).all(|slot| !self.taken.get(slot)))
            .ok_or(StoreError::StoreFull)?;

        for slot in offset..offset + size {
            self.taken.set(slot, true);
        }
        Ok(offset)
    }

    pub(crate) fn is_taken(&self, offset: usize) -> bool {
        offset < PHRASE_SIZE && self.taken.get(offset)
    }

    /// Number of allocated byte slots.
    pub(crate) fn used(&self) -> usize {
        self.taken.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_from_size() {
        assert_eq!(Width::from_size(1), Ok(Width::Byte));
        assert_eq!(Width::from_size(2), Ok(Width::Word));
        assert_eq!(Width::from_size(4), Ok(Width::DWord));
        assert_eq!(Width::from_size(0), Err(StoreError::InvalidSize));
        assert_eq!(Width::from_size(3), Err(StoreError::InvalidSize));
        assert_eq!(Width::from_size(8), Err(StoreError::InvalidSize));
    }

    #[test]
    fn byte_slots_fill_phrase_in_order() {
        let mut table = SlotTable::new();

        for expected in 0..PHRASE_SIZE {
            assert_eq!(table.allocate(Width::Byte), Ok(expected));
        }
        assert_eq!(table.allocate(Width::Byte), Err(StoreError::StoreFull));
        assert_eq!(table.used(), PHRASE_SIZE);
    }

    #[test]
    fn word_allocation_skips_odd_offsets() {
        let mut table = SlotTable::new();

        assert_eq!(table.allocate(Width::Byte), Ok(0));
        // Offset 1 is free but odd, so the word lands on 2.
        assert_eq!(table.allocate(Width::Word), Ok(2));
        assert_eq!(table.allocate(Width::Word), Ok(4));
        assert_eq!(table.allocate(Width::Word), Ok(6));
        assert_eq!(table.allocate(Width::Word), Err(StoreError::StoreFull));

        // The odd hole is still usable by a byte.
        assert_eq!(table.allocate(Width::Byte), Ok(1));
    }

    #[test]
    fn dword_allocation_is_quad_aligned() {
        let mut table = SlotTable::new();

        assert_eq!(table.allocate(Width::Word), Ok(0));
        assert_eq!(table.allocate(Width::DWord), Ok(4));
        assert_eq!(table.allocate(Width::DWord), Err(StoreError::StoreFull));
        assert_eq!(table.allocate(Width::Word), Ok(2));
    }

    #[test]
    fn alignment_holds_for_mixed_sequences() {
        let sequences: [&[Width]; 3] = [
            &[Width::Byte, Width::DWord, Width::Word, Width::Byte],
            &[Width::Word, Width::Byte, Width::Word, Width::Byte, Width::Byte],
            &[Width::Byte, Width::Byte, Width::Byte, Width::DWord],
        ];

        for sequence in sequences {
            let mut table = SlotTable::new();
            for &width in sequence {
                if let Ok(offset) = table.allocate(width) {
                    assert_eq!(offset % width.bytes(), 0, "{width:?} at {offset}");
                    assert!(offset + width.bytes() <= PHRASE_SIZE);
                }
            }
        }
    }

    #[test]
    fn is_taken_tracks_allocations() {
        let mut table = SlotTable::new();
        table.allocate(Width::Word).unwrap();

        assert!(table.is_taken(0));
        assert!(table.is_taken(1));
        assert!(!table.is_taken(2));
        assert!(!table.is_taken(PHRASE_SIZE));
    }
}
