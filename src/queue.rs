use core::cell::RefCell;

use critical_section::Mutex;

struct Ring<const C: usize> {
    buffer: [u8; C],
    start: usize,
    end: usize,
    count: usize,
}

impl<const C: usize> Ring<C> {
    const fn new() -> Self {
        Self {
            buffer: [0; C],
            start: 0,
            end: 0,
            count: 0,
        }
    }

    fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
        self.count = 0;
    }

    fn put(&mut self, byte: u8) -> bool {
        if self.count >= C {
            return false;
        }

        self.buffer[self.end] = byte;
        self.end = (self.end + 1) % C;
        self.count += 1;
        true
    }

    fn get(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }

        let byte = self.buffer[self.start];
        self.start = (self.start + 1) % C;
        self.count -= 1;
        Some(byte)
    }
}

/// Fixed-capacity FIFO of bytes shared between interrupt handlers and threads.
///
/// Every operation runs inside a critical section, so a receive ISR can
/// `put` while a thread `get`s (or the other way round for transmit) without
/// tearing the ring indices. Nothing here blocks: a full queue rejects the
/// byte and an empty queue yields `None`, and the caller decides whether to
/// drop or retry.
///
/// `C` is the capacity in bytes and must be non-zero.
pub struct ByteQueue<const C: usize> {
    ring: Mutex<RefCell<Ring<C>>>,
}

impl<const C: usize> ByteQueue<C> {
    /// Creates an empty queue. Usable in a `static` initializer.
    pub const fn new() -> Self {
        assert!(C > 0, "queue capacity must be non-zero");
        Self {
            ring: Mutex::new(RefCell::new(Ring::new())),
        }
    }

    /// Discards any queued bytes.
    pub fn init(&self) {
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).reset());
    }

    /// Appends `byte`, returning false if the queue is already full.
    pub fn put(&self, byte: u8) -> bool {
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).put(byte))
    }

    /// Removes and returns the oldest byte, or `None` if the queue is empty.
    pub fn get(&self) -> Option<u8> {
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).get())
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow_ref(cs).count)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == C
    }

    pub const fn capacity(&self) -> usize {
        C
    }
}

impl<const C: usize> Default for ByteQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> core::fmt::Debug for ByteQueue<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ByteQueue")
            .field("capacity", &C)
            .field("len", &self.len())
            .finish()
    }
}
