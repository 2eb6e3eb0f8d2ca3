use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize};

use crossbeam_utils::CachePadded;

use super::Buffer::{RingBuffer, RING_BYTES, RING_WORDS, WORD_SIZE};
use crate::Core::error::{FifoError, Result};

impl RingBuffer {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self {
            words: std::array::from_fn(|_| AtomicU32::new(0)),
            rpos: CachePadded::new(AtomicUsize::new(0)),
            wpos: CachePadded::new(AtomicUsize::new(0)),
            full: AtomicBool::new(false),
        }
    }

    /// Reset both cursors and clear the full flag. Stored words are left as is.
    pub fn init(&self) {
        self.full.store(false, Release);
        self.rpos.store(0, Release);
        self.wpos.store(0, Release);
    }

    #[inline]
    fn readable_words(&self) -> usize {
        if self.full.load(Acquire) {
            return RING_WORDS;
        }
        let rpos = self.rpos.load(Acquire);
        let wpos = self.wpos.load(Acquire);
        (wpos + RING_WORDS - rpos) % RING_WORDS
    }

    #[inline]
    fn writable_words(&self) -> usize {
        RING_WORDS - self.readable_words()
    }

    /// Bytes staged and not yet consumed.
    #[inline]
    pub fn readable_bytes(&self) -> usize {
        self.readable_words() * WORD_SIZE
    }

    /// Bytes that can be produced before the ring is full.
    #[inline]
    pub fn writable_bytes(&self) -> usize {
        RING_BYTES - self.readable_bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.readable_words() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.full.load(Acquire)
    }

    fn check(n: usize, available: usize) -> Result<()> {
        if n % WORD_SIZE != 0 {
            return Err(FifoError::Misaligned(n));
        }
        if n > available {
            return Err(FifoError::OutOfRange {
                requested: n,
                available,
            });
        }
        Ok(())
    }

    /// Advance the read cursor past `n` bytes.
    /// Returns whether the ring is now empty. A rejected call changes nothing.
    pub fn consume(&self, n: usize) -> Result<bool> {
        Self::check(n, self.readable_bytes())?;
        if n > 0 {
            self.full.store(false, Release);
        }
        let rpos = (self.rpos.load(Relaxed) + n / WORD_SIZE) % RING_WORDS;
        self.rpos.store(rpos, Release);
        Ok(self.is_empty())
    }

    /// Advance the write cursor past `n` bytes.
    /// Returns whether the ring is now full. A rejected call changes nothing.
    pub fn produce(&self, n: usize) -> Result<bool> {
        Self::check(n, self.writable_bytes())?;
        let wpos = (self.wpos.load(Relaxed) + n / WORD_SIZE) % RING_WORDS;
        if n > 0 && wpos == self.rpos.load(Acquire) {
            self.full.store(true, Release);
        }
        self.wpos.store(wpos, Release);
        Ok(self.is_full())
    }

    /// Copy readable words into `dst` without consuming them.
    ///
    /// Copies as many whole words as fit in `dst` and are readable, following
    /// the wrap-around. Returns the byte count copied.
    pub fn copy_out(&self, dst: &mut [u8]) -> usize {
        let words = (dst.len() / WORD_SIZE).min(self.readable_words());
        let start = self.rpos.load(Acquire);
        for (i, chunk) in dst.chunks_exact_mut(WORD_SIZE).take(words).enumerate() {
            let word = self.words[(start + i) % RING_WORDS].load(Relaxed);
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        words * WORD_SIZE
    }

    /// Copy whole words from `src` into free space without producing them.
    /// Returns the byte count copied.
    pub fn copy_in(&self, src: &[u8]) -> usize {
        let words = (src.len() / WORD_SIZE).min(self.writable_words());
        let start = self.wpos.load(Acquire);
        for (i, chunk) in src.chunks_exact(WORD_SIZE).take(words).enumerate() {
            let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            self.words[(start + i) % RING_WORDS].store(word, Relaxed);
        }
        words * WORD_SIZE
    }

    /// The word at the read cursor, if any.
    #[inline]
    pub fn front_word(&self) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        Some(self.words[self.rpos.load(Acquire)].load(Relaxed))
    }

    /// Store `word` at the write cursor without producing it.
    /// Returns false when the ring has no free slot.
    #[inline]
    pub fn stage_word(&self, word: u32) -> bool {
        if self.is_full() {
            return false;
        }
        self.words[self.wpos.load(Acquire)].store(word, Relaxed);
        true
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produce_zero_on_empty_ring_is_not_full() {
        let rb = RingBuffer::new();
        assert!(!rb.produce(0).unwrap());
        assert_eq!(rb.readable_bytes(), 0);
    }

    #[test]
    fn consume_zero_on_full_ring_keeps_it_full() {
        let rb = RingBuffer::new();
        assert!(rb.produce(RING_BYTES).unwrap());
        assert!(!rb.consume(0).unwrap());
        assert!(rb.is_full());
    }

    #[test]
    fn staged_word_is_invisible_until_produced() {
        let rb = RingBuffer::new();
        assert!(rb.stage_word(0xdead_beef));
        assert_eq!(rb.front_word(), None);
        rb.produce(WORD_SIZE).unwrap();
        assert_eq!(rb.front_word(), Some(0xdead_beef));
    }
}
