// Staging ring between a client and the pump - one per direction per client

use crossbeam_utils::CachePadded;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize};

/// Size in bytes of one hardware word. Every transfer moves whole words.
pub const WORD_SIZE: usize = 4;

/// Capacity of a ring in words.
pub const RING_WORDS: usize = 32;

/// Capacity of a ring in bytes.
pub const RING_BYTES: usize = RING_WORDS * WORD_SIZE;

/// A fixed-capacity circular buffer of hardware words.
///
/// ### Concurrency Design:
/// - **Cursors**: `rpos` and `wpos` are word indices in `0..RING_WORDS`.
///   Each has a single writer at any time (the client or the pump, never both)
///   and is published with a `Release` store; the other side reads it with
///   `Acquire`, which also makes the word cells written before it visible.
/// - **Full flag**: when the cursors coincide the ring is either empty or
///   full; `full` is what tells them apart.
/// - **Words**: plain atomic cells so the ring can be shared through an `Arc`
///   without `unsafe`. They are accessed with `Relaxed` ordering and ordered
///   by the cursor stores.
pub struct RingBuffer {
    /// Word storage.
    pub(crate) words: [AtomicU32; RING_WORDS],

    /// Index of the next word to read.
    /// Padded so the reader's and writer's cursors never share a cache line.
    pub(crate) rpos: CachePadded<AtomicUsize>,

    /// Index of the next word to write.
    pub(crate) wpos: CachePadded<AtomicUsize>,

    /// Set when `wpos` caught up with `rpos`.
    pub(crate) full: AtomicBool,
}
