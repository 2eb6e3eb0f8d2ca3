//! Register map of the FIFO engine and decoding of its status word.
//!
//! The channel exposes two register blocks: the upstream block carries
//! host-to-engine words, the downstream block carries engine-to-host words.
//! Every register address is `block | offset`.

/// Upstream (host to engine) register block.
pub const UP: u32 = 0x00;

/// Downstream (engine to host) register block.
pub const DOWN: u32 = 0x40;

/// Data register, relative to a block.
pub const DATA: u32 = 0x00;

/// Status register, relative to a block.
pub const STATUS: u32 = 0x04;

/// Writing [`EOT_MAGIC`] here raises end-of-transfer on the upstream FIFO.
pub const EOT_RAISE: u32 = 0x08;

/// Writing 1 here asks the engine to reset both FIFOs.
pub const REQ_RESET: u32 = 0x0C;

/// Writing [`EOT_MAGIC`] here acknowledges a downstream end-of-transfer.
pub const EOT_ACK: u32 = 0x14;

pub const EOT_MAGIC: u32 = 0xFFFF_FFFF;

/// Number of word entries in each hardware FIFO.
pub const FIFO_DEPTH: usize = 8;

pub const STATUS_EOT_MASK: u32 = 0x0000_00FF;
pub const STATUS_ENTRY_COUNT_MASK: u32 = 0x000F_0000;
pub const STATUS_ENTRY_COUNT_SHIFT: u32 = 16;
pub const STATUS_EMPTY: u32 = 1 << 20;
pub const STATUS_RESET_REQ: u32 = 1 << 25;

/// Decoded view of a status register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status(pub u32);

impl Status {
    /// Entries currently occupied in the FIFO.
    #[inline]
    pub fn entries(self) -> usize {
        ((self.0 & STATUS_ENTRY_COUNT_MASK) >> STATUS_ENTRY_COUNT_SHIFT) as usize
    }

    /// Words the host can read from a downstream FIFO.
    #[inline]
    pub fn readable_words(self) -> usize {
        self.entries()
    }

    /// Free slots the host can fill in an upstream FIFO.
    #[inline]
    pub fn writable_words(self) -> usize {
        FIFO_DEPTH.saturating_sub(self.entries())
    }

    /// An end-of-transfer word sits somewhere in the FIFO.
    #[inline]
    pub fn eot_pending(self) -> bool {
        self.0 & STATUS_EOT_MASK != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 & STATUS_EMPTY != 0
    }

    #[inline]
    pub fn reset_requested(self) -> bool {
        self.0 & STATUS_RESET_REQ != 0
    }

    /// Build a status word from its fields. Used by simulated engines.
    pub fn encode(entries: usize, eot_flags: u8, reset_requested: bool) -> Self {
        let mut raw = ((entries as u32) << STATUS_ENTRY_COUNT_SHIFT) & STATUS_ENTRY_COUNT_MASK;
        raw |= eot_flags as u32;
        if entries == 0 {
            raw |= STATUS_EMPTY;
        }
        if reset_requested {
            raw |= STATUS_RESET_REQ;
        }
        Status(raw)
    }
}
