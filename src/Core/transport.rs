//! The hardware seam. The engine only ever talks to the channel through
//! [`FifoTransport`], and only from the pump worker.

use super::error::TransportError;
use super::layout::{Status, DATA, DOWN, EOT_ACK, EOT_MAGIC, EOT_RAISE, STATUS, UP};

/// Word-oriented register access to one FIFO channel.
///
/// Data words are passed through untouched: the engine hands over the
/// native-endian value of four staged bytes and expects the same back.
/// Any error returned here is fatal for the device using the transport.
pub trait FifoTransport: Send + 'static {
    fn read_word(&mut self, reg: u32) -> Result<u32, TransportError>;

    fn write_word(&mut self, reg: u32, word: u32) -> Result<(), TransportError>;

    fn upstream_status(&mut self) -> Result<Status, TransportError> {
        self.read_word(UP | STATUS).map(Status)
    }

    fn downstream_status(&mut self) -> Result<Status, TransportError> {
        self.read_word(DOWN | STATUS).map(Status)
    }

    fn push_data(&mut self, word: u32) -> Result<(), TransportError> {
        self.write_word(UP | DATA, word)
    }

    fn pop_data(&mut self) -> Result<u32, TransportError> {
        self.read_word(DOWN | DATA)
    }

    fn raise_eot(&mut self) -> Result<(), TransportError> {
        self.write_word(UP | EOT_RAISE, EOT_MAGIC)
    }

    /// Consume the downstream EOT word and acknowledge it.
    fn ack_eot(&mut self) -> Result<(), TransportError> {
        let _discard = self.pop_data()?;
        self.write_word(DOWN | EOT_ACK, EOT_MAGIC)
    }
}

impl<T: FifoTransport + ?Sized> FifoTransport for Box<T> {
    fn read_word(&mut self, reg: u32) -> Result<u32, TransportError> {
        (**self).read_word(reg)
    }

    fn write_word(&mut self, reg: u32, word: u32) -> Result<(), TransportError> {
        (**self).write_word(reg, word)
    }
}
