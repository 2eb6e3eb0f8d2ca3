use std::sync::atomic::Ordering;

use tracing::{error, trace};

use super::client::Client;
use super::Buffer::WORD_SIZE;
use super::Structs::TransferState;
use crate::Core::error::{FifoError, Result};

impl Client {
    /// Copy response bytes of this client's oldest transfer into `buf`.
    ///
    /// `buf.len()` must be a multiple of 4. Blocks until response bytes are
    /// staged, the oldest transfer completes or the device fails. Returns 0
    /// once the client has no transfer left to read from.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() % WORD_SIZE != 0 {
            return Err(FifoError::Misaligned(buf.len()));
        }

        let rbuf = &self.buffers.rbuf;
        let mut state = self.device.state.lock();
        state.check()?;

        if self.nonblocking.load(Ordering::Relaxed) {
            let pending = state
                .client_head(self.id)
                .is_some_and(|xfr| xfr.state.response_pending());
            if !pending {
                return Err(FifoError::WouldBlock);
            }
        }

        let id = self.id;
        self.wait_until(&mut state, |s| {
            s.fatal.is_some()
                || !rbuf.is_empty()
                || s.client_head(id)
                    .map_or(true, |xfr| xfr.state == TransferState::Complete)
        })?;
        state.check()?;

        let n = rbuf.copy_out(buf);
        if rbuf.consume(n)? {
            let head = state.client_head(self.id).map(|xfr| (xfr.id, xfr.state));
            match head {
                None if n == 0 => return Ok(0),
                None => {
                    error!(device = %self.device.name, client = self.id, "response drained with no owning transfer");
                    return Err(FifoError::Protocol("response drained with no owning transfer"));
                }
                Some((_, s)) if s != TransferState::Complete => self.device.kick(),
                Some((xfr, _)) => {
                    state.retire(self.id, xfr);
                    trace!(device = %self.device.name, client = self.id, transfer = xfr, "transfer retired");
                    drop(state);
                    self.device.wait.notify_all();
                }
            }
        }

        Ok(n)
    }
}
