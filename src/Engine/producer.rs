use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use super::client::Client;
use super::Buffer::WORD_SIZE;
use crate::Core::error::{FifoError, Result};

impl Client {
    /// Send `buf` as one request.
    ///
    /// `buf.len()` must be a multiple of 4. The bytes are staged through the
    /// write ring in as many chunks as needed, but the channel sees a single
    /// end-of-transfer marker once the last chunk is out.
    ///
    /// An interrupted wait cancels the transfer and reports the bytes staged
    /// before the interrupt in [`FifoError::Interrupted`]. Nothing is rolled
    /// back; the pump finishes the handshake on its own.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if buf.len() % WORD_SIZE != 0 {
            return Err(FifoError::Misaligned(buf.len()));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let wbuf = &self.buffers.wbuf;
        let mut state = self.device.state.lock();

        if self.nonblocking.load(Ordering::Relaxed)
            && state.next_active().is_some()
            && wbuf.writable_bytes() < buf.len()
        {
            return Err(FifoError::WouldBlock);
        }

        let xfr = state.enqueue(self.id, &self.buffers)?;
        debug!(device = %self.device.name, client = self.id, transfer = xfr, len = buf.len(), "transfer queued");

        let id = self.id;
        let mut staged = 0usize;
        while staged < buf.len() {
            let waited = self.wait_until(&mut state, |s| {
                s.fatal.is_some()
                    || (s.client_head(id).map(|t| t.id) == Some(xfr) && !wbuf.is_full())
            });

            if let Err(FifoError::Interrupted { .. }) = waited {
                // Words of this transfer still in the ring must not leak into
                // the client's next request.
                if state.client_head(id).is_some_and(|t| t.id == xfr) {
                    wbuf.init();
                }
                state.cancel(id, xfr);
                self.device.kick();
                warn!(device = %self.device.name, client = id, transfer = xfr, staged, "write interrupted, transfer canceled");
                return Err(FifoError::Interrupted { staged });
            }
            waited?;
            state.check()?;

            let n = wbuf.copy_in(&buf[staged..]);
            wbuf.produce(n)?;
            staged += n;

            if staged == buf.len() {
                if let Some(t) = state.transfers.get_mut(&xfr) {
                    t.write_complete = true;
                }
            }
            self.device.kick();
        }

        Ok(staged)
    }
}
