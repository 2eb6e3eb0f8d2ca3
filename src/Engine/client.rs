use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::MutexGuard;
use tracing::debug;

use super::device::{DeviceShared, DeviceState};
use super::Structs::{ClientBuffers, ClientId, TransferState};
use crate::Core::error::{FifoError, Result};

/// One session on a device.
///
/// A client owns a response ring and a request ring and issues transfers in
/// call order: each `write` is one request and the following `read`s return
/// its response. A `read` returns 0 once every response has been consumed.
///
/// All calls take `&self`, so one thread may block in `read` while another
/// writes. Dropping the client closes it.
pub struct Client {
    pub(crate) id: ClientId,
    pub(crate) device: Arc<DeviceShared>,
    pub(crate) buffers: Arc<ClientBuffers>,
    pub(crate) nonblocking: AtomicBool,
    pub(crate) interrupts: Arc<InterruptLatch>,
    released: bool,
}

/// Readiness snapshot for multiplexed waiting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    /// The device carries a fatal error.
    pub error: bool,
    /// Response bytes are waiting in the read ring.
    pub readable: bool,
    /// The write ring has free space.
    pub writable: bool,
}

/// Interrupts issued against a client and the newest one already reported.
/// Both counters only move under the device lock.
#[derive(Default)]
pub(crate) struct InterruptLatch {
    issued: AtomicU64,
    reported: AtomicU64,
}

/// Breaks a client out of its blocking waits with [`FifoError::Interrupted`].
///
/// Every wait of the client that is blocked when `interrupt` runs fails, so a
/// reader and a writer sharing the client both return. With no wait blocked,
/// the interrupt is held for the next one.
#[derive(Clone)]
pub struct Interrupter {
    latch: Arc<InterruptLatch>,
    device: Weak<DeviceShared>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        match self.device.upgrade() {
            Some(device) => {
                let state = device.state.lock();
                self.latch.issued.fetch_add(1, Ordering::AcqRel);
                drop(state);
                device.wait.notify_all();
            }
            None => {
                self.latch.issued.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}

impl Client {
    pub(crate) fn open(device: &Arc<DeviceShared>, nonblocking: bool) -> Result<Self> {
        let id = device.next_client_id();
        {
            let mut state = device.state.lock();
            state.check()?;
            state.client_queues.insert(id, VecDeque::new());
        }
        debug!(device = %device.name, client = id, nonblocking, "client opened");

        Ok(Self {
            id,
            device: Arc::clone(device),
            buffers: Arc::new(ClientBuffers::default()),
            nonblocking: AtomicBool::new(nonblocking),
            interrupts: Arc::new(InterruptLatch::default()),
            released: false,
        })
    }

    pub fn set_nonblocking(&self, nonblocking: bool) {
        self.nonblocking.store(nonblocking, Ordering::Relaxed);
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            latch: Arc::clone(&self.interrupts),
            device: Arc::downgrade(&self.device),
        }
    }

    pub fn readiness(&self) -> Readiness {
        let state = self.device.state.lock();
        Readiness {
            error: state.fatal.is_some(),
            readable: !self.buffers.rbuf.is_empty(),
            writable: !self.buffers.wbuf.is_full(),
        }
    }

    /// Close the session without waiting for the hardware.
    ///
    /// Transfers not yet complete are canceled and handed to the pump.
    /// Returns the device's fatal error, if it has one.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut state = self.device.state.lock();
        let own = state.client_queues.remove(&self.id).unwrap_or_default();
        let mut canceled = 0usize;
        for id in own {
            let complete = match state.transfers.get_mut(&id) {
                Some(xfr) if xfr.state == TransferState::Complete => true,
                Some(xfr) => {
                    xfr.canceled = true;
                    false
                }
                None => continue,
            };
            if complete {
                state.transfers.remove(&id);
            } else {
                canceled += 1;
            }
        }
        if canceled > 0 {
            self.device.kick();
        }
        debug!(device = %self.device.name, client = self.id, canceled, "client closed");
        state.check()
    }

    /// Wait on the device condition until `ready` holds.
    ///
    /// The predicate runs under the device lock on every wake. An interrupt
    /// issued after the last one reported ends the wait with
    /// `Interrupted { staged: 0 }`.
    pub(crate) fn wait_until<F>(&self, state: &mut MutexGuard<'_, DeviceState>, mut ready: F) -> Result<()>
    where
        F: FnMut(&DeviceState) -> bool,
    {
        let seen = self.interrupts.reported.load(Ordering::Acquire);
        loop {
            if ready(&**state) {
                return Ok(());
            }
            let issued = self.interrupts.issued.load(Ordering::Acquire);
            if issued > seen {
                self.interrupts.reported.fetch_max(issued, Ordering::AcqRel);
                return Err(FifoError::Interrupted { staged: 0 });
            }
            self.device.wait.wait(state);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl io::Read for Client {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Client::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Read for &Client {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Client::read(*self, buf).map_err(io::Error::from)
    }
}

impl io::Write for Client {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Client::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &Client {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Client::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
