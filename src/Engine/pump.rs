//! The pump: the only code that touches the hardware channel.
//!
//! One worker thread per device sleeps on a re-armable deadline
//! ([`PumpTimer`]). Producers arm it for "now"; the pump arms it for later
//! when the channel needs time (no free upstream slot, no response data yet).
//! Each run takes the device lock and advances the active transfer as far as
//! the hardware allows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use super::device::DeviceShared;
use super::Buffer::{RingBuffer, WORD_SIZE};
use super::Structs::{Transfer, TransferState};
use crate::Core::error::{FifoError, Result};
use crate::Core::transport::FifoTransport;

struct TimerSlot {
    expires: Option<Instant>,
    shutdown: bool,
}

/// A one-shot deadline the pump worker sleeps on.
///
/// Arming an armed timer keeps the earlier deadline, so a producer's
/// "run now" always wins over a pending backoff.
pub(crate) struct PumpTimer {
    slot: Mutex<TimerSlot>,
    cond: Condvar,
}

impl PumpTimer {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(TimerSlot {
                expires: None,
                shutdown: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn arm_now(&self) {
        self.arm_at(Instant::now());
    }

    pub(crate) fn arm_after(&self, delay: Duration) {
        self.arm_at(Instant::now() + delay);
    }

    fn arm_at(&self, at: Instant) {
        let mut slot = self.slot.lock();
        if slot.shutdown {
            return;
        }
        slot.expires = Some(slot.expires.map_or(at, |cur| cur.min(at)));
        self.cond.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.slot.lock().expires.is_some()
    }

    pub(crate) fn shutdown(&self) {
        let mut slot = self.slot.lock();
        slot.shutdown = true;
        slot.expires = None;
        self.cond.notify_all();
    }

    /// Block until the deadline passes and disarm. False once shut down.
    fn wait_expired(&self) -> bool {
        let mut slot = self.slot.lock();
        loop {
            if slot.shutdown {
                return false;
            }
            match slot.expires {
                Some(at) if at <= Instant::now() => {
                    slot.expires = None;
                    return true;
                }
                Some(at) => {
                    self.cond.wait_until(&mut slot, at);
                }
                None => self.cond.wait(&mut slot),
            }
        }
    }
}

/// How a pump run left the active transfer.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// The channel needs time; run again after the reschedule interval.
    Backoff,
    /// Waiting on the client (more request bytes or free response space).
    Stalled,
    /// The downstream EOT was acknowledged.
    Completed,
}

pub(crate) struct Pump {
    device: Arc<DeviceShared>,
    transport: Box<dyn FifoTransport>,
    /// Stand-in rings for canceled transfers; never holds client data.
    scratch: RingBuffer,
}

impl Pump {
    pub(crate) fn new(device: Arc<DeviceShared>, transport: Box<dyn FifoTransport>) -> Self {
        Self {
            device,
            transport,
            scratch: RingBuffer::new(),
        }
    }

    /// Worker loop. Returns once the device timer is shut down.
    pub(crate) fn run(mut self) {
        while self.device.timer.wait_expired() {
            self.run_once();
        }
        trace!(device = %self.device.name, "pump worker exiting");
    }

    pub(crate) fn run_once(&mut self) {
        let device = Arc::clone(&self.device);
        let mut state = device.state.lock();

        if state.fatal.is_none() {
            if let Some(id) = state.next_active() {
                let outcome = match state.transfers.get_mut(&id) {
                    Some(xfr) => self.service(xfr),
                    None => Err(FifoError::Protocol("active transfer missing from arena")),
                };
                trace!(device = %device.name, transfer = id, ?outcome, "pump run");

                match outcome {
                    Ok(Step::Backoff) => device.timer.arm_after(device.config.reschedule_interval),
                    Ok(Step::Stalled) => {}
                    Ok(Step::Completed) => {
                        state.complete_active(id);
                        if state.next_active().is_some() {
                            device.timer.arm_now();
                        }
                    }
                    Err(err) => {
                        error!(device = %device.name, transfer = id, "fatal channel failure: {err}");
                        state.fail(err);
                    }
                }
            }
        }

        drop(state);
        device.wait.notify_all();
    }

    /// Advance one transfer: drain its request, raise EOT, fill its response.
    fn service(&mut self, xfr: &mut Transfer) -> Result<Step> {
        let buffers = Arc::clone(&xfr.buffers);
        let canceled = xfr.canceled;

        // A departed client's rings are never touched again. The handshake
        // still runs to the end against the scratch ring so the channel is
        // left idle for the next transfer.
        let (wbuf, rbuf) = if canceled {
            self.scratch.init();
            if !xfr.state.response_pending() {
                xfr.write_complete = true;
            }
            (&self.scratch, &self.scratch)
        } else {
            (&buffers.wbuf, &buffers.rbuf)
        };

        if !xfr.state.response_pending() {
            while !wbuf.is_empty() {
                let free = self.transport.upstream_status()?.writable_words();
                if free == 0 {
                    return Ok(Step::Backoff);
                }

                let count = free.min(wbuf.readable_bytes() / WORD_SIZE);
                for _ in 0..count {
                    let Some(word) = wbuf.front_word() else {
                        break;
                    };
                    self.transport.push_data(word)?;
                    wbuf.consume(WORD_SIZE)?;
                }
                xfr.state = TransferState::Draining;
            }

            if !xfr.write_complete {
                return Ok(Step::Stalled);
            }

            self.transport.raise_eot()?;
            xfr.write_complete = false;
            xfr.state = TransferState::AwaitingResponse;
            debug!(transfer = xfr.id, canceled, "request sent");
        }

        while !rbuf.is_full() {
            let status = self.transport.downstream_status()?;
            let available = status.readable_words();
            if available == 0 {
                let now = Instant::now();
                match xfr.data_deadline {
                    None => {
                        xfr.data_deadline = Some(now + self.device.config.response_timeout);
                    }
                    Some(deadline) if now > deadline => return Err(FifoError::Timeout),
                    Some(_) => {}
                }
                return Ok(Step::Backoff);
            }
            xfr.data_deadline = None;
            xfr.state = TransferState::Filling;

            // The EOT word is last in the FIFO. Only take it together with
            // the data ahead of it; otherwise leave it for a later run.
            let room = rbuf.writable_bytes() / WORD_SIZE;
            let eot = status.eot_pending() && available <= room;
            let count = if eot { available - 1 } else { available.min(room) };

            for _ in 0..count {
                let word = self.transport.pop_data()?;
                rbuf.stage_word(word);
                if !canceled {
                    rbuf.produce(WORD_SIZE)?;
                }
            }

            if eot {
                self.transport.ack_eot()?;
                xfr.state = TransferState::Complete;
                return Ok(Step::Completed);
            }
        }

        Ok(Step::Stalled)
    }
}
