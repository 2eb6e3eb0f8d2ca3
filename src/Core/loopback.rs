//! In-memory stand-in for the remote FIFO engine.
//!
//! [`Loopback`] models both 8-deep hardware FIFOs behind the register map in
//! [`layout`](super::layout). The simulated engine consumes upstream words
//! until it sees an EOT, hands the collected request to a responder and
//! feeds the response plus its own EOT into the downstream FIFO.
//!
//! Handles are cheap clones of one shared engine, so a test can keep one
//! handle for inspection and fault injection while the device owns another.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::TransportError;
use super::layout::{
    Status, DATA, DOWN, EOT_ACK, EOT_MAGIC, EOT_RAISE, FIFO_DEPTH, REQ_RESET, STATUS, UP,
};
use super::transport::FifoTransport;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Entry {
    Data(u32),
    Eot,
}

struct Engine {
    upstream: VecDeque<Entry>,
    downstream: VecDeque<Entry>,
    /// Response entries that did not fit downstream yet.
    backlog: VecDeque<Entry>,
    /// Words of the request being received.
    request: Vec<u8>,
    responder: Responder,
    requests: Vec<Vec<u8>>,

    hold_upstream: bool,
    stall_responses: bool,
    stuck_reset: bool,
    reset_pending: bool,
    fail_after: Option<u64>,

    accesses: u64,
    eot_raised: u64,
    eot_acked: u64,
}

impl Engine {
    fn new(responder: Responder) -> Self {
        Self {
            upstream: VecDeque::with_capacity(FIFO_DEPTH),
            downstream: VecDeque::with_capacity(FIFO_DEPTH),
            backlog: VecDeque::new(),
            request: Vec::new(),
            responder,
            requests: Vec::new(),
            hold_upstream: false,
            stall_responses: false,
            stuck_reset: false,
            reset_pending: false,
            fail_after: None,
            accesses: 0,
            eot_raised: 0,
            eot_acked: 0,
        }
    }

    /// Count one register access and apply fault injection.
    fn access(&mut self) -> Result<(), TransportError> {
        self.accesses += 1;
        match self.fail_after {
            Some(0) => Err(TransportError(libc::EIO)),
            Some(ref mut left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Let the remote side make progress.
    fn step(&mut self) {
        if self.reset_pending && !self.stuck_reset {
            self.upstream.clear();
            self.downstream.clear();
            self.backlog.clear();
            self.request.clear();
            self.reset_pending = false;
        }

        if !self.hold_upstream {
            while let Some(entry) = self.upstream.pop_front() {
                match entry {
                    Entry::Data(word) => self.request.extend_from_slice(&word.to_ne_bytes()),
                    Entry::Eot => {
                        let request = std::mem::take(&mut self.request);
                        let response = (self.responder)(&request);
                        self.backlog.extend(
                            response
                                .chunks_exact(4)
                                .map(|c| Entry::Data(u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))),
                        );
                        self.backlog.push_back(Entry::Eot);
                        self.requests.push(request);
                    }
                }
            }
        }

        if !self.stall_responses {
            // One response at a time: nothing follows an EOT until it is acked.
            while self.downstream.len() < FIFO_DEPTH && !self.downstream.contains(&Entry::Eot) {
                match self.backlog.pop_front() {
                    Some(entry) => self.downstream.push_back(entry),
                    None => break,
                }
            }
        }
    }

    fn status(fifo: &VecDeque<Entry>, reset_requested: bool) -> Status {
        let eot_flags = fifo
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == Entry::Eot)
            .fold(0u8, |flags, (slot, _)| flags | (1 << slot));
        Status::encode(fifo.len(), eot_flags, reset_requested)
    }

    fn read(&mut self, reg: u32) -> Result<u32, TransportError> {
        self.access()?;
        self.step();
        match reg {
            r if r == UP | STATUS => Ok(Self::status(&self.upstream, self.reset_pending).0),
            r if r == DOWN | STATUS => Ok(Self::status(&self.downstream, false).0),
            r if r == DOWN | DATA => match self.downstream.pop_front() {
                Some(Entry::Data(word)) => Ok(word),
                Some(Entry::Eot) => Ok(EOT_MAGIC),
                None => Err(TransportError(libc::EIO)),
            },
            _ => Err(TransportError(libc::EINVAL)),
        }
    }

    fn write(&mut self, reg: u32, word: u32) -> Result<(), TransportError> {
        self.access()?;
        match reg {
            r if r == UP | DATA => {
                if self.upstream.len() >= FIFO_DEPTH {
                    return Err(TransportError(libc::EIO));
                }
                self.upstream.push_back(Entry::Data(word));
            }
            // EOT marks the end of the data already queued and needs no slot.
            r if r == UP | EOT_RAISE => {
                self.upstream.push_back(Entry::Eot);
                self.eot_raised += 1;
            }
            r if r == DOWN | EOT_ACK => self.eot_acked += 1,
            r if r == UP | REQ_RESET => self.reset_pending = true,
            _ => return Err(TransportError(libc::EINVAL)),
        }
        self.step();
        Ok(())
    }
}

/// A simulated FIFO engine. See the module docs.
#[derive(Clone)]
pub struct Loopback {
    engine: Arc<Mutex<Engine>>,
}

impl Loopback {
    /// An engine that answers every request with the request itself.
    pub fn new() -> Self {
        Self::with_responder(|request| request.to_vec())
    }

    /// An engine that answers with `responder(request)`. Trailing bytes that
    /// do not make a whole word are dropped.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        Self {
            engine: Arc::new(Mutex::new(Engine::new(Box::new(responder)))),
        }
    }

    /// Start with a half-received request and a stale response word, as a
    /// previous user walking away mid-transfer would leave the engine.
    pub fn dirty(self) -> Self {
        {
            let mut engine = self.engine.lock();
            engine.request.extend_from_slice(&0x5a5a_5a5au32.to_ne_bytes());
            engine.downstream.push_back(Entry::Data(0xa5a5_a5a5));
        }
        self
    }

    /// While set, the engine stops taking words from the upstream FIFO.
    pub fn hold_upstream(&self, hold: bool) {
        self.engine.lock().hold_upstream = hold;
    }

    /// While set, no response words reach the downstream FIFO.
    pub fn stall_responses(&self, stall: bool) {
        self.engine.lock().stall_responses = stall;
    }

    /// While set, a reset request is never honored.
    pub fn stuck_reset(&self, stuck: bool) {
        self.engine.lock().stuck_reset = stuck;
    }

    /// Every register access after the next `n` fails.
    pub fn fail_after(&self, n: u64) {
        self.engine.lock().fail_after = Some(n);
    }

    /// Requests the engine has received, in arrival order.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.engine.lock().requests.clone()
    }

    /// Bytes of a request whose EOT has not arrived yet: words the engine
    /// already took plus data words still queued upstream.
    pub fn pending_request(&self) -> Vec<u8> {
        let engine = self.engine.lock();
        let mut bytes = engine.request.clone();
        for entry in &engine.upstream {
            match entry {
                Entry::Data(word) => bytes.extend_from_slice(&word.to_ne_bytes()),
                Entry::Eot => break,
            }
        }
        bytes
    }

    pub fn eot_raised(&self) -> u64 {
        self.engine.lock().eot_raised
    }

    pub fn eot_acked(&self) -> u64 {
        self.engine.lock().eot_acked
    }

    /// Register accesses made so far, failed ones included.
    pub fn accesses(&self) -> u64 {
        self.engine.lock().accesses
    }

    /// Both FIFOs drained and no response outstanding.
    pub fn is_idle(&self) -> bool {
        let engine = self.engine.lock();
        engine.upstream.is_empty() && engine.downstream.is_empty() && engine.backlog.is_empty()
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl FifoTransport for Loopback {
    fn read_word(&mut self, reg: u32) -> Result<u32, TransportError> {
        self.engine.lock().read(reg)
    }

    fn write_word(&mut self, reg: u32, word: u32) -> Result<(), TransportError> {
        self.engine.lock().write(reg, word)
    }
}
