// One queued request/response round trip and the buffers it runs against

use std::sync::Arc;
use std::time::Instant;

use crate::Engine::Buffer::RingBuffer;

pub type TransferId = u64;
pub type ClientId = u64;

/// Phase of a transfer. Phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransferState {
    /// Enqueued, the pump has not looked at it yet.
    Queued,
    /// The pump is moving staged request words to the upstream FIFO.
    Draining,
    /// EOT was raised upstream; no response word has arrived yet.
    AwaitingResponse,
    /// Response words are arriving.
    Filling,
    /// The downstream EOT was acknowledged.
    Complete,
}

impl TransferState {
    /// EOT has gone out and the engine owes us a response.
    #[inline]
    pub fn response_pending(self) -> bool {
        self >= TransferState::AwaitingResponse
    }
}

/// The two staging rings of one client. Shared by the client handle and
/// every transfer it creates; the `Arc` count is the client's reference count.
#[derive(Default)]
pub struct ClientBuffers {
    /// Response words filled by the pump, drained by `read`.
    pub rbuf: RingBuffer,
    /// Request words staged by `write`, drained by the pump.
    pub wbuf: RingBuffer,
}

/// A transfer as stored in the device arena.
///
/// It refers to its client's rings, it does not own them: the client handle
/// may be gone while the transfer is still queued, in which case the transfer
/// is `canceled` and the pump stops touching the rings.
pub struct Transfer {
    pub(crate) id: TransferId,
    pub(crate) client: ClientId,
    pub(crate) buffers: Arc<ClientBuffers>,
    pub(crate) state: TransferState,
    /// Set once by the writer after its final chunk, cleared when EOT is raised.
    pub(crate) write_complete: bool,
    pub(crate) canceled: bool,
    /// Armed the first time the downstream FIFO is found empty while waiting
    /// for the response; cleared whenever data shows up.
    pub(crate) data_deadline: Option<Instant>,
}

impl Transfer {
    pub(crate) fn new(id: TransferId, client: ClientId, buffers: Arc<ClientBuffers>) -> Self {
        Self {
            id,
            client,
            buffers,
            state: TransferState::Queued,
            write_complete: false,
            canceled: false,
            data_deadline: None,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Queued and canceled transfers never reached the hardware and can be
    /// dropped without a handshake.
    #[inline]
    pub(crate) fn discardable(&self) -> bool {
        self.canceled && self.state == TransferState::Queued
    }
}
