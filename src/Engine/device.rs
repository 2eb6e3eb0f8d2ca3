use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use super::builder::DeviceConfig;
use super::client::Client;
use super::pump::{Pump, PumpTimer};
use super::Structs::{ClientBuffers, ClientId, Transfer, TransferId};
use crate::Core::error::{FifoError, Result};
use crate::Core::layout::{REQ_RESET, UP};
use crate::Core::registry::InstanceId;
use crate::Core::transport::FifoTransport;

/// Everything guarded by the device lock: the transfer arena, the global
/// queue, each client's own queue and the sticky fatal error.
pub(crate) struct DeviceState {
    /// Owner of every live transfer. Removing an entry frees the transfer.
    pub(crate) transfers: HashMap<TransferId, Transfer>,
    /// Global FIFO across all clients. The head is the active transfer.
    pub(crate) queue: VecDeque<TransferId>,
    /// Per-client transfers in call order. Absent once the client closed.
    pub(crate) client_queues: HashMap<ClientId, VecDeque<TransferId>>,
    /// First fatal error, never cleared.
    pub(crate) fatal: Option<FifoError>,
    next_transfer_id: TransferId,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            transfers: HashMap::new(),
            queue: VecDeque::new(),
            client_queues: HashMap::new(),
            fatal: None,
            next_transfer_id: 1,
        }
    }

    /// Fails with the sticky error once one is set.
    #[inline]
    pub(crate) fn check(&self) -> Result<()> {
        match self.fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Allocate a transfer over `client`'s rings and append it to the global
    /// queue and to the client's own queue.
    pub(crate) fn enqueue(
        &mut self,
        client: ClientId,
        buffers: &Arc<ClientBuffers>,
    ) -> Result<TransferId> {
        self.check()?;
        let Some(own) = self.client_queues.get_mut(&client) else {
            return Err(FifoError::Protocol("enqueue from a closed client"));
        };
        let id = self.next_transfer_id;
        self.next_transfer_id += 1;
        own.push_back(id);
        self.transfers
            .insert(id, Transfer::new(id, client, Arc::clone(buffers)));
        self.queue.push_back(id);
        Ok(id)
    }

    /// The transfer the pump should work on, if any.
    ///
    /// Leading entries that were canceled before the pump ever touched them
    /// are dropped on the way; a canceled transfer that already reached the
    /// hardware stays and is finished by the pump.
    pub(crate) fn next_active(&mut self) -> Option<TransferId> {
        while let Some(&id) = self.queue.front() {
            match self.transfers.get(&id) {
                Some(xfr) if !xfr.discardable() => return Some(id),
                Some(_) => {
                    self.queue.pop_front();
                    self.transfers.remove(&id);
                    debug!(transfer = id, "discarded canceled transfer before activation");
                }
                None => {
                    self.queue.pop_front();
                }
            }
        }
        None
    }

    /// Oldest transfer of `client` still referenced by that client.
    pub(crate) fn client_head(&self, client: ClientId) -> Option<&Transfer> {
        self.client_queues
            .get(&client)
            .and_then(|own| own.front())
            .and_then(|id| self.transfers.get(id))
    }

    /// Client-side disposal of a completed, fully read transfer.
    pub(crate) fn retire(&mut self, client: ClientId, id: TransferId) {
        if let Some(own) = self.client_queues.get_mut(&client) {
            own.retain(|&t| t != id);
        }
        self.transfers.remove(&id);
    }

    /// Hand a transfer over to the pump: the client forgets it, the pump
    /// finishes or discards it.
    pub(crate) fn cancel(&mut self, client: ClientId, id: TransferId) {
        if let Some(own) = self.client_queues.get_mut(&client) {
            own.retain(|&t| t != id);
        }
        if let Some(xfr) = self.transfers.get_mut(&id) {
            xfr.canceled = true;
        }
    }

    /// Pump-side completion of the active transfer.
    pub(crate) fn complete_active(&mut self, id: TransferId) {
        if self.queue.front() == Some(&id) {
            self.queue.pop_front();
        } else {
            self.queue.retain(|&t| t != id);
        }
        let canceled = self.transfers.get(&id).is_some_and(|xfr| xfr.canceled);
        if canceled {
            self.transfers.remove(&id);
        }
        debug!(transfer = id, canceled, "transfer complete");
    }

    /// Poison the device. The first error sticks; every transfer is dropped.
    pub(crate) fn fail(&mut self, err: FifoError) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        self.transfers.clear();
        self.queue.clear();
        for own in self.client_queues.values_mut() {
            own.clear();
        }
    }
}

/// State shared by the device handle, every client and the pump worker.
/// The `Arc` count is the device reference count.
pub(crate) struct DeviceShared {
    pub(crate) index: u32,
    pub(crate) name: String,
    pub(crate) config: DeviceConfig,
    pub(crate) state: Mutex<DeviceState>,
    /// Waiters in `read`/`write`; always used with `state`.
    pub(crate) wait: Condvar,
    pub(crate) timer: PumpTimer,
    next_client_id: AtomicU64,
}

impl DeviceShared {
    /// Run the pump as soon as possible.
    #[inline]
    pub(crate) fn kick(&self) {
        self.timer.arm_now();
    }

    pub(crate) fn next_client_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// An attached FIFO channel.
///
/// Owns the pump worker and the instance index. Dropping it detaches the
/// channel; clients still open observe [`FifoError::NoDevice`].
pub struct Device {
    pub(crate) shared: Arc<DeviceShared>,
    instance: Option<InstanceId>,
    worker: Option<JoinHandle<()>>,
}

impl Device {
    /// Attach to `transport` with the default configuration.
    pub fn attach<T: FifoTransport>(transport: T) -> Result<Self> {
        super::DeviceBuilder::new().attach(transport)
    }

    pub(crate) fn start(config: DeviceConfig, mut transport: Box<dyn FifoTransport>) -> Result<Self> {
        reset_if_dirty(transport.as_mut(), &config)?;

        let instance = InstanceId::claim();
        let name = format!("{}{}", config.name_prefix, instance.get());

        let shared = Arc::new(DeviceShared {
            index: instance.get(),
            name: name.clone(),
            config,
            state: Mutex::new(DeviceState::new()),
            wait: Condvar::new(),
            timer: PumpTimer::new(),
            next_client_id: AtomicU64::new(1),
        });

        let pump = Pump::new(Arc::clone(&shared), transport);
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || pump.run())
            .map_err(|e| {
                error!(device = %name, "failed to spawn pump worker: {e}");
                FifoError::Spawn
            })?;

        info!(device = %name, "attached");
        Ok(Self {
            shared,
            instance: Some(instance),
            worker: Some(worker),
        })
    }

    /// Open a blocking session.
    pub fn open(&self) -> Result<Client> {
        Client::open(&self.shared, false)
    }

    /// Open a session whose calls fail with `WouldBlock` instead of waiting
    /// when no progress is possible.
    pub fn open_nonblocking(&self) -> Result<Client> {
        Client::open(&self.shared, true)
    }

    /// Detach the channel now. Equivalent to dropping the handle.
    pub fn detach(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        {
            let mut state = self.shared.state.lock();
            state.fail(FifoError::NoDevice);
        }
        self.shared.wait.notify_all();

        self.shared.timer.shutdown();
        if worker.join().is_err() {
            error!(device = %self.shared.name, "pump worker panicked");
        }
        self.instance.take();
        info!(device = %self.shared.name, "detached");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Leftover words in either FIFO mean a previous user walked away mid
/// transfer; ask the engine to reset both FIFOs before taking the channel.
fn reset_if_dirty(transport: &mut dyn FifoTransport, config: &DeviceConfig) -> Result<()> {
    let up = transport.upstream_status()?;
    let down = transport.downstream_status()?;
    if up.is_empty() && down.is_empty() {
        return Ok(());
    }

    warn!(
        upstream = up.entries(),
        downstream = down.entries(),
        "FIFOs not empty at attach, requesting reset"
    );
    transport.write_word(UP | REQ_RESET, 1)?;

    let start = Instant::now();
    loop {
        if !transport.upstream_status()?.reset_requested() {
            return Ok(());
        }
        if start.elapsed() >= config.reset_timeout {
            error!("FIFO reset did not complete within {:?}", config.reset_timeout);
            return Err(FifoError::ResetTimeout);
        }
        thread::sleep(config.reset_poll_interval);
    }
}
