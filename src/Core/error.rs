//! Error types shared by the engine, the transport seam and the C ABI.
//!
//! `FifoError` is `Copy` because the same value is stored in a device's
//! sticky fatal slot and handed to every caller that observes it.

use std::io;

use thiserror::Error;

/// Failure reported by a [`FifoTransport`](crate::Core::transport::FifoTransport)
/// implementation. The code is opaque to the engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("bus access failed (code {0})")]
pub struct TransportError(pub i32);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoError {
    #[error("length {0} is not a multiple of the 4-byte word size")]
    Misaligned(usize),

    #[error("ring accounting violated: {requested} bytes requested, {available} available")]
    OutOfRange { requested: usize, available: usize },

    #[error("operation would block")]
    WouldBlock,

    /// The blocking wait was interrupted. `staged` counts the bytes a write
    /// had already handed to the engine before the interruption.
    #[error("wait interrupted after staging {staged} bytes")]
    Interrupted { staged: usize },

    #[error("timed out waiting for response data")]
    Timeout,

    #[error("fatal transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("device detached")]
    NoDevice,

    #[error("FIFO reset request did not complete")]
    ResetTimeout,

    #[error("could not start the pump worker")]
    Spawn,

    #[error("engine invariant violated: {0}")]
    Protocol(&'static str),
}

impl FifoError {
    /// Whether this error poisons the whole device.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FifoError::Timeout | FifoError::Transport(_) | FifoError::NoDevice
        )
    }

    /// Negative errno equivalent, as returned across the C ABI.
    pub fn errno(&self) -> i32 {
        let code = match self {
            FifoError::Misaligned(_) | FifoError::OutOfRange { .. } => libc::EINVAL,
            FifoError::WouldBlock => libc::EAGAIN,
            FifoError::Interrupted { .. } => libc::EINTR,
            FifoError::Timeout | FifoError::ResetTimeout => libc::ETIME,
            FifoError::Transport(TransportError(code)) if *code > 0 => *code,
            FifoError::Transport(_) => libc::EIO,
            FifoError::NoDevice => libc::ENODEV,
            FifoError::Spawn => libc::EAGAIN,
            FifoError::Protocol(_) => libc::EPROTO,
        };
        -code
    }
}

impl From<FifoError> for io::Error {
    fn from(err: FifoError) -> Self {
        let kind = match err {
            FifoError::Misaligned(_) | FifoError::OutOfRange { .. } => io::ErrorKind::InvalidInput,
            FifoError::WouldBlock => io::ErrorKind::WouldBlock,
            // `Interrupted` would make `read_exact` and `write_all` retry
            // behind the caller's back.
            FifoError::Interrupted { .. } => io::ErrorKind::Other,
            FifoError::Timeout | FifoError::ResetTimeout => io::ErrorKind::TimedOut,
            FifoError::Transport(_) => io::ErrorKind::BrokenPipe,
            FifoError::NoDevice => io::ErrorKind::NotConnected,
            FifoError::Spawn => io::ErrorKind::Other,
            FifoError::Protocol(_) => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, FifoError>;
