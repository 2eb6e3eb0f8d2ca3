use crate::Core::error::{FifoError, TransportError};
use crate::Core::transport::FifoTransport;
use crate::Engine::{Client, Device, DeviceBuilder};
use std::ffi::c_void;
use std::ptr;
use tracing::error;

/// Register read callback. Stores the word in `*out` and returns 0, or
/// returns a negative errno.
pub type ReadWordFn = unsafe extern "C" fn(ctx: *mut c_void, reg: u32, out: *mut u32) -> i32;

/// Register write callback. Returns 0 or a negative errno.
pub type WriteWordFn = unsafe extern "C" fn(ctx: *mut c_void, reg: u32, word: u32) -> i32;

/// Transport backed by C callbacks.
struct CallbackTransport {
    ctx: *mut c_void,
    read: ReadWordFn,
    write: WriteWordFn,
}

// The caller of `fifo_device_attach` promises that `ctx` and the callbacks
// may be used from the pump thread.
unsafe impl Send for CallbackTransport {}

impl FifoTransport for CallbackTransport {
    fn read_word(&mut self, reg: u32) -> Result<u32, TransportError> {
        let mut word = 0u32;
        let rc = unsafe { (self.read)(self.ctx, reg, &mut word) };
        if rc < 0 {
            return Err(TransportError(-rc));
        }
        Ok(word)
    }

    fn write_word(&mut self, reg: u32, word: u32) -> Result<(), TransportError> {
        let rc = unsafe { (self.write)(self.ctx, reg, word) };
        if rc < 0 {
            return Err(TransportError(-rc));
        }
        Ok(())
    }
}

/// Handle to an attached device (opaque pointer)
pub struct DeviceHandle {
    inner: Device,
}

/// Handle to an open client session (opaque pointer)
pub struct ClientHandle {
    inner: Client,
}

fn to_ssize(result: Result<usize, FifoError>) -> isize {
    match result {
        Ok(n) => n as isize,
        Err(e) => e.errno() as isize,
    }
}

// -----------------------------------------------------------------------------
// Device API
// -----------------------------------------------------------------------------

/// Attach to a channel reached through `read`/`write`, with the default
/// configuration.
///
/// # Safety
/// `ctx`, `read` and `write` must stay valid until `fifo_device_free`, and
/// must be callable from a thread other than the caller's.
///
/// # Returns
/// * Pointer to `DeviceHandle`, or NULL on failure.
#[no_mangle]
pub unsafe extern "C" fn fifo_device_attach(
    ctx: *mut c_void,
    read: Option<ReadWordFn>,
    write: Option<WriteWordFn>,
) -> *mut DeviceHandle {
    let (Some(read), Some(write)) = (read, write) else {
        return ptr::null_mut();
    };

    match DeviceBuilder::new().attach(CallbackTransport { ctx, read, write }) {
        Ok(device) => Box::into_raw(Box::new(DeviceHandle { inner: device })),
        Err(e) => {
            error!("FFI: failed to attach device: {e}");
            ptr::null_mut()
        }
    }
}

/// Detach and free a device. Clients still open observe `-ENODEV`.
#[no_mangle]
pub extern "C" fn fifo_device_free(handle: *mut DeviceHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Dropped automatically
        }
    }
}

// -----------------------------------------------------------------------------
// Client API
// -----------------------------------------------------------------------------

/// Open a session on `device`.
///
/// # Returns
/// * Pointer to `ClientHandle`, or NULL if the device is NULL or failed.
#[no_mangle]
pub extern "C" fn fifo_client_open(device: *mut DeviceHandle, nonblocking: bool) -> *mut ClientHandle {
    if device.is_null() {
        return ptr::null_mut();
    }
    let device = unsafe { &(*device).inner };
    let opened = if nonblocking {
        device.open_nonblocking()
    } else {
        device.open()
    };
    match opened {
        Ok(client) => Box::into_raw(Box::new(ClientHandle { inner: client })),
        Err(e) => {
            error!("FFI: failed to open client: {e}");
            ptr::null_mut()
        }
    }
}

/// Read response bytes.
///
/// # Returns
/// * Bytes copied, or a negative errno.
#[no_mangle]
pub extern "C" fn fifo_client_read(handle: *mut ClientHandle, buf: *mut u8, len: usize) -> isize {
    if handle.is_null() || (buf.is_null() && len > 0) {
        return -(libc::EFAULT as isize);
    }
    let client = unsafe { &(*handle).inner };
    if len == 0 {
        return to_ssize(client.read(&mut []));
    }
    let slice = unsafe { std::slice::from_raw_parts_mut(buf, len) };
    to_ssize(client.read(slice))
}

/// Send one request.
///
/// When `staged` is not NULL it receives the bytes handed to the engine,
/// including on `-EINTR`, where the transfer is canceled after `*staged`
/// bytes went out.
///
/// # Returns
/// * Bytes staged, or a negative errno.
#[no_mangle]
pub extern "C" fn fifo_client_write(
    handle: *mut ClientHandle,
    data: *const u8,
    len: usize,
    staged: *mut usize,
) -> isize {
    if handle.is_null() || (data.is_null() && len > 0) {
        return -(libc::EFAULT as isize);
    }
    let client = unsafe { &(*handle).inner };
    let result = if len == 0 {
        client.write(&[])
    } else {
        client.write(unsafe { std::slice::from_raw_parts(data, len) })
    };
    if !staged.is_null() {
        let count = match result {
            Ok(n) => n,
            Err(FifoError::Interrupted { staged }) => staged,
            Err(_) => 0,
        };
        unsafe { *staged = count };
    }
    to_ssize(result)
}

/// Make the client's blocked (or next) read and write fail with `-EINTR`.
/// Safe to call from any thread while another is inside a client call.
#[no_mangle]
pub extern "C" fn fifo_client_interrupt(handle: *mut ClientHandle) {
    if !handle.is_null() {
        unsafe { &(*handle).inner }.interrupter().interrupt();
    }
}

/// Readiness as a `poll(2)` event mask (`POLLERR`, `POLLIN`, `POLLOUT`).
#[no_mangle]
pub extern "C" fn fifo_client_poll(handle: *mut ClientHandle) -> i32 {
    if handle.is_null() {
        return libc::POLLERR as i32;
    }
    let ready = unsafe { &(*handle).inner }.readiness();
    let mut mask = 0i32;
    if ready.error {
        mask |= libc::POLLERR as i32;
    }
    if ready.readable {
        mask |= libc::POLLIN as i32;
    }
    if ready.writable {
        mask |= libc::POLLOUT as i32;
    }
    mask
}

/// Close and free a client.
///
/// # Returns
/// * 0, or the device's fatal error as a negative errno.
#[no_mangle]
pub extern "C" fn fifo_client_free(handle: *mut ClientHandle) -> i32 {
    if handle.is_null() {
        return 0;
    }
    let handle = unsafe { Box::from_raw(handle) };
    match handle.inner.close() {
        Ok(()) => 0,
        Err(e) => e.errno(),
    }
}
