// C ABI round trip with a callback transport backed by the simulated engine.

use fifo_link::ffi::*;
use fifo_link::Core::Loopback;
use fifo_link::{FifoTransport, TransportError};
use std::ffi::c_void;
use std::ptr;
use std::thread;
use std::time::Duration;

unsafe extern "C" fn read_cb(ctx: *mut c_void, reg: u32, out: *mut u32) -> i32 {
    let lb = &mut *(ctx as *mut Loopback);
    match lb.read_word(reg) {
        Ok(word) => {
            *out = word;
            0
        }
        Err(TransportError(code)) => -code,
    }
}

unsafe extern "C" fn write_cb(ctx: *mut c_void, reg: u32, word: u32) -> i32 {
    let lb = &mut *(ctx as *mut Loopback);
    match lb.write_word(reg, word) {
        Ok(()) => 0,
        Err(TransportError(code)) => -code,
    }
}

#[test]
fn round_trip_through_the_c_api() {
    let lb = Loopback::new();
    let ctx = Box::into_raw(Box::new(lb.clone()));

    let dev = unsafe { fifo_device_attach(ctx as *mut c_void, Some(read_cb), Some(write_cb)) };
    assert!(!dev.is_null());
    let client = fifo_client_open(dev, false);
    assert!(!client.is_null());

    let request: Vec<u8> = (0..12u32).flat_map(u32::to_ne_bytes).collect();
    let mut staged = 0usize;
    assert_eq!(fifo_client_write(client, request.as_ptr(), request.len(), &mut staged), 48);
    assert_eq!(staged, 48);

    let mut response = Vec::new();
    let mut buf = [0u8; 16];
    loop {
        let n = fifo_client_read(client, buf.as_mut_ptr(), buf.len());
        assert!(n >= 0, "read failed with {n}");
        if n == 0 {
            break;
        }
        response.extend_from_slice(&buf[..n as usize]);
    }
    assert_eq!(response, request);

    let mask = fifo_client_poll(client);
    assert_eq!(mask & libc::POLLOUT as i32, libc::POLLOUT as i32);
    assert_eq!(mask & libc::POLLERR as i32, 0);

    assert_eq!(fifo_client_free(client), 0);
    fifo_device_free(dev);
    drop(unsafe { Box::from_raw(ctx) });
    assert_eq!(lb.eot_raised(), 1);
}

#[test]
fn errors_come_back_as_negative_errno() {
    let lb = Loopback::new();
    let ctx = Box::into_raw(Box::new(lb.clone()));
    let dev = unsafe { fifo_device_attach(ctx as *mut c_void, Some(read_cb), Some(write_cb)) };
    assert!(!dev.is_null());

    let client = fifo_client_open(dev, true);
    let mut buf = [0u8; 8];
    assert_eq!(fifo_client_read(client, buf.as_mut_ptr(), 6), -(libc::EINVAL as isize));
    assert_eq!(fifo_client_read(client, buf.as_mut_ptr(), 8), -(libc::EAGAIN as isize));
    assert_eq!(
        fifo_client_write(client, ptr::null(), 8, ptr::null_mut()),
        -(libc::EFAULT as isize)
    );
    assert_eq!(fifo_client_read(ptr::null_mut(), buf.as_mut_ptr(), 8), -(libc::EFAULT as isize));

    // Detaching poisons the session.
    fifo_device_free(dev);
    assert_eq!(fifo_client_read(client, buf.as_mut_ptr(), 8), -(libc::ENODEV as isize));
    assert_ne!(fifo_client_poll(client) & libc::POLLERR as i32, 0);
    assert_eq!(fifo_client_free(client), -libc::ENODEV);
    drop(unsafe { Box::from_raw(ctx) });
}

#[test]
fn attach_rejects_missing_callbacks() {
    let dev = unsafe { fifo_device_attach(ptr::null_mut(), None, Some(write_cb)) };
    assert!(dev.is_null());
    assert!(fifo_client_open(ptr::null_mut(), false).is_null());
    assert_eq!(fifo_client_free(ptr::null_mut()), 0);
}

#[test]
fn interrupted_write_reports_staged_bytes() {
    let lb = Loopback::new();
    lb.hold_upstream(true);
    let ctx = Box::into_raw(Box::new(lb.clone()));
    let dev = unsafe { fifo_device_attach(ctx as *mut c_void, Some(read_cb), Some(write_cb)) };
    assert!(!dev.is_null());
    let client = fifo_client_open(dev, false);

    let request: Vec<u8> = (0..64u32).flat_map(u32::to_ne_bytes).collect();
    let mut staged = usize::MAX;
    let handle = client as usize;
    let rc = thread::scope(|s| {
        s.spawn(move || {
            thread::sleep(Duration::from_millis(50));
            fifo_client_interrupt(handle as *mut ClientHandle);
        });
        fifo_client_write(client, request.as_ptr(), request.len(), &mut staged)
    });

    assert_eq!(rc, -(libc::EINTR as isize));
    assert!(staged >= 128 && staged < request.len(), "staged {staged}");
    assert_eq!(staged % 4, 0);

    lb.hold_upstream(false);
    assert_eq!(fifo_client_free(client), 0);
    fifo_device_free(dev);
    drop(unsafe { Box::from_raw(ctx) });
}
