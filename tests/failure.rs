// Device-wide failures: transport errors, response timeout, detach and the
// attach-time FIFO reset.

use fifo_link::Core::Loopback;
use fifo_link::{Device, DeviceBuilder, FifoError, TransportError};
use std::thread;
use std::time::{Duration, Instant};

fn builder() -> DeviceBuilder {
    DeviceBuilder::new()
        .with_reschedule_interval(Duration::from_millis(2))
        .with_response_timeout(Duration::from_millis(100))
        .with_reset_timeout(Duration::from_millis(40))
        .with_reset_poll_interval(Duration::from_millis(1))
}

fn fast_device(lb: &Loopback) -> Device {
    builder().attach(lb.clone()).unwrap()
}

fn word_bytes(word: u32) -> [u8; 4] {
    word.to_ne_bytes()
}

#[test]
fn transport_failure_is_sticky_for_every_caller() {
    let lb = Loopback::new();
    let device = fast_device(&lb);
    let a = device.open().unwrap();
    let b = device.open().unwrap();

    lb.fail_after(0);
    a.write(&word_bytes(1)).unwrap();

    let expected: fifo_link::Result<usize> = Err(FifoError::Transport(TransportError(libc::EIO)));
    let mut buf = [0u8; 4];
    assert_eq!(a.read(&mut buf), expected);
    assert_eq!(device.fatal_error(), Some(FifoError::Transport(TransportError(libc::EIO))));
    assert_eq!(device.queue_depth(), 0);

    assert_eq!(a.write(&word_bytes(2)).map(|_| ()), expected.map(|_| ()));
    assert_eq!(b.read(&mut buf), expected);
    assert!(b.readiness().error);
    assert!(matches!(device.open(), Err(FifoError::Transport(_))));
    assert_eq!(a.close(), Err(FifoError::Transport(TransportError(libc::EIO))));
}

#[test]
fn missing_response_times_out_the_whole_device() {
    let lb = Loopback::new();
    let device = fast_device(&lb);
    lb.stall_responses(true);

    let client = device.open().unwrap();
    let bystander = device.open().unwrap();
    client.write(&word_bytes(7)).unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(client.read(&mut buf), Err(FifoError::Timeout));

    assert_eq!(bystander.write(&word_bytes(8)), Err(FifoError::Timeout));
    assert!(matches!(device.open(), Err(FifoError::Timeout)));
    assert!(FifoError::Timeout.is_fatal());
}

#[test]
fn slow_but_steady_responses_do_not_time_out() {
    let lb = Loopback::new();
    let device = builder()
        .with_response_timeout(Duration::from_millis(500))
        .attach(lb.clone())
        .unwrap();
    lb.stall_responses(true);

    let client = device.open().unwrap();
    client.write(&word_bytes(9)).unwrap();
    thread::sleep(Duration::from_millis(60));
    lb.stall_responses(false);

    let mut buf = [0u8; 4];
    assert_eq!(client.read(&mut buf).unwrap(), 4);
    assert_eq!(buf, word_bytes(9));
    assert_eq!(device.fatal_error(), None);
}

#[test]
fn blocked_writer_sees_transport_failure() {
    let lb = Loopback::new();
    let device = fast_device(&lb);
    lb.hold_upstream(true);

    let client = device.open().unwrap();
    let payload: Vec<u8> = (0..64u32).flat_map(u32::to_ne_bytes).collect();

    let result = thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            lb.fail_after(0);
        });
        client.write(&payload)
    });
    assert_eq!(result, Err(FifoError::Transport(TransportError(libc::EIO))));
    assert_eq!(client.outstanding_transfers(), 0);
}

#[test]
fn detach_fails_open_clients_with_no_device() {
    let lb = Loopback::new();
    let device = fast_device(&lb);
    lb.stall_responses(true);

    let client = device.open().unwrap();
    client.write(&word_bytes(3)).unwrap();

    let result = thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut buf = [0u8; 4];
            client.read(&mut buf)
        });
        thread::sleep(Duration::from_millis(20));
        device.detach();
        reader.join().unwrap()
    });

    assert_eq!(result, Err(FifoError::NoDevice));
    assert_eq!(client.write(&word_bytes(4)), Err(FifoError::NoDevice));
    assert_eq!(client.close(), Err(FifoError::NoDevice));
}

#[test]
fn detach_keeps_the_first_error() {
    let lb = Loopback::new();
    let device = fast_device(&lb);
    let client = device.open().unwrap();

    lb.fail_after(0);
    client.write(&word_bytes(1)).unwrap();
    let mut buf = [0u8; 4];
    assert!(matches!(client.read(&mut buf), Err(FifoError::Transport(_))));

    drop(device);
    assert!(matches!(client.read(&mut buf), Err(FifoError::Transport(_))));
}

#[test]
fn attach_resets_dirty_fifos() {
    let lb = Loopback::new().dirty();
    let device = fast_device(&lb);
    assert!(lb.is_idle());

    let client = device.open().unwrap();
    client.write(&word_bytes(0x1234)).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(client.read(&mut buf).unwrap(), 4);
    assert_eq!(buf, word_bytes(0x1234));
    assert_eq!(lb.requests(), vec![word_bytes(0x1234).to_vec()]);
}

#[test]
fn attach_fails_when_reset_never_completes() {
    let lb = Loopback::new().dirty();
    lb.stuck_reset(true);
    let start = Instant::now();
    assert!(matches!(builder().attach(lb), Err(FifoError::ResetTimeout)));
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn attach_propagates_transport_errors() {
    let lb = Loopback::new();
    lb.fail_after(0);
    assert!(matches!(
        builder().attach(lb),
        Err(FifoError::Transport(TransportError(code))) if code == libc::EIO
    ));
}
