// Instance index allocation. Every test here attaches devices and checks
// absolute indices, so they run one at a time.

use fifo_link::Core::registry::live_instances;
use fifo_link::Core::Loopback;
use fifo_link::{Device, DeviceBuilder};
use serial_test::serial;

#[test]
#[serial]
fn indices_start_at_one_and_are_reused() {
    let a = Device::attach(Loopback::new()).unwrap();
    let b = Device::attach(Loopback::new()).unwrap();
    assert_eq!(a.index(), 1);
    assert_eq!(b.index(), 2);
    assert_eq!(a.name(), "fifolink1");
    assert_eq!(live_instances(), 2);

    drop(a);
    assert_eq!(live_instances(), 1);
    let c = Device::attach(Loopback::new()).unwrap();
    assert_eq!(c.index(), 1);

    b.detach();
    c.detach();
    assert_eq!(live_instances(), 0);
}

#[test]
#[serial]
fn failed_attach_claims_no_index() {
    let lb = Loopback::new().dirty();
    lb.stuck_reset(true);
    assert!(DeviceBuilder::new().attach(lb).is_err());
    assert_eq!(live_instances(), 0);
}

#[test]
#[serial]
fn builder_carries_its_configuration() {
    let device = DeviceBuilder::new()
        .with_name_prefix("sbe")
        .with_response_timeout(std::time::Duration::from_secs(1))
        .attach(Loopback::new())
        .unwrap();
    assert_eq!(device.name(), "sbe1");
    assert_eq!(device.config().response_timeout, std::time::Duration::from_secs(1));
    assert_eq!(
        device.config().reschedule_interval,
        std::time::Duration::from_millis(500)
    );
}
