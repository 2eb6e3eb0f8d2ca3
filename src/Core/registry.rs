//! Process-wide pool of device instance indices.
//!
//! Indices start at 1 and the smallest free one is always handed out, so a
//! detached device's index is reused by the next attach.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use parking_lot::Mutex;

lazy_static! {
    static ref LIVE_INSTANCES: Mutex<BTreeSet<u32>> = Mutex::new(BTreeSet::new());
}

/// A claimed instance index. Released when dropped.
#[derive(Debug)]
pub struct InstanceId(u32);

impl InstanceId {
    pub fn claim() -> Self {
        let mut live = LIVE_INSTANCES.lock();
        let mut candidate = 1u32;
        for &used in live.iter() {
            if used != candidate {
                break;
            }
            candidate += 1;
        }
        live.insert(candidate);
        InstanceId(candidate)
    }

    #[inline]
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Drop for InstanceId {
    fn drop(&mut self) {
        LIVE_INSTANCES.lock().remove(&self.0);
    }
}

/// Number of instance indices currently claimed in this process.
pub fn live_instances() -> usize {
    LIVE_INSTANCES.lock().len()
}
