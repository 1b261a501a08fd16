use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    raised: Mutex<bool>,
    condvar: Condvar,
}

/// One-shot, cloneable flag that sleepers can wait on. Raising it wakes every
/// waiter immediately.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<Inner>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let mut raised = self.0.raised.lock();
        if !*raised {
            *raised = true;
            self.0.condvar.notify_all();
        }
    }

    pub fn is_raised(&self) -> bool {
        *self.0.raised.lock()
    }

    /// Sleep for `timeout` unless the signal is raised first. Returns whether
    /// the signal is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut raised = self.0.raised.lock();
        while !*raised {
            if self.0.condvar.wait_until(&mut raised, deadline).timed_out() {
                break;
            }
        }
        *raised
    }
}
