use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Cooperative shutdown flag shared between the server and its workers.
///
/// Workers poll it with a short queue timeout, so cancellation latency is
/// bounded by the poll interval rather than instantaneous.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    closing: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> ShutdownFlag {
        ShutdownFlag::default()
    }

    pub fn cancel(&self) {
        self.closing.store(true, Ordering::Relaxed);
    }

    pub fn cancelled(&self) -> bool {
        self.closing.load(Ordering::Relaxed)
    }
}

/// Count of submitted frames not yet finished by a channel worker.
///
/// Incremented on enqueue and decremented exactly once per work item,
/// success or failure. The raw count is never handed out for mutation;
/// `wait_idle` is the only consumer-facing way to observe it reaching zero.
#[derive(Debug, Clone)]
pub struct InFlight {
    shared: Arc<SharedCount>,
}

#[derive(Debug)]
struct SharedCount {
    pending: Mutex<u64>,
    idle: Condvar,
}

impl InFlight {
    pub fn new() -> InFlight {
        InFlight {
            shared: Arc::new(SharedCount {
                pending: Mutex::new(0),
                idle: Condvar::new(),
            }),
        }
    }

    pub fn increment(&self) {
        *self.shared.pending.lock().unwrap() += 1;
    }

    /// Saturating: the count never goes below zero.
    pub fn decrement(&self) {
        let mut pending = self.shared.pending.lock().unwrap();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.shared.idle.notify_all();
        }
    }

    pub fn pending(&self) -> u64 {
        *self.shared.pending.lock().unwrap()
    }

    /// Block until every submitted frame has been processed.
    pub fn wait_idle(&self) {
        let mut pending = self.shared.pending.lock().unwrap();
        while *pending > 0 {
            pending = self.shared.idle.wait(pending).unwrap();
        }
    }
}

impl Default for InFlight {
    fn default() -> Self {
        InFlight::new()
    }
}
