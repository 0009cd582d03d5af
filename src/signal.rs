use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request shared between the controller and a running pass.
///
/// The flag is polled by the synchronizer before each file. The wake channel
/// lets a countdown blocked in `select!` notice the request without waiting
/// for its next tick.
#[derive(Clone, Debug)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Ask the current pass to stop at its next check point
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // Channel is bounded(1); a pending wake-up is already enough
        let _ = self.wake_tx.try_send(());
    }

    /// Check if a stop has been requested
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Receiver that becomes ready once a stop is requested
    pub fn wake_receiver(&self) -> &Receiver<()> {
        &self.wake_rx
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
