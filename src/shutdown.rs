//! Cooperative shutdown signal, checked at chunk and tick boundaries so a long
//! replay doesn't block process termination.

use tokio::sync::watch;

#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        *self.0.borrow()
    }

    /// A signal that never fires; used by tests and one-shot CLI commands
    /// that don't need cooperative cancellation.
    pub fn never() -> Self {
        let (_tx, signal) = channel();
        signal
    }
}

pub fn channel() -> (watch::Sender<bool>, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (tx, ShutdownSignal(rx))
}
