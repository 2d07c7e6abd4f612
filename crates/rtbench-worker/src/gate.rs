//! One-shot start gate shared by all workers of a run.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Orchestrator side of the gate. Opening it releases every waiter at once.
#[derive(Debug)]
pub struct StartGate {
    tx: watch::Sender<bool>,
}

/// Worker side of the gate.
#[derive(Debug, Clone)]
pub struct StartSignal {
    rx: watch::Receiver<bool>,
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

impl StartGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> StartSignal {
        StartSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Open the gate. Idempotent.
    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }
}

impl StartSignal {
    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the gate opens or `stop` fires.
    ///
    /// Returns `true` when released by the gate. A stop that arrives first
    /// wins, and so does a dropped gate.
    pub async fn wait(&mut self, stop: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = stop.cancelled() => false,
            res = self.rx.wait_for(|open| *open) => res.is_ok(),
        }
    }
}
