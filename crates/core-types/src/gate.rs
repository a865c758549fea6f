//! Cooperative pause/stop checkpoint handed to every suspension point.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::RunState;

/// Read side of the run's control state. Cloned freely into the discovery
/// driver and the interaction flow; the orchestrator keeps the write side.
#[derive(Clone)]
pub struct RunGate {
    state: watch::Receiver<RunState>,
    cancel: CancellationToken,
    // Keeps a detached gate's sender alive so `changed()` never errors.
    _owner: Option<Arc<watch::Sender<RunState>>>,
}

impl RunGate {
    pub fn new(state: watch::Receiver<RunState>, cancel: CancellationToken) -> Self {
        Self {
            state,
            cancel,
            _owner: None,
        }
    }

    /// A gate that is permanently `Running`; for tests and one-shot embeds.
    pub fn detached() -> Self {
        let (tx, rx) = watch::channel(RunState::Running);
        Self {
            state: rx,
            cancel: CancellationToken::new(),
            _owner: Some(Arc::new(tx)),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled() || matches!(*self.state.borrow(), RunState::Stopping)
    }

    /// Suspend in place while paused, without abandoning loop position.
    /// Returns `false` when a stop request ended the wait; callers that must
    /// finish their current step regardless may ignore the return value.
    pub async fn hold_if_paused(&self) -> bool {
        let mut rx = self.state.clone();
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            match *rx.borrow_and_update() {
                RunState::Paused => {}
                RunState::Stopping => return false,
                _ => return true,
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Standard suspension point: honor pause, then report whether the run
    /// may proceed.
    pub async fn checkpoint(&self) -> bool {
        self.hold_if_paused().await && !self.is_stopping()
    }
}
