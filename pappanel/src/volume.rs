//! Volume debouncing
//!
//! Slider input arrives much faster than the device can (or should) absorb
//! volume writes. The debouncer mirrors the original panel's behavior:
//! deltas below `min_delta` against the current mirror are ignored
//! outright, and rapid changes are coalesced so only the value standing
//! after the debounce window is sent. At most one request is pending at a
//! time; each new input resets the window.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use papclient::DeviceClient;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::PanelState;

/// True when `candidate` differs enough from the current mirror to be sent
pub(crate) fn should_send(last_volume: u8, candidate: u8, min_delta: u8) -> bool {
    candidate.abs_diff(last_volume) >= min_delta
}

/// Debounced volume sender
///
/// Cheap to clone; all clones feed the same worker task.
#[derive(Debug, Clone)]
pub(crate) struct VolumeDebouncer {
    tx: mpsc::UnboundedSender<u8>,
    min_delta: u8,
    state: Arc<RwLock<PanelState>>,
}

impl VolumeDebouncer {
    /// Spawn the worker task; must be called within a tokio runtime
    pub(crate) fn spawn(
        client: DeviceClient,
        state: Arc<RwLock<PanelState>>,
        debounce: Duration,
        min_delta: u8,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx, client, state.clone(), debounce));
        Self {
            tx,
            min_delta,
            state,
        }
    }

    /// Feed one slider input
    ///
    /// Returns true when the value was scheduled for sending, false when it
    /// was filtered out by the minimum-delta rule.
    pub(crate) fn input(&self, value: u8) -> bool {
        let value = value.min(100);
        let last = self.state.read().unwrap().last_volume();
        if !should_send(last, value, self.min_delta) {
            debug!(value, last, "Volume delta below threshold, ignored");
            return false;
        }
        self.tx.send(value).is_ok()
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<u8>,
    client: DeviceClient,
    state: Arc<RwLock<PanelState>>,
    debounce: Duration,
) {
    let mut closed = false;
    while !closed {
        let Some(mut value) = rx.recv().await else {
            break;
        };

        // Coalesce: keep absorbing inputs until the window stays quiet
        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break,
                next = rx.recv() => match next {
                    Some(v) => value = v,
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        match client.set_volume(value).await {
            Ok(()) => {
                state.write().unwrap().set_last_volume(value);
                debug!(value, "Volume sent to device");
            }
            Err(err) => {
                // Mirror is left at its pre-input value: the display rolls back
                warn!(value, "Volume update failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_delta_filter() {
        // The original panel ignores deltas below 2 against the last value
        assert!(!should_send(40, 40, 2));
        assert!(!should_send(40, 41, 2));
        assert!(should_send(40, 42, 2));
        assert!(should_send(40, 38, 2));
        assert!(should_send(0, 100, 2));
    }

    #[test]
    fn test_delta_zero_after_reconcile_is_filtered() {
        // End-to-end invariant: once the mirror says 42, feeding 42 again
        // must not schedule another request
        assert!(!should_send(42, 42, 2));
    }
}
