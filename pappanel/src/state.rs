//! Client-owned panel state and reconciliation
//!
//! `PanelState` holds the optimistic mirrors of device state (volume,
//! play/stop, loop) next to the last applied status snapshot. The mirrors
//! are a cache, not a source of truth: every successful poll overwrites
//! them through [`PanelState::reconcile`].
//!
//! Polls carry a monotonic sequence number so that a late response from a
//! superseded poll can never overwrite a newer one (the original panel had
//! a last-writer-wins race here).

use papclient::{DeviceStatus, PlaybackState};
use tracing::debug;

/// Local view of device state, reconciled against every status poll
#[derive(Debug, Clone)]
pub struct PanelState {
    /// Last applied status snapshot, superseded wholesale on each poll
    snapshot: Option<DeviceStatus>,
    /// Optimistic volume mirror (the "slider position")
    last_volume: u8,
    /// Optimistic play/stop mirror
    playback: PlaybackState,
    /// Optimistic loop mirror
    looping: bool,
    /// Sequence number of the last applied poll
    last_seq: u64,
    /// Device volume only overwrites the mirror beyond this delta
    volume_threshold: u8,
}

impl PanelState {
    pub fn new(volume_threshold: u8) -> Self {
        Self {
            snapshot: None,
            last_volume: 0,
            playback: PlaybackState::Stopped,
            looping: false,
            last_seq: 0,
            volume_threshold,
        }
    }

    /// Merge a polled snapshot into the local state
    ///
    /// Returns false (and changes nothing) when `seq` is not newer than the
    /// last applied poll, i.e. the response belongs to a superseded request.
    ///
    /// The volume mirror is only overwritten when the device-reported value
    /// differs from it by more than the configured threshold, so the poll
    /// does not fight the user mid-drag.
    pub fn reconcile(&mut self, seq: u64, status: &DeviceStatus) -> bool {
        if seq <= self.last_seq {
            debug!(seq, last_seq = self.last_seq, "Discarding stale status poll");
            return false;
        }

        self.playback = PlaybackState::from_playing(status.playing);
        self.looping = status.looping;

        if let Some(volume) = status.volume {
            if volume.abs_diff(self.last_volume) > self.volume_threshold {
                self.last_volume = volume;
            }
        }

        self.snapshot = Some(status.clone());
        self.last_seq = seq;
        true
    }

    /// Drop the snapshot and reset the optimistic mirrors
    ///
    /// Used by the full resync after a failed poll. The sequence counter is
    /// kept so responses from before the reset stay stale.
    pub fn clear(&mut self) {
        self.snapshot = None;
        self.last_volume = 0;
        self.playback = PlaybackState::Stopped;
        self.looping = false;
    }

    pub fn snapshot(&self) -> Option<&DeviceStatus> {
        self.snapshot.as_ref()
    }

    pub fn last_volume(&self) -> u8 {
        self.last_volume
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Set the optimistic volume mirror (after a successful send)
    pub(crate) fn set_last_volume(&mut self, volume: u8) {
        self.last_volume = volume.min(100);
    }

    /// Set the optimistic play/stop mirror (optimistic flip or rollback)
    pub(crate) fn set_playback(&mut self, playback: PlaybackState) {
        self.playback = playback;
    }

    /// Set the optimistic loop mirror (optimistic flip or rollback)
    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new(1)
    }
}
