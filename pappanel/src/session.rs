//! Stateful panel session for the Power Audio player
//!
//! `PanelSession` wraps the stateless `DeviceClient` and adds everything
//! the panel needs on top of raw requests:
//! - the client-owned [`PanelState`] with optimistic mirrors and
//!   poll reconciliation
//! - cached playlist and timer lists, replaced wholesale on refresh
//! - optimistic play/stop and loop toggles with rollback on failure
//! - debounced volume control
//! - batch uploads and the full-resync recovery path
//!
//! # Thread Safety
//!
//! The session is `Clone` and can be shared across tasks; all clones see
//! the same state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use papclient::{
    DeviceClient, DeviceStatus, PlaybackState, PlaylistEntry, Result, TimerEntry,
};
use tracing::{info, warn};

use crate::state::PanelState;
use crate::upload::{self, UploadFile, UploadReport};
use crate::volume::VolumeDebouncer;

/// Tuning knobs for a panel session
#[derive(Debug, Clone)]
pub struct PanelOptions {
    /// Status poll interval (original panel: 1-2s)
    pub status_poll: Duration,
    /// Playlist poll interval
    pub playlist_poll: Duration,
    /// Delay before the full resync after a failed poll
    pub resync_delay: Duration,
    /// Volume coalescing window
    pub volume_debounce: Duration,
    /// Minimum volume delta worth sending
    pub volume_min_delta: u8,
    /// Poll-reported volume only overwrites the mirror beyond this
    pub volume_reconcile_threshold: u8,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            status_poll: Duration::from_secs(2),
            playlist_poll: Duration::from_secs(5),
            resync_delay: Duration::from_secs(2),
            volume_debounce: Duration::from_millis(100),
            volume_min_delta: 2,
            volume_reconcile_threshold: 1,
        }
    }
}

impl PanelOptions {
    /// Read all knobs from the configuration
    pub fn from_config(config: &papconfig::Config) -> Result<Self> {
        Ok(Self {
            status_poll: Duration::from_secs(config.get_status_poll_secs()?),
            playlist_poll: Duration::from_secs(config.get_playlist_poll_secs()?),
            resync_delay: Duration::from_secs(config.get_resync_delay_secs()?),
            volume_debounce: Duration::from_millis(config.get_volume_debounce_ms()?),
            volume_min_delta: config.get_volume_min_delta()?.min(100) as u8,
            volume_reconcile_threshold: config.get_volume_reconcile_threshold()?.min(100) as u8,
        })
    }
}

/// Stateful panel session
#[derive(Clone)]
pub struct PanelSession {
    /// Underlying HTTP client
    client: DeviceClient,
    options: PanelOptions,
    /// Client-owned state (optimistic mirrors + last snapshot)
    state: Arc<RwLock<PanelState>>,
    /// Cached playlist, replaced wholesale on each refresh
    playlist: Arc<RwLock<Vec<PlaylistEntry>>>,
    /// Cached timer list, refreshed after every mutation
    timers: Arc<RwLock<Vec<TimerEntry>>>,
    /// Monotonic poll sequence (stale responses are discarded)
    seq: Arc<AtomicU64>,
    volume: VolumeDebouncer,
}

impl PanelSession {
    /// Create a session over an existing client
    ///
    /// Must be called within a tokio runtime (the volume worker is spawned
    /// here).
    pub fn new(client: DeviceClient, options: PanelOptions) -> Self {
        let state = Arc::new(RwLock::new(PanelState::new(
            options.volume_reconcile_threshold,
        )));
        let volume = VolumeDebouncer::spawn(
            client.clone(),
            state.clone(),
            options.volume_debounce,
            options.volume_min_delta,
        );
        Self {
            client,
            options,
            state,
            playlist: Arc::new(RwLock::new(Vec::new())),
            timers: Arc::new(RwLock::new(Vec::new())),
            seq: Arc::new(AtomicU64::new(0)),
            volume,
        }
    }

    /// Create a session from the configuration
    pub fn from_config(config: &papconfig::Config) -> Result<Self> {
        let client = DeviceClient::builder()
            .base_url(config.get_device_base_url())
            .timeout(Duration::from_secs(config.get_request_timeout_secs()?))
            .build()?;
        let options = PanelOptions::from_config(config)?;
        Ok(Self::new(client, options))
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    pub fn options(&self) -> &PanelOptions {
        &self.options
    }

    // ========================================================================
    // State access
    // ========================================================================

    /// Last applied status snapshot, if any poll has succeeded yet
    pub fn status_snapshot(&self) -> Option<DeviceStatus> {
        self.state.read().unwrap().snapshot().cloned()
    }

    pub fn playback(&self) -> PlaybackState {
        self.state.read().unwrap().playback()
    }

    pub fn looping(&self) -> bool {
        self.state.read().unwrap().looping()
    }

    pub fn last_volume(&self) -> u8 {
        self.state.read().unwrap().last_volume()
    }

    /// Cached playlist (replaced wholesale by each refresh)
    pub fn playlist(&self) -> Vec<PlaylistEntry> {
        self.playlist.read().unwrap().clone()
    }

    /// Cached timer list
    pub fn timers(&self) -> Vec<TimerEntry> {
        self.timers.read().unwrap().clone()
    }

    // ========================================================================
    // Polling & resync
    // ========================================================================

    /// Run one status poll and reconcile the local state
    ///
    /// Returns true when the snapshot was applied, false when it was
    /// discarded as stale (an overlapping newer poll already landed).
    pub async fn poll_status(&self) -> Result<bool> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let status = self.client.status().await?;
        Ok(self.state.write().unwrap().reconcile(seq, &status))
    }

    /// Re-fetch the playlist and replace the cached list
    pub async fn refresh_playlist(&self) -> Result<Vec<PlaylistEntry>> {
        let list = self.client.playlist().await?;
        *self.playlist.write().unwrap() = list.clone();
        Ok(list)
    }

    /// Re-fetch the timer list and replace the cached one
    pub async fn refresh_timers(&self) -> Result<Vec<TimerEntry>> {
        let list = self.client.timers().await?;
        *self.timers.write().unwrap() = list.clone();
        Ok(list)
    }

    /// Full resync after a lost device (the "page reload" of the original
    /// panel): drop local state and re-fetch everything, best effort.
    pub async fn full_resync(&self) {
        info!("Resyncing with device");
        self.state.write().unwrap().clear();

        if let Err(err) = self.poll_status().await {
            warn!("Resync status poll failed: {}", err);
        }
        if let Err(err) = self.refresh_playlist().await {
            warn!("Resync playlist fetch failed: {}", err);
        }
        if let Err(err) = self.refresh_timers().await {
            warn!("Resync timer fetch failed: {}", err);
        }
    }

    // ========================================================================
    // Transport & volume
    // ========================================================================

    /// Toggle play/stop with an optimistic flip
    ///
    /// The local mirror flips immediately; a failed POST reverts the flip
    /// (a failed user transition is no transition). Returns the state the
    /// panel ended up in.
    pub async fn toggle_play_stop(&self) -> Result<PlaybackState> {
        let previous = self.playback();
        let target = previous.toggled();
        self.state.write().unwrap().set_playback(target);

        let result = match target {
            PlaybackState::Playing => self.client.play().await,
            PlaybackState::Stopped => self.client.stop().await,
        };

        if let Err(err) = result {
            self.state.write().unwrap().set_playback(previous);
            return Err(err);
        }
        Ok(target)
    }

    /// Toggle loop playback with an optimistic flip and rollback
    pub async fn toggle_loop(&self) -> Result<bool> {
        let previous = self.looping();
        let target = !previous;
        self.state.write().unwrap().set_looping(target);

        if let Err(err) = self.client.set_loop(target).await {
            self.state.write().unwrap().set_looping(previous);
            return Err(err);
        }
        Ok(target)
    }

    /// Feed one volume slider input into the debouncer
    ///
    /// Returns true when the value was scheduled, false when the delta
    /// against the mirror was too small to bother the device with.
    pub fn set_volume(&self, value: u8) -> bool {
        self.volume.input(value)
    }

    /// Start playback of a specific playlist file
    pub async fn play_file(&self, file: &str) -> Result<()> {
        self.client.play_file(file).await?;
        self.state
            .write()
            .unwrap()
            .set_playback(PlaybackState::Playing);
        Ok(())
    }

    /// Pause playback (mirror is left alone; the next poll reconciles)
    pub async fn pause(&self) -> Result<()> {
        self.client.pause().await
    }

    /// Skip to the next track
    pub async fn next(&self) -> Result<()> {
        self.client.next().await
    }

    /// Skip to the previous track
    pub async fn previous(&self) -> Result<()> {
        self.client.previous().await
    }

    /// Generic command passthrough (`POST /api/{name}`)
    pub async fn send_command(&self, name: &str) -> Result<()> {
        self.client.send_command(name).await
    }

    // ========================================================================
    // Playlist mutations
    // ========================================================================

    /// Delete a file, then force a playlist refresh
    ///
    /// Destructive: callers are expected to confirm with the user first.
    pub async fn delete_file(&self, file: &str) -> Result<Vec<PlaylistEntry>> {
        self.client.delete_file(file).await?;
        self.refresh_playlist().await
    }

    /// Upload a batch of files, then force a playlist refresh
    ///
    /// The whole batch is validated against the extension allow-list before
    /// any network call; per-file failures do not abort the rest.
    pub async fn upload_files(&self, files: Vec<UploadFile>) -> Result<UploadReport> {
        let report = upload::upload_batch(&self.client, files).await?;
        if let Err(err) = self.refresh_playlist().await {
            warn!("Playlist refresh after upload failed: {}", err);
        }
        Ok(report)
    }

    // ========================================================================
    // Clock & timers
    // ========================================================================

    /// Trigger NTP synchronization on the device
    pub async fn sync_time(&self) -> Result<bool> {
        self.client.sync_time().await
    }

    /// Set the RTC manually
    pub async fn set_time(&self, datetime: &str) -> Result<()> {
        self.client.set_time(datetime).await
    }

    /// Set the UTC offset in hours
    pub async fn set_timezone(&self, offset: i32) -> Result<()> {
        self.client.set_timezone(offset).await
    }

    /// Schedule a timer, then refresh the cached list wholesale
    pub async fn add_timer(&self, datetime: &str, action: &str) -> Result<Vec<TimerEntry>> {
        self.client.add_timer(datetime, action).await?;
        self.refresh_timers().await
    }

    /// Remove a timer, then refresh the cached list wholesale
    ///
    /// Destructive: callers are expected to confirm with the user first.
    pub async fn remove_timer(&self, id: &str) -> Result<Vec<TimerEntry>> {
        self.client.remove_timer(id).await?;
        self.refresh_timers().await
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Reset WiFi credentials; the device restarts, so polls will fail and
    /// the poller's resync path takes over. Destructive: confirm first.
    pub async fn reset_wifi(&self) -> Result<()> {
        self.client.reset_wifi().await
    }

    /// Clear all persisted settings; same recovery path as `reset_wifi`.
    /// Destructive: confirm first.
    pub async fn clear_nvs(&self) -> Result<()> {
        self.client.clear_nvs().await
    }
}

impl std::fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSession")
            .field("device", &self.client.base_url())
            .field("playback", &self.playback().as_str())
            .field("looping", &self.looping())
            .field("last_volume", &self.last_volume())
            .field("playlist_entries", &self.playlist.read().unwrap().len())
            .field("timers", &self.timers.read().unwrap().len())
            .finish()
    }
}
