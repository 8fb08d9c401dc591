//! Background pollers
//!
//! Two independent loops, matching the original panel's two timers: a
//! status poll and a playlist poll. They run with no coordination and may
//! interleave arbitrarily; stale status responses are discarded by the
//! session's sequence numbers.
//!
//! A failed poll logs, waits for the configured resync delay, then runs a
//! full resync -- the self-healing path for a device that rebooted
//! mid-session.

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::warn;

use crate::session::PanelSession;

/// Handles of the two background loops
#[derive(Debug)]
pub struct PollerHandles {
    pub status: JoinHandle<()>,
    pub playlist: JoinHandle<()>,
}

impl PollerHandles {
    /// Stop both loops
    pub fn abort(&self) {
        self.status.abort();
        self.playlist.abort();
    }
}

/// Spawn the status and playlist pollers for a session
///
/// Both loops tick immediately, like the original panel's initial
/// `updateStatus()`/`loadMusicList()` calls before the intervals start.
pub fn spawn_pollers(session: PanelSession) -> PollerHandles {
    let status = tokio::spawn(status_loop(session.clone()));
    let playlist = tokio::spawn(playlist_loop(session));
    PollerHandles { status, playlist }
}

async fn status_loop(session: PanelSession) {
    let options = session.options().clone();
    let mut ticker = time::interval(options.status_poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(err) = session.poll_status().await {
            warn!("Status poll failed: {}", err);
            time::sleep(options.resync_delay).await;
            session.full_resync().await;
        }
    }
}

async fn playlist_loop(session: PanelSession) {
    let options = session.options().clone();
    let mut ticker = time::interval(options.playlist_poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(err) = session.refresh_playlist().await {
            warn!("Playlist poll failed: {}", err);
            time::sleep(options.resync_delay).await;
            session.full_resync().await;
        }
    }
}
