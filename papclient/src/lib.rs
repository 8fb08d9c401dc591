//! Power Audio device client library for PAPanel
//!
//! This crate provides a typed async Rust client for the REST API exposed
//! by the Power Audio embedded player, covering:
//!
//! - **Status**: one-shot snapshots of playback, volume, loop flag,
//!   connectivity, temperature and clock
//! - **Playlist**: full playlist fetch, per-file play and delete
//! - **Transport**: play/stop/pause/next/prev plus a generic command
//!   dispatcher for any `POST /api/{cmd}` action
//! - **Clock & Timers**: NTP sync, manual time, timezone, scheduled
//!   play/stop timers
//! - **Upload**: multipart audio file upload with a client-side
//!   extension allow-list
//!
//! The client is stateless. The panel-side state (optimistic mirrors,
//! reconciliation, pollers, debouncing) lives in the `pappanel` crate.
//!
//! # Example
//!
//! ```no_run
//! use papclient::DeviceClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DeviceClient::builder()
//!         .base_url("http://192.168.1.50")
//!         .build()?;
//!
//!     for entry in client.playlist().await? {
//!         println!("{}", entry);
//!     }
//!
//!     client.play_file("song.mp3").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod models;

// Re-exports
pub use client::{ClientBuilder, DeviceClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::{Error, Result};
pub use models::{
    ConnectivityState, DeviceDate, DeviceStatus, DeviceTime, FileKind, PlaybackState,
    PlaylistEntry, SyncTimeResponse, TimerEntry, TimerList, ALLOWED_EXTENSIONS,
    is_allowed_upload,
};
