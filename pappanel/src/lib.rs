//! Panel session for the Power Audio player
//!
//! This crate is the stateful half of PAPanel. It owns the local view of
//! device state and keeps it honest:
//!
//! - **State & reconciliation**: optimistic mirrors (volume, play/stop,
//!   loop) overwritten by every successful status poll; stale overlapping
//!   polls are discarded by sequence number
//! - **Pollers**: independent status and playlist loops with a delayed
//!   full-resync recovery path when the device drops off the network
//! - **Optimistic controls**: play/stop and loop flip locally first and
//!   roll back if the request fails; volume input is debounced and
//!   coalesced
//! - **Timers & uploads**: wholesale list refresh after every timer
//!   mutation; batch uploads validated before any network call
//!
//! # Example
//!
//! ```no_run
//! use pappanel::{PanelSession, spawn_pollers};
//! use papconfig::get_config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = PanelSession::from_config(&get_config())?;
//!     let pollers = spawn_pollers(session.clone());
//!
//!     session.toggle_play_stop().await?;
//!     println!("{}", session.playback().as_str());
//!
//!     pollers.abort();
//!     Ok(())
//! }
//! ```

pub mod poller;
pub mod session;
pub mod state;
pub mod upload;

mod volume;

// Re-exports
pub use poller::{PollerHandles, spawn_pollers};
pub use session::{PanelOptions, PanelSession};
pub use state::PanelState;
pub use upload::{UploadFile, UploadOutcome, UploadReport};
