//! Data models for the device REST API
//!
//! This module contains the structures needed to deserialize responses
//! from the player firmware, plus the logical types the panel works with.
//! Each status snapshot is immutable and superseded wholesale by the next
//! successful poll.

use serde::{Deserialize, Serialize};

/// File extensions the device can play (and accepts for upload)
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav"];

// ============================================================================
// Device Status Models
// ============================================================================

/// WiFi/MQTT link state as reported by the firmware
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectivityState {
    #[serde(rename = "Connected")]
    Connected,
    #[serde(rename = "Disconnected")]
    Disconnected,
}

impl ConnectivityState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityState::Connected)
    }
}

/// Wall-clock time as reported by the device RTC or NTP
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceTime {
    pub hour: u8,
    pub minute: u8,
    /// Older firmware omits the seconds field
    #[serde(default)]
    pub second: u8,
    #[serde(default)]
    pub date: Option<DeviceDate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceDate {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl std::fmt::Display for DeviceTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl std::fmt::Display for DeviceDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{:02}/{}", self.day, self.month, self.year)
    }
}

/// One full status snapshot from `GET /api/status`
///
/// Every field the firmware may omit is optional; `playing`/`looping`
/// default to false so older firmware that leaves them out still parses.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceStatus {
    /// Currently loaded track filename
    #[serde(default)]
    pub track: Option<String>,
    /// Board temperature in °C (from the RTC module)
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub wifi: Option<ConnectivityState>,
    #[serde(default)]
    pub mqtt: Option<ConnectivityState>,
    /// Bluetooth status string, only present on BT-capable builds
    #[serde(default)]
    pub bluetooth: Option<String>,
    /// Volume 0..=100
    #[serde(default)]
    pub volume: Option<u8>,
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub looping: bool,
    /// Playback position within the current track, in seconds
    #[serde(default)]
    pub track_position: Option<f64>,
    /// Duration of the current track, in seconds
    #[serde(default)]
    pub track_duration: Option<f64>,
    /// RTC time
    #[serde(default)]
    pub time: Option<DeviceTime>,
    /// NTP time, if the device has synchronized
    #[serde(default)]
    pub ntp: Option<DeviceTime>,
    /// UTC offset in hours
    #[serde(default)]
    pub timezone: Option<i32>,
}

// ============================================================================
// Playback State
// ============================================================================

/// Logical playback state of the device
///
/// The firmware only distinguishes playing from stopped; there is no
/// pause state on the wire (pause is a transport command, the status
/// still reports `playing: false` afterwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

impl PlaybackState {
    pub fn from_playing(playing: bool) -> Self {
        if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    /// Returns the opposite state (the optimistic toggle target)
    pub fn toggled(&self) -> Self {
        match self {
            PlaybackState::Stopped => PlaybackState::Playing,
            PlaybackState::Playing => PlaybackState::Stopped,
        }
    }

    /// Returns a human-readable label for the playback state
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Playing => "PLAYING",
        }
    }
}

// ============================================================================
// Playlist Models
// ============================================================================

/// Audio file kind, keyed by filename extension
///
/// Drives the per-entry icon in the playlist display, mirroring the
/// original panel's per-format icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Mp3,
    M4a,
    Aac,
    Wav,
    Other,
}

impl FileKind {
    /// Classify a filename by its extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" => FileKind::Mp3,
            "m4a" => FileKind::M4a,
            "aac" => FileKind::Aac,
            "wav" => FileKind::Wav,
            _ => FileKind::Other,
        }
    }

    /// Display icon for playlist rendering
    pub fn icon(&self) -> &'static str {
        match self {
            FileKind::Mp3 => "♪",
            FileKind::M4a => "♫",
            FileKind::Aac => "♬",
            FileKind::Wav => "∿",
            FileKind::Other => "·",
        }
    }

    /// Short uppercase format label
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Mp3 => "MP3",
            FileKind::M4a => "M4A",
            FileKind::Aac => "AAC",
            FileKind::Wav => "WAV",
            FileKind::Other => "???",
        }
    }

    /// True if the device accepts this kind for upload
    pub fn is_allowed(&self) -> bool {
        !matches!(self, FileKind::Other)
    }
}

/// Check a filename against the upload allow-list
pub fn is_allowed_upload(filename: &str) -> bool {
    FileKind::from_filename(filename).is_allowed()
}

/// One entry of the device playlist
///
/// The wire format is a bare JSON array of filenames; the kind is derived
/// locally. The list is fully replaced on each fetch, never diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub filename: String,
    pub kind: FileKind,
}

impl PlaylistEntry {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let kind = FileKind::from_filename(&filename);
        Self { filename, kind }
    }
}

impl std::fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.icon(), self.filename)
    }
}

// ============================================================================
// Timer Models
// ============================================================================

/// A scheduled play/stop timer on the device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerEntry {
    pub id: String,
    pub datetime: String,
    pub action: String,
}

/// Wire wrapper for `GET /api/timers`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimerList {
    #[serde(default)]
    pub timers: Vec<TimerEntry>,
}

/// Response of `POST /api/sync-time`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTimeResponse {
    pub success: bool,
}
