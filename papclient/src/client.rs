//! HTTP client for the Power Audio device REST API
//!
//! One async method per endpoint the firmware exposes. The client is
//! stateless: it holds no view of device state and no caches. State
//! tracking, reconciliation and optimistic updates live in `pappanel`.
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
//!     let status = client.status().await?;
//!     println!("playing: {}, volume: {:?}", status.playing, status.volume);
//!
//!     client.set_volume(42).await?;
//!     client.play_file("song.mp3").await?;
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::models::{
    DeviceStatus, PlaylistEntry, SyncTimeResponse, TimerEntry, TimerList, is_allowed_upload,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Default device base URL (ESP32 softAP address)
pub const DEFAULT_BASE_URL: &str = "http://192.168.4.1";

/// Default timeout for HTTP requests (5 seconds; the device is on the LAN)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Power Audio device HTTP client
#[derive(Debug, Clone)]
pub struct DeviceClient {
    pub(crate) client: Client,
    base_url: String,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client with a custom reqwest::Client
    ///
    /// Useful for sharing HTTP connection pools
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url.into()),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Get the device base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into `Error::Status` with the raw body
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::status(status.as_u16(), body))
        }
    }

    // ========================================================================
    // Status & Playlist
    // ========================================================================

    /// Fetch one status snapshot from `GET /api/status`
    pub async fn status(&self) -> Result<DeviceStatus> {
        let response = self
            .client
            .get(self.url("/api/status"))
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch the full playlist from `GET /api/playlist`
    ///
    /// The wire format is a bare JSON array of filenames; the returned
    /// list replaces any previously fetched one wholesale.
    pub async fn playlist(&self) -> Result<Vec<PlaylistEntry>> {
        let response = self
            .client
            .get(self.url("/api/playlist"))
            .timeout(self.timeout)
            .send()
            .await?;
        let files: Vec<String> = Self::check(response).await?.json().await?;
        Ok(files.into_iter().map(PlaylistEntry::new).collect())
    }

    // ========================================================================
    // Transport & Volume
    // ========================================================================

    /// Generic command dispatch: `POST /api/{name}` with no body
    ///
    /// Used for the firmware's simple actions (play, stop, pause, next,
    /// prev, ...). Dedicated handlers below layer debouncing and optimistic
    /// state on top of the same endpoints.
    pub async fn send_command(&self, name: &str) -> Result<()> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(Error::InvalidCommand(name.to_string()));
        }
        debug!(command = name, "Sending device command");
        let response = self
            .client
            .post(self.url(&format!("/api/{}", name)))
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Resume playback of the current track
    pub async fn play(&self) -> Result<()> {
        self.send_command("play").await
    }

    /// Start playback of a specific playlist file
    pub async fn play_file(&self, file: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/play"))
            .timeout(self.timeout)
            .form(&[("file", file)])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Stop playback
    pub async fn stop(&self) -> Result<()> {
        self.send_command("stop").await
    }

    /// Pause playback
    pub async fn pause(&self) -> Result<()> {
        self.send_command("pause").await
    }

    /// Skip to the next playlist track
    pub async fn next(&self) -> Result<()> {
        self.send_command("next").await
    }

    /// Skip to the previous playlist track
    pub async fn previous(&self) -> Result<()> {
        self.send_command("prev").await
    }

    /// Set the device volume (clamped to 0..=100)
    pub async fn set_volume(&self, value: u8) -> Result<()> {
        let value = value.min(100);
        let response = self
            .client
            .post(self.url("/api/volume"))
            .timeout(self.timeout)
            .form(&[("value", value.to_string())])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Enable or disable loop playback
    pub async fn set_loop(&self, enabled: bool) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/loop"))
            .timeout(self.timeout)
            .form(&[("enabled", enabled.to_string())])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Delete a file from the device SD card
    pub async fn delete_file(&self, file: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/delete"))
            .timeout(self.timeout)
            .form(&[("file", file)])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    // ========================================================================
    // Clock & Timers
    // ========================================================================

    /// Trigger NTP synchronization; returns the device-reported outcome
    pub async fn sync_time(&self) -> Result<bool> {
        let response = self
            .client
            .post(self.url("/api/sync-time"))
            .timeout(self.timeout)
            .send()
            .await?;
        let reply: SyncTimeResponse = Self::check(response).await?.json().await?;
        Ok(reply.success)
    }

    /// Set the RTC manually (`datetime` in the panel's `YYYY-MM-DDTHH:MM` form)
    pub async fn set_time(&self, datetime: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/set-time"))
            .timeout(self.timeout)
            .json(&json!({ "datetime": datetime }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Set the UTC offset in hours
    pub async fn set_timezone(&self, offset: i32) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/set-timezone"))
            .timeout(self.timeout)
            .json(&json!({ "offset": offset }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Fetch the timer list
    pub async fn timers(&self) -> Result<Vec<TimerEntry>> {
        let response = self
            .client
            .get(self.url("/api/timers"))
            .timeout(self.timeout)
            .send()
            .await?;
        let list: TimerList = Self::check(response).await?.json().await?;
        Ok(list.timers)
    }

    /// Schedule a play/stop timer
    pub async fn add_timer(&self, datetime: &str, action: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/add-timer"))
            .timeout(self.timeout)
            .json(&json!({ "datetime": datetime, "action": action }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Remove a timer by its device-assigned id
    pub async fn remove_timer(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/remove-timer"))
            .timeout(self.timeout)
            .form(&[("id", id)])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Reset WiFi credentials; the device restarts afterwards
    pub async fn reset_wifi(&self) -> Result<()> {
        self.send_command("reset-wifi").await
    }

    /// Clear all persisted settings (NVS); the device restarts afterwards
    pub async fn clear_nvs(&self) -> Result<()> {
        self.send_command("clear-nvs").await
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Upload one audio file as a multipart POST
    ///
    /// The extension is validated against the allow-list before any network
    /// traffic. The firmware serves the upload handler on `/api/upload` or
    /// `/upload` depending on the build, so a 404 on the first path retries
    /// the second.
    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<()> {
        if !is_allowed_upload(filename) {
            return Err(Error::UnsupportedFile(filename.to_string()));
        }

        let response = self.post_multipart("/api/upload", filename, data.clone()).await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!(filename, "/api/upload not found, retrying /upload");
            let response = self.post_multipart("/upload", filename, data).await?;
            Self::check(response).await?;
        } else {
            Self::check(response).await?;
        }
        Ok(())
    }

    async fn post_multipart(&self, path: &str, filename: &str, data: Vec<u8>) -> Result<Response> {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        // No per-request timeout here: large files on a slow SD card can
        // legitimately take longer than the API timeout.
        Ok(self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await?)
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Builder for `DeviceClient`
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientBuilder {
    /// Set the device base URL (e.g. `http://192.168.1.50`)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<DeviceClient> {
        // Fail early on an unparseable base URL rather than per request
        url::Url::parse(&self.base_url)?;

        // The timeout is applied per request, not on the pool: uploads
        // deliberately run without one.
        let client = Client::builder().build()?;
        Ok(DeviceClient {
            client,
            base_url: normalize_base_url(self.base_url),
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = DeviceClient::new().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_base_url_normalization() {
        let client = DeviceClient::builder()
            .base_url("http://10.0.0.5/")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://10.0.0.5");
        assert_eq!(client.url("/api/status"), "http://10.0.0.5/api/status");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(DeviceClient::builder().base_url("not a url").build().is_err());
    }

    #[tokio::test]
    async fn test_invalid_command_rejected_before_network() {
        let client = DeviceClient::new().unwrap();
        assert!(matches!(
            client.send_command("").await,
            Err(Error::InvalidCommand(_))
        ));
        assert!(matches!(
            client.send_command("../etc").await,
            Err(Error::InvalidCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_extension_before_network() {
        let client = DeviceClient::new().unwrap();
        let err = client.upload("song.txt", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFile(_)));
    }
}
