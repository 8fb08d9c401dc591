//! Batch upload of audio files
//!
//! The whole batch is validated against the extension allow-list before a
//! single byte goes on the wire; a disallowed file rejects the batch up
//! front. Files are then uploaded one by one; a failed file is marked
//! failed and the remaining ones still go through. Progress is a
//! percentage across the batch, not per-byte.

use papclient::{DeviceClient, Error, Result, is_allowed_upload};
use tracing::{info, warn};

/// One file selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }
}

/// Per-file upload outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub filename: String,
    /// None on success, the error text otherwise
    pub error: Option<String>,
    /// Batch progress after this file, in percent
    pub progress_pct: u8,
}

impl UploadOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a whole upload batch
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Upload a batch of files to the device
///
/// Returns `Error::UnsupportedFile` before any network call when a file
/// fails the allow-list check.
pub(crate) async fn upload_batch(
    client: &DeviceClient,
    files: Vec<UploadFile>,
) -> Result<UploadReport> {
    // Validate the whole batch first, like the original panel
    for file in &files {
        if !is_allowed_upload(&file.filename) {
            return Err(Error::UnsupportedFile(file.filename.clone()));
        }
    }

    let total = files.len();
    let mut report = UploadReport::default();

    for (index, file) in files.into_iter().enumerate() {
        let progress_pct = (((index + 1) * 100) / total.max(1)) as u8;
        let error = match client.upload(&file.filename, file.data).await {
            Ok(()) => {
                info!(filename = %file.filename, progress_pct, "Upload complete");
                None
            }
            Err(err) => {
                warn!(filename = %file.filename, "Upload failed: {}", err);
                Some(err.to_string())
            }
        };
        report.outcomes.push(UploadOutcome {
            filename: file.filename,
            error,
            progress_pct,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disallowed_extension_rejects_batch_before_network() {
        // Unroutable address: any network attempt would error differently
        let client = DeviceClient::builder()
            .base_url("http://192.0.2.1")
            .build()
            .unwrap();

        let files = vec![
            UploadFile::new("ok.mp3", vec![0; 4]),
            UploadFile::new("song.txt", vec![0; 4]),
        ];

        let err = upload_batch(&client, files).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFile(name) if name == "song.txt"));
    }

    #[test]
    fn test_report_counters() {
        let report = UploadReport {
            outcomes: vec![
                UploadOutcome {
                    filename: "a.mp3".into(),
                    error: None,
                    progress_pct: 50,
                },
                UploadOutcome {
                    filename: "b.mp3".into(),
                    error: Some("HTTP 500".into()),
                    progress_pct: 100,
                },
            ],
        };
        assert_eq!(report.failed_count(), 1);
        assert!(!report.all_succeeded());
    }
}
