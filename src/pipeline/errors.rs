// Error types for the acquisition pipeline

use std::fmt;

#[derive(Debug, Clone)]
pub enum DownloadError {
    /// Fetch exceeded its total timeout
    Timeout,

    /// Server answered with a non-200 status
    HttpStatus(u16),

    /// Failed to write the asset to local storage
    Io(String),

    /// ffmpeg binary is not installed / not found
    EncoderUnavailable,

    /// External mux process failed or produced an unusable file
    MergeFailed(String),

    /// Unknown error with details
    Unknown(String),
}

impl DownloadError {
    /// Short error code recorded on a failed `DownloadOutcome`.
    ///
    /// These strings are part of the contract with the storage layer: the
    /// bot reports them per-asset, so they must stay stable.
    pub fn error_code(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::HttpStatus(status) => format!("HTTP {}", status),
            Self::Io(msg) => msg.clone(),
            Self::EncoderUnavailable | Self::MergeFailed(_) => "merge_failed".to_string(),
            Self::Unknown(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Network timeout: remote host did not respond in time"),
            Self::HttpStatus(status) => write!(f, "HTTP {}", status),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::EncoderUnavailable => write!(f, "ffmpeg not available - cannot merge streams"),
            Self::MergeFailed(msg) => write!(f, "Merge failed: {}", msg),
            Self::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = e.status() {
            return Self::HttpStatus(status.as_u16());
        }
        Self::Unknown(e.to_string())
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
