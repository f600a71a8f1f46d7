// Common data models for the media pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of media asset attached to a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedImage,
    Audio,
}

impl MediaKind {
    /// Storage subdirectory for this kind
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Photo | Self::AnimatedImage => "images",
            Self::Video => "videos",
            Self::Audio => "audio",
        }
    }
}

/// Role of an asset within its post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRole {
    /// The main asset of the post
    Primary,
    /// Preview image for a video
    Thumbnail,
    /// Separately delivered audio track for a split video
    AudioCompanion,
}

/// One remote asset to acquire, as produced by the scraping layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub url: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Duration in seconds, for videos and audio
    #[serde(default)]
    pub duration: Option<f64>,
    /// MIME type declared by the platform, if any
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub role: Option<MediaRole>,
}

impl MediaDescriptor {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
            width: None,
            height: None,
            duration: None,
            mime_type: None,
            role: None,
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_role(mut self, role: MediaRole) -> Self {
        self.role = Some(role);
        self
    }
}

/// Platform-native description of one elementary stream.
///
/// Field names match the representation objects platforms embed in their
/// video metadata (`height`, `bandwidth`, `codecs`, `base_url`). A height of
/// zero signals an audio-only stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRepresentation {
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub bandwidth: u64,
    #[serde(default)]
    pub codecs: String,
    pub base_url: String,
}

/// Merge decision computed once per post by the stream classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergePlan {
    /// Best video stream, if the post has one
    pub video: Option<StreamRepresentation>,
    /// Companion audio stream, if the platform split it out
    pub audio: Option<StreamRepresentation>,
    /// True iff both a video and an audio candidate were found
    pub needs_merge: bool,
}

/// Terminal state of one acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Success,
    AlreadyExists,
    Failed,
}

/// Result of acquiring one asset, consumed by the storage layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub status: DownloadStatus,
    pub local_path: Option<PathBuf>,
    pub hosted_url: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub error: Option<String>,
    /// True when the file was produced by muxing separate streams
    #[serde(default)]
    pub merged: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub downloaded_at: Option<OffsetDateTime>,
}

impl DownloadOutcome {
    pub fn success(
        local_path: PathBuf,
        hosted_url: String,
        file_size: u64,
        mime_type: Option<String>,
    ) -> Self {
        Self {
            status: DownloadStatus::Success,
            local_path: Some(local_path),
            hosted_url: Some(hosted_url),
            file_size: Some(file_size),
            mime_type,
            error: None,
            merged: false,
            downloaded_at: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn already_exists(
        local_path: PathBuf,
        hosted_url: String,
        file_size: u64,
        mime_type: Option<String>,
    ) -> Self {
        Self {
            status: DownloadStatus::AlreadyExists,
            local_path: Some(local_path),
            hosted_url: Some(hosted_url),
            file_size: Some(file_size),
            mime_type,
            error: None,
            merged: false,
            // Cache hits are timestamped too; consumers treat this as
            // "when the asset was last confirmed on disk"
            downloaded_at: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: DownloadStatus::Failed,
            local_path: None,
            hosted_url: None,
            file_size: None,
            mime_type: None,
            error: Some(error.into()),
            merged: false,
            downloaded_at: None,
        }
    }

    pub fn into_merged(mut self) -> Self {
        self.merged = true;
        self
    }

    /// Whether a usable file exists on disk for this outcome
    pub fn is_stored(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Success | DownloadStatus::AlreadyExists
        )
    }
}
