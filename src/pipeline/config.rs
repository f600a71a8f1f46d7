// Storage and network configuration for the pipeline

use std::path::PathBuf;

/// Configuration for storage paths and external services
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for downloaded media
    pub storage_root: PathBuf,
    /// Public base URL the media server exposes the root under
    pub public_base_url: String,
    /// Total timeout for one HTTP fetch, in seconds
    pub fetch_timeout_secs: u64,
    /// Timeout for one ffmpeg mux invocation, in seconds
    pub mux_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let storage_root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("social-archive")
            .join("media_storage");

        Self {
            storage_root,
            public_base_url: "http://localhost:8000/media".to_string(),
            fetch_timeout_secs: 60,
            mux_timeout_secs: 300,
        }
    }
}

impl StorageConfig {
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        // Trailing slash would double up in hosted URL joins
        let mut url: String = base_url.into();
        while url.ends_with('/') {
            url.pop();
        }
        self.public_base_url = url;
        self
    }

    pub fn with_fetch_timeout(mut self, seconds: u64) -> Self {
        self.fetch_timeout_secs = seconds;
        self
    }

    pub fn with_mux_timeout(mut self, seconds: u64) -> Self {
        self.mux_timeout_secs = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let config = StorageConfig::default().with_public_base_url("http://host/media/");
        assert_eq!(config.public_base_url, "http://host/media");
    }
}
