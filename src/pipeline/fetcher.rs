// Single-item downloader
//
// Fetches one remote asset to its content address. Failures never escape as
// errors: every call produces a DownloadOutcome, and retry policy belongs to
// the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info};

use super::addressing::{ContentAddressor, MediaAddress};
use super::config::StorageConfig;
use super::errors::DownloadError;
use super::models::{DownloadOutcome, MediaDescriptor};

/// Buffered-write granularity; keeps memory use independent of asset size
const WRITE_BUF_SIZE: usize = 8 * 1024;

/// Fetches one asset to local storage
#[async_trait]
pub trait MediaFetch: Send + Sync {
    async fn fetch(
        &self,
        item: &MediaDescriptor,
        post_id: &str,
        platform: &str,
    ) -> DownloadOutcome;
}

/// Downloads individual media assets over HTTP
pub struct MediaFetcher {
    client: reqwest::Client,
    addressor: Arc<ContentAddressor>,
}

impl MediaFetcher {
    /// Fails only if the HTTP client cannot be built; a client without the
    /// configured fetch timeout is never used.
    pub fn new(
        addressor: Arc<ContentAddressor>,
        config: &StorageConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;

        Ok(Self { client, addressor })
    }

    pub fn addressor(&self) -> &ContentAddressor {
        &self.addressor
    }

    /// Fetch one asset. If the file already exists at its content address
    /// the call returns immediately without any network activity.
    pub async fn fetch(
        &self,
        item: &MediaDescriptor,
        post_id: &str,
        platform: &str,
    ) -> DownloadOutcome {
        let address = match self.addressor.address_for(
            &item.url,
            post_id,
            platform,
            item.kind,
            item.mime_type.as_deref(),
        ) {
            Ok(address) => address,
            Err(e) => {
                error!("failed to resolve address for {}: {}", item.url, e);
                return DownloadOutcome::failed(e.to_string());
            }
        };

        if let Ok(meta) = tokio::fs::metadata(&address.local_path).await {
            debug!("media file already exists: {}", address.local_path.display());
            return DownloadOutcome::already_exists(
                address.local_path,
                address.hosted_url,
                meta.len(),
                item.mime_type.clone(),
            );
        }

        match self.fetch_to_disk(item, &address).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("error downloading media {}: {}", item.url, e);
                DownloadOutcome::failed(e.error_code())
            }
        }
    }

    async fn fetch_to_disk(
        &self,
        item: &MediaDescriptor,
        address: &MediaAddress,
    ) -> Result<DownloadOutcome, DownloadError> {
        let response = self.client.get(&item.url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        if let Err(e) = self.stream_body(response, address).await {
            // Never leave a truncated file where the idempotence check
            // would mistake it for a complete asset
            let _ = tokio::fs::remove_file(&address.local_path).await;
            return Err(e);
        }

        // Size of record is what actually landed on disk; Content-Length
        // may be absent or wrong
        let actual_size = tokio::fs::metadata(&address.local_path).await?.len();

        info!(
            "downloaded media: {} -> {} ({} bytes)",
            item.url,
            address.local_path.display(),
            actual_size
        );

        Ok(DownloadOutcome::success(
            address.local_path.clone(),
            address.hosted_url.clone(),
            actual_size,
            content_type.or_else(|| item.mime_type.clone()),
        ))
    }

    async fn stream_body(
        &self,
        mut response: reqwest::Response,
        address: &MediaAddress,
    ) -> Result<(), DownloadError> {
        let file = tokio::fs::File::create(&address.local_path).await?;
        let mut writer = BufWriter::with_capacity(WRITE_BUF_SIZE, file);

        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl MediaFetch for MediaFetcher {
    async fn fetch(
        &self,
        item: &MediaDescriptor,
        post_id: &str,
        platform: &str,
    ) -> DownloadOutcome {
        MediaFetcher::fetch(self, item, post_id, platform).await
    }
}
