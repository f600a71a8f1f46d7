// Batch orchestrator - concurrent fan-out over one post's descriptors
//
// One task per descriptor, outcomes returned in input order. A failure in
// one task never cancels its siblings; an exception escaping this module is
// itself a bug.

use std::sync::Arc;

use tracing::{error, info};

use super::fetcher::MediaFetch;
use super::models::{DownloadOutcome, MediaDescriptor};

pub struct BatchDownloader {
    fetcher: Arc<dyn MediaFetch>,
}

impl BatchDownloader {
    pub fn new(fetcher: Arc<dyn MediaFetch>) -> Self {
        Self { fetcher }
    }

    /// Download all media items for a post concurrently.
    ///
    /// The output has the same length and order as the input regardless of
    /// completion order. An empty input issues no network activity.
    pub async fn download_all(
        &self,
        items: &[MediaDescriptor],
        post_id: &str,
        platform: &str,
    ) -> Vec<DownloadOutcome> {
        if items.is_empty() {
            return Vec::new();
        }

        info!(
            "downloading {} media items for {} post {}",
            items.len(),
            platform,
            post_id
        );

        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            let fetcher = Arc::clone(&self.fetcher);
            let item = item.clone();
            let post_id = post_id.to_string();
            let platform = platform.to_string();

            handles.push(tokio::spawn(async move {
                fetcher.fetch(&item, &post_id, &platform).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    // Panicked or cancelled task: convert to a failed
                    // outcome for this index only
                    error!("download task {} aborted: {}", i, e);
                    outcomes.push(DownloadOutcome::failed(e.to_string()));
                }
            }
        }

        let stored = outcomes.iter().filter(|o| o.is_stored()).count();
        info!(
            "stored {}/{} media items for post {}",
            stored,
            outcomes.len(),
            post_id
        );

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use async_trait::async_trait;

    use crate::pipeline::models::{DownloadStatus, MediaKind};

    /// Fetch double: panics for URLs containing "boom", succeeds otherwise
    struct ScriptedFetch;

    #[async_trait]
    impl MediaFetch for ScriptedFetch {
        async fn fetch(
            &self,
            item: &MediaDescriptor,
            _post_id: &str,
            _platform: &str,
        ) -> DownloadOutcome {
            if item.url.contains("boom") {
                panic!("scripted fetch failure");
            }
            DownloadOutcome::success(
                PathBuf::from("/tmp/asset"),
                "http://media.test/media/images/twitter/asset".to_string(),
                4,
                None,
            )
        }
    }

    #[tokio::test]
    async fn test_panicking_task_fails_only_its_index() {
        let batch = BatchDownloader::new(Arc::new(ScriptedFetch));
        let items = vec![
            MediaDescriptor::new("https://cdn/a.jpg", MediaKind::Photo),
            MediaDescriptor::new("https://cdn/boom.jpg", MediaKind::Photo),
            MediaDescriptor::new("https://cdn/c.jpg", MediaKind::Photo),
        ];

        let outcomes = batch.download_all(&items, "1", "twitter").await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, DownloadStatus::Success);
        assert_eq!(outcomes[1].status, DownloadStatus::Failed);
        assert!(outcomes[1].error.as_deref().unwrap().contains("panic"));
        assert_eq!(outcomes[2].status, DownloadStatus::Success);
    }
}
