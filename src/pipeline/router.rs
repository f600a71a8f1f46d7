// Router - dispatch between the plain batch path and the merge path
//
// Pure dispatch over injected services; owns no state of its own. Callers
// hold one acquirer per process and invoke it once per post, which is what
// keeps merges for a single post serialized.

use std::io;
use std::sync::Arc;

use tracing::{info, warn};

use super::addressing::ContentAddressor;
use super::batch::BatchDownloader;
use super::config::StorageConfig;
use super::fetcher::{MediaFetch, MediaFetcher};
use super::models::{
    DownloadOutcome, MediaDescriptor, MediaKind, MergePlan, StreamRepresentation,
};
use super::muxer::{FfmpegMuxer, StreamMerger, StreamMuxer};

/// Front door of the acquisition pipeline
pub struct MediaAcquirer {
    addressor: Arc<ContentAddressor>,
    fetcher: Arc<MediaFetcher>,
    batch: BatchDownloader,
    merger: StreamMerger,
}

impl MediaAcquirer {
    /// Build the full pipeline with the production ffmpeg muxer.
    pub fn new(config: &StorageConfig) -> io::Result<Self> {
        let muxer: Arc<dyn StreamMuxer> = Arc::new(FfmpegMuxer::new(config));
        Self::with_muxer(config, muxer)
    }

    /// Build the pipeline with a caller-supplied muxer (test doubles).
    pub fn with_muxer(config: &StorageConfig, muxer: Arc<dyn StreamMuxer>) -> io::Result<Self> {
        let addressor = Arc::new(ContentAddressor::new(config)?);
        let fetcher = MediaFetcher::new(Arc::clone(&addressor), config)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let fetcher = Arc::new(fetcher);
        let batch = BatchDownloader::new(Arc::clone(&fetcher) as Arc<dyn MediaFetch>);
        let merger = StreamMerger::new(muxer);

        Ok(Self {
            addressor,
            fetcher,
            batch,
            merger,
        })
    }

    pub fn addressor(&self) -> &ContentAddressor {
        &self.addressor
    }

    /// Acquire all media for one post.
    ///
    /// With a merge plan carrying a video candidate, the chosen streams are
    /// downloaded individually and muxed, and the merged outcome fills the
    /// post's video slot; all other descriptors take the plain batch path
    /// and keep their input positions.
    pub async fn acquire_media(
        &self,
        descriptors: &[MediaDescriptor],
        post_id: &str,
        platform: &str,
        plan: Option<&MergePlan>,
    ) -> Vec<DownloadOutcome> {
        if let Some(video) = plan.and_then(|p| p.video.as_ref()) {
            let audio = plan
                .and_then(|p| p.audio.as_ref())
                .filter(|_| plan.is_some_and(|p| p.needs_merge));
            return self
                .acquire_with_plan(descriptors, post_id, platform, video, audio)
                .await;
        }

        self.batch.download_all(descriptors, post_id, platform).await
    }

    async fn acquire_with_plan(
        &self,
        descriptors: &[MediaDescriptor],
        post_id: &str,
        platform: &str,
        video: &StreamRepresentation,
        audio: Option<&StreamRepresentation>,
    ) -> Vec<DownloadOutcome> {
        // The video slot is the first video descriptor; everything else
        // (thumbnails etc.) goes through the plain path at its own index
        let video_slot = descriptors.iter().position(|d| d.kind == MediaKind::Video);

        let rest: Vec<MediaDescriptor> = descriptors
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != video_slot)
            .map(|(_, d)| d.clone())
            .collect();

        let video_outcome = match audio {
            Some(audio) => self.download_and_merge(video, audio, post_id, platform).await,
            None => {
                // Single stream: assumed to carry embedded audio
                info!(
                    "single video stream ({}p) for {} post {}",
                    video.height, platform, post_id
                );
                let item = stream_descriptor(video, MediaKind::Video, "video/mp4");
                self.fetcher.fetch(&item, post_id, platform).await
            }
        };

        let rest_outcomes = self.batch.download_all(&rest, post_id, platform).await;

        // Reassemble in input order
        let mut outcomes = Vec::with_capacity(descriptors.len().max(1));
        let mut rest_iter = rest_outcomes.into_iter();
        let mut video_outcome = Some(video_outcome);

        for i in 0..descriptors.len() {
            if Some(i) == video_slot {
                if let Some(outcome) = video_outcome.take() {
                    outcomes.push(outcome);
                }
            } else if let Some(outcome) = rest_iter.next() {
                outcomes.push(outcome);
            }
        }
        // Scrapers for split-stream platforms may describe the video only
        // through the representation list; keep its outcome regardless
        if let Some(outcome) = video_outcome.take() {
            outcomes.insert(0, outcome);
        }

        outcomes
    }

    /// Download the two elementary streams under derived keys, then mux
    /// them to the address of (video URL, post id, platform).
    async fn download_and_merge(
        &self,
        video: &StreamRepresentation,
        audio: &StreamRepresentation,
        post_id: &str,
        platform: &str,
    ) -> DownloadOutcome {
        info!(
            "separate video ({}p) and audio streams for {} post {}",
            video.height, platform, post_id
        );

        let video_item = stream_descriptor(video, MediaKind::Video, "video/mp4");
        let audio_item = stream_descriptor(audio, MediaKind::Audio, "audio/mp4");

        let video_key = format!("{}_video", post_id);
        let video_outcome = self.fetcher.fetch(&video_item, &video_key, platform).await;
        let Some(video_path) = stored_path(&video_outcome) else {
            warn!("failed to download video stream: {:?}", video_outcome.error);
            return video_outcome;
        };

        let audio_key = format!("{}_audio", post_id);
        let audio_outcome = self.fetcher.fetch(&audio_item, &audio_key, platform).await;
        let Some(audio_path) = stored_path(&audio_outcome) else {
            warn!("failed to download audio stream: {:?}", audio_outcome.error);
            return audio_outcome;
        };

        let final_address = match self.addressor.address_for(
            &video.base_url,
            post_id,
            platform,
            MediaKind::Video,
            Some("video/mp4"),
        ) {
            Ok(address) => address,
            Err(e) => return DownloadOutcome::failed(e.to_string()),
        };

        self.merger
            .merge(&video_path, &audio_path, &final_address)
            .await
    }
}

fn stream_descriptor(
    rep: &StreamRepresentation,
    kind: MediaKind,
    mime: &str,
) -> MediaDescriptor {
    let mut item = MediaDescriptor::new(rep.base_url.clone(), kind).with_mime_type(mime);
    if rep.height > 0 {
        item.height = Some(rep.height);
    }
    item
}

fn stored_path(outcome: &DownloadOutcome) -> Option<std::path::PathBuf> {
    if outcome.is_stored() {
        outcome.local_path.clone()
    } else {
        None
    }
}
