pub mod pipeline;

pub use pipeline::{
    classify, BatchDownloader, ContentAddressor, DownloadError, DownloadOutcome, DownloadStatus,
    FfmpegMuxer, MediaAcquirer, MediaAddress, MediaDescriptor, MediaFetch, MediaFetcher, MediaKind,
    MediaRole, MergePlan, StorageConfig, StorageStats, StreamMerger, StreamMuxer, StreamRepresentation,
};
