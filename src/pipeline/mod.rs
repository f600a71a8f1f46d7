// Media acquisition pipeline
//
// Scrapers hand this module a list of media descriptors (plus, for
// split-stream platforms, a merge plan computed by the classifier at parse
// time); it fetches every asset to content-addressed storage and returns
// one outcome per asset for the storage layer to persist.

pub mod addressing;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod muxer;
pub mod router;

pub use addressing::{ContentAddressor, MediaAddress, StorageStats};
pub use batch::BatchDownloader;
pub use classifier::classify;
pub use config::StorageConfig;
pub use errors::DownloadError;
pub use fetcher::{MediaFetch, MediaFetcher};
pub use models::{
    DownloadOutcome, DownloadStatus, MediaDescriptor, MediaKind, MediaRole, MergePlan,
    StreamRepresentation,
};
pub use muxer::{FfmpegMuxer, StreamMerger, StreamMuxer};
pub use router::MediaAcquirer;
