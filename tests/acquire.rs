// End-to-end pipeline tests over a mock HTTP server and a temp storage root

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use archive_media::{
    classify, DownloadError, DownloadStatus, MediaAcquirer, MediaDescriptor, MediaKind, MediaRole,
    StorageConfig, StreamMuxer, StreamRepresentation,
};

/// Muxer double that concatenates both inputs into the output
struct ConcatMuxer;

#[async_trait]
impl StreamMuxer for ConcatMuxer {
    fn is_available(&self) -> bool {
        true
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        let mut merged = tokio::fs::read(video).await?;
        merged.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, merged).await?;
        Ok(())
    }
}

fn make_acquirer(root: &Path) -> MediaAcquirer {
    let config = StorageConfig::default()
        .with_storage_root(root)
        .with_public_base_url("http://media.test/media");
    MediaAcquirer::with_muxer(&config, Arc::new(ConcatMuxer)).unwrap()
}

#[tokio::test]
async fn test_photo_download_success() {
    let mut server = mockito::Server::new_async().await;
    let body = vec![0xAB_u8; 12_345];
    let mock = server
        .mock("GET", "/img.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(body)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let items = vec![MediaDescriptor::new(
        format!("{}/img.jpg", server.url()),
        MediaKind::Photo,
    )];
    let outcomes = acquirer.acquire_media(&items, "123", "twitter", None).await;

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.status, DownloadStatus::Success);
    assert_eq!(outcome.file_size, Some(12_345));
    assert_eq!(outcome.mime_type.as_deref(), Some("image/jpeg"));

    let local = outcome.local_path.as_ref().unwrap();
    assert!(local.starts_with(dir.path().join("images").join("twitter")));
    assert_eq!(std::fs::metadata(local).unwrap().len(), 12_345);

    // Hosted URL carries the same tail as the local path
    let filename = local.file_name().unwrap().to_str().unwrap();
    assert_eq!(
        outcome.hosted_url.as_deref(),
        Some(format!("http://media.test/media/images/twitter/{}", filename).as_str())
    );

    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_404_leaves_no_file_behind() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/video.mp4")
        .with_status(404)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let items = vec![MediaDescriptor::new(
        format!("{}/video.mp4", server.url()),
        MediaKind::Video,
    )];
    let outcomes = acquirer.acquire_media(&items, "99", "twitter", None).await;

    assert_eq!(outcomes[0].status, DownloadStatus::Failed);
    assert_eq!(outcomes[0].error.as_deref(), Some("HTTP 404"));
    assert!(outcomes[0].local_path.is_none());

    // The computed address must not exist on disk
    let videos = dir.path().join("videos").join("twitter");
    let leftover = std::fs::read_dir(&videos)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn test_second_fetch_skips_the_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/img.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(b"png-bytes".to_vec())
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let items = vec![MediaDescriptor::new(
        format!("{}/img.png", server.url()),
        MediaKind::Photo,
    )];

    let first = acquirer.acquire_media(&items, "7", "instagram", None).await;
    assert_eq!(first[0].status, DownloadStatus::Success);

    let second = acquirer.acquire_media(&items, "7", "instagram", None).await;
    assert_eq!(second[0].status, DownloadStatus::AlreadyExists);
    assert_eq!(second[0].file_size, Some(9));
    assert_eq!(second[0].local_path, first[0].local_path);

    // Exactly one request total across both calls
    mock.assert_async().await;
}

#[tokio::test]
async fn test_batch_preserves_order_and_isolates_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/a.jpg")
        .with_status(200)
        .with_body(b"aaaa".to_vec())
        .create_async()
        .await;
    server
        .mock("GET", "/broken.jpg")
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/c.jpg")
        .with_status(200)
        .with_body(b"cccccc".to_vec())
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let items = vec![
        MediaDescriptor::new(format!("{}/a.jpg", server.url()), MediaKind::Photo),
        MediaDescriptor::new(format!("{}/broken.jpg", server.url()), MediaKind::Photo),
        MediaDescriptor::new(format!("{}/c.jpg", server.url()), MediaKind::Photo),
    ];

    let outcomes = acquirer.acquire_media(&items, "55", "twitter", None).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].status, DownloadStatus::Success);
    assert_eq!(outcomes[0].file_size, Some(4));
    assert_eq!(outcomes[1].status, DownloadStatus::Failed);
    assert_eq!(outcomes[1].error.as_deref(), Some("HTTP 500"));
    assert_eq!(outcomes[2].status, DownloadStatus::Success);
    assert_eq!(outcomes[2].file_size, Some(6));
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let outcomes = acquirer.acquire_media(&[], "1", "twitter", None).await;
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn test_split_streams_are_merged() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v640.mp4")
        .with_status(200)
        .with_body(b"VIDEO-".to_vec())
        .create_async()
        .await;
    server
        .mock("GET", "/audio.mp4")
        .with_status(200)
        .with_body(b"AUDIO".to_vec())
        .create_async()
        .await;
    server
        .mock("GET", "/thumb.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(b"thumb".to_vec())
        .create_async()
        .await;

    let reps = vec![
        StreamRepresentation {
            height: 640,
            bandwidth: 1_000_000,
            codecs: "avc1.4d401f".to_string(),
            base_url: format!("{}/v640.mp4", server.url()),
        },
        StreamRepresentation {
            height: 0,
            bandwidth: 128_000,
            codecs: "mp4a.40.2".to_string(),
            base_url: format!("{}/audio.mp4", server.url()),
        },
    ];
    let plan = classify(&reps);
    assert!(plan.needs_merge);
    assert_eq!(plan.video.as_ref().unwrap().height, 640);

    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let items = vec![
        MediaDescriptor::new(format!("{}/v640.mp4", server.url()), MediaKind::Video)
            .with_role(MediaRole::Primary),
        MediaDescriptor::new(format!("{}/thumb.jpg", server.url()), MediaKind::Photo)
            .with_role(MediaRole::Thumbnail),
    ];

    let outcomes = acquirer
        .acquire_media(&items, "fb1", "facebook", Some(&plan))
        .await;

    assert_eq!(outcomes.len(), 2);

    let merged = &outcomes[0];
    assert_eq!(merged.status, DownloadStatus::Success);
    assert!(merged.merged);
    assert_eq!(merged.mime_type.as_deref(), Some("video/mp4"));
    let merged_path = merged.local_path.as_ref().unwrap();
    assert_eq!(std::fs::read(merged_path).unwrap(), b"VIDEO-AUDIO");

    // Thumbnail kept its slot and went through the plain path
    assert_eq!(outcomes[1].status, DownloadStatus::Success);
    assert!(!outcomes[1].merged);

    // Intermediate stream files are gone; only the merged video remains
    let videos = dir.path().join("videos").join("facebook");
    let remaining: Vec<_> = std::fs::read_dir(&videos)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(remaining, vec![merged_path.clone()]);
    let audio_dir = dir.path().join("audio").join("facebook");
    assert_eq!(std::fs::read_dir(&audio_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_video_only_plan_fetches_single_stream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/solo.mp4")
        .with_status(200)
        .with_body(b"solo-video".to_vec())
        .create_async()
        .await;

    let reps = vec![StreamRepresentation {
        height: 720,
        bandwidth: 2_000_000,
        codecs: "avc1.64001f".to_string(),
        base_url: format!("{}/solo.mp4", server.url()),
    }];
    let plan = classify(&reps);
    assert!(!plan.needs_merge);

    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let items = vec![MediaDescriptor::new(
        format!("{}/solo.mp4", server.url()),
        MediaKind::Video,
    )];
    let outcomes = acquirer
        .acquire_media(&items, "fb2", "facebook", Some(&plan))
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, DownloadStatus::Success);
    assert!(!outcomes[0].merged);
    assert_eq!(outcomes[0].file_size, Some(10));
}

#[tokio::test]
async fn test_failed_audio_stream_fails_the_video_slot() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v.mp4")
        .with_status(200)
        .with_body(b"video".to_vec())
        .create_async()
        .await;
    server
        .mock("GET", "/a.mp4")
        .with_status(403)
        .create_async()
        .await;

    let reps = vec![
        StreamRepresentation {
            height: 480,
            bandwidth: 900_000,
            codecs: "avc1.4d401e".to_string(),
            base_url: format!("{}/v.mp4", server.url()),
        },
        StreamRepresentation {
            height: 0,
            bandwidth: 96_000,
            codecs: "mp4a.40.2".to_string(),
            base_url: format!("{}/a.mp4", server.url()),
        },
    ];
    let plan = classify(&reps);

    let dir = tempfile::tempdir().unwrap();
    let acquirer = make_acquirer(dir.path());

    let items = vec![MediaDescriptor::new(
        format!("{}/v.mp4", server.url()),
        MediaKind::Video,
    )];
    let outcomes = acquirer
        .acquire_media(&items, "fb3", "facebook", Some(&plan))
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, DownloadStatus::Failed);
    assert_eq!(outcomes[0].error.as_deref(), Some("HTTP 403"));
}
