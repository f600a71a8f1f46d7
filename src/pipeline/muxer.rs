// Muxing - combine separately delivered video and audio elementary streams
//
// The external encoder is always invoked in stream-copy mode: both tracks
// are repackaged into one container without re-encoding. The process-exec
// side lives behind the StreamMuxer trait so the success/cleanup logic can
// be tested without a real ffmpeg binary.

use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use super::addressing::MediaAddress;
use super::config::StorageConfig;
use super::errors::DownloadError;
use super::models::DownloadOutcome;

/// Invokes an external stream-copy mux of one video and one audio file
#[async_trait]
pub trait StreamMuxer: Send + Sync {
    /// Whether the encoder binary was found at startup
    fn is_available(&self) -> bool;

    /// Mux `video` and `audio` into `output`, overwriting any partial
    /// target left by an interrupted attempt. Does not verify the result.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError>;
}

/// Production muxer shelling out to ffmpeg
pub struct FfmpegMuxer {
    ffmpeg_path: Option<String>,
    timeout_secs: u64,
}

impl FfmpegMuxer {
    /// Probe for ffmpeg once at construction. Unavailability is logged here
    /// and not again on every merge call.
    pub fn new(config: &StorageConfig) -> Self {
        let ffmpeg_path = find_ffmpeg();
        if ffmpeg_path.is_none() {
            warn!("ffmpeg not found - video/audio merging will not be available");
        }

        Self {
            ffmpeg_path,
            timeout_secs: config.mux_timeout_secs,
        }
    }
}

#[async_trait]
impl StreamMuxer for FfmpegMuxer {
    fn is_available(&self) -> bool {
        self.ffmpeg_path.is_some()
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        let ffmpeg = self
            .ffmpeg_path
            .as_deref()
            .ok_or(DownloadError::EncoderUnavailable)?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = vec![
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ];

        run_encoder(ffmpeg, &args, self.timeout_secs).await
    }
}

/// Run the encoder under a wall-clock timeout, killing it if the limit
/// elapses. ffmpeg reports everything on stderr (stdout is silent in
/// stream-copy mode), so only stderr is captured, and only its tail is
/// kept for the failure message.
async fn run_encoder(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<(), DownloadError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DownloadError::MergeFailed(format!("failed to start {}: {}", program, e)))?;

    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::MergeFailed("encoder stderr not captured".to_string()))?;
    // Drain stderr concurrently so a chatty encoder cannot fill the pipe
    // and deadlock against our wait
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let status = match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(waited) => waited
            .map_err(|e| DownloadError::MergeFailed(format!("failed to wait for {}: {}", program, e)))?,
        Err(_) => {
            let _ = child.kill().await;
            stderr_task.abort();
            return Err(DownloadError::MergeFailed(format!(
                "encoder timed out after {}s",
                timeout_secs
            )));
        }
    };

    if !status.success() {
        let stderr_buf = stderr_task.await.unwrap_or_default();
        return Err(DownloadError::MergeFailed(stderr_tail(
            &String::from_utf8_lossy(&stderr_buf),
        )));
    }

    Ok(())
}

/// Last three stderr lines, oldest first
fn stderr_tail(stderr: &str) -> String {
    let mut tail: Vec<&str> = stderr.lines().rev().take(3).collect();
    tail.reverse();
    tail.join(" | ")
}

/// Find the ffmpeg binary in common install locations, then PATH
fn find_ffmpeg() -> Option<String> {
    let common_paths = [
        "/opt/homebrew/bin/ffmpeg",
        "/usr/local/bin/ffmpeg",
        "/usr/bin/ffmpeg",
    ];

    for path in common_paths {
        if Path::new(path).exists() {
            return Some(path.to_string());
        }
    }

    if let Ok(output) = StdCommand::new("which").arg("ffmpeg").output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return Some(path);
            }
        }
    }

    None
}

/// Owns the merge contract: idempotence, success verification, and cleanup
/// of the per-stream intermediate files.
pub struct StreamMerger {
    muxer: Arc<dyn StreamMuxer>,
}

impl StreamMerger {
    pub fn new(muxer: Arc<dyn StreamMuxer>) -> Self {
        Self { muxer }
    }

    pub fn is_available(&self) -> bool {
        self.muxer.is_available()
    }

    /// Merge two previously downloaded stream files into `output`.
    ///
    /// Success requires both a clean encoder exit and a non-empty output
    /// file. On every exit path the intermediates are removed unless one of
    /// them is the output itself.
    pub async fn merge(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output: &MediaAddress,
    ) -> DownloadOutcome {
        if let Ok(meta) = tokio::fs::metadata(&output.local_path).await {
            info!("merged file already exists: {}", output.local_path.display());
            self.cleanup_intermediates(video_path, audio_path, &output.local_path)
                .await;
            return DownloadOutcome::already_exists(
                output.local_path.clone(),
                output.hosted_url.clone(),
                meta.len(),
                Some("video/mp4".to_string()),
            )
            .into_merged();
        }

        if !self.muxer.is_available() {
            // Probe already logged the missing binary; stay quiet per call
            self.cleanup_intermediates(video_path, audio_path, &output.local_path)
                .await;
            return DownloadOutcome::failed(DownloadError::EncoderUnavailable.error_code());
        }

        info!(
            "merging streams: {} + {} -> {}",
            video_path.display(),
            audio_path.display(),
            output.local_path.display()
        );

        let mux_result = self
            .muxer
            .mux(video_path, audio_path, &output.local_path)
            .await;

        let outcome = match mux_result {
            Ok(()) => self.verify_output(output).await,
            Err(e) => {
                warn!("mux invocation failed: {}", e);
                DownloadOutcome::failed(e.error_code())
            }
        };

        self.cleanup_intermediates(video_path, audio_path, &output.local_path)
            .await;
        outcome
    }

    async fn verify_output(&self, output: &MediaAddress) -> DownloadOutcome {
        match tokio::fs::metadata(&output.local_path).await {
            Ok(meta) if meta.len() > 0 => {
                info!(
                    "merged to {} ({} bytes)",
                    output.local_path.display(),
                    meta.len()
                );
                DownloadOutcome::success(
                    output.local_path.clone(),
                    output.hosted_url.clone(),
                    meta.len(),
                    Some("video/mp4".to_string()),
                )
                .into_merged()
            }
            _ => {
                warn!("merge produced empty or missing file");
                // Remove the empty file so a retry is not short-circuited
                // by the idempotence check
                let _ = tokio::fs::remove_file(&output.local_path).await;
                DownloadOutcome::failed(
                    DownloadError::MergeFailed("empty or missing output".to_string()).error_code(),
                )
            }
        }
    }

    async fn cleanup_intermediates(&self, video: &Path, audio: &Path, output: &Path) {
        for path in [video, audio] {
            // Guard the degenerate case where the "merge" was a rename and
            // an intermediate is the output we just produced
            if path == output {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to clean up intermediate {}: {}", path.display(), e);
                }
            }
        }
    }
}
