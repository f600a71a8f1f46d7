// Content addressing - deterministic (url, post, platform) -> path mapping
//
// The same key always yields the same local path and hosted URL, which is
// what makes re-running a scrape idempotent: the downloader can check for
// the file before touching the network. Local path and hosted URL share the
// same `{subdir}/{platform}/{filename}` tail and must never diverge.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::config::StorageConfig;
use super::models::MediaKind;

lazy_static! {
    static ref URL_FORMAT_RE: Regex = Regex::new(r"(?i)(jpe?g|png|gif|mp4|webm)").unwrap();
}

const KIND_SUBDIRS: [&str; 4] = ["images", "videos", "audio", "documents"];

/// Resolved location for one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAddress {
    pub local_path: PathBuf,
    pub hosted_url: String,
}

/// Per-kind storage usage
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindStats {
    pub files: u64,
    pub size: u64,
}

/// Storage usage summary for the whole root
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    pub total_files: u64,
    pub total_size: u64,
    pub by_type: HashMap<String, KindStats>,
}

/// Maps assets to stable local paths and hosted URLs
#[derive(Debug, Clone)]
pub struct ContentAddressor {
    storage_root: PathBuf,
    public_base_url: String,
}

impl ContentAddressor {
    /// Create the addressor and the kind subdirectories under the root.
    pub fn new(config: &StorageConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.storage_root)?;
        for subdir in KIND_SUBDIRS {
            std::fs::create_dir_all(config.storage_root.join(subdir))?;
        }

        Ok(Self {
            storage_root: config.storage_root.clone(),
            public_base_url: config.public_base_url.clone(),
        })
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Resolve the address for one asset, creating the platform directory
    /// lazily. This is the only mutation this component performs.
    pub fn address_for(
        &self,
        url: &str,
        post_id: &str,
        platform: &str,
        kind: MediaKind,
        declared_mime: Option<&str>,
    ) -> io::Result<MediaAddress> {
        let hash = file_hash(url, post_id, platform);
        let subdir = kind.subdir();

        let platform_dir = self.storage_root.join(subdir).join(platform);
        std::fs::create_dir_all(&platform_dir)?;

        let filename = format!("{}{}", hash, file_extension(url, declared_mime));
        let local_path = platform_dir.join(&filename);
        let hosted_url = format!(
            "{}/{}/{}/{}",
            self.public_base_url, subdir, platform, filename
        );

        Ok(MediaAddress {
            local_path,
            hosted_url,
        })
    }

    /// Walk the storage root and summarize usage per kind.
    pub fn stats(&self) -> io::Result<StorageStats> {
        let mut stats = StorageStats::default();

        for subdir in KIND_SUBDIRS {
            let type_dir = self.storage_root.join(subdir);
            if !type_dir.exists() {
                continue;
            }

            let mut kind_stats = KindStats::default();
            for entry in walkdir::WalkDir::new(&type_dir) {
                let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                if entry.file_type().is_file() {
                    kind_stats.files += 1;
                    let meta = entry
                        .metadata()
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                    kind_stats.size += meta.len();
                }
            }

            stats.total_files += kind_stats.files;
            stats.total_size += kind_stats.size;
            stats.by_type.insert(subdir.to_string(), kind_stats);
        }

        Ok(stats)
    }
}

/// 16 hex chars of SHA-256 over the content address key.
///
/// The concatenation order (url, then `{post_id}_{platform}`) is fixed;
/// changing it would re-address every stored file.
fn file_hash(url: &str, post_id: &str, platform: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(post_id.as_bytes());
    hasher.update(b"_");
    hasher.update(platform.as_bytes());

    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Resolve a file extension: URL path suffix, then MIME lookup, then a
/// keyword scan over the URL for common formats, then `.bin`.
fn file_extension(url: &str, declared_mime: Option<&str>) -> String {
    if let Some(ext) = extension_from_url_path(url) {
        return ext;
    }

    if let Some(mime) = declared_mime {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        if let Some(exts) = mime_guess::get_mime_extensions_str(essence) {
            if let Some(ext) = exts.first() {
                return format!(".{}", ext);
            }
        }
    }

    if let Some(m) = URL_FORMAT_RE.find(url) {
        let ext = match m.as_str().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => "jpg",
            other => return format!(".{}", other),
        };
        return format!(".{}", ext);
    }

    ".bin".to_string()
}

fn extension_from_url_path(url: &str) -> Option<String> {
    // Strip scheme and host so a dotted domain never reads as an extension
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = after_scheme.split_once('/').map(|(_, p)| p)?;
    let path = path.split(['?', '#']).next().unwrap_or(path);

    let filename = path.rsplit('/').next().unwrap_or(path);
    let ext = Path::new(filename).extension()?.to_str()?;
    Some(format!(".{}", ext.to_ascii_lowercase()))
}
