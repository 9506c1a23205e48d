// src/services/media_storage.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use uuid::Uuid;

use crate::config::{MediaConfig, StorageConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn folder(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub url: String,
    /// Playback length in seconds; only reported for videos.
    pub duration: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not probe media: {0}")]
    Probe(String),
    #[error("url does not belong to this storage: {0}")]
    ForeignUrl(String),
}

/// Object storage for uploaded media. Implementations take ownership of the
/// local file handed to `upload`.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn upload(&self, local: &Path, kind: MediaKind) -> Result<StoredMedia, StorageError>;
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Stores media under the upload directory, which the server exposes at
/// `/uploads`.
pub struct LocalMediaStorage {
    root: PathBuf,
    public_base: String,
    ffprobe: String,
}

impl LocalMediaStorage {
    pub fn new(storage: &StorageConfig, media: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&storage.upload_path),
            public_base: format!("{}/uploads", storage.public_url.trim_end_matches('/')),
            ffprobe: media.ffprobe_path.clone(),
        }
    }

    /// Maps a URL produced by `upload` back to its file, refusing anything
    /// that would escape the upload directory.
    fn path_for_url(&self, url: &str) -> Result<PathBuf, StorageError> {
        let relative = url
            .strip_prefix(&self.public_base)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;

        let relative = Path::new(relative);
        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::ForeignUrl(url.to_string()));
        }

        Ok(self.root.join(relative))
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path)
            .output()
            .await
            .context("Failed to run ffprobe")?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_duration(stdout: &str) -> Result<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .context("Invalid duration format")
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn upload(&self, local: &Path, kind: MediaKind) -> Result<StoredMedia, StorageError> {
        let duration = match kind {
            MediaKind::Video => match self.probe_duration(local).await {
                Ok(duration) => Some(duration),
                Err(e) => {
                    let _ = fs::remove_file(local).await;
                    return Err(StorageError::Probe(format!("{:#}", e)));
                }
            },
            MediaKind::Image => None,
        };

        let name = match local.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
            None => Uuid::new_v4().to_string(),
        };

        let dir = self.root.join(kind.folder());
        fs::create_dir_all(&dir).await?;
        let target = dir.join(&name);

        // A rename fails across filesystems; fall back to copying.
        if fs::rename(local, &target).await.is_err() {
            let copied = fs::copy(local, &target).await;
            let _ = fs::remove_file(local).await;
            copied?;
        }

        log::info!("Stored {:?} as {}", kind, target.display());

        Ok(StoredMedia {
            url: format!("{}/{}/{}", self.public_base, kind.folder(), name),
            duration,
        })
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.path_for_url(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => log::info!("Deleted media {}", path.display()),
            // Already gone counts as deleted
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Media {} was already missing", path.display())
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
