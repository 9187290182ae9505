//! The single "current frame" artifact.
//!
//! One PNG lives at a well-known path. A commit writes the new bytes to a
//! temporary file in the same directory, fsyncs it and renames it over the
//! path, so readers see either the old file or the new one, never a mix.
//!
//! ## Versioning
//!
//! Every commit is stamped with a generation number that increases by one
//! per successful commit, and with a completion timestamp that never goes
//! backwards even if the wall clock does. A commit whose frame time is older
//! than the committed frame's is rejected, so overlapping runs cannot
//! replace a newer image with an older one. The in-memory pointer to the
//! current version starts empty: a file left behind by an earlier process
//! is not served until this process commits its own frame.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use radar_common::GeoBounds;

use crate::{StorageError, StorageResult};

/// Frame data handed to [`ArtifactStore::commit`].
#[derive(Debug, Clone)]
pub struct FrameArtifact {
    pub png: Bytes,
    pub bounds: GeoBounds,
    pub source_url: String,
    /// Nominal time of the archive frame the image was rendered from
    pub frame_time: Option<DateTime<Utc>>,
}

/// Description of a committed artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    pub generation: u64,
    /// Completion time, epoch seconds
    pub timestamp: i64,
    pub bounds: GeoBounds,
    pub source_url: String,
    pub frame_time: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

pub struct ArtifactStore {
    path: PathBuf,
    current: RwLock<Option<ArtifactVersion>>,
    commit_lock: Mutex<()>,
    generation: AtomicU64,
}

impl ArtifactStore {
    /// Create a store for `path`, creating its parent directory.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if path.file_name().is_none() {
            return Err(StorageError::InvalidPath(path));
        }

        let dir = parent_dir(&path);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            info!(path = %path.display(), "Ignoring artifact left by a previous run");
        }

        Ok(Self {
            path,
            current: RwLock::new(None),
            commit_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generation of the last commit, 0 before the first one.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn current(&self) -> Option<ArtifactVersion> {
        self.current.read().await.clone()
    }

    /// Atomically replace the artifact. On error the previous artifact and
    /// version are left untouched.
    pub async fn commit(&self, artifact: FrameArtifact) -> StorageResult<ArtifactVersion> {
        if artifact.png.is_empty() {
            return Err(StorageError::EmptyArtifact);
        }

        let _guard = self.commit_lock.lock().await;
        if let Some(stale) = self.stale_against_current(&artifact).await {
            return Err(stale);
        }
        let generation = self.generation.load(Ordering::Acquire) + 1;
        let temp_path = self.temp_path(generation);

        if let Err(e) = write_synced(&temp_path, &artifact.png).await {
            remove_quietly(&temp_path).await;
            return Err(e);
        }

        let mut current = self.current.write().await;
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            remove_quietly(&temp_path).await;
            return Err(StorageError::io(&self.path, e));
        }

        let now = Utc::now().timestamp();
        let timestamp = match current.as_ref() {
            Some(previous) => now.max(previous.timestamp),
            None => now,
        };

        let version = ArtifactVersion {
            generation,
            timestamp,
            bounds: artifact.bounds,
            source_url: artifact.source_url,
            frame_time: artifact.frame_time,
            size_bytes: artifact.png.len() as u64,
        };
        *current = Some(version.clone());
        self.generation.store(generation, Ordering::Release);

        info!(
            generation,
            timestamp,
            bytes = version.size_bytes,
            path = %self.path.display(),
            "Committed artifact"
        );
        Ok(version)
    }

    /// Bytes and version of the current artifact.
    ///
    /// The pair is read under the pointer lock, so the bytes always belong
    /// to the returned version.
    pub async fn read_current(&self) -> StorageResult<(ArtifactVersion, Bytes)> {
        let current = self.current.read().await;
        let version = current.clone().ok_or(StorageError::NotYetGenerated)?;
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        debug!(generation = version.generation, bytes = data.len(), "Read artifact");
        Ok((version, Bytes::from(data)))
    }

    async fn stale_against_current(&self, artifact: &FrameArtifact) -> Option<StorageError> {
        let frame_time = artifact.frame_time?;
        let current = self.current.read().await.as_ref()?.frame_time?;
        if frame_time < current {
            warn!(%frame_time, %current, "Rejecting commit of an older frame");
            Some(StorageError::StaleFrame {
                frame_time,
                current,
            })
        } else {
            None
        }
    }

    fn temp_path(&self, generation: u64) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        parent_dir(&self.path).join(format!(".{}.tmp-{}-{}", name, std::process::id(), generation))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir_of_bare_filename() {
        assert_eq!(parent_dir(Path::new("radar.png")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/a/b.png")), PathBuf::from("/a"));
    }

    #[tokio::test]
    async fn test_temp_path_is_beside_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("radar.png")).await.unwrap();
        let temp = store.temp_path(3);
        assert_eq!(temp.parent(), Some(dir.path()));
        assert!(temp
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".radar.png.tmp-"));
    }
}
