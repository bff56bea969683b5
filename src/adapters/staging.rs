//! Per-run copies of the inputs under sanitized names.

use crate::domain::intake::secure_filename;
use futures::future::try_join;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("cannot prepare upload directory {path:?}: {source}")]
    UploadDir { path: PathBuf, source: io::Error },
    #[error("failed to stage inputs: {0}")]
    Copy(#[source] io::Error),
}

/// Inputs copied into a fresh `batch-*` directory under the upload directory.
///
/// The directory is private to one run, so a staged path never aliases the
/// caller's file even when that file already lives in the upload directory.
/// Dropping the value removes the directory.
#[derive(Debug)]
pub struct StagedInputs {
    dir: TempDir,
    pub video: PathBuf,
    pub watermark: PathBuf,
}

impl StagedInputs {
    pub async fn stage(upload_dir: &Path, video: &Path, watermark: &Path) -> Result<Self, StagingError> {
        let upload_error = |source| StagingError::UploadDir {
            path: upload_dir.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(upload_dir).await.map_err(upload_error)?;
        let dir = tempfile::Builder::new()
            .prefix("batch-")
            .tempdir_in(upload_dir)
            .map_err(upload_error)?;

        let video_name = staged_name(video);
        let mut watermark_name = staged_name(watermark);
        if watermark_name == video_name {
            watermark_name = format!("watermark_{}", watermark_name);
        }

        let staged = Self {
            video: dir.path().join(video_name),
            watermark: dir.path().join(watermark_name),
            dir,
        };
        try_join(
            tokio::fs::copy(video, &staged.video),
            tokio::fs::copy(watermark, &staged.watermark),
        )
        .await
        .map_err(StagingError::Copy)?;

        info!(video = %staged.video.display(), watermark = %staged.watermark.display(), "Inputs staged");
        Ok(staged)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the staged copies. Failures are logged, never returned.
    pub async fn remove(self) {
        let path = self.dir.path().to_path_buf();
        match tokio::task::spawn_blocking(move || self.dir.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Failed to remove staged inputs"),
            Err(e) => warn!(path = %path.display(), error = %e, "Staging cleanup task failed"),
        }
    }
}

fn staged_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    secure_filename(&name)
}
