use futures::future::join_all;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_NAME: &str = "processed_videos.zip";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("zip encoding failed: {0}")]
    Zip(#[from] ZipError),
    #[error("{0:?} has no file name")]
    Nameless(PathBuf),
    #[error("packaging task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Bundle `files` into a zip at `archive_path`, each stored under its base name.
///
/// Videos are stored uncompressed; they are already compressed streams.
pub fn package(files: &[PathBuf], archive_path: &Path) -> Result<PathBuf, ArchiveError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(archive_path)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(true);

    for file in files {
        let name = file
            .file_name()
            .ok_or_else(|| ArchiveError::Nameless(file.clone()))?
            .to_string_lossy()
            .into_owned();
        zip.start_file(name, options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
    }

    zip.finish()?;
    Ok(archive_path.to_path_buf())
}

/// Zip `outputs` into [`ARCHIVE_NAME`] inside `output_dir`.
///
/// Unless `keep_variants` is set the loose files are deleted once they are in
/// the archive; a file that cannot be deleted is logged and left behind.
pub async fn bundle(
    outputs: &[PathBuf],
    output_dir: &Path,
    keep_variants: bool,
) -> Result<PathBuf, ArchiveError> {
    let files = outputs.to_vec();
    let archive_path = output_dir.join(ARCHIVE_NAME);
    let archive = tokio::task::spawn_blocking(move || package(&files, &archive_path)).await??;
    info!(archive = %archive.display(), files = outputs.len(), "Variants packaged");

    if !keep_variants {
        let removals = join_all(outputs.iter().map(|path| tokio::fs::remove_file(path))).await;
        for (path, result) in outputs.iter().zip(removals) {
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "Failed to remove packaged variant");
            }
        }
    }

    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;
    use zip::ZipArchive;

    #[test]
    fn test_package_stores_files_by_base_name() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("static/videos");
        std::fs::create_dir_all(&nested).unwrap();

        let first = nested.join("video_0.mp4");
        let second = nested.join("video_1.mp4");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();

        let archive_path = dir.path().join(ARCHIVE_NAME);
        package(&[first, second], &archive_path).unwrap();

        let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = String::new();
        archive
            .by_name("video_1.mp4")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "second");
    }

    #[test]
    fn test_package_missing_input_fails() {
        let dir = tempdir().unwrap();
        let result = package(
            &[dir.path().join("video_0.mp4")],
            &dir.path().join(ARCHIVE_NAME),
        );
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    fn write_variants(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("video_{}.mp4", i));
                std::fs::write(&path, format!("variant {}", i)).unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bundle_removes_loose_variants() {
        let dir = tempdir().unwrap();
        let outputs = write_variants(dir.path(), 3);

        let archive_path = bundle(&outputs, dir.path(), false).await.unwrap();
        assert_eq!(archive_path, dir.path().join(ARCHIVE_NAME));
        assert!(outputs.iter().all(|path| !path.exists()));

        let archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["video_0.mp4", "video_1.mp4", "video_2.mp4"]);
    }

    #[tokio::test]
    async fn test_bundle_can_keep_variants() {
        let dir = tempdir().unwrap();
        let outputs = write_variants(dir.path(), 2);

        let archive_path = bundle(&outputs, dir.path(), true).await.unwrap();
        assert!(archive_path.exists());
        assert!(outputs.iter().all(|path| path.exists()));
    }

    #[tokio::test]
    async fn test_bundle_missing_variant_fails_and_keeps_the_rest() {
        let dir = tempdir().unwrap();
        let mut outputs = write_variants(dir.path(), 1);
        outputs.push(dir.path().join("video_1.mp4"));

        let result = bundle(&outputs, dir.path(), false).await;
        assert!(matches!(result, Err(ArchiveError::Io(_))));
        assert!(outputs[0].exists());
    }
}
