//! Validation done before a batch is handed to the coordinator.
//!
//! The coordinator trusts its inputs; anything rejected here never reaches it.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

pub const DEFAULT_VARIANT_COUNT: usize = 50;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRole {
    Source,
    Watermark,
}

impl MediaRole {
    fn accepts(&self, extension: &str) -> bool {
        let video = VIDEO_EXTENSIONS.contains(&extension);
        match self {
            MediaRole::Source => video,
            MediaRole::Watermark => video || IMAGE_EXTENSIONS.contains(&extension),
        }
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("number of versions must be a positive integer")]
    InvalidCount,
    #[error("unsupported file type for {name:?}; allowed: {allowed}")]
    UnsupportedExtension { name: String, allowed: String },
    #[error("{path:?} is not a readable file: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("{name:?} is {size} bytes, above the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },
}

/// Lower-cased extension, only if the name has a non-empty one.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

pub fn allowed_file(name: &str, role: MediaRole) -> bool {
    extension_of(name).is_some_and(|extension| role.accepts(&extension))
}

pub fn validate_count(count: i64) -> Result<usize, IntakeError> {
    if count <= 0 {
        return Err(IntakeError::InvalidCount);
    }
    usize::try_from(count).map_err(|_| IntakeError::InvalidCount)
}

/// Check extension, readability and size of one input file.
pub fn validate_input(path: &Path, role: MediaRole, max_bytes: u64) -> Result<(), IntakeError> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !allowed_file(&name, role) {
        let allowed = match role {
            MediaRole::Source => VIDEO_EXTENSIONS.join(", "),
            MediaRole::Watermark => [&VIDEO_EXTENSIONS[..], &IMAGE_EXTENSIONS[..]]
                .concat()
                .join(", "),
        };
        return Err(IntakeError::UnsupportedExtension { name, allowed });
    }

    let metadata = std::fs::metadata(path).map_err(|source| IntakeError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(IntakeError::Unreadable {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    if metadata.len() > max_bytes {
        return Err(IntakeError::TooLarge {
            name,
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    Ok(())
}

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static regex"))
}

/// Reduce an arbitrary upload name to a flat, shell- and path-safe file name.
///
/// Directory components are dropped, whitespace becomes `_`, every other
/// character outside `[A-Za-z0-9_.-]` is removed, and leading dots or
/// underscores are trimmed. Falls back to `upload` when nothing survives.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = unsafe_chars().replace_all(&joined, "");
    let trimmed = cleaned.trim_start_matches(['.', '_']);

    if trimmed.is_empty() {
        String::from("upload")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_allowed_video_extensions() {
        assert!(allowed_file("clip.mp4", MediaRole::Source));
        assert!(allowed_file("CLIP.MOV", MediaRole::Source));
        assert!(allowed_file("a.b.mkv", MediaRole::Source));
        assert!(!allowed_file("logo.png", MediaRole::Source));
        assert!(!allowed_file("mp4", MediaRole::Source));
        assert!(!allowed_file("clip.", MediaRole::Source));
    }

    #[test]
    fn test_watermark_accepts_images_and_videos() {
        assert!(allowed_file("logo.png", MediaRole::Watermark));
        assert!(allowed_file("logo.JPEG", MediaRole::Watermark));
        assert!(allowed_file("logo.avi", MediaRole::Watermark));
        assert!(!allowed_file("logo.svg", MediaRole::Watermark));
    }

    #[test]
    fn test_validate_count() {
        assert_eq!(validate_count(3).unwrap(), 3);
        assert!(matches!(validate_count(0), Err(IntakeError::InvalidCount)));
        assert!(matches!(validate_count(-4), Err(IntakeError::InvalidCount)));
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My Clip (final).mp4"), "My_Clip_final.mp4");
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename(r"C:\Users\me\logo.png"), "logo.png");
        assert_eq!(secure_filename(".hidden.mkv"), "hidden.mkv");
        assert_eq!(secure_filename("日本語.mp4"), "mp4");
        assert_eq!(secure_filename("///"), "upload");
    }

    #[test]
    fn test_validate_input_checks_extension_existence_and_size() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing.mp4");
        assert!(matches!(
            validate_input(&missing, MediaRole::Source, DEFAULT_MAX_UPLOAD_BYTES),
            Err(IntakeError::Unreadable { .. })
        ));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        assert!(matches!(
            validate_input(&text, MediaRole::Source, DEFAULT_MAX_UPLOAD_BYTES),
            Err(IntakeError::UnsupportedExtension { .. })
        ));

        let video = dir.path().join("clip.mp4");
        let mut file = std::fs::File::create(&video).unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        assert!(validate_input(&video, MediaRole::Source, 1024).is_ok());
        assert!(matches!(
            validate_input(&video, MediaRole::Source, 16),
            Err(IntakeError::TooLarge { size: 64, .. })
        ));
    }
}
