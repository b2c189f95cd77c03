// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for compression outputs
//!
//! A pipeline writes into an [`OutputArtifact`]: a container path and a
//! still image path, usually in the temporary directory. The caller either
//! commits the artifact to a persistent directory with timestamped names or
//! cleans it up.

use crate::constants::{files, still};
use crate::errors::{AppError, AppResult};
use crate::media::formats::ContainerFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Locations written by one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Container file
    pub video_path: PathBuf,
    /// Still image file (only written when requested)
    pub still_path: PathBuf,
}

/// Files moved to their persistent location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedArtifact {
    pub video_path: PathBuf,
    pub still_path: Option<PathBuf>,
}

impl OutputArtifact {
    pub fn new(video_path: impl Into<PathBuf>, still_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            still_path: still_path.into(),
        }
    }

    /// Two fresh paths in the system temporary directory
    pub fn allocate(container: ContainerFormat) -> Self {
        Self::allocate_in(&std::env::temp_dir(), container)
    }

    /// Two fresh paths in `dir`
    pub fn allocate_in(dir: &Path, container: ContainerFormat) -> Self {
        let artifact = Self {
            video_path: generate_tmp_path(dir, container.extension()),
            still_path: generate_tmp_path(dir, still::EXTENSION),
        };
        debug!(
            video = %artifact.video_path.display(),
            still = %artifact.still_path.display(),
            "Allocated output artifact"
        );
        artifact
    }

    /// Remove whatever was written; missing files are not an error
    pub fn cleanup(&self) {
        for path in [&self.video_path, &self.still_path] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed temporary output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary output"),
            }
        }
    }

    /// Move the outputs into `output_dir` with timestamped names
    ///
    /// The still image is moved only when it exists.
    pub fn commit_to(&self, output_dir: &Path) -> AppResult<CommittedArtifact> {
        std::fs::create_dir_all(output_dir).map_err(|e| {
            AppError::Storage(format!(
                "Failed to create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();

        let video_ext = extension_of(&self.video_path, "mov");
        let video_target = unique_path(
            output_dir,
            &format!("{}_{}", files::VIDEO_PREFIX, timestamp),
            &video_ext,
        );
        move_file(&self.video_path, &video_target)?;

        let still_path = if self.still_path.exists() {
            let still_target = unique_path(
                output_dir,
                &format!("{}_{}", files::IMAGE_PREFIX, timestamp),
                still::EXTENSION,
            );
            move_file(&self.still_path, &still_target)?;
            Some(still_target)
        } else {
            None
        };

        info!(
            video = %video_target.display(),
            still = ?still_path,
            "Committed output artifact"
        );
        Ok(CommittedArtifact {
            video_path: video_target,
            still_path,
        })
    }
}

/// Unique temporary file path with the given extension
pub fn generate_tmp_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", uuid::Uuid::new_v4(), extension))
}

/// Default persistent output directory
///
/// `$XDG_VIDEOS_DIR/hlgcam`, falling back to the home directory and then
/// the current directory.
pub fn default_output_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(files::OUTPUT_DIR_NAME)
}

fn extension_of(path: &Path, fallback: &str) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

/// `dir/stem.ext`, or `dir/stem_N.ext` if that already exists
fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, extension));
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Rename, falling back to copy and remove across filesystems
fn move_file(from: &Path, to: &Path) -> AppResult<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| {
        AppError::Storage(format!(
            "Failed to move {} to {}: {}",
            from.display(),
            to.display(),
            e
        ))
    })?;
    if let Err(e) = std::fs::remove_file(from) {
        warn!(path = %from.display(), error = %e, "Failed to remove moved file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_gives_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = OutputArtifact::allocate_in(dir.path(), ContainerFormat::QuickTime);
        let b = OutputArtifact::allocate_in(dir.path(), ContainerFormat::QuickTime);
        assert_ne!(a.video_path, a.still_path);
        assert_ne!(a.video_path, b.video_path);
        assert_eq!(a.video_path.extension().unwrap(), "mov");
        assert_eq!(a.still_path.extension().unwrap(), "jpg");
        assert!(a.video_path.starts_with(dir.path()));
    }

    #[test]
    fn test_commit_moves_files() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let artifact = OutputArtifact::allocate_in(scratch.path(), ContainerFormat::Mp4);
        std::fs::write(&artifact.video_path, b"video").unwrap();
        std::fs::write(&artifact.still_path, b"still").unwrap();

        let committed = artifact.commit_to(out.path()).unwrap();
        assert!(!artifact.video_path.exists());
        assert_eq!(std::fs::read(&committed.video_path).unwrap(), b"video");
        let name = committed.video_path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("VID_") && name.ends_with(".mp4"));
        let still = committed.still_path.unwrap();
        assert!(still.file_name().unwrap().to_string_lossy().starts_with("IMG_"));
    }

    #[test]
    fn test_commit_without_still() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let artifact = OutputArtifact::allocate_in(scratch.path(), ContainerFormat::QuickTime);
        std::fs::write(&artifact.video_path, b"video").unwrap();

        let committed = artifact.commit_to(out.path()).unwrap();
        assert!(committed.still_path.is_none());
    }

    #[test]
    fn test_commit_does_not_overwrite() {
        let out = tempfile::tempdir().unwrap();
        let first = unique_path(out.path(), "VID_x", "mov");
        std::fs::write(&first, b"a").unwrap();
        let second = unique_path(out.path(), "VID_x", "mov");
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("VID_x_1.mov"));
    }

    #[test]
    fn test_cleanup_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = OutputArtifact::allocate_in(dir.path(), ContainerFormat::QuickTime);
        std::fs::write(&artifact.video_path, b"x").unwrap();
        artifact.cleanup();
        assert!(!artifact.video_path.exists());
    }
}
