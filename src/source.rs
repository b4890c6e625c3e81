// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image sources for batch posture analysis.
//!
//! A source string names a single image, a directory of images, or a simple
//! `dir/*.ext` glob. [`Source::paths`] expands it into a sorted list of files.

use std::path::{Path, PathBuf};

use crate::error::{InferenceError, Result};

/// Image file extensions accepted when scanning directories.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Input source for the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// Directory scanned (non-recursively) for images.
    Directory(PathBuf),
    /// Pattern `dir/*` or `dir/*.ext`; other wildcards are rejected.
    Glob(String),
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains('*') {
            Self::Glob(s.to_string())
        } else if Path::new(s).is_dir() {
            Self::Directory(PathBuf::from(s))
        } else {
            Self::Image(PathBuf::from(s))
        }
    }
}

impl Source {
    /// Whether the source may expand to several files.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Directory(_) | Self::Glob(_))
    }

    /// Expand the source into image paths, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidImageError`] if an image file or
    /// directory does not exist, or [`InferenceError::Io`] if a directory
    /// cannot be read.
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        match self {
            Self::Image(path) => {
                if path.is_file() {
                    Ok(vec![path.clone()])
                } else {
                    Err(InferenceError::InvalidImageError(format!(
                        "Image not found: {}",
                        path.display()
                    )))
                }
            }
            Self::Directory(dir) => collect_images(dir, None),
            Self::Glob(pattern) => {
                let (dir_part, file_part) = pattern
                    .rsplit_once(['/', '\\'])
                    .unwrap_or(("", pattern.as_str()));
                let dir = if dir_part.is_empty() { Path::new(".") } else { Path::new(dir_part) };
                let ext = match file_part {
                    "*" if !dir_part.contains('*') => None,
                    _ => Some(glob_extension(dir_part, file_part).ok_or_else(|| {
                        InferenceError::InvalidImageError(format!(
                            "Unsupported pattern '{pattern}': only 'dir/*' and 'dir/*.ext' are supported"
                        ))
                    })?),
                };
                collect_images(dir, ext.as_deref())
            }
        }
    }
}

/// Extension of a `*.ext` file pattern; `None` for anything else.
fn glob_extension(dir_part: &str, file_part: &str) -> Option<String> {
    let ext = file_part.strip_prefix("*.")?;
    let plain = |s: &str| !s.contains(['*', '?', '[', ']']);
    (!ext.is_empty() && plain(ext) && plain(dir_part)).then(|| ext.to_lowercase())
}

/// Collect image files from `dir`, optionally restricted to one extension.
fn collect_images(dir: &Path, ext: Option<&str>) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(InferenceError::InvalidImageError(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| match ext {
            Some(ext) => path
                .extension()
                .is_some_and(|e| e.to_string_lossy().to_lowercase() == ext),
            None => is_image_file(path),
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Check if a path is an image file based on extension.
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}
