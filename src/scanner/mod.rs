use crate::error::{ReconcileError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub path: PathBuf,
    /// Also the image id
    pub file_name: String,
}

impl ImageInfo {
    pub fn image_id(&self) -> &str {
        &self.file_name
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(ReconcileError::FolderNotFound(folder.display().to_string()));
    }

    let mut images = Vec::new();
    let walker = WalkDir::new(folder).max_depth(if recursive { usize::MAX } else { 1 });

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let is_image = path
            .extension()
            .map(|ext| is_image_extension(&ext.to_string_lossy()))
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        images.push(ImageInfo {
            path: path.to_path_buf(),
            file_name,
        });
    }

    // Sort by file name, path as tie-break for recursive scans
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name).then_with(|| a.path.cmp(&b.path)));

    // Image ids are file names; the first occurrence wins
    let mut seen = BTreeSet::new();
    images.retain(|img| {
        let fresh = seen.insert(img.file_name.clone());
        if !fresh {
            warn!(path = %img.path.display(), "duplicate image file name skipped");
        }
        fresh
    });

    Ok(images)
}

/// Check if a file extension is a supported image format
fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}
