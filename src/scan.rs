//! Single-directory scan: the filesystem input of the pipeline.
//!
//! Delivers one `ScanEntry` per recognized image file in a directory.
//! Subdirectories, OS-reserved names and unrecognized extensions are
//! filtered here so the rest of the pipeline only ever sees image items.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the pipeline will attempt to thumbnail.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff",
];

/// Names that commonly appear in image folders but are never sources
/// (including our own kind: other tools' thumbnail caches).
const RESERVED_NAMES: &[&str] = &["Thumbs.db", "desktop.ini", ".DS_Store"];

/// Filesystem metadata for one candidate image file.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    /// File name only (e.g. "IMG_0001.jpg")
    pub name: String,
    /// Absolute path
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Lowercased extension
    pub extension: String,
}

/// Check whether a path carries a recognized image extension.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_reserved(name: &str) -> bool {
    name.starts_with('.') || RESERVED_NAMES.iter().any(|r| name.eq_ignore_ascii_case(r))
}

/// Scan one directory level for image files.
///
/// Fails only if the directory itself cannot be read; unreadable
/// individual entries are skipped.
pub fn scan_directory(dir: &Path) -> io::Result<Vec<ScanEntry>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", dir.display()),
        ));
    }

    let mut entries = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_image_path(path) {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if is_reserved(&name) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        entries.push(ScanEntry {
            name,
            path: absolute_path(path),
            size: metadata.len(),
            modified,
            extension,
        });
    }

    log::debug!("scanned {}: {} image files", dir.display(), entries.len());
    Ok(entries)
}

/// Canonical absolute form of a path, falling back to the raw path when
/// canonicalization fails (e.g. the file vanished mid-scan).
pub fn absolute_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_scan_filters_to_images() {
        let dir = scratch_dir("thumbcache_scan_filter");
        fs::write(dir.join("a.jpg"), b"x").unwrap();
        fs::write(dir.join("b.PNG"), b"x").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();
        fs::write(dir.join("Thumbs.db"), b"x").unwrap();
        fs::write(dir.join(".hidden.jpg"), b"x").unwrap();
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub").join("nested.jpg"), b"x").unwrap();

        let mut names: Vec<String> = scan_directory(&dir)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();

        // Nested files, non-images, reserved and hidden names are all skipped
        assert_eq!(names, vec!["a.jpg", "b.PNG"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_scan_entry_metadata() {
        let dir = scratch_dir("thumbcache_scan_meta");
        fs::write(dir.join("photo.jpeg"), vec![0u8; 1234]).unwrap();

        let entries = scan_directory(&dir).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 1234);
        assert_eq!(entries[0].extension, "jpeg");
        assert!(entries[0].path.ends_with("photo.jpeg"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_scan_missing_directory_errors() {
        assert!(scan_directory(Path::new("/nonexistent/thumbcache_scan")).is_err());
    }
}
