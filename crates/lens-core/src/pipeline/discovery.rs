//! Image file discovery for the `lens analyze` command.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A discovered image file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
    /// MIME type implied by the extension
    pub content_type: &'static str,
}

/// Map a file extension to the MIME type the validator understands.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// Find image files at a path.
///
/// A file path is returned as-is when its extension is known. A directory is
/// walked recursively; results are sorted by path.
pub fn discover(path: &Path) -> Vec<DiscoveredFile> {
    let mut files: Vec<DiscoveredFile> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|entry| {
            let content_type = content_type_for_path(entry.path())?;
            let size = entry.metadata().ok()?.len();
            Some(DiscoveredFile {
                path: entry.path().to_path_buf(),
                size,
                content_type,
            })
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(content_type_for_path(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(content_type_for_path(Path::new("a.txt")), None);
        assert_eq!(content_type_for_path(Path::new("noext")), None);
    }

    #[test]
    fn test_discover_walks_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("nested/a.jpg"), b"xy").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let files = discover(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("b.png"));
        assert!(files[1].path.ends_with("nested/a.jpg"));
        assert_eq!(files[1].size, 2);
    }

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.gif");
        std::fs::write(&file, b"GIF8").unwrap();
        let files = discover(&file);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content_type, "image/gif");
    }
}
