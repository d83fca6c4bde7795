// Upload directory: where inputs are staged and results are kept for download.
// Results are never purged; clean the directory out of band.

use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Input and output locations reserved for one upscale request.
#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub file_id: Uuid,
    pub input_filename: String,
    pub input_path: PathBuf,
    pub output_filename: String,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Uses `dir` as the upload directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserves fresh file names: `{id}_input.{ext}` and `{id}_output.png`.
    pub fn allocate(&self, ext: &str) -> UploadSlot {
        let file_id = Uuid::new_v4();
        let input_filename = format!("{file_id}_input.{ext}");
        let output_filename = format!("{file_id}_output.png");
        UploadSlot {
            file_id,
            input_path: self.dir.join(&input_filename),
            input_filename,
            output_path: self.dir.join(&output_filename),
            output_filename,
        }
    }

    /// Maps a client-supplied file name to a path inside the directory.
    /// Returns `None` for names that could point anywhere else.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if filename.is_empty()
            || filename.starts_with('.')
            || filename.contains(['/', '\\', '\0'])
        {
            return None;
        }
        Some(self.dir.join(filename))
    }

    /// Deletes `path` if present. Failures are logged, not returned.
    pub async fn remove_if_exists(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_open_creates_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a").join("uploads");
        let store = assert_ok!(UploadStore::open(&dir));
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[test]
    fn test_allocate_names() {
        let root = tempfile::tempdir().unwrap();
        let store = UploadStore::open(root.path()).unwrap();

        let slot = store.allocate("jpeg");

        assert_eq!(slot.input_filename, format!("{}_input.jpeg", slot.file_id));
        assert_eq!(slot.output_filename, format!("{}_output.png", slot.file_id));
        assert_eq!(slot.input_path, root.path().join(&slot.input_filename));
        assert_eq!(slot.output_path, root.path().join(&slot.output_filename));
        assert_ne!(store.allocate("jpeg").file_id, slot.file_id);
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let root = tempfile::tempdir().unwrap();
        let store = UploadStore::open(root.path()).unwrap();

        assert_eq!(
            store.resolve("abc_output.png"),
            Some(root.path().join("abc_output.png"))
        );
        assert!(store.resolve("").is_none());
        assert!(store.resolve("..").is_none());
        assert!(store.resolve(".hidden").is_none());
        assert!(store.resolve("../secret").is_none());
        assert!(store.resolve("sub/file.png").is_none());
        assert!(store.resolve("..\\file.png").is_none());
    }

    #[tokio::test]
    async fn test_remove_if_exists() {
        let root = tempfile::tempdir().unwrap();
        let store = UploadStore::open(root.path()).unwrap();
        let path = root.path().join("x.png");
        std::fs::write(&path, b"x").unwrap();

        store.remove_if_exists(&path).await;
        assert!(!path.exists());

        // second removal is a no-op
        store.remove_if_exists(&path).await;
    }
}
