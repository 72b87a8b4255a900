use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// An uploaded file as seen by the pipeline.
#[async_trait]
pub trait Upload: Send + Sync {
    /// Client-supplied filename; may be empty.
    fn filename(&self) -> &str;

    fn bytes(&self) -> &[u8];

    /// Write the raw bytes to `destination`, replacing any existing file.
    async fn save(&self, destination: &Path) -> std::io::Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(destination, self.bytes()).await
    }
}

/// Upload held fully in memory, as read from a multipart part.
#[derive(Debug, Clone)]
pub struct InMemoryUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

impl InMemoryUpload {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl Upload for InMemoryUpload {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Shared directory attachments are written into.
///
/// Files keep their original name; same-named uploads overwrite each other.
#[derive(Debug, Clone)]
pub struct UploadDir {
    base_path: PathBuf,
}

impl UploadDir {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Destination for a client filename. Only the final path component is
    /// used so uploads cannot escape the directory; `fallback` names files
    /// that arrive without a usable name.
    pub fn path_for(&self, filename: &str, fallback: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback);
        self.base_path.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/uploads");
        let store = UploadDir::new(&nested).await.unwrap();
        assert!(store.base_path().is_dir());
    }

    #[tokio::test]
    async fn path_for_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadDir::new(dir.path()).await.unwrap();

        assert_eq!(store.path_for("scan.png", "x"), dir.path().join("scan.png"));
        assert_eq!(
            store.path_for("../../etc/passwd", "x"),
            dir.path().join("passwd")
        );
        assert_eq!(store.path_for("", "eye_image"), dir.path().join("eye_image"));
        assert_eq!(store.path_for("..", "xray"), dir.path().join("xray"));
    }

    #[tokio::test]
    async fn save_writes_exact_bytes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.pdf");

        InMemoryUpload::new("report.pdf", b"first".to_vec())
            .save(&dest)
            .await
            .unwrap();
        let data: Vec<u8> = (0..=255).collect();
        InMemoryUpload::new("report.pdf", data.clone())
            .save(&dest)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
    }
}
