//! Saved meter images
//!
//! Images are written as `{images_dir}/{measure_uuid}.jpg` and exposed by
//! the static file route under `/temp/`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use tracing::debug;

/// URL prefix the static file route is mounted on
pub const IMAGE_ROUTE_PREFIX: &str = "/temp";

/// Writes decoded images to disk and builds their public URLs
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    public_base_url: String,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Decode and persist an image, returning its public URL
    pub async fn save(&self, image_base64: &str, measure_uuid: &str) -> std::io::Result<String> {
        let bytes = STANDARD
            .decode(image_base64)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{}.jpg", measure_uuid);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, &bytes).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "Image saved");

        Ok(self.url_for(&file_name))
    }

    /// Delete a saved image; an already missing file is not an error
    pub async fn remove(&self, measure_uuid: &str) -> std::io::Result<()> {
        let path = self.dir.join(format!("{}.jpg", measure_uuid));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Image removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.public_base_url, IMAGE_ROUTE_PREFIX, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("images"), "http://localhost:3000/");

        let encoded = STANDARD.encode(b"\xFF\xD8\xFFfake-jpeg");
        let url = store.save(&encoded, "abc").await.unwrap();

        assert_eq!(url, "http://localhost:3000/temp/abc.jpg");
        let written = std::fs::read(dir.path().join("images").join("abc.jpg")).unwrap();
        assert_eq!(written, b"\xFF\xD8\xFFfake-jpeg");
    }

    #[tokio::test]
    async fn test_remove_deletes_saved_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://localhost:3000");

        store.save(&STANDARD.encode(b"img"), "abc").await.unwrap();
        assert!(dir.path().join("abc.jpg").exists());

        store.remove("abc").await.unwrap();
        assert!(!dir.path().join("abc.jpg").exists());

        // Second removal is a no-op
        store.remove("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_base64() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://localhost:3000");

        let err = store.save("not base64!!", "abc").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert!(!dir.path().join("abc.jpg").exists());
    }
}
