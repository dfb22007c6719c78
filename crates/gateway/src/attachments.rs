use std::path::PathBuf;

use {async_trait::async_trait, tracing::debug};

use {
    botline_channels::{AttachmentStore, Error, Result},
    botline_common::types::AttachmentRef,
};

/// Filesystem-backed attachment store; files are served under `/files`.
pub struct FsAttachmentStore {
    dir: PathBuf,
    public_url: String,
}

impl FsAttachmentStore {
    /// Creates the directory eagerly so the first store can't race setup.
    pub fn new(dir: impl Into<PathBuf>, public_url: impl Into<String>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let public_url: String = public_url.into();
        Ok(Self {
            dir,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn store(&self, bytes: &[u8], extension: &str, tag: &str) -> Result<AttachmentRef> {
        // Timestamp prefix keeps directory listings chronological; the uuid
        // fragment guarantees uniqueness within a second.
        let token = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!(
            "{}_{}{}",
            chrono::Utc::now().format("%Y%m%d%H%M%S"),
            &token[..8],
            extension
        );
        let path = self.dir.join(&filename);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::external("write attachment", e))?;
        debug!(path = %path.display(), size = bytes.len(), "stored attachment");

        Ok(AttachmentRef::new(
            format!("{}/files/{filename}", self.public_url),
            tag,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_bytes_and_builds_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FsAttachmentStore::new(dir.path(), "https://botline.example.org/").unwrap();

        let attachment = store.store(b"fake-jpeg", ".jpg", "file").await.unwrap();
        assert!(attachment.url.starts_with("https://botline.example.org/files/"));
        assert!(attachment.url.ends_with(".jpg"));
        assert_eq!(attachment.tag, "file");

        let filename = attachment.url.rsplit('/').next().unwrap();
        let written = std::fs::read(dir.path().join(filename)).unwrap();
        assert_eq!(written, b"fake-jpeg");
    }

    #[tokio::test]
    async fn filenames_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAttachmentStore::new(dir.path(), "http://localhost:8080").unwrap();

        let first = store.store(b"a", ".pdf", "file").await.unwrap();
        let second = store.store(b"b", ".pdf", "file").await.unwrap();
        assert_ne!(first.url, second.url);
    }
}
