use crate::models::forms::Upload;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// Why an upload was not stored. Serialized as-is to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadError {
    pub field_name: String,
    pub client_name: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl UploadError {
    fn new(upload: &Upload, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            field_name: upload.field_name.clone(),
            client_name: upload.client_name.clone(),
            message: message.into(),
            kind,
        }
    }
}

/// Stores avatar images under a caller-chosen name. Returning `Ok` means the file is in place.
#[async_trait]
pub trait AvatarUploader: Send + Sync {
    async fn store(&self, upload: &Upload, name: &str) -> Result<(), UploadError>;
    /// Best-effort removal of a stored avatar; a missing file is not an error.
    async fn remove(&self, name: &str);
}

/// Writes avatars into a directory on the local filesystem.
pub struct FsAvatarUploader {
    dir: PathBuf,
    max_bytes: usize,
}

impl FsAvatarUploader {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self { dir: dir.into(), max_bytes }
    }
}

/// A bare filename: no separators, no parent references, no hidden files.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.chars().any(|c| matches!(c, '/' | '\\' | '\0'))
}

#[async_trait]
impl AvatarUploader for FsAvatarUploader {
    async fn store(&self, upload: &Upload, name: &str) -> Result<(), UploadError> {
        if !is_plain_name(name) {
            return Err(UploadError::new(upload, "name", format!("Invalid file name {name}")));
        }

        if upload.bytes.len() > self.max_bytes {
            return Err(UploadError::new(
                upload,
                "size",
                format!("File size should be less than {} bytes", self.max_bytes),
            ));
        }

        let io_err = |e: std::io::Error| {
            tracing::error!(error = %e, dir = %self.dir.display(), "failed to store avatar");
            UploadError::new(upload, "fs", "Unable to store the uploaded file")
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        // write next to the target and rename, so readers never see a half-written file
        let partial = self.dir.join(format!(".{name}.{}.part", uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&partial, &upload.bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_err(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, self.dir.join(name)).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_err(e));
        }

        tracing::debug!(name, bytes = upload.bytes.len(), "avatar stored");
        Ok(())
    }

    async fn remove(&self, name: &str) {
        if !is_plain_name(name) {
            return;
        }
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => tracing::debug!(name, "avatar removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, name, "failed to remove avatar"),
        }
    }
}
