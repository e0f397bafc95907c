use std::path::Path;

use config::UploadConfig;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file selected")]
    Empty,
    #[error("File type not allowed. Allowed types: {0}")]
    InvalidExtension(String),
    #[error("File too large ({size} bytes). Maximum size is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An accepted image that has not been written yet.
#[derive(Debug)]
pub struct PendingImage {
    pub file_name: String,
    bytes: Vec<u8>,
}

impl PendingImage {
    /// Checks the original name and size against the upload policy and picks
    /// a unique stored name.
    pub fn accept(
        config: &UploadConfig,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, UploadError> {
        if original_name.trim().is_empty() || bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        let ext = original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| config.allows_extension(ext))
            .ok_or_else(|| UploadError::InvalidExtension(config.allowed_extensions.join(", ")))?;
        if bytes.len() > config.max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: config.max_bytes,
            });
        }
        Ok(Self {
            file_name: format!("{}.{}", Uuid::new_v4(), ext),
            bytes,
        })
    }

    pub async fn persist(self, dir: &Path) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(dir.join(&self.file_name), &self.bytes).await?;
        tracing::debug!(file = %self.file_name, size = self.bytes.len(), "Stored upload");
        Ok(self.file_name)
    }
}

/// Deletes a stored upload. Failures are logged, never returned.
pub async fn remove_stored(dir: &Path, file_name: &str) {
    let path = dir.join(file_name);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Failed to remove image {}: {}", path.display(), err);
    }
}
