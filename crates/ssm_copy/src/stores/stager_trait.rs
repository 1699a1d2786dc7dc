//! Trait for object staging backends

use crate::models::error::StageError;
use std::path::Path;

#[async_trait::async_trait]
pub trait ObjectStager: Send + Sync {
    /// Create or overwrite one object with `content`.
    async fn stage(&self, bucket: &str, key: &str, content: Vec<u8>) -> Result<(), StageError>;

    /// Read the local file at `path` to completion and stage its bytes.
    async fn stage_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), StageError> {
        let content = tokio::fs::read(path).await.map_err(|source| StageError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.stage(bucket, key, content).await
    }
}

/// Rejects empty bucket or key before anything is sent.
pub fn validate_location(bucket: &str, key: &str) -> Result<(), StageError> {
    if bucket.trim().is_empty() {
        return Err(StageError::InvalidInput("bucket must not be empty".to_string()));
    }
    if key.trim().is_empty() {
        return Err(StageError::InvalidInput("key must not be empty".to_string()));
    }
    Ok(())
}
