//! Artifact storage. Production writes to S3 (MinIO locally); tests keep artifacts in memory.

#[cfg(test)]
use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
#[cfg(test)]
use bytes::Bytes;
#[cfg(test)]
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::document::ArtifactRef;
use crate::render::Artifact;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("S3 upload failed: {0}")]
    Upload(String),
}

#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    async fn put(&self, document_id: Uuid, artifact: &Artifact) -> Result<ArtifactRef, StorageError>;
}

pub fn artifact_key(document_id: Uuid, name: &str) -> String {
    format!("documents/{document_id}/{name}")
}

#[derive(Clone)]
pub struct S3ArtifactStorage {
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ArtifactStorage {
    pub fn new(s3: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            s3,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ArtifactStorage for S3ArtifactStorage {
    async fn put(&self, document_id: Uuid, artifact: &Artifact) -> Result<ArtifactRef, StorageError> {
        let key = artifact_key(document_id, &artifact.name);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(artifact.body.clone()))
            .content_type(&artifact.content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        info!(%document_id, "Uploaded artifact to s3://{}/{}", self.bucket, key);
        Ok(ArtifactRef {
            name: artifact.name.clone(),
            content_type: artifact.content_type.clone(),
            location: format!("s3://{}/{}", self.bucket, key),
        })
    }
}

/// Keeps artifact bodies keyed by their storage key.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryArtifactStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

#[cfg(test)]
impl InMemoryArtifactStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }
}

#[cfg(test)]
#[async_trait]
impl ArtifactStorage for InMemoryArtifactStorage {
    async fn put(&self, document_id: Uuid, artifact: &Artifact) -> Result<ArtifactRef, StorageError> {
        let key = artifact_key(document_id, &artifact.name);
        self.objects.lock().insert(key.clone(), artifact.body.clone());
        Ok(ArtifactRef {
            name: artifact.name.clone(),
            content_type: artifact.content_type.clone(),
            location: format!("memory://{key}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_put_uses_document_key() {
        let storage = InMemoryArtifactStorage::new();
        let document_id = Uuid::new_v4();
        let artifact = Artifact {
            name: "index.md".to_string(),
            content_type: "text/markdown".to_string(),
            body: Bytes::from_static(b"# Ada"),
        };

        let reference = storage.put(document_id, &artifact).await.unwrap();

        let key = format!("documents/{document_id}/index.md");
        assert_eq!(reference.location, format!("memory://{key}"));
        assert_eq!(storage.get(&key).unwrap(), Bytes::from_static(b"# Ada"));
        assert_eq!(storage.len(), 1);
    }
}
