//! Media storage for files attached to submissions. The engine never looks at media; it is
//! stored so the record can point back at it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::models::recommendation::MediaRef;

const MAX_FILENAME_CHARS: usize = 100;

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, filename: &str, mimetype: &str, bytes: Bytes) -> Result<MediaRef>;
}

/// `media/<uuid>-<sanitized filename>`
pub fn media_key(filename: &str) -> String {
    format!("media/{}-{}", Uuid::new_v4(), sanitize_filename(filename))
}

/// Strips any path and keeps `[A-Za-z0-9._-]`, replacing everything else with `_`.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_start_matches('.');
    let cleaned: String = base
        .chars()
        .take(MAX_FILENAME_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Writes media under a local directory.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, filename: &str, mimetype: &str, bytes: Bytes) -> Result<MediaRef> {
        let key = media_key(filename);
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Stored media {} ({} bytes)", path.display(), bytes.len());
        Ok(MediaRef {
            key,
            filename: filename.to_string(),
            mimetype: mimetype.to_string(),
            size: bytes.len() as u64,
        })
    }
}

/// Writes media to an S3 (or MinIO) bucket.
pub struct S3MediaStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3MediaStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put(&self, filename: &str, mimetype: &str, bytes: Bytes) -> Result<MediaRef> {
        let key = media_key(filename);
        let size = bytes.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(mimetype)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded media to s3://{}/{}", self.bucket, key);
        Ok(MediaRef {
            key,
            filename: filename.to_string(),
            mimetype: mimetype.to_string(),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_paths_and_odd_chars() {
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\bumper scratch.png"), "bumper_scratch.png");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
    }

    #[test]
    fn test_sanitize_filename_is_bounded() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_media_key_layout() {
        let key = media_key("walkaround.mp4");
        assert!(key.starts_with("media/"));
        assert!(key.ends_with("-walkaround.mp4"));
    }

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let media = store
            .put("door ding.jpg", "image/jpeg", Bytes::from_static(b"\xff\xd8jpeg"))
            .await
            .unwrap();

        assert_eq!(media.filename, "door ding.jpg");
        assert_eq!(media.mimetype, "image/jpeg");
        assert_eq!(media.size, 6);
        let written = std::fs::read(dir.path().join(&media.key)).unwrap();
        assert_eq!(written, b"\xff\xd8jpeg");
    }
}
