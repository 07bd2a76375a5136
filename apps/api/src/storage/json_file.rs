use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::models::recommendation::{RecommendationResult, StoredRecommendation};
use crate::storage::RecommendationStore;

/// Keeps the whole history as one JSON array on disk.
///
/// Appends are serialized through a mutex and land via temp-file + rename, so a concurrent
/// `load()` always sees either the old or the new file, never a torn write.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<StoredRecommendation>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse {}", self.path.display())),
            // First run: no history yet
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }
}

#[async_trait]
impl RecommendationStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<StoredRecommendation>> {
        self.read_all().await
    }

    async fn append(&self, result: RecommendationResult) -> Result<StoredRecommendation> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_all().await?;
        let record = StoredRecommendation::new(result);
        records.push(record.clone());

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &records))
            .await
            .context("JSON store writer task panicked")??;

        info!(
            "Appended recommendation {} to {}",
            record.id,
            self.path.display()
        );
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredRecommendation>> {
        Ok(self.read_all().await?.into_iter().find(|r| r.id == id))
    }
}

fn write_atomically(path: &Path, records: &[StoredRecommendation]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
